use crate::models::{DateRange, NormalizedTable, SeriesRequest};
use ahash::AHashMap;
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

/// Full input tuple of a statistics load.
///
/// The series set is stored as sorted (name, code) pairs so that request order
/// does not split the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity: String,
    pub series: BTreeSet<(String, String)>,
    pub range: DateRange,
}

impl CacheKey {
    pub fn new(entity: &str, series: &SeriesRequest, range: DateRange) -> Self {
        Self {
            entity: entity.trim().to_string(),
            series: series
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
            range,
        }
    }
}

/// Memo of successful reshape results, including "no data".
///
/// Reads dominate. Two callers that miss the same key both compute and both
/// write; outputs are deterministic so the last write is as good as the first.
#[derive(Debug, Default)]
pub struct ReshapeCache {
    map: RwLock<AHashMap<CacheKey, Option<NormalizedTable>>>,
}

impl ReshapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Option<NormalizedTable>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: Option<NormalizedTable>) {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key, value);
    }

    /// Return the cached value or compute it without holding the lock.
    /// Errors are returned to the caller and not cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: CacheKey,
        compute: impl FnOnce() -> Result<Option<NormalizedTable>, E>,
    ) -> Result<Option<NormalizedTable>, E> {
        if let Some(hit) = self.get(&key) {
            log::debug!("cache hit for {} {}", key.entity, key.range);
            return Ok(hit);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
