use crate::api::StatisticsSource;
use crate::cache::{CacheKey, ReshapeCache};
use crate::error::LoadError;
use crate::models::{DateRange, NormalizedTable, SeriesRequest};
use crate::reshape::reshape;

/// Load `series` for `entity` over `range`: source -> reshape, memoized in `cache`.
///
/// `Ok(None)` means the source had no usable data. Source and reshape failures
/// are returned as `LoadError` and are never cached.
pub fn load_series<S: StatisticsSource + ?Sized>(
    source: &S,
    cache: Option<&ReshapeCache>,
    entity: &str,
    series: &SeriesRequest,
    range: DateRange,
) -> Result<Option<NormalizedTable>, LoadError> {
    let compute = || -> Result<Option<NormalizedTable>, LoadError> {
        let raw = source
            .fetch_table(entity, &series.codes(), range)
            .map_err(LoadError::Source)?;
        log::info!(
            "fetched {} raw row(s) for {} ({})",
            raw.len(),
            entity,
            range
        );
        Ok(reshape(&raw, series)?)
    };

    match cache {
        Some(cache) => cache.get_or_try_insert_with(CacheKey::new(entity, series, range), compute),
        None => compute(),
    }
}
