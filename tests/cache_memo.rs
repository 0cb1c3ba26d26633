use anyhow::{Result, bail};
use dashfeed::cache::{CacheKey, ReshapeCache};
use dashfeed::models::{DateRange, RawTable, Scalar, SeriesRequest};
use dashfeed::pipeline::load_series;
use dashfeed::{LoadError, StatisticsSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-table source that counts how often it is asked.
#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
    fail: bool,
}

impl StatisticsSource for Counting {
    fn fetch_table(&self, entity: &str, codes: &[String], range: DateRange) -> Result<RawTable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("provider unavailable");
        }
        let mut columns = vec!["economy".to_string(), "time".to_string()];
        columns.extend(codes.iter().cloned());
        let mut t = RawTable::new(columns);
        for year in range.start..=range.end {
            let mut row: Vec<Scalar> = vec![entity.into(), format!("YR{year}").into()];
            row.extend(codes.iter().enumerate().map(|(i, _)| Scalar::from(year as f64 + i as f64)));
            t.push_row(row);
        }
        Ok(t)
    }
}

fn gdp_pop() -> SeriesRequest {
    SeriesRequest::new([("GDP", "NY.GDP.MKTP.CD"), ("Population", "SP.POP.TOTL")]).unwrap()
}

#[test]
fn hit_matches_fresh_computation_without_refetch() {
    let source = Counting::default();
    let cache = ReshapeCache::new();
    let range = DateRange::new(2000, 2002).unwrap();

    let first = load_series(&source, Some(&cache), "IND", &gdp_pop(), range).unwrap();
    let second = load_series(&source, Some(&cache), "IND", &gdp_pop(), range).unwrap();
    let fresh = load_series(&source, None, "IND", &gdp_pop(), range).unwrap();

    assert_eq!(first, second);
    assert_eq!(second, fresh);
    // Two calls through the cache, one without.
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 1);
}

#[test]
fn key_covers_entity_series_and_range() {
    let source = Counting::default();
    let cache = ReshapeCache::new();
    let r1 = DateRange::new(2000, 2002).unwrap();
    let r2 = DateRange::new(2000, 2003).unwrap();

    load_series(&source, Some(&cache), "IND", &gdp_pop(), r1).unwrap();
    load_series(&source, Some(&cache), "PAK", &gdp_pop(), r1).unwrap();
    load_series(&source, Some(&cache), "IND", &gdp_pop(), r2).unwrap();
    let gdp_only = SeriesRequest::new([("GDP", "NY.GDP.MKTP.CD")]).unwrap();
    load_series(&source, Some(&cache), "IND", &gdp_only, r1).unwrap();

    assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    assert_eq!(cache.len(), 4);
}

#[test]
fn key_ignores_request_order() {
    let range = DateRange::new(2000, 2001).unwrap();
    let swapped =
        SeriesRequest::new([("Population", "SP.POP.TOTL"), ("GDP", "NY.GDP.MKTP.CD")]).unwrap();
    assert_eq!(
        CacheKey::new("IND", &gdp_pop(), range),
        CacheKey::new("IND", &swapped, range)
    );
}

#[test]
fn failures_are_not_cached() {
    let source = Counting {
        fail: true,
        ..Default::default()
    };
    let cache = ReshapeCache::new();
    let range = DateRange::new(2000, 2001).unwrap();

    for _ in 0..2 {
        let err = load_series(&source, Some(&cache), "IND", &gdp_pop(), range).unwrap_err();
        assert!(matches!(err, LoadError::Source(_)));
    }
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_empty());
}

#[test]
fn concurrent_population_is_consistent() {
    let source = Arc::new(Counting::default());
    let cache = Arc::new(ReshapeCache::new());
    let range = DateRange::new(1990, 2020).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (source, cache) = (source.clone(), cache.clone());
            std::thread::spawn(move || {
                load_series(source.as_ref(), Some(cache.as_ref()), "IND", &gdp_pop(), range).unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.len(), 1);
    cache.clear();
    assert!(cache.is_empty());
}
