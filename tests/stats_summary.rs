use dashfeed::models::{NormalizedRow, NormalizedTable};
use dashfeed::stats::{GroupKey, grouped_summary};

fn row(entity: &str, year: i32, values: Vec<Option<f64>>) -> NormalizedRow {
    NormalizedRow {
        entity: entity.into(),
        year,
        values,
    }
}

#[test]
fn grouped_stats_handle_missing_and_median_even_odd() {
    // (AAA, S1) with values [1,2,3,4] -> median = (2+3)/2 = 2.5
    // (BBB, S1) with [10, None, 30] -> missing = 1, median = 20
    let table = NormalizedTable {
        series: vec!["S1".into()],
        rows: vec![
            row("AAA", 2018, vec![Some(1.0)]),
            row("BBB", 2018, vec![Some(10.0)]),
            row("AAA", 2019, vec![Some(2.0)]),
            row("BBB", 2019, vec![None]),
            row("AAA", 2020, vec![Some(3.0)]),
            row("BBB", 2020, vec![Some(30.0)]),
            row("AAA", 2021, vec![Some(4.0)]),
        ],
    };
    let got = grouped_summary(&table);
    assert_eq!(got.len(), 2);

    let a = &got[0];
    assert_eq!(
        a.key,
        GroupKey {
            entity: "AAA".into(),
            series: "S1".into()
        }
    );
    assert_eq!(a.count, 4);
    assert_eq!(a.missing, 0);
    assert_eq!(a.min, Some(1.0));
    assert_eq!(a.max, Some(4.0));
    assert!((a.mean.unwrap() - 2.5).abs() < 1e-9);
    assert!((a.median.unwrap() - 2.5).abs() < 1e-9);

    let b = &got[1];
    assert_eq!(b.key.entity, "BBB");
    assert_eq!(b.count, 2);
    assert_eq!(b.missing, 1);
    assert_eq!(b.mean.unwrap(), 20.0);
    assert_eq!(b.median.unwrap(), 20.0);
}

#[test]
fn one_group_per_series_and_all_missing_group() {
    let table = NormalizedTable {
        series: vec!["GDP".into(), "Pop".into()],
        rows: vec![
            row("IND", 2000, vec![Some(5.0), None]),
            row("IND", 2001, vec![Some(7.0), None]),
        ],
    };
    let got = grouped_summary(&table);
    assert_eq!(got.len(), 2);
    let pop = got.iter().find(|s| s.key.series == "Pop").unwrap();
    assert_eq!(pop.count, 0);
    assert_eq!(pop.missing, 2);
    assert_eq!(pop.mean, None);
    assert_eq!(pop.median, None);
}
