//! Wide statistics table -> year-indexed table with one column per named series.
//!
//! The first two columns are trusted by position only (entity, then time label);
//! every other column is trusted by its label, which is matched against the
//! requested series codes.
use crate::error::ReshapeError;
use crate::models::{NormalizedRow, NormalizedTable, RawTable, Scalar, SeriesRequest};
use ahash::{AHashMap, AHashSet};
use regex::Regex;
use std::sync::LazyLock;

static TIME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^0-9]*([0-9]+)$").expect("time label pattern")
});

const ENTITY_COL: usize = 0;
const TIME_COL: usize = 1;

/// Decode a time cell such as `YR2000`, `2000` or `2000.0` into a year.
pub fn parse_year(cell: &Scalar) -> Option<i32> {
    match cell {
        Scalar::Null => None,
        Scalar::Number(n) if n.is_finite() && n.fract() == 0.0 => i32::try_from(*n as i64).ok(),
        Scalar::Number(_) => None,
        Scalar::Text(s) => {
            let caps = TIME_LABEL.captures(s.trim())?;
            caps.get(1)?.as_str().parse::<i32>().ok()
        }
    }
}

/// Decode a value cell. Blank text and `..` count as missing; so does any
/// other non-numeric text, with a warning.
fn parse_value(cell: &Scalar, entity: &str, code: &str) -> Option<f64> {
    match cell {
        Scalar::Null => None,
        Scalar::Number(n) if n.is_nan() => None,
        Scalar::Number(n) => Some(*n),
        Scalar::Text(s) => {
            let t = s.trim();
            if t.is_empty() || t == ".." {
                return None;
            }
            let parsed = t.parse::<f64>().ok();
            if parsed.is_none() {
                log::warn!(
                    "reshape: value '{}' for series '{}' of '{}' is not numeric, treated as missing",
                    t,
                    code,
                    entity
                );
            }
            parsed
        }
    }
}

struct LongRecord<'a> {
    entity: String,
    year: i32,
    code: &'a str,
    value: Option<f64>,
}

/// Reshape `raw` into a `NormalizedTable` for `series`.
///
/// Returns `Ok(None)` when there is nothing to show: no input rows, or no row
/// and requested series that survive decoding. That is not an error.
///
/// Rows with a missing entity or a time label that does not decode are dropped.
/// Repeated (entity, year, code) observations keep the first one seen. Codes
/// not in `series` never reach the output.
pub fn reshape(
    raw: &RawTable,
    series: &SeriesRequest,
) -> Result<Option<NormalizedTable>, ReshapeError> {
    if raw.rows.is_empty() {
        return Ok(None);
    }
    if raw.columns.len() <= TIME_COL {
        return Err(ReshapeError::Unknown(format!(
            "table has {} column(s); entity and time columns are required",
            raw.columns.len()
        )));
    }

    let wanted: AHashSet<&str> = series.iter().map(|(_, code)| code).collect();
    let value_cols: Vec<(usize, &str)> = raw
        .columns
        .iter()
        .enumerate()
        .skip(TIME_COL + 1)
        .filter(|(_, label)| wanted.contains(label.as_str()))
        .map(|(i, label)| (i, label.as_str()))
        .collect();
    log::debug!(
        "reshape: {} rows, {} of {} value columns requested",
        raw.rows.len(),
        value_cols.len(),
        raw.columns.len() - TIME_COL - 1
    );

    // Long form, first-seen wins per (entity, year, code).
    let mut seen: AHashSet<(String, i32, &str)> = AHashSet::new();
    let mut long: Vec<LongRecord> = Vec::new();
    let mut dropped = 0usize;
    for (n, row) in raw.rows.iter().enumerate() {
        if row.len() != raw.columns.len() {
            return Err(ReshapeError::Unknown(format!(
                "row {} has {} cells, expected {}",
                n,
                row.len(),
                raw.columns.len()
            )));
        }
        let (Some(entity), Some(year)) = (row[ENTITY_COL].as_label(), parse_year(&row[TIME_COL]))
        else {
            dropped += 1;
            continue;
        };
        for &(idx, code) in &value_cols {
            if !seen.insert((entity.clone(), year, code)) {
                continue;
            }
            let value = parse_value(&row[idx], &entity, code);
            long.push(LongRecord {
                entity: entity.clone(),
                year,
                code,
                value,
            });
        }
    }
    if dropped > 0 {
        log::warn!("reshape: dropped {} row(s) without entity or decodable time", dropped);
    }

    // Output columns: requested codes that were observed, in request order.
    let observed: AHashSet<&str> = value_cols.iter().map(|&(_, code)| code).collect();
    let columns: Vec<(&str, &str)> = series
        .iter()
        .filter(|(_, code)| observed.contains(code))
        .collect();
    if columns.is_empty() || long.is_empty() {
        return Ok(None);
    }
    let col_of: AHashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, &(_, code))| (code, i))
        .collect();

    // Pivot back to wide, rows in first-seen (entity, year) order.
    let mut index: AHashMap<(String, i32), usize> = AHashMap::new();
    let mut rows: Vec<NormalizedRow> = Vec::new();
    for rec in long {
        let slot = *index
            .entry((rec.entity.clone(), rec.year))
            .or_insert_with(|| {
                rows.push(NormalizedRow {
                    entity: rec.entity.clone(),
                    year: rec.year,
                    values: vec![None; columns.len()],
                });
                rows.len() - 1
            });
        let Some(&c) = col_of.get(rec.code) else {
            return Err(ReshapeError::Unknown(format!(
                "series code '{}' lost its column",
                rec.code
            )));
        };
        rows[slot].values[c] = rec.value;
    }

    rows.sort_by_key(|r| r.year);

    Ok(Some(NormalizedTable {
        series: columns.iter().map(|&(name, _)| name.to_string()).collect(),
        rows,
    }))
}

/// Decode a JSON records payload and reshape it. A payload that is not an
/// array of objects is `ReshapeError::Parse`.
pub fn reshape_json(
    payload: &str,
    series: &SeriesRequest,
) -> Result<Option<NormalizedTable>, ReshapeError> {
    let raw = RawTable::from_json_records(payload)
        .map_err(|e| ReshapeError::Parse(format!("invalid records payload: {}", e)))?;
    reshape(&raw, series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_labels() {
        assert_eq!(parse_year(&"YR2000".into()), Some(2000));
        assert_eq!(parse_year(&" 1999 ".into()), Some(1999));
        assert_eq!(parse_year(&Scalar::Number(2001.0)), Some(2001));
        assert_eq!(parse_year(&"YR".into()), None);
        assert_eq!(parse_year(&"YR20x0".into()), None);
        assert_eq!(parse_year(&Scalar::Null), None);
        assert_eq!(parse_year(&"YR99999999999".into()), None);
    }

    #[test]
    fn value_cells() {
        assert_eq!(parse_value(&"..".into(), "IND", "a"), None);
        assert_eq!(parse_value(&" 2.5 ".into(), "IND", "a"), Some(2.5));
        assert_eq!(parse_value(&"n/a".into(), "IND", "a"), None);
        assert_eq!(parse_value(&Scalar::Number(f64::NAN), "IND", "a"), None);
    }
}
