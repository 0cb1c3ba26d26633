use crate::extract::ExtractedTable;
use crate::models::NormalizedTable;
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Prefix cells that a spreadsheet would evaluate as a formula.
fn guard_cell(s: &str) -> String {
    match s.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{}", s),
        _ => s.to_string(),
    }
}

fn fmt_value(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => x.to_string(),
        _ => String::new(),
    }
}

/// Save a normalized table as CSV: `entity,year,<series>...`, missing values blank.
pub fn save_csv<P: AsRef<Path>>(table: &NormalizedTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    let mut header = vec!["entity".to_string(), "year".to_string()];
    header.extend(table.series.iter().map(|s| guard_cell(s)));
    wtr.write_record(&header)?;
    for r in &table.rows {
        let mut rec = vec![guard_cell(&r.entity), r.year.to_string()];
        rec.extend(r.values.iter().map(|v| fmt_value(*v)));
        wtr.write_record(&rec)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save a normalized table as a pretty JSON array of records.
pub fn save_json<P: AsRef<Path>>(table: &NormalizedTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let s = serde_json::to_string_pretty(&table.to_records())?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Save an extracted table as CSV, guarding every text cell.
pub fn save_extracted_csv<P: AsRef<Path>>(table: &ExtractedTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    wtr.write_record(table.headers.iter().map(|h| guard_cell(h)))?;
    for row in &table.rows {
        // Numbers such as -3.5 stay numbers.
        wtr.write_record(row.iter().map(|c| {
            if c.parse::<f64>().is_ok() {
                c.clone()
            } else {
                guard_cell(c)
            }
        }))?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NormalizedRow;
    use tempfile::tempdir;

    #[test]
    fn write_csv_and_json() {
        let dir = tempdir().unwrap();
        let csvp = dir.path().join("x.csv");
        let jsonp = dir.path().join("x.json");
        let table = NormalizedTable {
            series: vec!["GDP".into(), "Population".into()],
            rows: vec![NormalizedRow {
                entity: "IND".into(),
                year: 2000,
                values: vec![Some(1.5), None],
            }],
        };
        save_csv(&table, &csvp).unwrap();
        save_json(&table, &jsonp).unwrap();
        let txt = std::fs::read_to_string(&csvp).unwrap();
        assert_eq!(txt, "entity,year,GDP,Population\nIND,2000,1.5,\n");
        assert!(jsonp.exists());
    }

    #[test]
    fn guard_prefixes_formula_starters() {
        assert_eq!(guard_cell("=1+1"), "'=1+1");
        assert_eq!(guard_cell("@foo"), "'@foo");
        assert_eq!(guard_cell("India"), "India");
    }
}
