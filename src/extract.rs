//! Caller-side reading of fetcher output as a table.
//!
//! The fetcher only promises text. The instruction asks the model for bare CSV,
//! and this module checks that it actually got some.
use crate::error::ExtractError;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

/// Default system instruction for article-to-CSV extraction.
pub const EXTRACTION_INSTRUCTION: &str = "\
You are an automated data extraction bot.
Your ONLY job is to find structured data and return it as a CSV.
You MUST follow these rules:
1. The first line MUST be the CSV headers.
2. You MUST NOT add any introduction, explanation, or notes.
3. If you find no data, you MUST return the single string: \"Error: No structured data found.\"
4. Do not use any formatting like markdown.
";

/// Sentinel the instruction tells the model to answer with when it finds nothing.
pub const NO_DATA_SENTINEL: &str = "Error: No structured data found.";

/// Header + rows read from model output. All rows have the header's width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Column parsed as numbers; cells that are not numbers become `None`.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        Some(
            self.column(name)?
                .into_iter()
                .map(|c| c.trim().replace(',', "").parse::<f64>().ok())
                .collect(),
        )
    }
}

/// Read `text` as CSV with a header line.
///
/// Fails with `ExtractError::NoData` on the no-data sentinel and with
/// `ExtractError::Malformed` on anything that is not a rectangular CSV.
pub fn parse_extraction(text: &str) -> Result<ExtractedTable, ExtractError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::Malformed("empty response".into()));
    }
    if text == NO_DATA_SENTINEL {
        return Err(ExtractError::NoData);
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ExtractError::Malformed(format!("{} | data: '{}'", e, text)))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ExtractError::Malformed(format!("no header line | data: '{}'", text)));
    }

    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| ExtractError::Malformed(format!("{} | data: '{}'", e, text)))?;
        rows.push(rec.iter().map(str::to_string).collect());
    }
    Ok(ExtractedTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_header_and_rows() {
        let t = parse_extraction("Year,GDP\n2020,1.5\n2021,2.5\n").unwrap();
        assert_eq!(t.headers, vec!["Year", "GDP"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.numeric_column("GDP").unwrap(), vec![Some(1.5), Some(2.5)]);
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let err = parse_extraction("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, ExtractError::Malformed(_)));
    }

    #[test]
    fn sentinel_is_no_data() {
        assert_eq!(
            parse_extraction("  Error: No structured data found.\n"),
            Err(ExtractError::NoData)
        );
    }
}
