use crate::error::{CallFailure, ModelError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// AI call types
// ---------------------------------------------------------------------------

/// One instruction/content pair sent to the text-generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPayload {
    pub instruction: String,
    pub content: String,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct PartList<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: PartList<'a>,
    contents: [PartList<'a>; 1],
}

impl RequestPayload {
    pub fn new(instruction: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            content: content.into(),
        }
    }

    /// JSON body: `systemInstruction` carries the instruction, `contents` the user text.
    pub fn to_body(&self) -> Value {
        let req = GenerateRequest {
            system_instruction: PartList {
                parts: [TextPart {
                    text: &self.instruction,
                }],
            },
            contents: [PartList {
                parts: [TextPart {
                    text: &self.content,
                }],
            }],
        };
        // Only string fields, serialization cannot fail.
        serde_json::to_value(req).unwrap_or(Value::Null)
    }
}

/// Failure classes reported by the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Remote answered with a non-success status. Not retried.
    HttpStatus,
    /// Body undecodable or missing the expected fields.
    Malformed,
    /// Remote policy refusal.
    Blocked,
    /// Transport-level failure (connect, reset, timeout, DNS).
    NetworkError,
    /// Attempts consumed without a resolution.
    Exhausted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::HttpStatus => "HttpStatus",
            FailureKind::Malformed => "Malformed",
            FailureKind::Blocked => "Blocked",
            FailureKind::NetworkError => "NetworkError",
            FailureKind::Exhausted => "Exhausted",
        };
        f.write_str(s)
    }
}

/// Result of one `ResilientFetcher::fetch` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(String),
    Failure(CallFailure),
}

impl CallOutcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        CallOutcome::Failure(CallFailure::new(kind, detail))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::Failure(f) => Some(f.kind),
        }
    }

    pub fn into_result(self) -> Result<String, CallFailure> {
        match self {
            CallOutcome::Success(text) => Ok(text),
            CallOutcome::Failure(f) => Err(f),
        }
    }
}

// Response shape of the generateContent endpoint. Everything optional: the
// fetcher decides what is missing, not serde.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].text`, if the whole path exists.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }

    pub fn has_candidates(&self) -> bool {
        self.candidates.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Time ranges
// ---------------------------------------------------------------------------

/// Inclusive year range, written `start:end`.
///
/// This is the only time encoding accepted for statistics queries; single years
/// and open-ended forms like `2000:` are rejected on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: i32,
    pub end: i32,
}

impl DateRange {
    pub fn new(start: i32, end: i32) -> Result<Self, ModelError> {
        if start > end {
            return Err(ModelError::InvalidRange {
                input: format!("{}:{}", start, end),
                reason: "start is after end".into(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn to_query_param(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for DateRange {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ModelError::InvalidRange {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let (a, b) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("expected START:END"))?;
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return Err(invalid("open-ended ranges are not accepted"));
        }
        let start = a.parse::<i32>().map_err(|_| invalid("start is not a year"))?;
        let end = b.parse::<i32>().map_err(|_| invalid("end is not a year"))?;
        if start > end {
            return Err(invalid("start is after end"));
        }
        Ok(Self { start, end })
    }
}

// ---------------------------------------------------------------------------
// Raw (wide, untrusted) tables
// ---------------------------------------------------------------------------

/// One cell of a `RawTable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Render as an identity string. `Null` and blank text have none.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(format!("{}", *n as i64)),
            Scalar::Number(n) => Some(n.to_string()),
            Scalar::Text(s) if s.trim().is_empty() => None,
            Scalar::Text(s) => Some(s.trim().to_string()),
        }
    }

    /// Cell for any JSON value. Booleans, arrays and objects keep their JSON
    /// text, so they never read as numbers or years.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => Scalar::Null,
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| Scalar::Text(n.to_string()), Scalar::Number),
            Value::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}

impl From<Option<f64>> for Scalar {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Scalar::Null, Scalar::Number)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// Wide table as delivered by a statistics source.
///
/// Column labels are not trusted: by convention the first two columns are the
/// entity and the time label, whatever they are called.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Scalar>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build from a JSON array of objects (records orientation).
    ///
    /// Columns are the union of keys in first-seen order; a key missing from a
    /// record becomes `Scalar::Null`. Only the outer shape can fail: cells are
    /// decoded with [`Scalar::from_json`].
    pub fn from_json_records(payload: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<Map<String, Value>> = serde_json::from_str(payload)?;
        let mut columns: Vec<String> = Vec::new();
        for rec in &records {
            for key in rec.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        let mut table = RawTable::new(columns);
        for rec in records {
            let mut row = Vec::with_capacity(table.columns.len());
            for col in &table.columns {
                row.push(rec.get(col).map_or(Scalar::Null, Scalar::from_json));
            }
            table.rows.push(row);
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Series requests and normalized output
// ---------------------------------------------------------------------------

/// Ordered mapping of display name -> external series code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesRequest {
    entries: Vec<(String, String)>,
}

impl SeriesRequest {
    /// Names and codes must be non-empty and unique.
    pub fn new<I, N, C>(pairs: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let mut names = HashSet::new();
        let mut codes = HashSet::new();
        let mut entries = Vec::new();
        for (n, c) in pairs {
            let (n, c) = (n.into().trim().to_string(), c.into().trim().to_string());
            if n.is_empty() || c.is_empty() {
                return Err(ModelError::InvalidSeries(
                    "series names and codes must be non-empty".into(),
                ));
            }
            if !names.insert(n.clone()) {
                return Err(ModelError::InvalidSeries(format!("duplicate series name '{}'", n)));
            }
            if !codes.insert(c.clone()) {
                return Err(ModelError::InvalidSeries(format!("duplicate series code '{}'", c)));
            }
            entries.push((n, c));
        }
        if entries.is_empty() {
            return Err(ModelError::InvalidSeries("at least one series required".into()));
        }
        Ok(Self { entries })
    }

    /// Parse `NAME=CODE` items, e.g. `GDP=NY.GDP.MKTP.CD`.
    pub fn parse_pairs<S: AsRef<str>>(items: &[S]) -> Result<Self, ModelError> {
        let mut pairs = Vec::with_capacity(items.len());
        for item in items {
            let item = item.as_ref();
            let (name, code) = item.rsplit_once('=').ok_or_else(|| {
                ModelError::InvalidSeries(format!("expected NAME=CODE, got '{}'", item))
            })?;
            pairs.push((name.to_string(), code.to_string()));
        }
        Self::new(pairs)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn codes(&self) -> Vec<String> {
        self.entries.iter().map(|(_, c)| c.clone()).collect()
    }

    /// Inverse lookup: code -> display name.
    pub fn name_for(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, c)| c == code)
            .map(|(n, _)| n.as_str())
    }
}

/// One (entity, year) row; `values` is aligned with `NormalizedTable::series`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub entity: String,
    pub year: i32,
    pub values: Vec<Option<f64>>,
}

/// Year-indexed table, one column per requested series name.
///
/// At most one row per (entity, year); rows ascend by year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub series: Vec<String>,
    pub rows: Vec<NormalizedRow>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.series.iter().position(|s| s == name)
    }

    /// Value of series `name` in `row`; `None` when missing or not a column.
    pub fn value(&self, row: &NormalizedRow, name: &str) -> Option<f64> {
        let idx = self.column_index(name)?;
        row.values.get(idx).copied().flatten()
    }

    pub fn find(&self, entity: &str, year: i32) -> Option<&NormalizedRow> {
        self.rows.iter().find(|r| r.entity == entity && r.year == year)
    }

    /// Records orientation: `{"entity":..,"year":..,<name>:<value|null>,..}`.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|r| {
                let mut m = Map::new();
                m.insert("entity".into(), Value::String(r.entity.clone()));
                m.insert("year".into(), Value::from(r.year));
                for (name, v) in self.series.iter().zip(&r.values) {
                    let cell = v
                        .and_then(serde_json::Number::from_f64)
                        .map_or(Value::Null, Value::Number);
                    m.insert(name.clone(), cell);
                }
                m
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// World Bank API wire types
// ---------------------------------------------------------------------------

/// Metadata section returned by the API (position 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub page: u32,
    pub pages: u32,
    /// Some responses encode `per_page` as a string, others as a number.
    /// Accept both and normalize to `u32`.
    #[serde(deserialize_with = "de_u32_from_string_or_number")]
    pub per_page: u32,
    pub total: u32,
}

/// Serde helper: parse `u32` from either a JSON number or a string.
fn de_u32_from_string_or_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct U32Visitor;

    impl<'de> Visitor<'de> for U32Visitor {
        type Value = u32;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a string or integer representing a non-negative number")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(E::custom)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(|_| E::custom("negative or oversized value for u32"))
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            s.trim().parse::<u32>().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(U32Visitor)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeName {
    pub id: String,
    pub value: String,
}

/// Raw observation from the indicator endpoint (position 1 array).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub indicator: CodeName,
    pub country: CodeName,
    pub countryiso3code: String,
    pub date: String,
    pub value: Option<f64>,
}

impl Entry {
    /// ISO3 code when present, otherwise the API's own country id (aggregates).
    pub fn entity(&self) -> &str {
        if self.countryiso3code.trim().is_empty() {
            &self.country.id
        } else {
            &self.countryiso3code
        }
    }
}
