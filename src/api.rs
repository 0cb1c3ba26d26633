//! Synchronous client for the **World Bank Indicators API (v2)**.
//!
//! This module focuses on the `country/{code}/indicator/{codes}` endpoint and
//! hands results back as a wide [`RawTable`]: one row per (economy, year), one
//! column per indicator id, time labels written `YR<year>` like the API's own
//! bulk exports. Pagination is handled automatically.
//!
//! ### Notes
//! - The API sometimes serializes `per_page` as a **string**; we accept both string/number.
//! - When requesting **multiple indicators** at once, the API requires a `source` parameter
//!   (e.g., `source=2` for WDI). Without one, indicators are fetched one by one and merged.
//! - Time ranges are always sent as an explicit `start:end` pair.
//!
//! Typical usage:
//! ```no_run
//! # use dashfeed::{Client, DateRange};
//! let client = Client::default();
//! let table = client.fetch_raw_table(
//!     "IND",
//!     &["NY.GDP.MKTP.CD".into(), "SP.POP.TOTL".into()],
//!     "2000:2023".parse::<DateRange>()?,
//! )?;
//! # Ok::<(), anyhow::Error>(())
//! ```
use crate::models::{DateRange, Entry, Meta, RawTable, Scalar};
use ahash::AHashMap;
use anyhow::{Context, Result, bail};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::time::Duration;

/// Anything that can deliver a wide statistics table for one entity.
pub trait StatisticsSource {
    fn fetch_table(&self, entity: &str, codes: &[String], range: DateRange) -> Result<RawTable>;
}

#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    /// Numeric source id (e.g., 2 for WDI) sent with multi-indicator requests.
    pub source: Option<u32>,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        Self::new("https://api.worldbank.org/v2", Duration::from_secs(30))
            .expect("reqwest client build")
    }
}

// Allow -, _, . unescaped in codes (common for indicator ids)
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn enc_join<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(|s| percent_encoding::utf8_percent_encode(s.trim(), SAFE).to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Column labels of the entity/time pair in tables built here.
pub const ENTITY_LABEL: &str = "economy";
pub const TIME_LABEL: &str = "time";

impl Client {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout) // total request timeout
            .connect_timeout(Duration::from_secs(10)) // connect timeout
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("dashfeed/", env!("CARGO_PKG_VERSION"))) // set user agent
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            source: None,
            http,
        })
    }

    pub fn with_source(mut self, source: Option<u32>) -> Self {
        self.source = source;
        self
    }

    // Small retry for transient failures (5xx / network errors)
    fn get_json(&self, url: &str) -> Result<Value> {
        const BACKOFF_MS: [u64; 3] = [100, 300, 700];
        let mut last_err: Option<anyhow::Error> = None;
        for (attempt, backoff_ms) in BACKOFF_MS.into_iter().enumerate() {
            match self.http.get(url).send() {
                Ok(r) if r.status().is_success() => {
                    return r.json().context("decode json");
                }
                Ok(r) if r.status().is_server_error() => {
                    log::warn!("GET {} -> HTTP {}, retrying", url, r.status());
                }
                Ok(r) => bail!("request failed with HTTP {}", r.status()),
                Err(e) => {
                    log::warn!("GET {} failed: {}", url, e);
                    last_err = Some(e.into());
                }
            }
            if attempt + 1 < BACKOFF_MS.len() {
                std::thread::sleep(Duration::from_millis(backoff_ms));
            }
        }
        match last_err {
            Some(e) => Err(e.context("network error after retries")),
            None => bail!("server error after retries"),
        }
    }

    /// Fetch indicator observations for one entity.
    ///
    /// - `entity`: ISO3 (e.g., "IND"), ISO2, or an aggregate code (e.g., "EUU").
    /// - `indicators`: e.g., "SP.POP.TOTL". Multiple accepted.
    /// - `range`: inclusive year range, sent as `date=start:end`.
    pub fn fetch_observations(
        &self,
        entity: &str,
        indicators: &[String],
        range: DateRange,
    ) -> Result<Vec<Entry>> {
        if entity.trim().is_empty() {
            bail!("a country/region code is required");
        }
        if indicators.is_empty() {
            bail!("at least one indicator code required");
        }

        // Multi-indicator fallback: without a source id the API rejects the
        // joined form, so fetch each indicator separately and merge.
        if indicators.len() > 1 && self.source.is_none() {
            let mut all = Vec::new();
            for indicator in indicators {
                all.extend(self.fetch_observations(entity, std::slice::from_ref(indicator), range)?);
            }
            return Ok(all);
        }

        let country_spec = enc_join([entity]);
        let indicator_spec = enc_join(indicators.iter().map(|s| s.as_str()));
        let mut url = format!(
            "{}/country/{}/indicator/{}?format=json&per_page=1000&date={}",
            self.base_url,
            country_spec,
            indicator_spec,
            range.to_query_param()
        );
        if let Some(s) = self.source {
            url.push_str(&format!("&source={}", s));
        }

        // Safety cap to avoid pathological jobs
        let max_pages = 1000u32;

        let mut page = 1u32;
        let mut out: Vec<Entry> = Vec::new();
        loop {
            if page > max_pages {
                bail!("page limit exceeded ({})", max_pages);
            }
            let page_url = format!("{}&page={}", url, page);
            let v: Value = self
                .get_json(&page_url)
                .with_context(|| format!("GET {}", page_url))?;

            // The API returns [Meta, [Entry, ...]] or a "message" object in position 0 on error.
            let arr = v.as_array().ok_or_else(|| {
                anyhow::anyhow!("unexpected response shape: not a top-level array")
            })?;
            if arr.is_empty() {
                bail!("unexpected response: empty array");
            }
            if arr[0].get("message").is_some() {
                bail!("world bank api error: {}", arr[0]);
            }

            let meta: Meta = serde_json::from_value(arr[0].clone()).context("parse meta")?;
            // No observations come back as `null` in position 1.
            let entries: Vec<Entry> = match arr.get(1) {
                Some(Value::Null) | None => vec![],
                Some(list) => serde_json::from_value(list.clone()).context("parse entries")?,
            };
            log::debug!("page {}/{}: {} entries", meta.page, meta.pages, entries.len());
            out.extend(entries);

            if page >= meta.pages {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    /// Fetch observations and pivot them into a wide table.
    pub fn fetch_raw_table(
        &self,
        entity: &str,
        indicators: &[String],
        range: DateRange,
    ) -> Result<RawTable> {
        let entries = self.fetch_observations(entity, indicators, range)?;
        Ok(entries_to_wide(&entries, indicators))
    }
}

impl StatisticsSource for Client {
    fn fetch_table(&self, entity: &str, codes: &[String], range: DateRange) -> Result<RawTable> {
        self.fetch_raw_table(entity, codes, range)
    }
}

/// Pivot API observations into `economy, time, <indicator>...` columns.
///
/// Requested indicators come first in request order; ids the API added on its
/// own follow. Rows keep first-seen (economy, date) order, and a repeated
/// observation keeps its first value.
pub fn entries_to_wide(entries: &[Entry], requested: &[String]) -> RawTable {
    let mut columns: Vec<String> = vec![ENTITY_LABEL.into(), TIME_LABEL.into()];
    columns.extend(requested.iter().cloned());
    for e in entries {
        if !columns[2..].iter().any(|c| *c == e.indicator.id) {
            columns.push(e.indicator.id.clone());
        }
    }
    let col_of: AHashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .skip(2)
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut index: AHashMap<(&str, &str), usize> = AHashMap::new();
    let mut rows: Vec<Vec<Scalar>> = Vec::new();
    let mut filled: Vec<Vec<bool>> = Vec::new();
    for e in entries {
        let slot = *index.entry((e.entity(), e.date.as_str())).or_insert_with(|| {
            let mut row = vec![Scalar::Null; columns.len()];
            row[0] = Scalar::Text(e.entity().to_string());
            row[1] = Scalar::Text(format!("YR{}", e.date.trim()));
            rows.push(row);
            filled.push(vec![false; columns.len()]);
            rows.len() - 1
        });
        if let Some(&c) = col_of.get(e.indicator.id.as_str())
            && !filled[slot][c]
        {
            rows[slot][c] = e.value.into();
            filled[slot][c] = true;
        }
    }

    RawTable { columns, rows }
}
