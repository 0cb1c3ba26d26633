//! dashfeed
//!
//! The data core behind small charting dashboards: turn untrusted external data
//! into strict tables, and report every failure as a value.
//!
//! ### Features
//! - Call a text-generation endpoint with bounded retries and exponential backoff,
//!   classifying each outcome (`CallOutcome`)
//! - Check that the returned text really is CSV before anyone charts it
//! - Fetch World Bank indicators as a wide table and reshape it into a clean
//!   (entity, year) table with one named column per series
//! - Memoize reshaped results by (entity, series set, time range)
//! - Save as CSV or JSON; quick summary statistics (min, max, mean, median)
//!
//! ### Example
//! ```no_run
//! use dashfeed::{Client, DateRange, ReshapeCache, SeriesRequest};
//!
//! let client = Client::default();
//! let cache = ReshapeCache::new();
//! let series = SeriesRequest::new([
//!     ("GDP", "NY.GDP.MKTP.CD"),
//!     ("Population", "SP.POP.TOTL"),
//! ])?;
//! let range: DateRange = "2000:2023".parse()?;
//! match dashfeed::pipeline::load_series(&client, Some(&cache), "IND", &series, range)? {
//!     Some(table) => dashfeed::storage::save_csv(&table, "ind.csv")?,
//!     None => eprintln!("no data"),
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod reshape;
pub mod stats;
pub mod storage;

pub use api::{Client, StatisticsSource};
pub use cache::ReshapeCache;
pub use error::{CallFailure, ExtractError, LoadError, ModelError, ReshapeError};
pub use fetcher::ResilientFetcher;
pub use models::{
    CallOutcome, DateRange, FailureKind, NormalizedTable, RawTable, RequestPayload, Scalar,
    SeriesRequest,
};
pub use reshape::reshape;
