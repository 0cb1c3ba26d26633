use crate::models::FailureKind;
use thiserror::Error;

/// A classified failure from the AI endpoint. Carried inside `CallOutcome::Failure`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct CallFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl CallFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Failures of the reshape step. "No data" is not one of them; see `reshape::reshape`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReshapeError {
    #[error("ParseError: {0}")]
    Parse(String),

    #[error("UnknownError: {0}")]
    Unknown(String),
}

/// Failures of the statistics load path (adapter + reshape).
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("statistics source failed: {0:#}")]
    Source(anyhow::Error),

    #[error(transparent)]
    Reshape(#[from] ReshapeError),
}

/// Consumption-side failures when fetcher text is read as a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("the model reported that no structured data was found")]
    NoData,

    #[error("Malformed: returned text is not a valid table: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid time range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },

    #[error("invalid series request: {0}")]
    InvalidSeries(String),
}
