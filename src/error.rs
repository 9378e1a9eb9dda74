//! Error types for the forecast pipeline.

use thiserror::Error;

/// Terminal pipeline failure. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid wiring; the pipeline never starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A record violated the data model.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Malformed input row or file.
    #[error("failed to decode {origin}: {reason}")]
    Decode { origin: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Too few observations (or a non-finite result) for a key's forecast.
    #[error("forecast for key '{key}' failed: {source}")]
    Forecast {
        key: String,
        #[source]
        source: ForecastError,
    },

    /// A stage task panicked or was aborted.
    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: &'static str, reason: String },
}

impl PipelineError {
    pub(crate) fn decode(origin: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}

/// Degenerate numeric input to a forecast model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("{model} needs at least {needed} observed days, got {got}")]
    TooFewObservations {
        model: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("{model} produced a non-finite forecast ({value})")]
    NonFinite { model: &'static str, value: f64 },
}
