//! Boundary error types. The pipeline stages themselves are infallible; errors
//! only come from validating caller input and from the persistence collaborator.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("window_days must be within 1..={max}, got {got}")]
    InvalidWindow { got: i64, max: i64 },

    #[error("top_n must be within 1..={max}, got {got}")]
    InvalidTopN { got: usize, max: usize },

    #[error("lookback_days ({lookback}) must exceed window_days ({window})")]
    InvalidLookback { lookback: i64, window: i64 },

    #[error("lookback_days must be within 1..={max}, got {got}")]
    LookbackOutOfRange { got: i64, max: i64 },

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("at least one source must be enabled")]
    NoSources,

    #[error("config file error: {0}")]
    File(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("history store error: {0}")]
    Store(String),

    #[error("history store lock poisoned")]
    Poisoned,

    #[error("artifact write failed: {0}")]
    Artifact(#[from] std::io::Error),

    #[error("artifact encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that stop a run before it starts. Storage failures after the
/// stages ran are reported on the run result instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}
