// src/lib.rs
// Public library surface for the service binary, the demo and integration tests.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod hashing;
pub mod ingest;
pub mod metrics;
pub mod options;
pub mod persistence;

// Ranking pipeline stages, in execution order
pub mod timestamp;
pub mod dedup;
pub mod idea;
pub mod scoring;
pub mod baseline;
pub mod integrity;
pub mod pipeline;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::config::DigestConfig;
pub use crate::error::{ConfigError, PersistenceError, PipelineError};
pub use crate::ingest::CollectedBatch;
pub use crate::options::{RunOptions, RunRequest};
pub use crate::persistence::{ArtifactWriter, HistoryStore, InMemoryHistory};
pub use crate::pipeline::{Pipeline, RunResult};

use std::sync::Arc;

/// Pipeline wired the way the service runs it: in-memory history, wall clock
/// and artifacts under `cfg.artifact_dir`.
pub fn default_pipeline(cfg: &DigestConfig) -> Pipeline {
    Pipeline::new(Arc::new(InMemoryHistory::new()), Arc::new(SystemClock))
        .with_artifacts(ArtifactWriter::new(cfg.artifact_dir.clone()))
}
