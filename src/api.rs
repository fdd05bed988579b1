use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::config::DigestConfig;
use crate::error::{PersistenceError, PipelineError};
use crate::ingest::types::Source;
use crate::ingest::CollectedBatch;
use crate::options::RunRequest;
use crate::persistence::RunMetadata;
use crate::pipeline::{Pipeline, RunResult};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<DigestConfig>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, config: DigestConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sources", get(list_sources))
        .route("/runs", post(submit_run))
        .route("/runs/{run_id}", get(get_run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Alias used by the binary and the HTTP tests.
pub fn router(state: AppState) -> Router {
    create_router(state)
}

#[derive(serde::Deserialize)]
struct RunBody {
    request: RunRequest,
    /// Pre-collected records. Live collection is out of the HTTP path.
    #[serde(default)]
    batch: CollectedBatch,
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Config(c) => ApiError(StatusCode::BAD_REQUEST, c.to_string()),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(e: PersistenceError) -> Self {
        tracing::warn!(target: "api", error = %e, "persistence error");
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

async fn submit_run(
    State(state): State<AppState>,
    Json(body): Json<RunBody>,
) -> Result<Json<RunResult>, ApiError> {
    let res = state
        .pipeline
        .run_request(&body.request, &state.config, body.batch)
        .await?;
    Ok(Json(res))
}

async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunMetadata>, ApiError> {
    match state.pipeline.store().get_run(&run_id).await? {
        Some(meta) => Ok(Json(meta)),
        None => Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("unknown run '{run_id}'"),
        )),
    }
}

#[derive(serde::Serialize)]
struct SourceInfo {
    source: Source,
    enabled: bool,
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    let enabled = state.config.enabled_sources().unwrap_or_default();
    Json(
        Source::ALL
            .iter()
            .map(|s| SourceInfo {
                source: *s,
                enabled: enabled.contains(s),
            })
            .collect(),
    )
}
