use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::GatekeeperConfig;
use crate::document::RawDocument;
use crate::judge::CancelFlag;
use crate::pipeline::{Pipeline, PipelineOutput};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn from_config(cfg: &GatekeeperConfig) -> Self {
        Self::new(Pipeline::from_config(cfg))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/rank", post(rank))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Either `{"documents": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RankReq {
    Wrapped { documents: Vec<RawDocument> },
    Bare(Vec<RawDocument>),
}

impl RankReq {
    fn into_documents(self) -> Vec<RawDocument> {
        match self {
            RankReq::Wrapped { documents } | RankReq::Bare(documents) => documents,
        }
    }
}

async fn rank(State(state): State<AppState>, Json(body): Json<RankReq>) -> Json<PipelineOutput> {
    let docs = body.into_documents();
    info!(target: "api", documents = docs.len(), "rank request");
    let out = state.pipeline.execute(docs, &CancelFlag::new()).await;
    Json(out)
}

#[derive(Serialize)]
struct StatusOut {
    judge_enabled: bool,
    batch_size: usize,
    pacing_ms: u64,
    max_attempts: u32,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    let judge = state.pipeline.judge();
    let s = judge.settings();
    Json(StatusOut {
        judge_enabled: judge.is_enabled(),
        batch_size: s.batch_size,
        pacing_ms: s.pacing.as_millis() as u64,
        max_attempts: s.retry.max_attempts,
    })
}
