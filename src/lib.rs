// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod diversity;
pub mod document;
pub mod embed;
pub mod judge;
pub mod metrics;
pub mod pipeline;
pub mod scoring;

pub use crate::api::router;
pub use crate::config::GatekeeperConfig;
pub use crate::diversity::DiversityReducer;
pub use crate::document::{Document, RawDocument, ScoreBreakdown};
pub use crate::judge::{CancelFlag, JudgeOrchestrator};
pub use crate::pipeline::Pipeline;
pub use crate::scoring::ScoringEngine;

/// Full HTTP app: API routes plus `/metrics`.
pub fn app(cfg: &GatekeeperConfig) -> anyhow::Result<axum::Router> {
    let metrics = crate::metrics::Metrics::init()?;
    let state = api::AppState::from_config(cfg);
    Ok(router(state).merge(metrics.router()))
}
