// src/pipeline.rs
//! End-to-end run: score → reduce → judge.
//!
//! With no limits configured every input document comes out either as a
//! top-level representative or inside exactly one representative's
//! `merged_children`.

use std::time::Instant;

use metrics::histogram;
use serde::Serialize;
use tracing::info;

use crate::config::{GatekeeperConfig, PipelineConfig};
use crate::diversity::DiversityReducer;
use crate::document::{Document, RawDocument};
use crate::judge::{build_client, CancelFlag, JudgeOrchestrator};
use crate::scoring::{ReputationPolicy, ScoringArtifacts, ScoringEngine};

/// Counts for one run, returned alongside the ranked documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub input: usize,
    pub representatives: usize,
    pub merged: usize,
    pub judged: usize,
    pub output: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub documents: Vec<Document>,
    pub summary: RunSummary,
}

pub struct Pipeline {
    engine: ScoringEngine,
    reducer: DiversityReducer,
    judge: JudgeOrchestrator,
    limits: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        engine: ScoringEngine,
        reducer: DiversityReducer,
        judge: JudgeOrchestrator,
        limits: PipelineConfig,
    ) -> Self {
        Self {
            engine,
            reducer,
            judge,
            limits,
        }
    }

    /// Build every stage from config: embedder, artifacts, reputation lists,
    /// reducer thresholds, and the judge client.
    pub fn from_config(cfg: &GatekeeperConfig) -> Self {
        let embedder = cfg.embedder.build();
        let artifacts = ScoringArtifacts::load(&cfg.scoring.artifacts, embedder.as_deref());
        let engine = ScoringEngine::from_artifacts(
            &artifacts,
            ReputationPolicy::from_config(&cfg.reputation),
            embedder,
            cfg.scoring.lexical_norm,
        );
        let judge = JudgeOrchestrator::new(build_client(&cfg.judge), cfg.judge.settings());
        Self::new(
            engine,
            DiversityReducer::new(cfg.diversity),
            judge,
            cfg.pipeline,
        )
    }

    pub fn judge(&self) -> &JudgeOrchestrator {
        &self.judge
    }

    pub async fn run(&self, raw: Vec<RawDocument>) -> Vec<Document> {
        self.execute(raw, &CancelFlag::new()).await.documents
    }

    pub async fn run_with_cancel(&self, raw: Vec<RawDocument>, cancel: &CancelFlag) -> Vec<Document> {
        self.execute(raw, cancel).await.documents
    }

    pub async fn execute(&self, raw: Vec<RawDocument>, cancel: &CancelFlag) -> PipelineOutput {
        let docs: Vec<Document> = raw.into_iter().map(Document::from).collect();
        self.execute_documents(docs, cancel).await
    }

    pub async fn execute_documents(&self, mut docs: Vec<Document>, cancel: &CancelFlag) -> PipelineOutput {
        let started = Instant::now();
        let input = docs.len();

        self.engine.score_all(&mut docs);

        let mut reps = self.reducer.reduce(docs);
        let representatives = reps.len();
        let merged = input - representatives;

        if let Some(limit) = self.limits.candidate_limit {
            reps.truncate(limit);
        }
        let judged = if self.judge.is_enabled() { reps.len() } else { 0 };

        let mut ranked = self.judge.rerank_with_cancel(reps, cancel).await;
        if let Some(limit) = self.limits.final_limit {
            ranked.truncate(limit);
        }

        let elapsed = started.elapsed();
        histogram!("gatekeeper_pipeline_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
        let summary = RunSummary {
            input,
            representatives,
            merged,
            judged,
            output: ranked.len(),
            duration_ms: elapsed.as_millis() as u64,
        };
        info!(
            target: "pipeline",
            input,
            representatives,
            merged,
            judged,
            output = summary.output,
            duration_ms = summary.duration_ms,
            "pipeline run finished"
        );
        PipelineOutput {
            documents: ranked,
            summary,
        }
    }
}
