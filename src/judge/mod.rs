// src/judge/mod.rs
//! # Judge Orchestrator
//!
//! Re-ranks representatives with an external language-model judge.
//!
//! Documents are cut into batches (10 by default) in their incoming order. Each
//! batch is one completion call, retried with exponential backoff on transient
//! errors (see [`backoff`]). Between batches the orchestrator waits a fixed
//! pacing interval (4s by default) to stay under provider rate limits; there is
//! no wait after the last batch.
//!
//! Every document ends up with a judge score:
//! - returned by the judge: `score / 10`, clamped to [0,1], also written to
//!   `relevance_score`;
//! - otherwise its pre-judge `relevance_score`, with a reason explaining why
//!   (missed, failed, unparseable, cancelled, disabled).
//!
//! The output is stably sorted by judge score, descending.

pub mod backoff;
pub mod client;
pub mod parse;
pub mod prompt;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::document::{Document, JudgeVerdict};

pub use backoff::{BatchRetry, BatchState, RetryPolicy, Sleeper, TokioSleeper};
pub use client::{
    build_client, CompletionClient, DisabledClient, DynCompletionClient, GeminiClient,
    JudgeError, OpenAiClient,
};
pub use parse::{parse_verdicts, ParseError};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_PACING: Duration = Duration::from_secs(4);

pub const REASON_MISSED: &str = "missed by judge";
pub const REASON_CANCELLED: &str = "judge cancelled";
pub const REASON_DISABLED: &str = "judge disabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JudgeSettings {
    pub batch_size: usize,
    pub pacing: Duration,
    pub retry: RetryPolicy,
    pub snippet_chars: usize,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            pacing: DEFAULT_PACING,
            retry: RetryPolicy::default(),
            snippet_chars: prompt::DEFAULT_SNIPPET_CHARS,
        }
    }
}

/// Cooperative cancellation, checked before each call.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Judged,
    Failed,
    Unparseable,
    Cancelled,
}

impl BatchOutcome {
    fn as_str(self) -> &'static str {
        match self {
            BatchOutcome::Judged => "judged",
            BatchOutcome::Failed => "failed",
            BatchOutcome::Unparseable => "unparseable",
            BatchOutcome::Cancelled => "cancelled",
        }
    }
}

pub struct JudgeOrchestrator {
    client: DynCompletionClient,
    sleeper: Arc<dyn Sleeper>,
    settings: JudgeSettings,
    // One judge conversation at a time per orchestrator; pacing is global.
    gate: Arc<Mutex<()>>,
}

impl JudgeOrchestrator {
    pub fn new(client: DynCompletionClient, settings: JudgeSettings) -> Self {
        Self {
            client,
            sleeper: Arc::new(TokioSleeper),
            settings,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Swap the sleeper (tests record delays instead of waiting).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_enabled()
    }

    pub async fn rerank(&self, docs: Vec<Document>) -> Vec<Document> {
        self.rerank_with_cancel(docs, &CancelFlag::new()).await
    }

    pub async fn rerank_with_cancel(
        &self,
        mut docs: Vec<Document>,
        cancel: &CancelFlag,
    ) -> Vec<Document> {
        if docs.is_empty() {
            return docs;
        }
        if !self.client.is_enabled() {
            return Self::passthrough(docs, REASON_DISABLED);
        }

        let _gate = self.gate.lock().await;
        let batch_size = self.settings.batch_size.max(1);
        let total = docs.len().div_ceil(batch_size);
        info!(
            target: "judge",
            client = self.client.name(),
            documents = docs.len(),
            batches = total,
            "judge re-rank started"
        );

        for (i, batch) in docs.chunks_mut(batch_size).enumerate() {
            let outcome = self.judge_batch(batch, cancel).await;
            counter!("gatekeeper_judge_batches_total", "outcome" => outcome.as_str()).increment(1);
            debug!(target: "judge", batch = i + 1, of = total, outcome = outcome.as_str(), "batch done");

            let last = i + 1 == total;
            if !last && outcome != BatchOutcome::Cancelled && !cancel.is_cancelled() {
                self.sleeper.sleep(self.settings.pacing).await;
            }
        }

        sort_by_judge(&mut docs);
        docs
    }

    /// Give every document `judge = relevance_score` with `reason`, then sort.
    pub fn passthrough(mut docs: Vec<Document>, reason: &str) -> Vec<Document> {
        apply_fallback(&mut docs, reason);
        sort_by_judge(&mut docs);
        docs
    }

    async fn judge_batch(&self, batch: &mut [Document], cancel: &CancelFlag) -> BatchOutcome {
        let user_prompt = prompt::build_user_prompt(batch, self.settings.snippet_chars);
        let mut retry = BatchRetry::new(self.settings.retry);

        let response = loop {
            if cancel.is_cancelled() {
                apply_fallback(batch, REASON_CANCELLED);
                return BatchOutcome::Cancelled;
            }
            let Some(attempt) = retry.begin_call() else {
                break None;
            };
            let err = match self.client.complete(&user_prompt, prompt::SYSTEM_PROMPT).await {
                Ok(text) if !text.trim().is_empty() => {
                    retry.succeed();
                    break Some(text);
                }
                Ok(_) => JudgeError::EmptyResponse,
                Err(e) => e,
            };
            match retry.fail(&err) {
                BatchState::Retrying { delay, .. } => {
                    warn!(
                        target: "judge",
                        attempt,
                        delay_secs = delay.as_secs_f32(),
                        error = %err,
                        "transient judge error; backing off"
                    );
                    counter!("gatekeeper_judge_retries_total").increment(1);
                    self.sleeper.sleep(delay).await;
                }
                _ => {
                    warn!(target: "judge", attempts = attempt, error = %err, "judge batch failed; keeping relevance scores");
                    apply_fallback(batch, &format!("judge failed: {err}"));
                    return BatchOutcome::Failed;
                }
            }
        };

        let Some(text) = response else {
            apply_fallback(batch, "judge failed: no attempts left");
            return BatchOutcome::Failed;
        };

        match parse::parse_verdicts(&text) {
            Ok(verdicts) => {
                merge_verdicts(batch, verdicts);
                BatchOutcome::Judged
            }
            Err(e) => {
                warn!(target: "judge", error = %e, "judge response unparseable; keeping relevance scores");
                apply_fallback(batch, &format!("judge response unparseable: {e}"));
                BatchOutcome::Unparseable
            }
        }
    }
}

fn apply_fallback(docs: &mut [Document], reason: &str) {
    for doc in docs {
        let score = doc.relevance_score;
        doc.score_breakdown.set_judge(score, reason);
    }
}

/// Match verdicts to documents by id; later duplicates win, unknown ids are
/// ignored, documents without a verdict keep their relevance score.
fn merge_verdicts(batch: &mut [Document], verdicts: Vec<JudgeVerdict>) {
    let by_id: HashMap<String, JudgeVerdict> = verdicts
        .into_iter()
        .map(|v| (v.document_id.clone(), v))
        .collect();
    for doc in batch {
        match by_id.get(&doc.id) {
            Some(v) => {
                let score = v.normalized();
                doc.score_breakdown.set_judge(score, v.reason.clone());
                doc.relevance_score = score;
            }
            None => {
                let score = doc.relevance_score;
                doc.score_breakdown.set_judge(score, REASON_MISSED);
            }
        }
    }
}

fn sort_by_judge(docs: &mut [Document]) {
    docs.sort_by(|a, b| b.judge_or_relevance().total_cmp(&a.judge_or_relevance()));
}
