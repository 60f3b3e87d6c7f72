// src/scoring/mod.rs
//! Multi-signal relevance scoring.
//!
//! Four independent providers (lexical, semantic, preference, reputation) are
//! combined by a fixed rule:
//!
//! ```text
//! base  = 0.3*lexical + 0.4*semantic + 0.3*preference
//! final = base * reputation
//! ```
//!
//! The engine never fails. A provider that errors, panics, or returns a value
//! outside its range is replaced by that component's neutral value (0.5, or 0.9
//! for reputation) and the run continues.

pub mod artifacts;
pub mod lexical;
pub mod preference;
pub mod reputation;
pub mod semantic;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::{Document, ScoreBreakdown, NEUTRAL_REPUTATION, NEUTRAL_SCORE};
use crate::embed::Embedder;

pub use artifacts::{ArtifactError, ArtifactPaths, ScoringArtifacts};
pub use lexical::{IdfTable, LexicalScorer};
pub use preference::{PreferenceHead, PreferenceScorer};
pub use reputation::{ReputationConfig, ReputationPolicy};
pub use semantic::{BoundaryModel, SemanticScorer};

#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("embedding has {found} dimensions, model expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Lexical,
    Semantic,
    Preference,
    Reputation,
}

impl Component {
    pub fn name(self) -> &'static str {
        match self {
            Component::Lexical => "lexical",
            Component::Semantic => "semantic",
            Component::Preference => "preference",
            Component::Reputation => "reputation",
        }
    }

    pub fn neutral(self) -> f32 {
        match self {
            Component::Reputation => NEUTRAL_REPUTATION,
            _ => NEUTRAL_SCORE,
        }
    }

    fn accepts(self, v: f32) -> bool {
        match self {
            Component::Reputation => v.is_finite() && v > 0.0,
            _ => (0.0..=1.0).contains(&v),
        }
    }
}

/// What a provider sees for one document.
#[derive(Clone, Copy)]
pub struct ScoreInput<'a> {
    pub doc: &'a Document,
    /// Title and body joined.
    pub text: &'a str,
    /// Present only when an embedder is configured and the text is not degenerate.
    pub embedding: Option<&'a [f32]>,
}

/// A swappable scoring signal mapping a document to a bounded number.
pub trait ScoreProvider: Send + Sync {
    fn component(&self) -> Component;
    fn score(&self, input: &ScoreInput<'_>) -> Result<f32, ScoreError>;
}

pub struct ScoringEngine {
    lexical: Box<dyn ScoreProvider>,
    semantic: Box<dyn ScoreProvider>,
    preference: Box<dyn ScoreProvider>,
    reputation: Box<dyn ScoreProvider>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl ScoringEngine {
    pub fn new(
        lexical: Box<dyn ScoreProvider>,
        semantic: Box<dyn ScoreProvider>,
        preference: Box<dyn ScoreProvider>,
        reputation: Box<dyn ScoreProvider>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        Self {
            lexical,
            semantic,
            preference,
            reputation,
            embedder,
        }
    }

    /// Wire the built-in providers to loaded artifacts.
    pub fn from_artifacts(
        artifacts: &ScoringArtifacts,
        reputation: ReputationPolicy,
        embedder: Option<Arc<dyn Embedder>>,
        lexical_norm: f32,
    ) -> Self {
        Self::new(
            Box::new(LexicalScorer::new(artifacts.idf.clone(), lexical_norm)),
            Box::new(SemanticScorer::new(artifacts.boundary.clone())),
            Box::new(PreferenceScorer::new(artifacts.preference.clone())),
            Box::new(reputation),
            embedder,
        )
    }

    /// Engine with no artifacts and no embedder: only reputation discriminates.
    pub fn neutral(reputation: ReputationPolicy) -> Self {
        Self::from_artifacts(
            &ScoringArtifacts::default(),
            reputation,
            None,
            lexical::DEFAULT_LEXICAL_NORM,
        )
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    /// Score one document in place (breakdown, relevance, embedding) and return
    /// a copy of the breakdown.
    pub fn score(&self, doc: &mut Document) -> ScoreBreakdown {
        let text = doc.text();
        let embedding = self.embedder.as_ref().and_then(|e| e.embed(&text));

        let (lexical, semantic, preference, reputation) = {
            let input = ScoreInput {
                doc: &*doc,
                text: &text,
                embedding: embedding.as_deref(),
            };
            (
                self.run(self.lexical.as_ref(), &input),
                self.run(self.semantic.as_ref(), &input),
                self.run(self.preference.as_ref(), &input),
                self.run(self.reputation.as_ref(), &input),
            )
        };

        let breakdown = ScoreBreakdown::from_components(lexical, semantic, preference, reputation);
        doc.relevance_score = breakdown.final_score().unwrap_or(0.0);
        doc.score_breakdown = breakdown.clone();
        doc.embedding = embedding;

        counter!("gatekeeper_documents_scored_total").increment(1);
        debug!(
            target: "scoring",
            id = %doc.id,
            lexical, semantic, preference, reputation,
            relevance = doc.relevance_score,
            "scored"
        );
        breakdown
    }

    pub fn score_all(&self, docs: &mut [Document]) {
        for doc in docs.iter_mut() {
            self.score(doc);
        }
    }

    fn run(&self, provider: &dyn ScoreProvider, input: &ScoreInput<'_>) -> f32 {
        let component = provider.component();
        let outcome = catch_unwind(AssertUnwindSafe(|| provider.score(input)));
        let err = match outcome {
            Ok(Ok(v)) if component.accepts(v) => return v,
            Ok(Ok(v)) => format!("value {v} out of range"),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "provider panicked".to_string(),
        };
        warn!(
            target: "scoring",
            component = component.name(),
            id = %input.doc.id,
            error = %err,
            "score provider failed; using neutral value"
        );
        counter!("gatekeeper_component_fallback_total", "component" => component.name())
            .increment(1);
        component.neutral()
    }
}
