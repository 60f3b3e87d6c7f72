// src/document.rs
//! Document model shared by scoring, diversity reduction and the judge.
//!
//! The score breakdown is a fixed-shape record: the four content components are
//! set together through [`ScoreBreakdown::from_components`], which is the only
//! place the `final` value is computed. The judge fields are written later by the
//! orchestrator and never feed back into `final`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Neutral value for components bounded in [0,1].
pub const NEUTRAL_SCORE: f32 = 0.5;
/// Neutral reputation multiplier (mild penalty for unknown sources).
pub const NEUTRAL_REPUTATION: f32 = 0.9;

pub const W_LEXICAL: f32 = 0.3;
pub const W_SEMANTIC: f32 = 0.4;
pub const W_PREFERENCE: f32 = 0.3;

/// A document as delivered by the collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDocument {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Weighted content score before the reputation multiplier.
pub fn base_score(lexical: f32, semantic: f32, preference: f32) -> f32 {
    W_LEXICAL * lexical + W_SEMANTIC * semantic + W_PREFERENCE * preference
}

/// The ranking contract: `(0.3*lexical + 0.4*semantic + 0.3*preference) * reputation`.
pub fn combine(lexical: f32, semantic: f32, preference: f32, reputation: f32) -> f32 {
    base_score(lexical, semantic, preference) * reputation
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    lexical: Option<f32>,
    semantic: Option<f32>,
    preference: Option<f32>,
    reputation: Option<f32>,
    judge: Option<f32>,
    judge_reason: Option<String>,
    #[serde(rename = "final")]
    final_score: Option<f32>,
}

impl ScoreBreakdown {
    pub fn from_components(lexical: f32, semantic: f32, preference: f32, reputation: f32) -> Self {
        Self {
            lexical: Some(lexical),
            semantic: Some(semantic),
            preference: Some(preference),
            reputation: Some(reputation),
            judge: None,
            judge_reason: None,
            final_score: Some(combine(lexical, semantic, preference, reputation)),
        }
    }

    pub fn lexical(&self) -> Option<f32> {
        self.lexical
    }
    pub fn semantic(&self) -> Option<f32> {
        self.semantic
    }
    pub fn preference(&self) -> Option<f32> {
        self.preference
    }
    pub fn reputation(&self) -> Option<f32> {
        self.reputation
    }
    pub fn judge(&self) -> Option<f32> {
        self.judge
    }
    pub fn judge_reason(&self) -> Option<&str> {
        self.judge_reason.as_deref()
    }
    pub fn final_score(&self) -> Option<f32> {
        self.final_score
    }

    /// Weighted sum without reputation, if all three content components exist.
    pub fn base(&self) -> Option<f32> {
        Some(base_score(self.lexical?, self.semantic?, self.preference?))
    }

    /// Record the judge's normalized score in [0,1] with its reason.
    pub fn set_judge(&mut self, score: f32, reason: impl Into<String>) {
        self.judge = Some(score);
        self.judge_reason = Some(reason.into());
    }
}

/// Transient per-batch verdict; merged into the owning document then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub document_id: String,
    /// Raw judge score on the 0..=10 scale.
    pub score: f32,
    pub reason: String,
}

impl JudgeVerdict {
    /// Score mapped to [0,1]; non-finite values count as 0.
    pub fn normalized(&self) -> f32 {
        if !self.score.is_finite() {
            return 0.0;
        }
        (self.score / 10.0).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub score_breakdown: ScoreBreakdown,
    pub relevance_score: f32,
    pub merged_children: Vec<Document>,
    /// Sentence embedding computed during scoring; reused by the reducer.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            url: String::new(),
            source: String::new(),
            published_at: None,
            score_breakdown: ScoreBreakdown::default(),
            relevance_score: 0.0,
            merged_children: Vec::new(),
            embedding: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_relevance(mut self, score: f32) -> Self {
        self.relevance_score = score;
        self
    }

    /// Title and body joined, the text every content signal reads.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }

    /// Judge score if present, otherwise the pre-judge relevance.
    pub fn judge_or_relevance(&self) -> f32 {
        self.score_breakdown.judge().unwrap_or(self.relevance_score)
    }

    /// Number of documents this representative stands for (itself included).
    pub fn cluster_size(&self) -> usize {
        1 + self.merged_children.len()
    }
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        let id = match raw.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => derive_id(&raw.url, &raw.title),
        };
        Self {
            id,
            title: raw.title,
            body: raw.body,
            url: raw.url,
            source: raw.source,
            published_at: raw.published_at,
            score_breakdown: ScoreBreakdown::default(),
            relevance_score: 0.0,
            merged_children: Vec::new(),
            embedding: None,
        }
    }
}

/// Stable id from URL + title (first 8 bytes of SHA-256, hex).
pub fn derive_id(url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    hasher.update(b"\n");
    hasher.update(title.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(19);
    out.push_str("doc-");
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
