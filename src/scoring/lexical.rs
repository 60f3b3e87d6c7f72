// src/scoring/lexical.rs
//! Lexical weight: how much rare, informative vocabulary a document carries,
//! measured against an inverse-document-frequency table learned offline.
//!
//! score = clamp(Σ idf(token) / sqrt(|tokens|) / norm, 0, 1) over the document's
//! unique token set.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Component, ScoreError, ScoreInput, ScoreProvider};
use crate::document::NEUTRAL_SCORE;

/// Calibration constant dividing the length-normalized IDF mass.
pub const DEFAULT_LEXICAL_NORM: f32 = 15.0;

static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex"));

/// Lowercase, drop punctuation, keep tokens longer than one char that are not
/// purely numeric. Order and duplicates are preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let cleaned = RE_PUNCT.replace_all(&lower, "");
    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 1 && !w.chars().all(char::is_numeric))
        .map(str::to_string)
        .collect()
}

/// `{ "idf_scores": {token: idf}, "default_idf": 0.0, "total_docs": N }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdfTable {
    pub idf_scores: HashMap<String, f32>,
    /// Weight for tokens missing from the table.
    #[serde(default)]
    pub default_idf: f32,
    #[serde(default)]
    pub total_docs: u64,
}

impl IdfTable {
    pub fn idf(&self, token: &str) -> f32 {
        self.idf_scores
            .get(token)
            .copied()
            .unwrap_or(self.default_idf)
    }

    /// Normalized lexical score in [0,1]. Text without tokens scores 0.
    pub fn score(&self, text: &str, norm: f32) -> f32 {
        let unique: BTreeSet<String> = tokenize(text).into_iter().collect();
        if unique.is_empty() {
            return 0.0;
        }
        let mass: f32 = unique.iter().map(|t| self.idf(t)).sum();
        let raw = mass / (unique.len() as f32).sqrt() / norm.max(f32::EPSILON);
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

pub struct LexicalScorer {
    table: Option<std::sync::Arc<IdfTable>>,
    norm: f32,
}

impl LexicalScorer {
    pub fn new(table: Option<std::sync::Arc<IdfTable>>, norm: f32) -> Self {
        Self { table, norm }
    }
}

impl ScoreProvider for LexicalScorer {
    fn component(&self) -> Component {
        Component::Lexical
    }

    fn score(&self, input: &ScoreInput<'_>) -> Result<f32, ScoreError> {
        match &self.table {
            Some(table) => Ok(table.score(input.text, self.norm)),
            None => Ok(NEUTRAL_SCORE),
        }
    }
}
