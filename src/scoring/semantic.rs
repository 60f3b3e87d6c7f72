// src/scoring/semantic.rs
//! Semantic fit: signed distance from a one-class decision boundary learned over
//! sentence embeddings of historically selected documents.
//!
//! The boundary is an RBF one-class model serialized as support vectors:
//! `f(x) = Σ coef_i · exp(-γ‖x − sv_i‖²) − ρ`. Positive means "inside the typical
//! region". The distance is squashed through a clamped sigmoid.

use std::sync::Arc;

use serde::Deserialize;

use super::artifacts::ArtifactError;
use super::{Component, ScoreError, ScoreInput, ScoreProvider};
use crate::document::NEUTRAL_SCORE;

/// Distances are clamped to ±this before the sigmoid.
pub const DISTANCE_CLAMP: f32 = 10.0;

/// `1 / (1 + e^-d)` with `d` clamped to [-10, 10]; NaN maps to 0.5.
pub fn clamped_sigmoid(distance: f32) -> f32 {
    let d = if distance.is_nan() {
        0.0
    } else {
        distance.clamp(-DISTANCE_CLAMP, DISTANCE_CLAMP)
    };
    1.0 / (1.0 + (-d).exp())
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoundaryModel {
    /// Embedder the support vectors live in.
    pub embedder_id: String,
    pub gamma: f32,
    pub rho: f32,
    pub support_vectors: Vec<Vec<f32>>,
    pub dual_coef: Vec<f32>,
}

impl BoundaryModel {
    pub fn dimension(&self) -> usize {
        self.support_vectors.first().map(Vec::len).unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.support_vectors.is_empty() {
            return Err(ArtifactError::Invalid(
                "boundary model has no support vectors".into(),
            ));
        }
        if self.support_vectors.len() != self.dual_coef.len() {
            return Err(ArtifactError::Invalid(format!(
                "boundary model: {} support vectors but {} coefficients",
                self.support_vectors.len(),
                self.dual_coef.len()
            )));
        }
        let dim = self.dimension();
        if self.support_vectors.iter().any(|sv| sv.len() != dim) {
            return Err(ArtifactError::Invalid(
                "boundary model: ragged support vectors".into(),
            ));
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(ArtifactError::Invalid(format!(
                "boundary model: gamma must be positive, got {}",
                self.gamma
            )));
        }
        Ok(())
    }

    /// Signed distance from the boundary.
    pub fn decision(&self, x: &[f32]) -> Result<f32, ScoreError> {
        let dim = self.dimension();
        if x.len() != dim {
            return Err(ScoreError::DimensionMismatch {
                expected: dim,
                found: x.len(),
            });
        }
        let mut acc = 0f32;
        for (sv, coef) in self.support_vectors.iter().zip(&self.dual_coef) {
            let sq: f32 = sv.iter().zip(x).map(|(a, b)| (a - b) * (a - b)).sum();
            acc += coef * (-self.gamma * sq).exp();
        }
        Ok(acc - self.rho)
    }
}

pub struct SemanticScorer {
    model: Option<Arc<BoundaryModel>>,
}

impl SemanticScorer {
    pub fn new(model: Option<Arc<BoundaryModel>>) -> Self {
        Self { model }
    }
}

impl ScoreProvider for SemanticScorer {
    fn component(&self) -> Component {
        Component::Semantic
    }

    fn score(&self, input: &ScoreInput<'_>) -> Result<f32, ScoreError> {
        let (Some(model), Some(embedding)) = (&self.model, input.embedding) else {
            return Ok(NEUTRAL_SCORE);
        };
        Ok(clamped_sigmoid(model.decision(embedding)?))
    }
}
