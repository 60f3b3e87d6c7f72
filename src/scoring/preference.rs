// src/scoring/preference.rs
//! Learned preference head over sentence embeddings: dense → ReLU → dense →
//! logistic. Trained offline on curated (kept vs. passed-over) documents.

use std::sync::Arc;

use serde::Deserialize;

use super::artifacts::ArtifactError;
use super::semantic::clamped_sigmoid;
use super::{Component, ScoreError, ScoreInput, ScoreProvider};
use crate::document::NEUTRAL_SCORE;

/// Row-major dense layer: `weights[out][in]`.
#[derive(Debug, Clone, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    fn inputs(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    fn outputs(&self) -> usize {
        self.weights.len()
    }

    fn check(&self, name: &str, inputs: usize) -> Result<(), ArtifactError> {
        if self.weights.is_empty() || self.bias.len() != self.outputs() {
            return Err(ArtifactError::Invalid(format!(
                "preference head: layer `{name}` has {} rows and {} biases",
                self.outputs(),
                self.bias.len()
            )));
        }
        if self.weights.iter().any(|row| row.len() != inputs) {
            return Err(ArtifactError::Invalid(format!(
                "preference head: layer `{name}` rows must have {inputs} inputs"
            )));
        }
        Ok(())
    }

    fn forward(&self, x: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>() + b)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceHead {
    pub embedder_id: String,
    pub input_dim: usize,
    pub hidden: DenseLayer,
    pub output: DenseLayer,
}

impl PreferenceHead {
    pub fn validate(&self) -> Result<(), ArtifactError> {
        self.hidden.check("hidden", self.input_dim)?;
        self.output.check("output", self.hidden.outputs())?;
        if self.output.outputs() != 1 {
            return Err(ArtifactError::Invalid(format!(
                "preference head: output layer must have 1 unit, has {}",
                self.output.outputs()
            )));
        }
        debug_assert_eq!(self.hidden.inputs(), self.input_dim);
        Ok(())
    }

    /// Preference in [0,1].
    pub fn predict(&self, embedding: &[f32]) -> Result<f32, ScoreError> {
        if embedding.len() != self.input_dim {
            return Err(ScoreError::DimensionMismatch {
                expected: self.input_dim,
                found: embedding.len(),
            });
        }
        let hidden: Vec<f32> = self
            .hidden
            .forward(embedding)
            .into_iter()
            .map(|v| v.max(0.0))
            .collect();
        let logit = self.output.forward(&hidden)[0];
        Ok(clamped_sigmoid(logit))
    }
}

pub struct PreferenceScorer {
    head: Option<Arc<PreferenceHead>>,
}

impl PreferenceScorer {
    pub fn new(head: Option<Arc<PreferenceHead>>) -> Self {
        Self { head }
    }
}

impl ScoreProvider for PreferenceScorer {
    fn component(&self) -> Component {
        Component::Preference
    }

    fn score(&self, input: &ScoreInput<'_>) -> Result<f32, ScoreError> {
        // An untrained head means "no opinion".
        let (Some(head), Some(embedding)) = (&self.head, input.embedding) else {
            return Ok(NEUTRAL_SCORE);
        };
        head.predict(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head() -> PreferenceHead {
        PreferenceHead {
            embedder_id: "hashing-sha256-8".into(),
            input_dim: 2,
            hidden: DenseLayer {
                weights: vec![vec![1.0, 0.0], vec![0.0, -1.0]],
                bias: vec![0.0, 0.0],
            },
            output: DenseLayer {
                weights: vec![vec![2.0, 3.0]],
                bias: vec![-1.0],
            },
        }
    }

    #[test]
    fn forward_pass_applies_relu_then_sigmoid() {
        let h = head();
        // hidden = relu([1, -1]) = [1, 0]; logit = 2*1 + 3*0 - 1 = 1
        let p = h.predict(&[1.0, 1.0]).unwrap();
        assert!((p - 1.0 / (1.0 + (-1.0f32).exp())).abs() < 1e-6);
        // hidden = relu([0, 1]) = [0, 1]; logit = 3 - 1 = 2
        let p = h.predict(&[0.0, -1.0]).unwrap();
        assert!((p - 1.0 / (1.0 + (-2.0f32).exp())).abs() < 1e-6);
    }

    #[test]
    fn output_is_bounded() {
        let h = head();
        for x in [[1e6, -1e6], [-1e6, 1e6], [0.0, 0.0]] {
            let p = h.predict(&x).unwrap();
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn validate_checks_shapes() {
        assert!(head().validate().is_ok());
        let mut bad = head();
        bad.input_dim = 3;
        assert!(bad.validate().is_err());
        let mut bad = head();
        bad.output.weights.push(vec![0.0, 0.0]);
        bad.output.bias.push(0.0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn wrong_embedding_size_errors() {
        assert!(head().predict(&[1.0]).is_err());
    }
}
