// src/embed.rs
//! Sentence embedding seam.
//!
//! Scoring artifacts (boundary model, preference head) are trained against one
//! embedder and record its identifier; the pipeline refuses to pair an artifact
//! with a different embedder. The built-in [`HashingEmbedder`] is a local,
//! deterministic feature-hashing embedder so the engine runs without a model
//! server; a sentence-transformer backend plugs in through the same trait.

use sha2::{Digest, Sha256};

use crate::scoring::lexical::tokenize;

pub trait Embedder: Send + Sync {
    /// Identifier the scoring artifacts were trained against.
    fn id(&self) -> &str;
    /// Output dimensionality.
    fn dimension(&self) -> usize;
    /// Embed `text`; `None` for degenerate input (no usable tokens).
    fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Signed feature hashing over unigrams and bigrams, L2-normalized.
///
/// Features are hashed with SHA-256 so vectors stay identical across builds and
/// toolchains; the id names the hash so artifacts trained on another scheme are
/// rejected.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    id: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 256;

    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(8);
        Self {
            id: format!("hashing-sha256-{dimension}"),
            dimension,
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return None;
        }
        let mut v = vec![0f32; self.dimension];
        let mut add = |feature: &str, weight: f32| {
            let bits = feature_bits(feature);
            let idx = (bits % self.dimension as u64) as usize;
            let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign * weight;
        };
        for t in &tokens {
            add(t, 1.0);
        }
        for pair in tokens.windows(2) {
            add(&format!("{} {}", pair[0], pair[1]), 0.5);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return None;
        }
        v.iter_mut().for_each(|x| *x /= norm);
        Some(v)
    }
}

/// First eight bytes of the feature's SHA-256 digest, big-endian.
fn feature_bits(feature: &str) -> u64 {
    let digest = Sha256::digest(feature.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Cosine similarity; 0.0 for mismatched, empty or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0f32;
    let mut norm_a = 0f32;
    let mut norm_b = 0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}
