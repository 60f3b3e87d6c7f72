// src/config/mod.rs
//! TOML configuration for the gatekeeper.
//!
//! Resolution order: `$GATEKEEPER_CONFIG_PATH` (must exist), then
//! `config/gatekeeper.toml`, then built-in defaults. Every section and key is
//! optional.
//!
//! ```toml
//! [scoring]
//! lexical_norm = 15.0
//! [scoring.artifacts]
//! idf = "artifacts/idf.json"
//!
//! [embedder]
//! kind = "hashing"
//! dimension = 256
//!
//! [diversity]
//! title_threshold = 0.85
//! semantic_threshold = 0.70
//!
//! [judge]
//! enabled = true
//! provider = "gemini"
//! api_key = "ENV"
//!
//! [pipeline]
//! candidate_limit = 50
//! final_limit = 30
//! ```

pub mod judge;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diversity::{DiversityConfig, DEFAULT_SEMANTIC_THRESHOLD, DEFAULT_TITLE_THRESHOLD};
use crate::embed::{Embedder, HashingEmbedder};
use crate::scoring::lexical::DEFAULT_LEXICAL_NORM;
use crate::scoring::{ArtifactPaths, ReputationConfig};

pub use judge::JudgeConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/gatekeeper.toml";
pub const ENV_CONFIG_PATH: &str = "GATEKEEPER_CONFIG_PATH";

fn default_lexical_norm() -> f32 {
    DEFAULT_LEXICAL_NORM
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_lexical_norm")]
    pub lexical_norm: f32,
    #[serde(default)]
    pub artifacts: ArtifactPaths,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            lexical_norm: DEFAULT_LEXICAL_NORM,
            artifacts: ArtifactPaths::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    #[default]
    Hashing,
    None,
}

fn default_dimension() -> usize {
    HashingEmbedder::DEFAULT_DIMENSION
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default)]
    pub kind: EmbedderKind,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::default(),
            dimension: default_dimension(),
        }
    }
}

impl EmbedderConfig {
    pub fn build(&self) -> Option<Arc<dyn Embedder>> {
        match self.kind {
            EmbedderKind::Hashing => Some(Arc::new(HashingEmbedder::new(self.dimension))),
            EmbedderKind::None => None,
        }
    }
}

/// Optional truncation. Unset means no document is ever dropped.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub candidate_limit: Option<usize>,
    #[serde(default)]
    pub final_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatekeeperConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub diversity: DiversityConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl GatekeeperConfig {
    /// Parse and sanitize; API keys are left as written.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: GatekeeperConfig = toml::from_str(s).context("parsing gatekeeper config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading gatekeeper config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.judge.resolve_api_key();
        Ok(cfg)
    }

    /// 1) $GATEKEEPER_CONFIG_PATH 2) config/gatekeeper.toml 3) defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        let mut cfg = Self::default();
        cfg.judge.resolve_api_key();
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        if !(self.scoring.lexical_norm.is_finite() && self.scoring.lexical_norm > 0.0) {
            self.scoring.lexical_norm = DEFAULT_LEXICAL_NORM;
        }
        if !self.diversity.title_threshold.is_finite() {
            self.diversity.title_threshold = DEFAULT_TITLE_THRESHOLD;
        }
        if !self.diversity.semantic_threshold.is_finite() {
            self.diversity.semantic_threshold = DEFAULT_SEMANTIC_THRESHOLD;
        }
        if self.embedder.dimension == 0 {
            self.embedder.dimension = default_dimension();
        }
        self.judge.sanitize();
    }
}
