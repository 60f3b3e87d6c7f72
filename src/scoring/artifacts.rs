// src/scoring/artifacts.rs
//! Loading of trained scoring artifacts.
//!
//! Every artifact is optional. A missing file is the normal cold-start case and
//! is logged at info; an unreadable, corrupt, or mismatched artifact is logged at
//! warn. Either way the matching scorer falls back to its neutral value.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use super::lexical::IdfTable;
use super::preference::PreferenceHead;
use super::semantic::BoundaryModel;
use crate::embed::Embedder;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid artifact: {0}")]
    Invalid(String),
    #[error("{artifact} was trained against embedder `{expected}`, runtime embedder is `{found}`")]
    EmbedderMismatch {
        artifact: &'static str,
        expected: String,
        found: String,
    },
}

/// Where to look for each artifact; `None` means "not configured".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactPaths {
    #[serde(default)]
    pub idf: Option<PathBuf>,
    #[serde(default)]
    pub boundary: Option<PathBuf>,
    #[serde(default)]
    pub preference: Option<PathBuf>,
}

/// Read-only models shared by every document of a run.
#[derive(Debug, Clone, Default)]
pub struct ScoringArtifacts {
    pub idf: Option<Arc<IdfTable>>,
    pub boundary: Option<Arc<BoundaryModel>>,
    pub preference: Option<Arc<PreferenceHead>>,
}

impl ScoringArtifacts {
    /// Load everything configured. Embedding-space artifacts are kept only when
    /// they were trained against `embedder` (same id and dimensionality).
    pub fn load(paths: &ArtifactPaths, embedder: Option<&dyn Embedder>) -> Self {
        let idf = load_optional::<IdfTable>("idf table", paths.idf.as_deref());

        let boundary = load_optional::<BoundaryModel>("boundary model", paths.boundary.as_deref())
            .and_then(|m| {
                let checked = m.validate().and_then(|_| {
                    check_embedder("boundary model", &m.embedder_id, m.dimension(), embedder)
                });
                keep_if_ok("boundary model", m, checked)
            });

        let preference =
            load_optional::<PreferenceHead>("preference head", paths.preference.as_deref())
                .and_then(|h| {
                    let checked = h.validate().and_then(|_| {
                        check_embedder("preference head", &h.embedder_id, h.input_dim, embedder)
                    });
                    keep_if_ok("preference head", h, checked)
                });

        let out = Self {
            idf: idf.map(Arc::new),
            boundary: boundary.map(Arc::new),
            preference: preference.map(Arc::new),
        };
        info!(
            target: "artifacts",
            idf = out.idf.is_some(),
            boundary = out.boundary.is_some(),
            preference = out.preference.is_some(),
            "scoring artifacts loaded"
        );
        out
    }
}

fn keep_if_ok<T>(name: &str, value: T, checked: Result<(), ArtifactError>) -> Option<T> {
    match checked {
        Ok(()) => Some(value),
        Err(e) => {
            warn!(target: "artifacts", artifact = name, error = %e, "artifact rejected; using neutral fallback");
            None
        }
    }
}

fn check_embedder(
    artifact: &'static str,
    expected_id: &str,
    expected_dim: usize,
    embedder: Option<&dyn Embedder>,
) -> Result<(), ArtifactError> {
    let Some(e) = embedder else {
        return Err(ArtifactError::EmbedderMismatch {
            artifact,
            expected: expected_id.to_string(),
            found: "<none>".to_string(),
        });
    };
    if e.id() != expected_id || e.dimension() != expected_dim {
        return Err(ArtifactError::EmbedderMismatch {
            artifact,
            expected: format!("{expected_id} (dim {expected_dim})"),
            found: format!("{} (dim {})", e.id(), e.dimension()),
        });
    }
    Ok(())
}

fn load_optional<T: DeserializeOwned>(name: &str, path: Option<&Path>) -> Option<T> {
    let path = path?;
    match load_json_file::<T>(path) {
        Ok(Some(v)) => Some(v),
        Ok(None) => {
            info!(target: "artifacts", artifact = name, path = %path.display(), "artifact absent; using neutral fallback");
            None
        }
        Err(e) => {
            warn!(target: "artifacts", artifact = name, error = %e, "artifact failed to load; using neutral fallback");
            None
        }
    }
}

/// Parse a JSON artifact. `Ok(None)` when the file does not exist.
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| ArtifactError::Parse {
            path: path.to_path_buf(),
            source,
        })
}
