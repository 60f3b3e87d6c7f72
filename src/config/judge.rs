// src/config/judge.rs
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::judge::{prompt::DEFAULT_SNIPPET_CHARS, JudgeSettings, RetryPolicy};

fn default_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    crate::judge::DEFAULT_BATCH_SIZE
}
fn default_max_attempts() -> u32 {
    crate::judge::backoff::DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_secs() -> f64 {
    crate::judge::backoff::DEFAULT_BASE_DELAY.as_secs_f64()
}
fn default_pacing_secs() -> f64 {
    crate::judge::DEFAULT_PACING.as_secs_f64()
}
fn default_snippet_chars() -> usize {
    DEFAULT_SNIPPET_CHARS
}
fn default_request_timeout_secs() -> u64 {
    60
}

/// `[judge]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "openai" | "gemini" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// "ENV" (or empty) means: read JUDGE_API_KEY, then OPENAI_API_KEY /
    /// GEMINI_API_KEY by provider.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    #[serde(default = "default_pacing_secs")]
    pub pacing_secs: f64,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key: String::new(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            pacing_secs: default_pacing_secs(),
            snippet_chars: default_snippet_chars(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Negative, non-finite or out-of-range seconds fall back to `fallback`.
fn secs(v: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(v).unwrap_or_else(|_| Duration::from_secs_f64(fallback))
}

fn valid_secs(v: f64) -> bool {
    Duration::try_from_secs_f64(v).is_ok()
}

impl JudgeConfig {
    pub fn settings(&self) -> JudgeSettings {
        JudgeSettings {
            batch_size: self.batch_size.max(1),
            pacing: secs(self.pacing_secs, default_pacing_secs()),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                base_delay: secs(self.base_delay_secs, default_base_delay_secs()),
            },
            snippet_chars: self.snippet_chars,
        }
    }

    pub(crate) fn sanitize(&mut self) {
        self.provider = self.provider.trim().to_lowercase();
        if self.batch_size == 0 {
            self.batch_size = default_batch_size();
        }
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if !valid_secs(self.base_delay_secs) {
            self.base_delay_secs = default_base_delay_secs();
        }
        if !valid_secs(self.pacing_secs) {
            self.pacing_secs = default_pacing_secs();
        }
    }

    /// Resolve an "ENV" / empty key from the environment. A missing key is not an
    /// error: the judge just stays disabled.
    pub(crate) fn resolve_api_key(&mut self) {
        let key = self.api_key.trim();
        if !(key.is_empty() || key.eq_ignore_ascii_case("env")) {
            return;
        }
        let provider_var = match self.provider.as_str() {
            "openai" => Some("OPENAI_API_KEY"),
            "gemini" => Some("GEMINI_API_KEY"),
            _ => None,
        };
        let found = env::var("JUDGE_API_KEY")
            .ok()
            .or_else(|| provider_var.and_then(|v| env::var(v).ok()))
            .filter(|k| !k.trim().is_empty());
        match found {
            Some(k) => self.api_key = k,
            None => {
                self.api_key.clear();
                if self.enabled {
                    warn!(target: "judge", provider = %self.provider, "no API key in environment; judge will be disabled");
                }
            }
        }
    }
}
