// src/judge/client.rs
//! Completion client abstraction for the external judge.
//!
//! The judge only needs `complete(user_prompt, system_prompt) -> text`. Concrete
//! providers translate HTTP outcomes into [`JudgeError`] so the orchestrator can
//! tell transient failures (rate limit, overload, no answer) from permanent ones.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::JudgeConfig;

/// Markers in error bodies that mean "try again later". Status codes are
/// classified from the status itself, never from digits in the body.
const TRANSIENT_MARKERS: [&str; 6] = [
    "overloaded",
    "resource_exhausted",
    "rate limit",
    "rate_limit",
    "too many requests",
    "service unavailable",
];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum JudgeError {
    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16 },
    #[error("service overloaded: {0}")]
    Overloaded(String),
    #[error("empty response")]
    EmptyResponse,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {message}")]
    Transport { message: String, timeout: bool },
    #[error("judge disabled")]
    Disabled,
}

impl JudgeError {
    /// Whether retrying with backoff may help.
    pub fn is_transient(&self) -> bool {
        match self {
            JudgeError::RateLimited { .. } | JudgeError::Overloaded(_) | JudgeError::EmptyResponse => {
                true
            }
            JudgeError::Transport { timeout, .. } => *timeout,
            JudgeError::Http { body, .. } => has_transient_marker(body),
            JudgeError::Disabled => false,
        }
    }

    /// Map a non-success HTTP status and body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = truncate(body, 300);
        match status {
            429 => JudgeError::RateLimited { status },
            503 | 529 => JudgeError::Overloaded(format!("HTTP {status}")),
            _ if has_transient_marker(&body) => JudgeError::Overloaded(body),
            _ => JudgeError::Http { status, body },
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_status(status.as_u16(), &e.to_string());
        }
        JudgeError::Transport {
            timeout: e.is_timeout(),
            message: e.to_string(),
        }
    }
}

fn has_transient_marker(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Language-model completion contract used by the judge.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, user_prompt: &str, system_prompt: &str) -> Result<String, JudgeError>;

    /// Provider/model label for logs.
    fn name(&self) -> &str;

    /// `false` means calls are pointless; the orchestrator skips straight to
    /// fallback scores without pacing.
    fn is_enabled(&self) -> bool {
        true
    }
}

pub type DynCompletionClient = Arc<dyn CompletionClient>;

/// Always disabled; used when no provider or key is configured.
pub struct DisabledClient;

#[async_trait]
impl CompletionClient for DisabledClient {
    async fn complete(&self, _user: &str, _system: &str) -> Result<String, JudgeError> {
        Err(JudgeError::Disabled)
    }
    fn name(&self) -> &str {
        "disabled"
    }
    fn is_enabled(&self) -> bool {
        false
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, JudgeError> {
    reqwest::Client::builder()
        .user_agent("news-gatekeeper/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .map_err(JudgeError::from_reqwest)
}

/// OpenAI-compatible chat completions.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    label: String,
}

impl OpenAiClient {
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(
        api_key: impl Into<String>,
        model: Option<&str>,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, JudgeError> {
        let model = model.unwrap_or(Self::DEFAULT_MODEL).to_string();
        Ok(Self {
            http: http_client(timeout)?,
            api_key: api_key.into(),
            label: format!("openai:{model}"),
            model,
            base_url: base_url
                .unwrap_or(Self::DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, user_prompt: &str, system_prompt: &str) -> Result<String, JudgeError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Msg {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(Msg {
            role: "user",
            content: user_prompt,
        });
        let req = Req {
            model: &self.model,
            messages,
            temperature: 0.2,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(JudgeError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(JudgeError::from_status(status.as_u16(), &body));
        }
        let body: Resp = resp.json().await.map_err(JudgeError::from_reqwest)?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(JudgeError::EmptyResponse);
        }
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Google Gemini `generateContent`.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    label: String,
}

impl GeminiClient {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash-lite";
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    pub fn new(
        api_key: impl Into<String>,
        model: Option<&str>,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, JudgeError> {
        let model = model.unwrap_or(Self::DEFAULT_MODEL).to_string();
        Ok(Self {
            http: http_client(timeout)?,
            api_key: api_key.into(),
            label: format!("gemini:{model}"),
            model,
            base_url: base_url
                .unwrap_or(Self::DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, user_prompt: &str, system_prompt: &str) -> Result<String, JudgeError> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            role: Option<&'a str>,
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerationConfig {
            temperature: f32,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Req<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            system_instruction: Option<Content<'a>>,
            contents: Vec<Content<'a>>,
            generation_config: GenerationConfig,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Option<RespContent>,
        }
        #[derive(Deserialize)]
        struct RespContent {
            #[serde(default)]
            parts: Vec<RespPart>,
        }
        #[derive(Deserialize)]
        struct RespPart {
            #[serde(default)]
            text: String,
        }

        let req = Req {
            system_instruction: (!system_prompt.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: system_prompt,
                }],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user_prompt }],
            }],
            generation_config: GenerationConfig { temperature: 0.2 },
        };

        let resp = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(JudgeError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(JudgeError::from_status(status.as_u16(), &body));
        }
        let body: Resp = resp.json().await.map_err(JudgeError::from_reqwest)?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(JudgeError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Factory: build the configured provider, or a disabled client when the judge
/// is off, the key is missing, or the provider is unknown.
pub fn build_client(cfg: &JudgeConfig) -> DynCompletionClient {
    if !cfg.enabled {
        return Arc::new(DisabledClient);
    }
    if cfg.api_key.trim().is_empty() {
        warn!(target: "judge", provider = %cfg.provider, "judge enabled but no API key; judge disabled");
        return Arc::new(DisabledClient);
    }
    let timeout = Duration::from_secs(cfg.request_timeout_secs.max(1));
    let built = match cfg.provider.as_str() {
        "openai" => OpenAiClient::new(
            cfg.api_key.clone(),
            cfg.model.as_deref(),
            cfg.base_url.as_deref(),
            timeout,
        )
        .map(|c| Arc::new(c) as DynCompletionClient),
        "gemini" => GeminiClient::new(
            cfg.api_key.clone(),
            cfg.model.as_deref(),
            cfg.base_url.as_deref(),
            timeout,
        )
        .map(|c| Arc::new(c) as DynCompletionClient),
        other => {
            warn!(target: "judge", provider = other, "unsupported judge provider; judge disabled");
            return Arc::new(DisabledClient);
        }
    };
    built.unwrap_or_else(|e| {
        warn!(target: "judge", error = %e, "failed to build judge client; judge disabled");
        Arc::new(DisabledClient)
    })
}
