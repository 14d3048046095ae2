//! Completion and vision service abstraction.
//!
//! [`CompletionClient`] is the only seam through which the pipeline talks to
//! a language model. [`OpenAiCompatClient`] implements it against any
//! OpenAI-compatible `POST {base_url}/chat/completions` endpoint, reading
//! the endpoint settings from a [`ConfigSource`] on every call.
//!
//! # Error classes
//!
//! | Variant | Cause |
//! |---------|-------|
//! | `Connection` | request never got a response (connect, timeout, I/O) |
//! | `RateLimited` | HTTP 429 |
//! | `Status` | any other non-2xx status |
//! | `NotConfigured` | endpoint or key missing |
//! | `Malformed` | 2xx body without `choices[0].message.content` |
//! | `Other` | anything else |
//!
//! The first three are *transport* errors ([`CompletionError::is_transport`]);
//! the page extractor propagates those from the vision path and swallows the
//! rest. No retries happen here.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::{ConfigSource, EndpointConfig};

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("{0} endpoint is not configured")]
    NotConfigured(&'static str),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Other(String),
}

impl CompletionError {
    /// Connection, rate-limit, and status failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CompletionError::Connection(_)
                | CompletionError::RateLimited(_)
                | CompletionError::Status { .. }
        )
    }
}

/// A single-turn prompt, optionally with one PNG image attached.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Base64-encoded PNG.
    pub image_png_base64: Option<String>,
}

impl CompletionRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_png_base64: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image_png_base64: String) -> Self {
        Self {
            prompt: prompt.into(),
            image_png_base64: Some(image_png_base64),
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Whether a call has a chance of succeeding right now.
    async fn is_configured(&self) -> bool;

    /// Sends the request and returns the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Which endpoint section of the config a client reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Llm,
    Ocr,
}

impl Endpoint {
    fn label(self) -> &'static str {
        match self {
            Endpoint::Llm => "llm",
            Endpoint::Ocr => "ocr",
        }
    }
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiCompatClient {
    source: ConfigSource,
    endpoint: Endpoint,
}

impl OpenAiCompatClient {
    pub fn new(source: ConfigSource, endpoint: Endpoint) -> Self {
        Self { source, endpoint }
    }

    async fn current(&self) -> Option<EndpointConfig> {
        let config = match self.source.load_async().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(config = %self.source.path().display(), error = %e, "config reload failed");
                return None;
            }
        };
        let ready = match self.endpoint {
            Endpoint::Llm => config.is_llm_configured(),
            Endpoint::Ocr => config.is_ocr_configured(),
        };
        if !ready {
            return None;
        }
        Some(match self.endpoint {
            Endpoint::Llm => config.llm,
            Endpoint::Ocr => config.ocr,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn is_configured(&self) -> bool {
        self.current().await.is_some()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let endpoint = self
            .current()
            .await
            .ok_or(CompletionError::NotConfigured(self.endpoint.label()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Other(e.to_string()))?;

        let url = format!(
            "{}/chat/completions",
            endpoint.base_url.trim_end_matches('/')
        );
        let body = build_payload(&endpoint.model, request);

        let response = client
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CompletionError::RateLimited(body_text));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;
        parse_chat_response(&json)
    }
}

fn classify_send_error(e: reqwest::Error) -> CompletionError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        CompletionError::Connection(e.to_string())
    } else {
        CompletionError::Other(e.to_string())
    }
}

/// Chat-completions body. Images go in as a `data:` URL content part.
fn build_payload(model: &str, request: &CompletionRequest) -> Value {
    let content = match &request.image_png_base64 {
        Some(image) => json!([
            { "type": "text", "text": request.prompt },
            {
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{}", image) }
            }
        ]),
        None => json!(request.prompt),
    };
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": content }],
    })
}

fn parse_chat_response(json: &Value) -> Result<String, CompletionError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| CompletionError::Malformed("missing choices[0].message.content".into()))
}
