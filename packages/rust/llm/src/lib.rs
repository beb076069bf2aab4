//! Language-model backend for the map and reduce stages.
//!
//! The pipeline only sees [`ChatBackend`]: one prompt in, one completion out.
//! [`OllamaChat`] implements it against Ollama's non-streaming `/api/chat`
//! endpoint with the sampling options pinned by [`OllamaConfig`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use docdigest_shared::{DigestError, OllamaConfig, Result};

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("docdigest/", env!("CARGO_PKG_VERSION"));

/// A blocking-from-the-caller's-view prompt → completion backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `prompt` as a single user message and return the reply text.
    async fn invoke(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Chat message in Ollama's request/response format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Sampling options forwarded verbatim to the model runtime.
#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_ctx: u32,
    seed: i64,
    num_predict: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: &'a ChatOptions,
    keep_alive: i64,
}

/// Response body for a non-streaming chat call.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

/// [`ChatBackend`] talking to an Ollama server.
///
/// No request timeout is set; the runtime's own limits apply.
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: Client,
    url: String,
    model: String,
    options: ChatOptions,
    keep_alive: i64,
}

impl OllamaChat {
    /// Build a client for the configured host and model.
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DigestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/api/chat", config.host.trim_end_matches('/')),
            model: config.model.clone(),
            options: ChatOptions {
                temperature: config.temperature,
                num_ctx: config.num_ctx,
                seed: config.seed,
                num_predict: config.num_predict,
                top_k: config.top_k,
                top_p: config.top_p,
            },
            keep_alive: config.keep_alive,
        })
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for OllamaChat {
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: &self.options,
            keep_alive: self.keep_alive,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DigestError::Network(format!("{}: {e}", self.url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DigestError::Network(format!("{}: failed to read body: {e}", self.url)))?;

        let parsed: Option<ChatResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let detail = parsed
                .and_then(|r| r.error)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(DigestError::Backend(format!("HTTP {status}: {detail}")));
        }

        let parsed = parsed.ok_or_else(|| {
            DigestError::Backend(format!(
                "invalid chat response (got: {})",
                body.chars().take(200).collect::<String>()
            ))
        })?;

        if let Some(error) = parsed.error {
            return Err(DigestError::Backend(error));
        }

        debug!(
            tokens_in = parsed.prompt_eval_count,
            tokens_out = parsed.eval_count,
            "chat completed"
        );

        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }
}
