use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::types::{InferenceClient, InferenceRequest};
use super::InferenceError;

/// Ollama HTTP client for vision/text inference over `/api/chat`.
///
/// Chat-template vision models (LLaVA, Gemma) reject images on
/// `/api/generate`, so everything goes through the chat endpoint.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            InferenceError::Connection(self.base_url.clone())
        } else {
            InferenceError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    /// Base64-encoded images (only for user messages).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response body from Ollama /api/chat (non-streaming)
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

fn build_chat_request<'a>(model: &'a str, request: &'a InferenceRequest) -> ChatRequest<'a> {
    let images = request
        .images
        .iter()
        .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
        .collect();

    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: &request.prompt_text,
            images,
        }],
        stream: false,
        options: ChatOptions {
            temperature: request.generation_config.temperature,
            num_predict: request.generation_config.max_output_tokens,
        },
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = build_chat_request(&self.model, request);

        tracing::debug!(
            model = %self.model,
            images = request.images.len(),
            prompt_len = request.prompt_text.len(),
            "Sending inference request"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        Ok(parsed.message.content)
    }
}

/// Mock inference client for testing. Returns a configurable response.
pub struct MockInferenceClient {
    response: Result<String, String>,
    delay: Option<Duration>,
    last_request: Mutex<Option<InferenceRequest>>,
}

impl MockInferenceClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            delay: None,
            last_request: Mutex::new(None),
        }
    }

    /// A client whose every call fails with an HTTP 503.
    pub fn failing(body: &str) -> Self {
        Self {
            response: Err(body.to_string()),
            delay: None,
            last_request: Mutex::new(None),
        }
    }

    /// Sleep before answering (for timeout and cancellation tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The most recent request this client received.
    pub fn last_request(&self) -> Option<InferenceRequest> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    fn model(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        if let Ok(mut guard) = self.last_request.lock() {
            *guard = Some(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(body) => Err(InferenceError::Api {
                status: 503,
                body: body.clone(),
            }),
        }
    }
}
