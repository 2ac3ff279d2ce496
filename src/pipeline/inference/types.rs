use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::InferenceError;

/// Sampling controls forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    /// Moderate temperature: narrative summaries benefit from some variety,
    /// the JSON block still comes out stable.
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 2048,
        }
    }
}

/// One inference call.
#[derive(Debug, Clone, Default)]
pub struct InferenceRequest {
    /// Raw image bytes (PNG/JPEG). Empty for text-only prompts.
    pub images: Vec<Vec<u8>>,
    pub prompt_text: String,
    pub generation_config: GenerationConfig,
}

impl InferenceRequest {
    pub fn text(prompt_text: String, generation_config: GenerationConfig) -> Self {
        Self {
            images: Vec::new(),
            prompt_text,
            generation_config,
        }
    }

    pub fn with_images(
        images: Vec<Vec<u8>>,
        prompt_text: String,
        generation_config: GenerationConfig,
    ) -> Self {
        Self {
            images,
            prompt_text,
            generation_config,
        }
    }
}

/// Remote text generation (allows mocking).
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError>;
}
