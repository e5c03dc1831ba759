use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    /// `false` selects greedy decoding.
    pub do_sample: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: constants::MAX_NEW_TOKENS,
            do_sample: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to reach text generation service at {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("text generation service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode text generation response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// A service that turns a prompt into generated text.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        params: GenerationParams,
    ) -> BoxFuture<'a, Result<String, GenerationError>>;
}

// Structures matching Ollama's /api/generate endpoint
#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool, // We want the full response, not a stream
    options: OllamaOptions,
}

#[derive(Serialize, Debug, PartialEq)]
struct OllamaOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

impl From<GenerationParams> for OllamaOptions {
    fn from(params: GenerationParams) -> Self {
        if params.do_sample {
            Self {
                num_predict: params.max_new_tokens,
                temperature: None,
                top_k: None,
            }
        } else {
            Self {
                num_predict: params.max_new_tokens,
                temperature: Some(0.0),
                top_k: Some(1),
            }
        }
    }
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String, // The generated text
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GenerationError::Request {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn request(&self, prompt: &str, params: GenerationParams) -> Result<String, GenerationError> {
        let ollama_api_url = format!("{}/api/generate", self.base_url);

        let request_payload = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: params.into(),
        };

        let response = self
            .client
            .post(&ollama_api_url)
            .json(&request_payload)
            .send()
            .await
            .map_err(|source| GenerationError::Request {
                url: ollama_api_url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "Ollama API request failed");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: error_body,
            });
        }

        let ollama_response = response
            .json::<OllamaResponse>()
            .await
            .map_err(GenerationError::Decode)?;

        debug!(response = ?ollama_response.response, "Received Ollama response");

        Ok(ollama_response.response)
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        params: GenerationParams,
    ) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(self.request(prompt, params))
    }
}
