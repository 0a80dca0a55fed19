//! OpenAI-compatible embeddings over HTTP.
//!
//! - Endpoint: `POST {base_url}/embeddings`
//! - Auth: `Authorization: Bearer {api_key}`
//! - Body: `{ model, input: ["text1", ...] }`
//! - Response: `{ data: [{ embedding, index }], ... }`
//!
//! Works with any server speaking the same shape (Azure OpenAI, vLLM,
//! LiteLLM, Ollama's `/v1`) through `base_url`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docqa_core::config::EmbeddingSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::EmbeddingProvider;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    id: String,
    timeout_secs: u64,
}

impl OpenAiEmbeddings {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "embedding API key is not configured \
                 (set OPENAI_API_KEY or APP_EMBEDDING__API_KEY)"
                    .into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            endpoint: format!("{}/embeddings", settings.base_url.trim_end_matches('/')),
            id: format!("openai:{}", settings.model),
            timeout_secs: settings.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            return Error::Timeout(self.timeout_secs);
        }
        Error::Provider(format!("embedding request to {} failed: {err}", self.endpoint))
    }
}

/// Order vectors by `index` and check there is exactly one per input.
fn extract_embeddings(mut response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(Error::Provider(format!(
            "expected {expected} embeddings, provider returned {}",
            response.data.len()
        )));
    }
    response.data.sort_by_key(|d| d.index);
    if response.data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(Error::Provider("provider returned non-contiguous embedding indices".into()));
    }
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

/// Best-effort human message from an OpenAI-style error body.
pub fn http_error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .and_then(|d| d.message)
        .unwrap_or_else(|| body.to_string());
    format!("HTTP {status}: {detail}")
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest { model: &self.model, input: texts };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Provider(format!("failed to read embedding response: {e}")))?;
        if !status.is_success() {
            return Err(Error::Provider(http_error_message(status.as_u16(), &text)));
        }
        let parsed: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Provider(format!("failed to parse embedding response: {e}")))?;
        extract_embeddings(parsed, texts.len())
    }
}
