//! OpenAI-compatible chat completions used as the generation provider.
//!
//! - Endpoint: `POST {base_url}/chat/completions`
//! - Body: `{ model, messages: [system, user], temperature }`
//! - Answer: `choices[0].message.content`

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docqa_core::config::GenerationSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::GenerationProvider;
use docqa_core::types::CompletionRequest;
use docqa_embed::openai::http_error_message;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl<'a> ChatRequest<'a> {
    fn from_completion(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: [
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: request.temperature,
        }
    }
}

fn first_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| Error::Provider("chat completion returned no content".into()))
}

pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    timeout_secs: u64,
}

impl OpenAiChat {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "generation API key is not configured \
                 (set OPENAI_API_KEY or APP_GENERATION__API_KEY)"
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
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            timeout_secs: settings.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationProvider for OpenAiChat {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::from_completion(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout_secs)
                } else {
                    Error::Provider(format!("chat request to {} failed: {e}", self.endpoint))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Provider(format!("failed to read chat response: {e}")))?;
        if !status.is_success() {
            return Err(Error::Provider(http_error_message(status.as_u16(), &text)));
        }
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Provider(format!("failed to parse chat response: {e}")))?;
        first_content(parsed)
    }
}
