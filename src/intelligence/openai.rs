//! OpenAI-compatible chat completions client.
//!
//! Blocking, non-streaming. Works against api.openai.com or any server that
//! speaks the same `/chat/completions` shape.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{extract_json_from_response, GenerationError, TextGenerator};
use crate::config::GenerationConfig;
use crate::util::truncate_for_log;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for ChatCompletionsGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsGenerator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsGenerator {
    /// Build a client from configuration.
    ///
    /// Fails with [`GenerationError::Unavailable`] when no API key is set, so
    /// callers learn about it before any transcript is touched.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                GenerationError::Unavailable(
                    "no API key configured (set OPENAI_API_KEY)".to_string(),
                )
            })?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl TextGenerator for ChatCompletionsGenerator {
    fn generate(
        &self,
        system_prompt: &str,
        transcript: &str,
    ) -> Result<serde_json::Value, GenerationError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: transcript.to_string(),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GenerationError::Unavailable(format!(
                "credentials rejected by {} (HTTP {})",
                self.endpoint,
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&body, 500),
            });
        }

        let completion: ChatCompletionResponse = response.json()?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        parse_generated_json(&content)
    }
}

/// Parse model output into JSON, salvaging objects wrapped in fences or prose.
pub(crate) fn parse_generated_json(content: &str) -> Result<serde_json::Value, GenerationError> {
    let json_str = extract_json_from_response(content).ok_or_else(|| {
        GenerationError::Malformed(format!(
            "no JSON object in output: {}",
            truncate_for_log(content, 200)
        ))
    })?;
    serde_json::from_str(json_str).map_err(|e| GenerationError::Malformed(e.to_string()))
}
