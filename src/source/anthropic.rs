use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{missing_key_error, status_error, StoryboardSource, SERVICE};
use crate::config::{Config, Provider, Sampling};
use crate::error::{StoryResult, StoryboardError};
use crate::prompt::{user_message, SYSTEM_PROMPT};
use crate::response::{decode_storyboard, ValidationPolicy};
use crate::schema::Storyboard;

const ANTHROPIC_API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicSource {
    http: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    sampling: Sampling,
    validation: ValidationPolicy,
}

impl AnthropicSource {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.to_string(),
            sampling: config.sampling,
            validation: config.validation,
        }
    }

    fn request(&self, explanation: &str) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.sampling.max_output_tokens,
            system: SYSTEM_PROMPT.to_owned(),
            temperature: self.sampling.temperature,
            top_k: self.sampling.top_k,
            top_p: self.sampling.top_p,
            messages: vec![AnthropicMessage {
                role: "user".to_owned(),
                content: user_message(explanation),
            }],
        }
    }

    async fn complete(&self, api_key: &str, request: &AnthropicRequest) -> StoryResult<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|error| StoryboardError::from_transport(SERVICE, &error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| StoryboardError::from_transport(SERVICE, &error))?;
        if !status.is_success() {
            return Err(status_error(Provider::Anthropic, status, &body));
        }

        let decoded: AnthropicResponse = serde_json::from_str(&body).map_err(|error| {
            StoryboardError::response_format(format!(
                "failed to decode Anthropic response envelope: {error}"
            ))
        })?;
        decoded
            .content
            .into_iter()
            .find_map(|chunk| chunk.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                StoryboardError::response_format(format!(
                    "The {SERVICE} returned an empty response."
                ))
            })
    }
}

#[async_trait]
impl StoryboardSource for AnthropicSource {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, explanation: &str) -> StoryResult<Storyboard> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_key_error(Provider::Anthropic))?;

        info!(model = %self.model, "requesting storyboard from Anthropic");
        let text = self.complete(api_key, &self.request(explanation)).await?;
        decode_storyboard(&text, self.validation)
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}
