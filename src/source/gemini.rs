use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{missing_key_error, status_error, StoryboardSource, SERVICE};
use crate::config::{Config, Provider, Sampling};
use crate::error::{StoryResult, StoryboardError};
use crate::prompt::build_prompt;
use crate::response::{decode_storyboard, ValidationPolicy};
use crate::schema::Storyboard;

/// Google Gemini `generateContent` backend.
#[derive(Debug, Clone)]
pub struct GeminiSource {
    http: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    sampling: Sampling,
    validation: ValidationPolicy,
}

impl GeminiSource {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.as_str().trim_end_matches('/').to_owned(),
            sampling: config.sampling,
            validation: config.validation,
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    async fn complete(&self, api_key: &str, prompt: String) -> StoryResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_owned(),
                temperature: self.sampling.temperature,
                top_k: self.sampling.top_k,
                top_p: self.sampling.top_p,
                max_output_tokens: self.sampling.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| StoryboardError::from_transport(SERVICE, &error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| StoryboardError::from_transport(SERVICE, &error))?;
        if !status.is_success() {
            return Err(status_error(Provider::Gemini, status, &body));
        }

        let decoded: GenerateContentResponse = serde_json::from_str(&body).map_err(|error| {
            StoryboardError::response_format(format!(
                "failed to decode Gemini response envelope: {error}"
            ))
        })?;
        if let Some(reason) = decoded
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(StoryboardError::upstream(format!(
                "The {SERVICE} blocked the request ({reason})."
            )));
        }

        let candidate = decoded
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| StoryboardError::upstream(format!("The {SERVICE} returned no candidates.")))?;
        debug!(finish_reason = ?candidate.finish_reason, "gemini candidate received");

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            return Err(StoryboardError::response_format(format!(
                "The {SERVICE} returned an empty response."
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl StoryboardSource for GeminiSource {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, explanation: &str) -> StoryResult<Storyboard> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_key_error(Provider::Gemini))?;

        info!(model = %self.model, "requesting storyboard from Gemini");
        let text = self.complete(api_key, build_prompt(explanation)).await?;
        decode_storyboard(&text, self.validation)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOverrides, FileConfig};

    fn config_without_key() -> Config {
        Config::resolve(FileConfig::default(), &ConfigOverrides::default(), |_| None)
            .expect("config")
    }

    #[test]
    fn request_uses_camel_case_generation_config() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![Part {
                    text: Some("hi".to_owned()),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_owned(),
                temperature: 0.2,
                top_k: 32,
                top_p: 0.9,
                max_output_tokens: 10,
            },
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["topK"], 32);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn url_targets_the_configured_model() {
        let source = GeminiSource::new(Client::new(), &config_without_key());
        assert_eq!(
            source.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-04-17:generateContent"
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let source = GeminiSource::new(Client::new(), &config_without_key());
        let error = source.generate("explain quicksort").await.expect_err("no key");
        assert_eq!(error.code(), "E_CONFIG");
    }

    #[test]
    fn response_text_parts_are_joined() {
        let body = r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "{\"a\""}, {"text": ": 1}"}]}, "finishReason": "STOP"}]}"#;
        let decoded: GenerateContentResponse = serde_json::from_str(body).expect("decode");
        let text: String = decoded.candidates[0]
            .content
            .as_ref()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.clone())
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(text, "{\"a\": 1}");
    }
}
