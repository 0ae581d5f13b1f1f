mod anthropic;
mod gemini;
mod replay;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::{Config, Provider};
use crate::error::{StoryResult, StoryboardError};
use crate::schema::Storyboard;

pub use anthropic::AnthropicSource;
pub use gemini::GeminiSource;
pub use replay::ReplaySource;

const SERVICE: &str = "AI service";

#[async_trait]
pub trait StoryboardSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Generates a storyboard for `explanation`. Callers guarantee the
    /// input is not blank.
    async fn generate(&self, explanation: &str) -> StoryResult<Storyboard>;
}

pub fn build_source(config: &Config) -> StoryResult<Arc<dyn StoryboardSource>> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    let http = builder.build().map_err(|error| {
        StoryboardError::configuration(format!("failed to create HTTP client: {error}"))
    })?;

    let source: Arc<dyn StoryboardSource> = match config.provider {
        Provider::Gemini => Arc::new(GeminiSource::new(http, config)),
        Provider::Anthropic => Arc::new(AnthropicSource::new(http, config)),
    };
    Ok(source)
}

fn missing_key_error(provider: Provider) -> StoryboardError {
    let variables = provider.key_variables().join(" or ");
    let label = match provider {
        Provider::Gemini => "Gemini",
        Provider::Anthropic => "Anthropic",
    };
    StoryboardError::configuration(format!(
        "API Key for {label} is not configured. Please set the {variables} environment variable."
    ))
}

/// Maps an HTTP error status and body onto the user-facing error kinds.
fn status_error(provider: Provider, status: StatusCode, body: &str) -> StoryboardError {
    let invalid_key = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || body.contains("API_KEY_INVALID")
        || body.contains("API key not valid")
        || body.contains("invalid x-api-key");
    if invalid_key {
        let variables = provider.key_variables().join(" or ");
        return StoryboardError::upstream(format!(
            "The provided API key is invalid or not authorized. Please check your {variables} environment variable."
        ));
    }

    let detail = upstream_message(body).unwrap_or_else(|| body.trim().chars().take(200).collect());
    StoryboardError::upstream(format!(
        "An error occurred while communicating with the {SERVICE}: HTTP {status}: {detail}"
    ))
}

/// Pulls `error.message` out of a JSON error body (both providers use it).
fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(ToOwned::to_owned)
}
