use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StoryboardError;
use crate::prompt::DEFAULT_EXPLANATION;
use crate::response::ValidationPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "storyreel.yaml";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";
pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Gemini,
    Anthropic,
}

impl Provider {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => bail!("unknown provider '{other}'. Supported: gemini, anthropic"),
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => DEFAULT_GEMINI_MODEL,
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_ENDPOINT,
            Self::Anthropic => ANTHROPIC_ENDPOINT,
        }
    }

    /// Environment variables consulted for the credential, in priority order.
    pub fn key_variables(self) -> &'static [&'static str] {
        match self {
            Self::Gemini => &["GEMINI_API_KEY", "API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
        }
    }
}

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sampling {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// On-disk configuration. Every field is optional in the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub autoplay_interval_ms: Option<u64>,
    pub validation: Option<ValidationPolicy>,
    pub sampling: Option<Sampling>,
    pub initial_input: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub provider: Provider,
    pub model: String,
    pub endpoint: Url,
    pub api_key: Option<String>,
    /// `None` leaves the request unbounded.
    pub timeout: Option<Duration>,
    pub autoplay_interval: Duration,
    pub validation: ValidationPolicy,
    pub sampling: Sampling,
    pub initial_input: String,
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub strict: bool,
    pub autoplay_interval_ms: Option<u64>,
}

impl Config {
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let file = match &overrides.config_path {
            Some(path) => read_config_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    read_config_file(default_path)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Self::resolve(file, overrides, |name| env::var(name).ok())
    }

    /// Layers file values, environment and CLI overrides (lowest to highest).
    pub fn resolve(
        file: FileConfig,
        overrides: &ConfigOverrides,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env_provider = lookup_env("STORYREEL_PROVIDER")
            .map(|raw| Provider::parse(&raw))
            .transpose()
            .context("invalid STORYREEL_PROVIDER")?;
        let provider = overrides
            .provider
            .or(env_provider)
            .or(file.provider)
            .unwrap_or_default();

        let model = overrides
            .model
            .clone()
            .or_else(|| lookup_env("STORYREEL_MODEL"))
            .or(file.model)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_owned());

        let endpoint_raw = file
            .endpoint
            .unwrap_or_else(|| provider.default_endpoint().to_owned());
        let endpoint = Url::parse(&endpoint_raw).map_err(|error| {
            StoryboardError::configuration(format!("invalid endpoint '{endpoint_raw}': {error}"))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StoryboardError::configuration(format!(
                "endpoint '{endpoint_raw}' must use http or https"
            ))
            .into());
        }

        let api_key = provider
            .key_variables()
            .iter()
            .find_map(|name| lookup_env(*name))
            .filter(|value| !value.trim().is_empty());

        let timeout = match file.timeout_secs.unwrap_or(60) {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        };

        let interval_ms = overrides
            .autoplay_interval_ms
            .or(file.autoplay_interval_ms)
            .unwrap_or(2_000);
        if interval_ms == 0 {
            bail!("autoplay interval must be > 0 ms");
        }

        let sampling = file.sampling.unwrap_or_default();
        if !(0.0..=2.0).contains(&sampling.temperature) {
            bail!(
                "sampling.temperature must be within 0.0..=2.0, got {}",
                sampling.temperature
            );
        }
        if !(0.0..=1.0).contains(&sampling.top_p) {
            bail!("sampling.top_p must be within 0.0..=1.0, got {}", sampling.top_p);
        }

        let validation = if overrides.strict {
            ValidationPolicy::Strict
        } else {
            file.validation.unwrap_or_default()
        };

        Ok(Self {
            provider,
            model,
            endpoint,
            api_key,
            timeout,
            autoplay_interval: Duration::from_millis(interval_ms),
            validation,
            sampling,
            initial_input: file
                .initial_input
                .unwrap_or_else(|| DEFAULT_EXPLANATION.to_owned()),
        })
    }
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to decode config {}", path.display()))
}

fn default_temperature() -> f32 {
    0.2
}

fn default_top_k() -> u32 {
    32
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_output_tokens() -> u32 {
    8_192
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_use_the_documented_generation_settings() {
        let config =
            Config::resolve(FileConfig::default(), &ConfigOverrides::default(), env_of(&[]))
                .expect("defaults");
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.autoplay_interval, Duration::from_millis(2_000));
        assert_eq!(config.sampling.top_k, 32);
        assert_eq!(config.validation, ValidationPolicy::BestEffort);
        assert_eq!(config.api_key, None);
        assert_eq!(config.initial_input, DEFAULT_EXPLANATION);
    }

    #[test]
    fn gemini_key_prefers_specific_variable() {
        let config = Config::resolve(
            FileConfig::default(),
            &ConfigOverrides::default(),
            env_of(&[("API_KEY", "generic"), ("GEMINI_API_KEY", "specific")]),
        )
        .expect("config");
        assert_eq!(config.api_key.as_deref(), Some("specific"));
    }

    #[test]
    fn cli_overrides_beat_env_and_file() {
        let file: FileConfig = serde_yaml::from_str(
            "provider: gemini\nmodel: from-file\nvalidation: best_effort\nautoplay_interval_ms: 500\n",
        )
        .expect("yaml");
        let overrides = ConfigOverrides {
            provider: Some(Provider::Anthropic),
            strict: true,
            ..ConfigOverrides::default()
        };
        let config = Config::resolve(
            file,
            &overrides,
            env_of(&[("STORYREEL_MODEL", "from-env"), ("ANTHROPIC_API_KEY", "k")]),
        )
        .expect("config");
        assert_eq!(config.provider, Provider::Anthropic);
        assert_eq!(config.model, "from-env");
        assert_eq!(config.validation, ValidationPolicy::Strict);
        assert_eq!(config.autoplay_interval, Duration::from_millis(500));
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.endpoint.as_str(), ANTHROPIC_ENDPOINT);
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let error = serde_yaml::from_str::<FileConfig>("modle: typo\n").expect_err("typo");
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn bad_endpoint_is_a_configuration_error() {
        let file = FileConfig {
            endpoint: Some("ftp://example.com".to_owned()),
            ..FileConfig::default()
        };
        let error = Config::resolve(file, &ConfigOverrides::default(), env_of(&[]))
            .expect_err("bad scheme");
        let typed = crate::error::find_storyboard_error(&error).expect("typed");
        assert_eq!(typed.code(), "E_CONFIG");
    }

    #[test]
    fn zero_timeout_disables_it_and_zero_interval_fails() {
        let file = FileConfig {
            timeout_secs: Some(0),
            ..FileConfig::default()
        };
        let config = Config::resolve(file, &ConfigOverrides::default(), env_of(&[]))
            .expect("config");
        assert_eq!(config.timeout, None);

        let overrides = ConfigOverrides {
            autoplay_interval_ms: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(Config::resolve(FileConfig::default(), &overrides, env_of(&[])).is_err());
    }
}
