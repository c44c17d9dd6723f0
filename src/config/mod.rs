//! Configuration loading and validation.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{CrewError, Result};

pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com/v1";

/// Backend settings shared by every agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    pub llm: LlmConfig,
}

impl CrewConfig {
    /// Load from a TOML file (missing file means defaults), apply
    /// environment overrides, then validate.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading config file");
                let content = fs::read_to_string(path).await?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = env::var("DEEPSEEK_API_KEY") {
            self.llm.api_key = key;
        }
        if let Ok(model) = env::var("DEEPSEEK_MODEL") {
            self.llm.model = model;
        }
        if let Ok(base) = env::var("DEEPSEEK_API_BASE") {
            self.llm.api_base = base;
        }
    }

    /// An agent cannot run without a backend, so a missing key is fatal
    /// here rather than a recoverable per-invocation failure.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.llm.api_key.is_empty() {
            errors.push("api_key is not set (set DEEPSEEK_API_KEY or [llm] api_key)");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push("temperature must be within [0.0, 2.0]");
        }
        if self.llm.max_tokens == 0 {
            errors.push("max_tokens must be greater than 0");
        }
        if self.llm.api_base.is_empty() {
            errors.push("api_base must not be empty");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CrewError::Config(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key() -> CrewConfig {
        CrewConfig {
            llm: LlmConfig {
                api_key: "sk-test".into(),
                ..LlmConfig::default()
            },
        }
    }

    #[test]
    fn defaults_point_at_deepseek() {
        let config = LlmConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.max_tokens, 2000);
    }

    #[test]
    fn missing_api_key_fails_validation() {
        let config = CrewConfig::default();
        assert!(matches!(config.validate(), Err(CrewError::Config(_))));
        assert!(with_key().validate().is_ok());
    }

    #[test]
    fn out_of_range_temperature_fails_validation() {
        let mut config = with_key();
        config.llm.temperature = 2.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: CrewConfig =
            toml::from_str("[llm]\napi_key = \"sk-file\"\ntemperature = 0.2\n").unwrap();
        assert_eq!(config.llm.api_key, "sk-file");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
    }
}
