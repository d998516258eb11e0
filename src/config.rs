use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::models::GenerationConfig;

const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_GEMINI_API_KEY";

/// Main configuration structure for filechat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Credential sent as the `key` query parameter
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Optional sampling settings, sent only when present
    #[serde(default)]
    pub generation: Option<GenerationConfig>,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            generation: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = [".env", "../.env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("FILECHAT_CONFIG_PATH").unwrap_or_else(|_| "filechat.yaml".to_string());

        let mut config = Self::from_file(&config_path);
        config.apply_overrides(|key| env::var(key).ok());

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn from_file(config_path: &str) -> Self {
        if !Path::new(config_path).exists() {
            tracing::debug!("Config file not found at {} - using defaults", config_path);
            return Self::default();
        }

        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path);
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    config_path,
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply overrides from a key lookup (the process environment in `load`)
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_key) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = Some(api_key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(endpoint) = lookup("GEMINI_ENDPOINT") {
            self.gemini.endpoint = endpoint;
        }

        if let Some(temperature) = lookup("GEMINI_TEMPERATURE") {
            match temperature.parse() {
                Ok(value) => {
                    self.gemini
                        .generation
                        .get_or_insert_with(GenerationConfig::default)
                        .temperature = Some(value);
                }
                Err(_) => tracing::warn!("Ignoring invalid GEMINI_TEMPERATURE: {}", temperature),
            }
        }
        if let Some(max_tokens) = lookup("GEMINI_MAX_OUTPUT_TOKENS") {
            match max_tokens.parse() {
                Ok(value) => {
                    self.gemini
                        .generation
                        .get_or_insert_with(GenerationConfig::default)
                        .max_output_tokens = Some(value);
                }
                Err(_) => {
                    tracing::warn!("Ignoring invalid GEMINI_MAX_OUTPUT_TOKENS: {}", max_tokens)
                }
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.credential().is_none() {
            return Err("GEMINI_API_KEY is not set; sending will fail until it is".into());
        }

        if self.gemini.model.trim().is_empty() {
            return Err("gemini.model cannot be empty".into());
        }

        if !self.gemini.endpoint.starts_with("http://")
            && !self.gemini.endpoint.starts_with("https://")
        {
            return Err(format!(
                "gemini.endpoint must be an http(s) URL, got '{}'",
                self.gemini.endpoint
            )
            .into());
        }

        if let Some(temperature) = self.gemini.generation.as_ref().and_then(|g| g.temperature) {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("gemini.generation.temperature must be between 0.0 and 2.0".into());
            }
        }

        Ok(())
    }

    /// The pre-provisioned credential, if one is usable.
    pub fn credential(&self) -> Option<&str> {
        self.gemini
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_have_no_credential() {
        let cfg = Config::default();
        assert_eq!(cfg.credential(), None);
        assert_eq!(cfg.gemini.model, "gemini-2.0-flash");
        assert!(cfg.gemini.generation.is_none());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn placeholder_and_blank_keys_are_not_credentials() {
        let mut cfg = Config::default();
        cfg.gemini.api_key = Some(PLACEHOLDER_API_KEY.to_string());
        assert_eq!(cfg.credential(), None);
        cfg.gemini.api_key = Some("   ".to_string());
        assert_eq!(cfg.credential(), None);
        cfg.gemini.api_key = Some("abc123".to_string());
        assert_eq!(cfg.credential(), Some("abc123"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-pro"),
            ("GEMINI_ENDPOINT", "http://localhost:9999"),
            ("GEMINI_MAX_OUTPUT_TOKENS", "512"),
        ]));

        assert_eq!(cfg.credential(), Some("secret"));
        assert_eq!(cfg.gemini.model, "gemini-pro");
        assert_eq!(cfg.gemini.endpoint, "http://localhost:9999");
        assert_eq!(
            cfg.gemini.generation.as_ref().and_then(|g| g.max_output_tokens),
            Some(512)
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn invalid_numeric_overrides_are_ignored() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[("GEMINI_TEMPERATURE", "warm")]));
        assert!(cfg.gemini.generation.is_none());
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "gemini:\n  api_key: from-file\n  generation:\n    temperature: 0.2\n",
        )
        .expect("yaml should parse");

        assert_eq!(cfg.credential(), Some("from-file"));
        assert_eq!(cfg.gemini.endpoint, default_endpoint());
        assert_eq!(
            cfg.gemini.generation.and_then(|g| g.temperature),
            Some(0.2)
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = Config::from_file("/nonexistent/filechat.yaml");
        assert_eq!(cfg.gemini.model, default_model());
    }
}
