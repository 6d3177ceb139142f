//! Unified configuration for the review subsystem.
//!
//! Sources, lowest to highest precedence: built-in defaults, a YAML file
//! or inline JSON value, environment variables (`REVIEW_BACKEND_TYPE`,
//! `REVIEW_BACKEND_MODEL`, `REVIEW_BACKEND_TEMPERATURE`,
//! `REVIEW_BACKEND_MAX_TOKENS`).

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::ReviewError;

const DEFAULT_BACKEND_TYPE: &str = "anthropic";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// LLM backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    /// Registered backend name (e.g. "anthropic", "openai").
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature. Must be >= 0.0.
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens per completion. Must be > 0.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Backend-specific extras (api_key, base_url, ...), forwarded to the
    /// backend factory verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            backend_type: DEFAULT_BACKEND_TYPE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            extra: serde_json::Map::new(),
        }
    }
}

impl BackendSettings {
    /// Factory configuration: the extras plus the configured model.
    pub fn factory_config(&self) -> JsonValue {
        let mut config = self.extra.clone();
        config.insert("model".to_string(), JsonValue::String(self.model.clone()));
        JsonValue::Object(config)
    }
}

/// Per-methodology overrides.
///
/// A non-empty `prompt` or `knowledge_base` names a registry entry that
/// takes precedence over the reviewer's own defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodSettings {
    #[serde(default)]
    pub prompt: String,

    #[serde(default)]
    pub knowledge_base: String,
}

/// Top-level configuration for the review subsystem.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewConfig {
    /// LLM backend settings.
    #[serde(default)]
    pub backend: BackendSettings,

    /// Per-methodology overrides, keyed by `model_type`.
    #[serde(default)]
    pub methods: BTreeMap<String, MethodSettings>,
}

impl ReviewConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ReviewError> {
        Self::default().finish()
    }

    /// Load from a YAML file, then apply environment overrides.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ReviewError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: ReviewConfig = serde_yaml::from_str(&contents)?;
        config.finish()
    }

    /// Load from an inline JSON value, then apply environment overrides.
    pub fn from_json(value: &JsonValue) -> Result<Self, ReviewError> {
        let config: ReviewConfig = serde_json::from_value(value.clone())?;
        config.finish()
    }

    /// Settings for a methodology, or defaults when none are configured.
    pub fn method(&self, model_type: &str) -> MethodSettings {
        self.methods.get(model_type).cloned().unwrap_or_default()
    }

    fn finish(mut self) -> Result<Self, ReviewError> {
        self.apply_env_overrides()?;
        self.validate()?;
        Ok(self)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ReviewError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply environment-style overrides through a lookup function.
    ///
    /// The indirection keeps override precedence testable without
    /// mutating process-global environment state.
    fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ReviewError> {
        if let Some(value) = lookup("REVIEW_BACKEND_TYPE") {
            self.backend.backend_type = value;
        }
        if let Some(value) = lookup("REVIEW_BACKEND_MODEL") {
            self.backend.model = value;
        }
        if let Some(value) = lookup("REVIEW_BACKEND_TEMPERATURE") {
            self.backend.temperature = value.parse().map_err(|_| {
                ReviewError::InvalidConfig(format!(
                    "REVIEW_BACKEND_TEMPERATURE is not a number: {value:?}"
                ))
            })?;
        }
        if let Some(value) = lookup("REVIEW_BACKEND_MAX_TOKENS") {
            self.backend.max_tokens = value.parse().map_err(|_| {
                ReviewError::InvalidConfig(format!(
                    "REVIEW_BACKEND_MAX_TOKENS is not an integer: {value:?}"
                ))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ReviewError> {
        if self.backend.temperature < 0.0 {
            return Err(ReviewError::InvalidConfig(format!(
                "temperature must be >= 0.0, got {}",
                self.backend.temperature
            )));
        }
        if self.backend.max_tokens == 0 {
            return Err(ReviewError::InvalidConfig(
                "max_tokens must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_backend_type() -> String {
    DEFAULT_BACKEND_TYPE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
