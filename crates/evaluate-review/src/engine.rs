//! ReviewEngine: orchestrates a single artifact review.
//!
//! render prompt -> call backend -> parse response -> package result.
//!
//! The parser accepts two response shapes. Structured text:
//!
//! ```text
//! DIMENSION: internal_validity
//! SCORE: 0.85
//! JUSTIFICATION: Strong randomized design with proper controls.
//!
//! OVERALL: 0.82
//! ```
//!
//! and, only when no structured-text blocks are found, a JSON object with
//! a `dimensions` array. An entirely unparseable response degrades to an
//! empty dimension list with overall 0.0 rather than failing: downstream
//! stages get a low-confidence signal instead of a crash.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backends::{Backend, BackendRegistry, CompletionConfig};
use crate::config::ReviewConfig;
use crate::models::{ArtifactPayload, PromptSpec, ReviewDimension, ReviewResult};
use crate::prompts::render;
use crate::ReviewError;

lazy_static! {
    // One header per structured-text block; the justification runs from
    // the end of this match to the next block, an OVERALL line, or the
    // end of the response.
    static ref DIMENSION_HEADER: Regex = Regex::new(
        r"DIMENSION:\s*(?P<name>\S+)\s*\nSCORE:\s*(?P<score>[\d.]+)\s*\nJUSTIFICATION:\s*"
    )
    .unwrap();

    static ref OVERALL_LINE: Regex = Regex::new(r"OVERALL:\s*([\d.]+)").unwrap();
}

/// Per-call overrides for a review.
#[derive(Debug, Clone, Default)]
pub struct ReviewOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Executes artifact reviews against a configured backend.
pub struct ReviewEngine {
    backend: Arc<dyn Backend>,
    default_model: Option<String>,
    default_temperature: f32,
    default_max_tokens: u32,
}

impl ReviewEngine {
    /// Create an engine around an existing backend with library defaults.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            default_model: None,
            default_temperature: 0.0,
            default_max_tokens: 4096,
        }
    }

    /// Set the default model for completions.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Construct an engine from configuration using the built-in backends.
    pub fn from_config(config: &ReviewConfig) -> Result<Self, ReviewError> {
        Self::from_config_with_registry(config, &BackendRegistry::with_defaults())
    }

    /// Construct an engine from configuration using the given registry.
    ///
    /// Use this to bring custom or stub backends.
    pub fn from_config_with_registry(
        config: &ReviewConfig,
        backends: &BackendRegistry,
    ) -> Result<Self, ReviewError> {
        let backend = backends.create(
            &config.backend.backend_type,
            &config.backend.factory_config(),
        )?;

        Ok(Self {
            backend,
            default_model: Some(config.backend.model.clone()),
            default_temperature: config.backend.temperature,
            default_max_tokens: config.backend.max_tokens,
        })
    }

    /// Execute a review of the given artifact.
    ///
    /// Template variables are the artifact text, `model_type`,
    /// `sample_size`, `knowledge_context`, and any payload metadata,
    /// passed through verbatim.
    pub async fn review(
        &self,
        artifact: &ArtifactPayload,
        spec: &PromptSpec,
        knowledge_context: &str,
        overrides: &ReviewOverrides,
    ) -> Result<ReviewResult, ReviewError> {
        let mut variables: BTreeMap<String, JsonValue> = artifact.metadata.clone();
        variables.insert(
            "artifact".to_string(),
            JsonValue::String(artifact.artifact_text.clone()),
        );
        variables.insert(
            "model_type".to_string(),
            JsonValue::String(artifact.model_type.clone()),
        );
        variables.insert("sample_size".to_string(), artifact.sample_size.into());
        variables.insert(
            "knowledge_context".to_string(),
            JsonValue::String(knowledge_context.to_string()),
        );

        let messages = render(spec, &variables);

        let used_model = overrides
            .model
            .clone()
            .or_else(|| self.default_model.clone());
        let completion = CompletionConfig {
            model: used_model.clone(),
            temperature: overrides.temperature.unwrap_or(self.default_temperature),
            max_tokens: overrides.max_tokens.unwrap_or(self.default_max_tokens),
            response_format: None,
        };

        let raw_response = self.backend.complete(&messages, &completion).await?;

        let dimensions = parse_dimensions(&raw_response);
        let overall = parse_overall(&raw_response, &dimensions);

        if overall == 0.0 && dimensions.is_empty() {
            tracing::warn!(
                initiative_id = %artifact.initiative_id,
                "review produced no dimensions and overall 0.0; response likely malformed"
            );
        }

        let result = ReviewResult {
            initiative_id: artifact.initiative_id.clone(),
            prompt_name: spec.name.clone(),
            prompt_version: spec.version.clone(),
            backend_name: self.backend.name().to_string(),
            model: used_model.unwrap_or_default(),
            dimensions,
            overall_score: overall,
            raw_response,
            timestamp: Utc::now().to_rfc3339(),
        };

        tracing::info!(
            initiative_id = %result.initiative_id,
            prompt = %result.prompt_name,
            overall = result.overall_score,
            "reviewed artifact"
        );

        Ok(result)
    }
}

/// Clamp a parsed score to the unit interval.
fn clamp_unit(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

/// Parse DIMENSION/SCORE/JUSTIFICATION blocks from a response, falling
/// back to JSON only when no structured-text blocks are found.
pub fn parse_dimensions(response: &str) -> Vec<ReviewDimension> {
    let headers: Vec<regex::Captures<'_>> = DIMENSION_HEADER.captures_iter(response).collect();

    let mut dimensions = Vec::with_capacity(headers.len());
    for (i, caps) in headers.iter().enumerate() {
        let start = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(response.len());

        let mut justification = &response[start..end];
        if let Some(pos) = justification.find("\nOVERALL:") {
            justification = &justification[..pos];
        }

        // A score that matched the pattern but does not parse (e.g.
        // "1.2.3") degrades to 0.0 instead of dropping the response.
        let score = caps["score"].parse::<f64>().unwrap_or(0.0);

        dimensions.push(ReviewDimension {
            name: caps["name"].to_string(),
            score: clamp_unit(score),
            justification: justification.trim().to_string(),
        });
    }

    if !dimensions.is_empty() {
        return dimensions;
    }

    parse_dimensions_json(response)
}

fn parse_dimensions_json(response: &str) -> Vec<ReviewDimension> {
    let Ok(value) = serde_json::from_str::<JsonValue>(response) else {
        return Vec::new();
    };
    let Some(entries) = value.get("dimensions").and_then(JsonValue::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|entry| {
            let score = entry
                .get("score")
                .map(|v| {
                    v.as_f64()
                        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                        .unwrap_or(0.0)
                })
                .unwrap_or(0.0);
            ReviewDimension {
                name: entry
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                score: clamp_unit(score),
                justification: entry
                    .get("justification")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }
        })
        .collect()
}

/// Extract the overall score from a response, or compute it from the
/// parsed dimensions.
///
/// Precedence: explicit `OVERALL:` line (clamped), mean of dimension
/// scores, then 0.0.
pub fn parse_overall(response: &str, dimensions: &[ReviewDimension]) -> f64 {
    if let Some(caps) = OVERALL_LINE.captures(response) {
        if let Ok(score) = caps[1].parse::<f64>() {
            return clamp_unit(score);
        }
    }

    if !dimensions.is_empty() {
        let sum: f64 = dimensions.iter().map(|d| d.score).sum();
        return sum / dimensions.len() as f64;
    }

    0.0
}
