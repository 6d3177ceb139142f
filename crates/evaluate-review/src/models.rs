//! Data models for artifact review.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::ReviewError;

/// Typed input envelope for an artifact to review.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArtifactPayload {
    /// Unique initiative identifier.
    pub initiative_id: String,

    /// The artifact content to review: every manifest-listed file,
    /// concatenated with a header per file.
    pub artifact_text: String,

    /// Causal inference methodology label.
    #[serde(default)]
    pub model_type: String,

    /// Sample size of the study, best-effort extracted from artifacts.
    #[serde(default)]
    pub sample_size: u64,

    /// Additional key-value pairs forwarded to the prompt template.
    #[serde(default)]
    pub metadata: BTreeMap<String, JsonValue>,
}

impl ArtifactPayload {
    /// Construct a payload from a pipeline event object.
    ///
    /// `initiative_id` and `artifact_text` are required; all other keys
    /// pass through as metadata.
    pub fn from_event(event: &JsonValue) -> Result<Self, ReviewError> {
        let get_str = |key: &str| -> Result<String, ReviewError> {
            event
                .get(key)
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| ReviewError::MissingEventKey(key.to_string()))
        };

        let known = ["initiative_id", "artifact_text", "model_type", "sample_size"];
        let metadata = event
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter(|(k, _)| !known.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            initiative_id: get_str("initiative_id")?,
            artifact_text: get_str("artifact_text")?,
            model_type: event
                .get("model_type")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string(),
            sample_size: event
                .get("sample_size")
                .and_then(JsonValue::as_u64)
                .unwrap_or(0),
            metadata,
        })
    }
}

/// Metadata and template content for a review prompt.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptSpec {
    /// Unique prompt identifier.
    pub name: String,

    /// Version string.
    pub version: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Names of scoring dimensions this prompt expects.
    ///
    /// Advisory: the parser tolerates unknown or missing dimensions.
    #[serde(default)]
    pub dimensions: Vec<String>,

    /// Template for the system message.
    #[serde(default)]
    pub system_template: String,

    /// Template for the user message.
    #[serde(default)]
    pub user_template: String,
}

/// A single scored dimension of an artifact review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewDimension {
    /// Dimension identifier (e.g. "internal_validity").
    pub name: String,

    /// Score clamped to [0.0, 1.0].
    pub score: f64,

    /// Free-text explanation of the score.
    pub justification: String,
}

/// Complete result of an artifact review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    /// Identifier of the reviewed initiative.
    pub initiative_id: String,

    /// Name of the prompt template used.
    pub prompt_name: String,

    /// Version string of the prompt template.
    pub prompt_version: String,

    /// Registered name of the LLM backend.
    pub backend_name: String,

    /// Model identifier used for completion.
    pub model: String,

    /// Per-dimension scores and justifications.
    #[serde(default)]
    pub dimensions: Vec<ReviewDimension>,

    /// Aggregated score across dimensions.
    #[serde(default)]
    pub overall_score: f64,

    /// Full LLM output retained for audit.
    #[serde(default)]
    pub raw_response: String,

    /// ISO-8601 timestamp of the review.
    #[serde(default)]
    pub timestamp: String,
}
