//! # evaluate-review
//!
//! LLM-assisted artifact review and evaluation routing for the EVALUATE
//! pipeline stage.
//!
//! The deterministic pieces live in `evaluate-core`; this crate adds
//! everything the review strategy needs and the router that dispatches
//! between the two strategies:
//!
//! - Method reviewers keyed by methodology ([`methods`])
//! - Prompt templates and rendering ([`prompts`])
//! - Knowledge context resolution and retrieval ([`knowledge`])
//! - Pluggable LLM backends ([`backends`])
//! - The review engine ([`engine`]) and review API ([`api`])
//! - The evaluation router ([`router`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use evaluate_review::{evaluate_confidence, ReviewConfig};
//!
//! let config = ReviewConfig::from_yaml_file("review_config.yaml")?;
//! let result = evaluate_confidence(&config, "jobs/rct-housing", None).await?;
//! println!("{} -> {:.3}", result.initiative_id, result.confidence);
//! ```
//!
//! ## Concurrency
//!
//! One evaluation is one sequential pass: manifest read, event build,
//! scorer draw or backend call, result write. Run independent evaluations
//! in separate tasks against distinct job directories; nothing locks a
//! job directory against a concurrent evaluation of the same job.
//! Registries are populated up front and treated as read-only lookup
//! tables afterwards.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod api;
pub mod backends;
pub mod config;
pub mod engine;
pub mod knowledge;
pub mod methods;
pub mod models;
pub mod prompts;
pub mod router;

pub use api::{compute_review, review, ReviewRuntime, REVIEW_RESULT_FILENAME};
pub use backends::{
    AnthropicBackend, Backend, BackendError, BackendFactory, BackendRegistry, ChatMessage,
    CompletionConfig, OpenAiBackend,
};
pub use config::{BackendSettings, MethodSettings, ReviewConfig};
pub use engine::{ReviewEngine, ReviewOverrides};
pub use knowledge::{Chunk, KnowledgeBase, KnowledgeRegistry, StaticKnowledgeBase};
pub use methods::{ExperimentReviewer, MethodRegistry, MethodReviewer, QuasiExperimentalReviewer};
pub use models::{ArtifactPayload, PromptSpec, ReviewDimension, ReviewResult};
pub use prompts::{load_prompt_spec, parse_prompt_spec, render, PromptRegistry};
pub use router::{
    evaluate_confidence, evaluate_confidence_with, EvaluateError, EvaluateReport, EvaluateResult,
    EvaluationRouter, Strategy, EVALUATE_RESULT_FILENAME, SCORE_RESULT_FILENAME,
};

/// Errors from the review subsystem.
///
/// Lookup failures (unknown method, prompt, knowledge base, backend)
/// carry the registered names so a misconfigured job is debuggable from
/// the error message alone.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error(transparent)]
    Manifest(#[from] evaluate_core::ManifestError),

    #[error("Unknown method {name:?}. Available: {available}")]
    UnknownMethod { name: String, available: String },

    #[error("Unknown prompt {name:?}. Available: {available}")]
    UnknownPrompt { name: String, available: String },

    #[error("Unknown knowledge base {name:?}. Available: {available}")]
    UnknownKnowledgeBase { name: String, available: String },

    #[error("Prompt template not found: {0}")]
    PromptNotFound(PathBuf),

    #[error("Manifest for model_type {model_type:?} has no file entries")]
    EmptyFileList { model_type: String },

    #[error("Artifact file not found: {0}")]
    ArtifactNotFound(PathBuf),

    #[error("Event missing required key: {0}")]
    MissingEventKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Backend(#[from] backends::BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Join registry keys for Lookup error messages.
pub(crate) fn available_names<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    let names: Vec<&str> = keys.map(|s| s.as_str()).collect();
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

/// Write a result as pretty-printed JSON with a trailing newline.
pub(crate) fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    std::fs::write(path, format!("{json}\n"))
}
