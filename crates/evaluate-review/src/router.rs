//! Evaluation routing: the top-level entry point of the EVALUATE stage.
//!
//! A manifest declares two dispatch axes: the strategy ("score" or
//! "review") and the methodology ("experiment", "quasi_experimental",
//! ...). The router validates both before any further file I/O so a
//! misconfigured job fails fast instead of silently falling back to a
//! default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use evaluate_core::{
    load_manifest, load_scorer_event, score_confidence, EventError, EventOverrides, Manifest,
    ManifestError, ScoreResult,
};

use crate::api::ReviewRuntime;
use crate::config::ReviewConfig;
use crate::methods::MethodReviewer;
use crate::models::ReviewResult;
use crate::ReviewError;

/// Evaluate result filename inside a job directory.
pub const EVALUATE_RESULT_FILENAME: &str = "evaluate_result.json";

/// Score result filename inside a job directory (score strategy only).
pub const SCORE_RESULT_FILENAME: &str = "score_result.json";

/// Errors from the evaluation router.
#[derive(Error, Debug)]
pub enum EvaluateError {
    #[error("Unknown evaluate_strategy: {0:?}")]
    UnknownStrategy(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("Failed to write result: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize result: {0}")]
    Json(#[from] serde_json::Error),
}

/// The two terminal evaluation paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Deterministic confidence draw from the methodology's range.
    Score,
    /// LLM-backed structured review.
    Review,
}

impl Strategy {
    /// Parse a manifest strategy string.
    ///
    /// # Errors
    ///
    /// [`EvaluateError::UnknownStrategy`] for anything but "score" or
    /// "review".
    pub fn parse(value: &str) -> Result<Self, EvaluateError> {
        match value {
            "score" => Ok(Strategy::Score),
            "review" => Ok(Strategy::Review),
            other => Err(EvaluateError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Score => "score",
            Strategy::Review => "review",
        }
    }
}

/// Strategy-specific report: a descriptive string for the score path,
/// the full review record for the review path.
///
/// Untagged so the serialized field is a plain string or the review
/// object, matching what downstream stages consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluateReport {
    Review(ReviewResult),
    Score(String),
}

/// Output of the EVALUATE pipeline stage, both strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResult {
    /// Initiative identifier.
    pub initiative_id: String,

    /// Confidence score between 0.0 and 1.0.
    pub confidence: f64,

    /// `(lower, upper)` bounds from the method reviewer.
    pub confidence_range: (f64, f64),

    /// Strategy that produced this result.
    pub strategy: Strategy,

    /// Strategy-specific report.
    pub report: EvaluateReport,
}

/// Maps a manifest to its evaluation strategy and method reviewer.
///
/// Raises early on unknown inputs so downstream code never receives an
/// invalid combination.
pub struct EvaluationRouter;

impl EvaluationRouter {
    /// Dispatch on strategy and model type.
    pub fn route(
        manifest: &Manifest,
        runtime: &ReviewRuntime,
    ) -> Result<(Strategy, Arc<dyn MethodReviewer>), EvaluateError> {
        let strategy = Strategy::parse(&manifest.evaluate_strategy)?;
        let reviewer = runtime.methods.create(&manifest.model_type)?;
        Ok((strategy, reviewer))
    }
}

/// Evaluate the confidence of a job directory with the built-in
/// registries.
///
/// See [`evaluate_confidence_with`] to bring custom registries.
pub async fn evaluate_confidence(
    config: &ReviewConfig,
    job_dir: impl AsRef<Path>,
    cost_to_scale: Option<f64>,
) -> Result<EvaluateResult, EvaluateError> {
    evaluate_confidence_with(&ReviewRuntime::with_defaults(), config, job_dir, cost_to_scale).await
}

/// Evaluate the confidence of a job directory.
///
/// Reads the job directory, dispatches on the manifest's
/// `evaluate_strategy`, and writes `evaluate_result.json` (plus
/// `score_result.json` for the score strategy) back to the job
/// directory. The manifest itself is never rewritten.
///
/// # Arguments
///
/// * `runtime` - Registries to resolve methods, prompts, knowledge, and
///   backends against.
/// * `config` - Backend and per-methodology configuration; only the
///   review strategy uses it.
/// * `job_dir` - Job directory containing `manifest.json` and upstream
///   artifacts.
/// * `cost_to_scale` - Optional override replacing the value stored in
///   the job directory artifacts.
pub async fn evaluate_confidence_with(
    runtime: &ReviewRuntime,
    config: &ReviewConfig,
    job_dir: impl AsRef<Path>,
    cost_to_scale: Option<f64>,
) -> Result<EvaluateResult, EvaluateError> {
    let job_dir = job_dir.as_ref();
    let manifest = load_manifest(job_dir)?;

    let (strategy, reviewer) = EvaluationRouter::route(&manifest, runtime)?;

    let overrides = EventOverrides { cost_to_scale };
    let scorer_event = load_scorer_event(&manifest, job_dir, &overrides)?;

    let confidence_range = reviewer.confidence_range();

    // Only this block differs between strategies.
    let (confidence, report) = match strategy {
        Strategy::Score => {
            let score_result = score_confidence(&scorer_event.initiative_id, confidence_range);
            write_score_result(job_dir, &score_result)?;
            let report = format!(
                "Confidence drawn uniformly between {:.2} and {:.2}",
                confidence_range.0, confidence_range.1
            );
            (score_result.confidence, EvaluateReport::Score(report))
        }
        Strategy::Review => {
            let review_result = runtime.compute_review(job_dir, config).await?;
            (
                review_result.overall_score,
                EvaluateReport::Review(review_result),
            )
        }
    };

    // Everything below is shared.
    let result = EvaluateResult {
        initiative_id: scorer_event.initiative_id,
        confidence,
        confidence_range,
        strategy,
        report,
    };

    let result_path = job_dir.join(EVALUATE_RESULT_FILENAME);
    crate::write_json_file(&result_path, &result)?;

    tracing::info!(
        initiative_id = %result.initiative_id,
        strategy = strategy.as_str(),
        confidence = result.confidence,
        "evaluated initiative"
    );

    Ok(result)
}

fn write_score_result(job_dir: &Path, result: &ScoreResult) -> Result<(), EvaluateError> {
    let result_path = job_dir.join(SCORE_RESULT_FILENAME);
    crate::write_json_file(&result_path, result)?;
    tracing::debug!(path = %result_path.display(), "wrote score result");
    Ok(())
}
