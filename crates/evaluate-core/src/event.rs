//! Scorer events: normalized numeric records built from MEASURE output.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::manifest::Manifest;

/// Well-known MEASURE results filename inside a job directory.
pub const RESULTS_FILENAME: &str = "impact_results.json";

/// Errors that can occur when building a scorer event.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Impact results not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read impact results: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse impact results JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat record consumed by both evaluation strategies.
///
/// Immutable once built; numeric fields default to zero when the upstream
/// results file omits them. Partial results are preferred over hard failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScorerEvent {
    /// Initiative identifier.
    pub initiative_id: String,

    /// Methodology label from the manifest.
    pub model_type: String,

    /// Upper bound of the effect confidence interval.
    pub ci_upper: f64,

    /// Point estimate of the measured effect.
    pub effect_estimate: f64,

    /// Lower bound of the effect confidence interval.
    pub ci_lower: f64,

    /// Cost to scale the initiative.
    pub cost_to_scale: f64,

    /// Study sample size.
    pub sample_size: u64,
}

/// Caller-supplied overrides applied after the results file is read.
///
/// Overrides always win over file-derived values.
#[derive(Debug, Clone, Default)]
pub struct EventOverrides {
    pub cost_to_scale: Option<f64>,
}

/// Raw shape of `impact_results.json`. Every field is optional upstream.
#[derive(Debug, Deserialize)]
struct RawResults {
    #[serde(default)]
    ci_upper: f64,
    #[serde(default)]
    effect_estimate: f64,
    #[serde(default)]
    ci_lower: f64,
    #[serde(default)]
    cost_to_scale: f64,
    #[serde(default)]
    sample_size: u64,
}

/// Build a scorer event from a job directory's `impact_results.json`.
///
/// # Errors
///
/// [`EventError::NotFound`] if the results file is missing. Missing numeric
/// fields inside the file are not an error; they default to zero.
pub fn load_scorer_event(
    manifest: &Manifest,
    job_dir: impl AsRef<Path>,
    overrides: &EventOverrides,
) -> Result<ScorerEvent, EventError> {
    let job_dir = job_dir.as_ref();
    let results_path = job_dir.join(RESULTS_FILENAME);

    if !results_path.exists() {
        return Err(EventError::NotFound(results_path));
    }

    let contents = fs::read_to_string(&results_path)?;
    let raw: RawResults = serde_json::from_str(&contents)?;

    let mut event = ScorerEvent {
        initiative_id: manifest.initiative_id_or(job_dir),
        model_type: manifest.model_type.clone(),
        ci_upper: raw.ci_upper,
        effect_estimate: raw.effect_estimate,
        ci_lower: raw.ci_lower,
        cost_to_scale: raw.cost_to_scale,
        sample_size: raw.sample_size,
    };

    if let Some(cost) = overrides.cost_to_scale {
        event.cost_to_scale = cost;
    }

    tracing::debug!(
        path = %results_path.display(),
        initiative_id = %event.initiative_id,
        "loaded scorer event"
    );

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job_dir(results_json: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(RESULTS_FILENAME), results_json).unwrap();
        dir
    }

    fn manifest_with_id(id: &str) -> Manifest {
        let mut manifest = Manifest::new("experiment");
        manifest.initiative_id = id.to_string();
        manifest
    }

    #[test]
    fn test_happy_path() {
        let dir = make_job_dir(
            r#"{"ci_upper": 15.0, "effect_estimate": 10.0, "ci_lower": 5.0,
                "cost_to_scale": 100.0, "sample_size": 50}"#,
        );
        let manifest = manifest_with_id("init-reader-test");

        let event = load_scorer_event(&manifest, dir.path(), &EventOverrides::default()).unwrap();

        assert_eq!(event.initiative_id, "init-reader-test");
        assert_eq!(event.model_type, "experiment");
        assert_eq!(event.ci_upper, 15.0);
        assert_eq!(event.effect_estimate, 10.0);
        assert_eq!(event.ci_lower, 5.0);
        assert_eq!(event.cost_to_scale, 100.0);
        assert_eq!(event.sample_size, 50);
    }

    #[test]
    fn test_overrides_win() {
        let dir = make_job_dir(
            r#"{"ci_upper": 1.0, "effect_estimate": 0.5, "ci_lower": 0.0,
                "cost_to_scale": 10.0, "sample_size": 10}"#,
        );
        let manifest = manifest_with_id("init-override");
        let overrides = EventOverrides {
            cost_to_scale: Some(999.0),
        };

        let event = load_scorer_event(&manifest, dir.path(), &overrides).unwrap();
        assert_eq!(event.cost_to_scale, 999.0);
        assert_eq!(event.ci_upper, 1.0);
    }

    #[test]
    fn test_missing_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = manifest_with_id("init-missing");

        let result = load_scorer_event(&manifest, dir.path(), &EventOverrides::default());
        assert!(matches!(result, Err(EventError::NotFound(_))));
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let dir = make_job_dir("{}");
        let manifest = manifest_with_id("init-defaults");

        let event = load_scorer_event(&manifest, dir.path(), &EventOverrides::default()).unwrap();
        assert_eq!(event.ci_upper, 0.0);
        assert_eq!(event.effect_estimate, 0.0);
        assert_eq!(event.ci_lower, 0.0);
        assert_eq!(event.cost_to_scale, 0.0);
        assert_eq!(event.sample_size, 0);
    }

    #[test]
    fn test_initiative_id_from_dir_name() {
        let dir = make_job_dir(r#"{"sample_size": 10}"#);
        let manifest = Manifest::new("experiment");

        let event = load_scorer_event(&manifest, dir.path(), &EventOverrides::default()).unwrap();
        let expected = dir.path().file_name().unwrap().to_string_lossy();
        assert_eq!(event.initiative_id, expected);
    }
}
