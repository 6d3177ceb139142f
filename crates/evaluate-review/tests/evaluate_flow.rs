//! End-to-end tests for the EVALUATE stage over real job directories.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use evaluate_review::{
    evaluate_confidence_with, Backend, BackendError, BackendFactory, ChatMessage,
    CompletionConfig, EvaluateError, EvaluateReport, ReviewConfig, ReviewError, ReviewRuntime,
    Strategy, EVALUATE_RESULT_FILENAME, REVIEW_RESULT_FILENAME, SCORE_RESULT_FILENAME,
};

const FIVE_DIMENSION_RESPONSE: &str = "\
DIMENSION: randomization_integrity
SCORE: 0.85
JUSTIFICATION: Good balance across covariates.

DIMENSION: specification_adequacy
SCORE: 0.80
JUSTIFICATION: Appropriate OLS specification.

DIMENSION: statistical_inference
SCORE: 0.75
JUSTIFICATION: CIs reported.

DIMENSION: threats_to_validity
SCORE: 0.70
JUSTIFICATION: Some attrition noted.

DIMENSION: effect_size_plausibility
SCORE: 0.90
JUSTIFICATION: Effect size is realistic.
";

/// Backend that replays a scripted response and counts invocations.
struct ScriptedBackend {
    response: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _config: &CompletionConfig,
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedBackendFactory {
    calls: Arc<AtomicUsize>,
}

impl BackendFactory for ScriptedBackendFactory {
    fn backend_type(&self) -> &'static str {
        "scripted"
    }

    fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn Backend>, BackendError> {
        Ok(Arc::new(ScriptedBackend {
            response: config["response"].as_str().unwrap_or_default().to_string(),
            calls: self.calls.clone(),
        }))
    }
}

/// A runtime with the scripted backend registered alongside built-ins,
/// plus the shared invocation counter.
fn scripted_runtime() -> (ReviewRuntime, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut runtime = ReviewRuntime::with_defaults();
    runtime.backends.register(Arc::new(ScriptedBackendFactory {
        calls: calls.clone(),
    }));
    (runtime, calls)
}

fn scripted_config(response: &str) -> ReviewConfig {
    ReviewConfig::from_json(&json!({
        "backend": {"type": "scripted", "model": "mock-model", "response": response},
    }))
    .unwrap()
}

fn make_job_dir(strategy: Option<&str>) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut manifest = json!({
        "schema_version": "2.0",
        "model_type": "experiment",
        "created_at": "2025-06-01T12:00:00+00:00",
        "files": {
            "impact_results": {"path": "impact_results.json", "format": "json"},
        },
    });
    if let Some(strategy) = strategy {
        manifest["evaluate_strategy"] = json!(strategy);
    }
    let results = json!({
        "ci_upper": 15.0,
        "effect_estimate": 10.0,
        "ci_lower": 5.0,
        "cost_to_scale": 100.0,
        "sample_size": 50,
    });
    fs::write(dir.path().join("manifest.json"), manifest.to_string()).unwrap();
    fs::write(dir.path().join("impact_results.json"), results.to_string()).unwrap();
    dir
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// -- Score strategy ----------------------------------------------------------

#[tokio::test]
async fn score_strategy_end_to_end() {
    let dir = make_job_dir(Some("score"));
    let (runtime, calls) = scripted_runtime();
    let config = scripted_config(FIVE_DIMENSION_RESPONSE);

    let result = evaluate_confidence_with(&runtime, &config, dir.path(), None)
        .await
        .unwrap();

    assert_eq!(result.strategy, Strategy::Score);
    assert_eq!(result.confidence_range, (0.85, 1.0));
    assert!(result.confidence >= 0.85 && result.confidence <= 1.0);
    match &result.report {
        EvaluateReport::Score(text) => {
            assert!(text.contains("0.85"));
            assert!(text.contains("1.00"));
        }
        other => panic!("expected score report, got {other:?}"),
    }

    // The backend abstraction is never touched on the score path.
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Both result files land in the job directory.
    let written = read_json(&dir.path().join(EVALUATE_RESULT_FILENAME));
    assert_eq!(written["strategy"], "score");
    let score_written = read_json(&dir.path().join(SCORE_RESULT_FILENAME));
    assert!(score_written["confidence"].is_f64());
    assert_eq!(score_written["confidence_range"][0], 0.85);
}

#[tokio::test]
async fn score_strategy_is_deterministic() {
    let dir = make_job_dir(Some("score"));
    let (runtime, _) = scripted_runtime();
    let config = scripted_config("");

    let r1 = evaluate_confidence_with(&runtime, &config, dir.path(), None)
        .await
        .unwrap();
    let r2 = evaluate_confidence_with(&runtime, &config, dir.path(), None)
        .await
        .unwrap();
    assert_eq!(r1.confidence, r2.confidence);
}

#[tokio::test]
async fn score_strategy_works_without_any_backend() {
    // An empty backend registry proves the score path never constructs one.
    let dir = make_job_dir(Some("score"));
    let mut runtime = ReviewRuntime::with_defaults();
    runtime.backends = evaluate_review::BackendRegistry::new();

    let result =
        evaluate_confidence_with(&runtime, &ReviewConfig::default(), dir.path(), None).await;
    assert!(result.is_ok());
}

// -- Review strategy ---------------------------------------------------------

#[tokio::test]
async fn review_strategy_end_to_end() {
    let dir = make_job_dir(Some("review"));
    let (runtime, calls) = scripted_runtime();
    let config = scripted_config(FIVE_DIMENSION_RESPONSE);

    let result = evaluate_confidence_with(&runtime, &config, dir.path(), None)
        .await
        .unwrap();

    assert_eq!(result.strategy, Strategy::Review);
    assert_eq!(result.confidence_range, (0.85, 1.0));
    assert!((result.confidence - 0.80).abs() < 1e-9);
    match &result.report {
        EvaluateReport::Review(review) => {
            assert_eq!(review.dimensions.len(), 5);
            assert!((review.overall_score - 0.80).abs() < 1e-9);
            assert_eq!(review.prompt_name, "experiment_review");
            assert_eq!(review.backend_name, "scripted");
            assert!(!review.raw_response.is_empty());
            assert!(!review.timestamp.is_empty());
        }
        other => panic!("expected review report, got {other:?}"),
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The deterministic score file is not produced on the review path.
    assert!(!dir.path().join(SCORE_RESULT_FILENAME).exists());

    let written = read_json(&dir.path().join(EVALUATE_RESULT_FILENAME));
    assert_eq!(written["strategy"], "review");
    assert!(written["report"]["dimensions"].is_array());
    assert!(written["report"]["overall_score"].is_f64());
    assert!(written["report"]["raw_response"].is_string());
}

#[tokio::test]
async fn default_strategy_is_review() {
    let dir = make_job_dir(None);
    let (runtime, calls) = scripted_runtime();
    let config = scripted_config(FIVE_DIMENSION_RESPONSE);

    let result = evaluate_confidence_with(&runtime, &config, dir.path(), None)
        .await
        .unwrap();
    assert_eq!(result.strategy, Strategy::Review);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn review_degrades_on_unparseable_response() {
    let dir = make_job_dir(Some("review"));
    let (runtime, _) = scripted_runtime();
    let config = scripted_config("nothing");

    let result = evaluate_confidence_with(&runtime, &config, dir.path(), None)
        .await
        .unwrap();
    assert_eq!(result.confidence, 0.0);
    match &result.report {
        EvaluateReport::Review(review) => assert!(review.dimensions.is_empty()),
        other => panic!("expected review report, got {other:?}"),
    }
}

// -- Review API --------------------------------------------------------------

#[tokio::test]
async fn review_api_writes_review_result() {
    let dir = make_job_dir(None);
    let (runtime, _) = scripted_runtime();
    let config = scripted_config(FIVE_DIMENSION_RESPONSE);

    let result = runtime.review(dir.path(), &config).await.unwrap();
    assert!((result.overall_score - 0.80).abs() < 1e-9);

    let written = read_json(&dir.path().join(REVIEW_RESULT_FILENAME));
    assert!((written["overall_score"].as_f64().unwrap() - 0.80).abs() < 1e-9);
}

#[tokio::test]
async fn compute_review_writes_nothing() {
    let dir = make_job_dir(None);
    let (runtime, _) = scripted_runtime();
    let config = scripted_config(FIVE_DIMENSION_RESPONSE);

    let result = runtime.compute_review(dir.path(), &config).await.unwrap();
    assert!((result.overall_score - 0.80).abs() < 1e-9);
    assert!(!dir.path().join(REVIEW_RESULT_FILENAME).exists());
}

#[tokio::test]
async fn review_api_resolves_configured_prompt_from_registry() {
    let dir = make_job_dir(None);
    let (mut runtime, _) = scripted_runtime();

    // Register a custom prompt and point the experiment method at it.
    runtime.prompts.register(evaluate_review::PromptSpec {
        name: "custom_experiment_prompt".to_string(),
        version: "2.0".to_string(),
        user_template: "Custom review of {{ artifact }}".to_string(),
        ..Default::default()
    });
    let config = ReviewConfig::from_json(&json!({
        "backend": {"type": "scripted", "model": "mock-model", "response": FIVE_DIMENSION_RESPONSE},
        "methods": {"experiment": {"prompt": "custom_experiment_prompt"}},
    }))
    .unwrap();

    let result = runtime.compute_review(dir.path(), &config).await.unwrap();
    assert_eq!(result.prompt_name, "custom_experiment_prompt");
    assert_eq!(result.prompt_version, "2.0");
}

#[tokio::test]
async fn review_api_unknown_configured_prompt_is_fatal() {
    let dir = make_job_dir(None);
    let (runtime, _) = scripted_runtime();
    let config = ReviewConfig::from_json(&json!({
        "backend": {"type": "scripted", "response": ""},
        "methods": {"experiment": {"prompt": "no_such_prompt"}},
    }))
    .unwrap();

    let result = runtime.compute_review(dir.path(), &config).await;
    match result {
        Err(ReviewError::UnknownPrompt { name, available }) => {
            assert_eq!(name, "no_such_prompt");
            assert!(available.contains("experiment_review"));
        }
        other => panic!("expected UnknownPrompt, got {:?}", other.err()),
    }
}

// -- Error cases -------------------------------------------------------------

#[tokio::test]
async fn unknown_strategy_fails_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = json!({
        "model_type": "experiment",
        "evaluate_strategy": "unknown_xyz",
        "files": {
            "impact_results": {"path": "impact_results.json", "format": "json"},
        },
    });
    let results = json!({"ci_upper": 1.0, "sample_size": 10});
    fs::write(dir.path().join("manifest.json"), manifest.to_string()).unwrap();
    fs::write(dir.path().join("impact_results.json"), results.to_string()).unwrap();

    let (runtime, _) = scripted_runtime();
    let result =
        evaluate_confidence_with(&runtime, &ReviewConfig::default(), dir.path(), None).await;

    assert!(matches!(result, Err(EvaluateError::UnknownStrategy(_))));
    assert!(!dir.path().join(EVALUATE_RESULT_FILENAME).exists());
    assert!(!dir.path().join(SCORE_RESULT_FILENAME).exists());
}

#[tokio::test]
async fn missing_manifest_is_not_found() {
    let (runtime, _) = scripted_runtime();
    let result = evaluate_confidence_with(
        &runtime,
        &ReviewConfig::default(),
        "/nonexistent/path/xyz",
        None,
    )
    .await;
    assert!(matches!(result, Err(EvaluateError::Manifest(_))));
}

#[tokio::test]
async fn unknown_method_lists_available() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = json!({"model_type": "unknown_method_xyz", "files": {}});
    fs::write(dir.path().join("manifest.json"), manifest.to_string()).unwrap();

    let (runtime, _) = scripted_runtime();
    let result = runtime
        .compute_review(dir.path(), &ReviewConfig::default())
        .await;
    match result {
        Err(ReviewError::UnknownMethod { name, available }) => {
            assert_eq!(name, "unknown_method_xyz");
            assert!(available.contains("experiment"));
            assert!(available.contains("quasi_experimental"));
        }
        other => panic!("expected UnknownMethod, got {:?}", other.err()),
    }
}

// -- Shared invariants -------------------------------------------------------

#[tokio::test]
async fn manifest_is_never_rewritten() {
    for strategy in ["score", "review"] {
        let dir = make_job_dir(Some(strategy));
        let manifest_path = dir.path().join("manifest.json");
        let before = fs::read(&manifest_path).unwrap();

        let (runtime, _) = scripted_runtime();
        let config = scripted_config(FIVE_DIMENSION_RESPONSE);
        evaluate_confidence_with(&runtime, &config, dir.path(), None)
            .await
            .unwrap();

        let after = fs::read(&manifest_path).unwrap();
        assert_eq!(before, after, "manifest mutated by {strategy} strategy");
    }
}

#[tokio::test]
async fn cost_to_scale_override_reaches_event() {
    // The override affects the scorer event but not the confidence draw,
    // which is seeded by identity alone.
    let dir = make_job_dir(Some("score"));
    let (runtime, _) = scripted_runtime();
    let config = scripted_config("");

    let with_override = evaluate_confidence_with(&runtime, &config, dir.path(), Some(999.0))
        .await
        .unwrap();
    let without = evaluate_confidence_with(&runtime, &config, dir.path(), None)
        .await
        .unwrap();
    assert_eq!(with_override.confidence, without.confidence);
}

#[tokio::test]
async fn evaluate_result_has_expected_keys() {
    let dir = make_job_dir(Some("score"));
    let (runtime, _) = scripted_runtime();
    evaluate_confidence_with(&runtime, &scripted_config(""), dir.path(), None)
        .await
        .unwrap();

    let written = read_json(&dir.path().join(EVALUATE_RESULT_FILENAME));
    let keys: Vec<&str> = written.as_object().unwrap().keys().map(|k| k.as_str()).collect();
    for key in [
        "initiative_id",
        "confidence",
        "confidence_range",
        "strategy",
        "report",
    ] {
        assert!(keys.contains(&key), "missing key {key}");
    }
}
