//! Public review API: review a job directory.

use std::path::Path;

use evaluate_core::load_manifest;

use crate::backends::BackendRegistry;
use crate::config::ReviewConfig;
use crate::engine::{ReviewEngine, ReviewOverrides};
use crate::knowledge::{load_knowledge, KnowledgeRegistry};
use crate::methods::MethodRegistry;
use crate::models::{PromptSpec, ReviewResult};
use crate::prompts::{load_prompt_spec, PromptRegistry};
use crate::ReviewError;

/// Review result filename inside a job directory.
pub const REVIEW_RESULT_FILENAME: &str = "review_result.json";

/// The registries a review resolves against.
///
/// [`ReviewRuntime::with_defaults`] wires up the built-in backends,
/// method reviewers, prompt templates, and knowledge bases; tests and
/// embedders swap in their own entries before evaluating. Populate the
/// registries up front: they are read-only lookup tables while
/// evaluations are in flight.
pub struct ReviewRuntime {
    pub backends: BackendRegistry,
    pub methods: MethodRegistry,
    pub prompts: PromptRegistry,
    pub knowledge: KnowledgeRegistry,
}

impl Default for ReviewRuntime {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ReviewRuntime {
    /// A runtime with every built-in registered.
    pub fn with_defaults() -> Self {
        Self {
            backends: BackendRegistry::with_defaults(),
            methods: MethodRegistry::with_defaults(),
            prompts: PromptRegistry::with_defaults(),
            knowledge: KnowledgeRegistry::with_defaults(),
        }
    }

    /// Compute a review of a job directory without writing results.
    ///
    /// Suitable for evaluation loops and batch processing where writing
    /// back to the job directory is unwanted.
    ///
    /// Prompt resolution order for the manifest's methodology:
    ///
    /// 1. A prompt named in `config.methods[model_type].prompt` is loaded
    ///    from the prompt registry (unknown name is fatal).
    /// 2. Otherwise the reviewer's `prompt_template_dir()`, scanning for
    ///    `<prompt_name>.yaml`.
    /// 3. Otherwise the registry entry named by the reviewer's
    ///    `prompt_name()` (the built-in reviewers resolve here).
    ///
    /// The same precedence applies to `knowledge_base`, except a missing
    /// knowledge source yields an empty context rather than an error.
    pub async fn compute_review(
        &self,
        job_dir: impl AsRef<Path>,
        config: &ReviewConfig,
    ) -> Result<ReviewResult, ReviewError> {
        let job_dir = job_dir.as_ref();
        let manifest = load_manifest(job_dir)?;
        tracing::info!(
            job_dir = %job_dir.display(),
            model_type = %manifest.model_type,
            "reviewing job directory"
        );

        let reviewer = self.methods.create(&manifest.model_type)?;
        let artifact = reviewer.load_artifact(&manifest, job_dir)?;

        let method_settings = config.method(&manifest.model_type);

        let spec: PromptSpec = if !method_settings.prompt.is_empty() {
            self.prompts.get(&method_settings.prompt)?.clone()
        } else if let Some(template_dir) = reviewer.prompt_template_dir() {
            load_prompt_spec(template_dir.join(format!("{}.yaml", reviewer.prompt_name())))?
        } else {
            self.prompts.get(reviewer.prompt_name())?.clone()
        };

        let knowledge_context = if !method_settings.knowledge_base.is_empty() {
            self.knowledge.get(&method_settings.knowledge_base)?
        } else if let Some(knowledge_dir) = reviewer.knowledge_content_dir() {
            load_knowledge(knowledge_dir)
        } else if self.knowledge.has(reviewer.name()) {
            self.knowledge.get(reviewer.name())?
        } else {
            String::new()
        };

        let engine = ReviewEngine::from_config_with_registry(config, &self.backends)?;
        engine
            .review(&artifact, &spec, &knowledge_context, &ReviewOverrides::default())
            .await
    }

    /// Review a job directory and write `review_result.json` back.
    pub async fn review(
        &self,
        job_dir: impl AsRef<Path>,
        config: &ReviewConfig,
    ) -> Result<ReviewResult, ReviewError> {
        let job_dir = job_dir.as_ref();
        let result = self.compute_review(job_dir, config).await?;

        let result_path = job_dir.join(REVIEW_RESULT_FILENAME);
        crate::write_json_file(&result_path, &result)?;
        tracing::info!(path = %result_path.display(), "wrote review result");

        Ok(result)
    }
}

/// Review a job directory with the built-in registries and write results.
///
/// See [`ReviewRuntime::review`] for the resolution rules; use a
/// [`ReviewRuntime`] directly to bring custom backends, prompts, or
/// knowledge bases.
pub async fn review(
    job_dir: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<ReviewResult, ReviewError> {
    ReviewRuntime::with_defaults().review(job_dir, config).await
}

/// Compute a review with the built-in registries, writing nothing.
pub async fn compute_review(
    job_dir: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<ReviewResult, ReviewError> {
    ReviewRuntime::with_defaults()
        .compute_review(job_dir, config)
        .await
}
