//! Methodology-specific reviewers and their registry.
//!
//! Each method reviewer bundles what a methodology needs for evaluation:
//! an a-priori confidence range for the deterministic score strategy, an
//! artifact loading routine, and optional locations for its prompt
//! template and knowledge content. Reviewers are keyed by the manifest's
//! `model_type`.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use evaluate_core::Manifest;

use crate::models::ArtifactPayload;
use crate::ReviewError;

mod experiment;
mod quasi_experimental;

pub use experiment::ExperimentReviewer;
pub use quasi_experimental::QuasiExperimentalReviewer;

/// A methodology-specific artifact reviewer.
///
/// The default [`load_artifact`](MethodReviewer::load_artifact) reads
/// every manifest-listed file; override it for methodologies that need
/// bespoke artifact assembly.
pub trait MethodReviewer: Send + Sync {
    /// Registry key (e.g. "experiment").
    fn name(&self) -> &str;

    /// Name of the prompt template this methodology reviews with.
    fn prompt_name(&self) -> &str;

    /// Human-readable description of the methodology.
    fn description(&self) -> &str {
        ""
    }

    /// `(lower, upper)` a-priori credibility bounds for the deterministic
    /// score strategy.
    ///
    /// Ranges across methodologies are ordered by rigor in spirit, but
    /// non-overlap is not enforced.
    fn confidence_range(&self) -> (f64, f64);

    /// Directory containing this reviewer's YAML prompt templates.
    ///
    /// `None` means "use the prompt registry" (the built-in reviewers
    /// resolve their templates there).
    fn prompt_template_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Directory containing this reviewer's knowledge files.
    ///
    /// `None` means "use the knowledge registry".
    fn knowledge_content_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Read artifact files per manifest and return a payload.
    ///
    /// Default implementation: concatenate every manifest-listed file with
    /// a `=== name (format) ===` header, and extract `sample_size` from
    /// the first JSON file carrying that key.
    ///
    /// # Errors
    ///
    /// [`ReviewError::EmptyFileList`] when the manifest lists no files;
    /// [`ReviewError::ArtifactNotFound`] when a listed file is missing.
    fn load_artifact(
        &self,
        manifest: &Manifest,
        job_dir: &Path,
    ) -> Result<ArtifactPayload, ReviewError> {
        if manifest.files.is_empty() {
            return Err(ReviewError::EmptyFileList {
                model_type: manifest.model_type.clone(),
            });
        }

        let mut sections = Vec::new();
        let mut sample_size: Option<u64> = None;

        for (name, entry) in &manifest.files {
            let path = job_dir.join(&entry.path);
            if !path.exists() {
                return Err(ReviewError::ArtifactNotFound(path));
            }
            let content = fs::read_to_string(&path)?;

            if sample_size.is_none() && entry.format == "json" {
                if let Ok(value) = serde_json::from_str::<JsonValue>(&content) {
                    sample_size = value.get("sample_size").and_then(JsonValue::as_u64);
                }
            }

            sections.push(format!("=== {} ({}) ===\n{}", name, entry.format, content));
        }

        Ok(ArtifactPayload {
            initiative_id: manifest.initiative_id_or(job_dir),
            artifact_text: sections.join("\n\n"),
            model_type: manifest.model_type.clone(),
            sample_size: sample_size.unwrap_or(0),
            metadata: BTreeMap::new(),
        })
    }
}

/// Registry of method reviewers, keyed by methodology name.
///
/// Built-ins register through an explicit call list in
/// [`MethodRegistry::with_defaults`]. Like the other registries, this is
/// a plain lookup table: registration while evaluations are in flight is
/// unsupported.
#[derive(Default)]
pub struct MethodRegistry {
    reviewers: BTreeMap<String, Arc<dyn MethodReviewer>>,
}

impl MethodRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in reviewers registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("experiment", Arc::new(ExperimentReviewer));
        registry.register("quasi_experimental", Arc::new(QuasiExperimentalReviewer));
        registry
    }

    /// Register a reviewer under `name`, replacing any previous entry.
    ///
    /// The key is usually the reviewer's own name, but tests and plugins
    /// may register the same reviewer under several keys.
    pub fn register(&mut self, name: impl Into<String>, reviewer: Arc<dyn MethodReviewer>) {
        self.reviewers.insert(name.into(), reviewer);
    }

    /// Remove a registered reviewer.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn MethodReviewer>> {
        self.reviewers.remove(name)
    }

    /// Look up the reviewer registered under `name`.
    ///
    /// # Errors
    ///
    /// [`ReviewError::UnknownMethod`] listing registered names.
    pub fn create(&self, name: &str) -> Result<Arc<dyn MethodReviewer>, ReviewError> {
        self.reviewers
            .get(name)
            .cloned()
            .ok_or_else(|| ReviewError::UnknownMethod {
                name: name.to_string(),
                available: crate::available_names(self.reviewers.keys()),
            })
    }

    /// Sorted list of registered method names.
    pub fn available(&self) -> Vec<&str> {
        self.reviewers.keys().map(|s| s.as_str()).collect()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.available())
            .finish()
    }
}
