//! Job directory manifest: load and validate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Well-known manifest filename inside a job directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Errors that can occur when loading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest missing required field: {0}")]
    MissingField(String),
}

/// A single file reference within a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// Relative path to the file within the job directory.
    pub path: String,

    /// File format identifier (e.g. "json", "yaml", "csv").
    pub format: String,
}

/// Parsed manifest for a job directory.
///
/// The EVALUATE stage treats the manifest as read-only: it is loaded,
/// validated, and never written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest schema version. Optional; absent in older job directories.
    #[serde(default)]
    pub schema_version: String,

    /// Causal inference methodology label (e.g. "experiment").
    #[serde(default)]
    pub model_type: String,

    /// ISO-8601 creation timestamp.
    #[serde(default)]
    pub created_at: String,

    /// Mapping of logical names to file entries.
    ///
    /// BTreeMap so artifact concatenation order is deterministic.
    #[serde(default)]
    pub files: BTreeMap<String, FileEntry>,

    /// Initiative identifier. Falls back to the job directory name.
    #[serde(default)]
    pub initiative_id: String,

    /// Evaluation strategy: "score" or "review". Defaults to "review".
    #[serde(default = "default_strategy")]
    pub evaluate_strategy: String,
}

fn default_strategy() -> String {
    "review".to_string()
}

impl Manifest {
    /// Construct a minimal manifest for the given methodology.
    ///
    /// Remaining fields take their defaults; useful for tests and for
    /// callers that assemble manifests programmatically.
    pub fn new(model_type: impl Into<String>) -> Self {
        Self {
            schema_version: String::new(),
            model_type: model_type.into(),
            created_at: String::new(),
            files: BTreeMap::new(),
            initiative_id: String::new(),
            evaluate_strategy: default_strategy(),
        }
    }

    /// Parse a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate required fields.
    fn validate(&self) -> Result<(), ManifestError> {
        if self.model_type.is_empty() {
            return Err(ManifestError::MissingField("model_type".to_string()));
        }
        Ok(())
    }

    /// The initiative identifier, falling back to the job directory name.
    pub fn initiative_id_or(&self, job_dir: &Path) -> String {
        if !self.initiative_id.is_empty() {
            return self.initiative_id.clone();
        }
        job_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Load and validate a manifest from a job directory.
///
/// # Errors
///
/// * [`ManifestError::NotFound`] if `manifest.json` does not exist.
/// * [`ManifestError::MissingField`] if required fields are missing.
pub fn load_manifest(job_dir: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let job_dir = job_dir.as_ref();
    let manifest_path = job_dir.join(MANIFEST_FILENAME);

    if !manifest_path.exists() {
        return Err(ManifestError::NotFound(manifest_path));
    }

    let contents = fs::read_to_string(&manifest_path)?;
    let mut manifest = Manifest::from_json(&contents)?;

    if manifest.initiative_id.is_empty() {
        manifest.initiative_id = manifest.initiative_id_or(job_dir);
    }

    tracing::debug!(
        path = %manifest_path.display(),
        model_type = %manifest.model_type,
        "loaded manifest"
    );

    Ok(manifest)
}
