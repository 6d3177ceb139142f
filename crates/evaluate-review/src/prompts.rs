//! Prompt template loading, registration, and rendering.
//!
//! Templates are YAML files with `name`, `version`, `description`,
//! `dimensions`, `system`, and `user` keys. The two built-in templates
//! ship embedded in the crate; additional templates are registered by
//! name or discovered by scanning a directory.
//!
//! Rendering supports `{{ var }}` substitution. `{% ... %}` block tags
//! are stripped rather than evaluated: templates stay plain data, and
//! an undefined variable renders as empty text instead of failing the
//! review.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::backends::ChatMessage;
use crate::models::PromptSpec;
use crate::ReviewError;

const EXPERIMENT_REVIEW_YAML: &str = include_str!("../assets/prompts/experiment_review.yaml");
const QUASI_EXPERIMENTAL_REVIEW_YAML: &str =
    include_str!("../assets/prompts/quasi_experimental_review.yaml");

lazy_static! {
    // {{ var }} with optional whitespace-control dashes.
    static ref VARIABLE_TAG: Regex =
        Regex::new(r"\{\{-?\s*([A-Za-z_][A-Za-z0-9_]*)\s*-?\}\}").unwrap();

    // {% ... %} block tags are stripped, not evaluated.
    static ref BLOCK_TAG: Regex = Regex::new(r"(?s)\{%.*?%\}").unwrap();
}

/// Raw YAML shape of a prompt template file.
#[derive(Debug, Deserialize)]
struct RawPromptSpec {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    dimensions: Option<DimensionsField>,
    #[serde(default)]
    system: String,
    #[serde(default)]
    user: String,
}

/// Dimensions may be a YAML list or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DimensionsField {
    List(Vec<String>),
    Csv(String),
}

/// Parse a prompt spec from YAML text.
pub fn parse_prompt_spec(yaml: &str) -> Result<PromptSpec, ReviewError> {
    let raw: RawPromptSpec = serde_yaml::from_str(yaml)?;

    let dimensions = match raw.dimensions {
        Some(DimensionsField::List(list)) => list,
        Some(DimensionsField::Csv(csv)) => csv
            .split(',')
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect(),
        None => Vec::new(),
    };

    let version = match raw.version {
        Some(serde_yaml::Value::String(s)) => s,
        Some(other) => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "0.0".to_string()),
        None => "0.0".to_string(),
    };

    Ok(PromptSpec {
        name: raw.name.unwrap_or_else(|| "unknown".to_string()),
        version,
        description: raw.description,
        dimensions,
        system_template: raw.system,
        user_template: raw.user,
    })
}

/// Load a prompt spec from a YAML file.
///
/// # Errors
///
/// [`ReviewError::PromptNotFound`] if the file does not exist.
pub fn load_prompt_spec(path: impl AsRef<Path>) -> Result<PromptSpec, ReviewError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReviewError::PromptNotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    parse_prompt_spec(&contents)
}

/// Registry of named prompt specifications.
///
/// Built-ins are registered by an explicit call list in
/// [`PromptRegistry::with_defaults`]; there are no import-time side
/// effects. The registry is a plain lookup table and is not synchronized.
#[derive(Debug, Default)]
pub struct PromptRegistry {
    specs: BTreeMap<String, PromptSpec>,
}

impl PromptRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in templates registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for yaml in [EXPERIMENT_REVIEW_YAML, QUASI_EXPERIMENTAL_REVIEW_YAML] {
            let spec = parse_prompt_spec(yaml).expect("built-in prompt template is valid YAML");
            registry.register(spec);
        }
        registry
    }

    /// Register a prompt spec under its own name, replacing any previous
    /// spec of that name.
    pub fn register(&mut self, spec: PromptSpec) {
        tracing::debug!(name = %spec.name, version = %spec.version, "registered prompt");
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Register a prompt template file under an explicit name.
    pub fn register_file(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<(), ReviewError> {
        let spec = load_prompt_spec(path)?;
        self.specs.insert(name.into(), spec);
        Ok(())
    }

    /// Scan a directory for `.yaml` templates and register each by its
    /// declared name. Missing directories are ignored.
    pub fn scan_dir(&mut self, directory: impl AsRef<Path>) -> Result<(), ReviewError> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            tracing::warn!(path = %directory.display(), "prompt directory does not exist");
            return Ok(());
        }
        let mut paths: Vec<_> = fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        paths.sort();
        for path in paths {
            let spec = load_prompt_spec(&path)?;
            self.register(spec);
        }
        Ok(())
    }

    /// Return the prompt spec registered under `name`.
    ///
    /// # Errors
    ///
    /// [`ReviewError::UnknownPrompt`] listing registered names.
    pub fn get(&self, name: &str) -> Result<&PromptSpec, ReviewError> {
        self.specs.get(name).ok_or_else(|| ReviewError::UnknownPrompt {
            name: name.to_string(),
            available: crate::available_names(self.specs.keys()),
        })
    }

    /// Sorted list of registered prompt names.
    pub fn available(&self) -> Vec<&str> {
        self.specs.keys().map(|s| s.as_str()).collect()
    }
}

/// Render a prompt spec into chat messages.
///
/// Empty rendered texts produce no message, so a spec with only a user
/// template yields a single-message sequence.
pub fn render(spec: &PromptSpec, variables: &BTreeMap<String, JsonValue>) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    let system_text = render_template(&spec.system_template, variables);
    if !system_text.is_empty() {
        messages.push(ChatMessage::system(system_text));
    }

    let user_text = render_template(&spec.user_template, variables);
    if !user_text.is_empty() {
        messages.push(ChatMessage::user(user_text));
    }

    messages
}

fn render_template(template: &str, variables: &BTreeMap<String, JsonValue>) -> String {
    if template.is_empty() {
        return String::new();
    }

    let stripped = BLOCK_TAG.replace_all(template, "");
    VARIABLE_TAG
        .replace_all(&stripped, |caps: &regex::Captures<'_>| {
            variables.get(&caps[1]).map(value_to_text).unwrap_or_default()
        })
        .trim()
        .to_string()
}

/// Render a JSON value as template text. Strings are inserted verbatim;
/// everything else uses its JSON representation.
fn value_to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, JsonValue)]) -> BTreeMap<String, JsonValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_builtin_templates_loaded() {
        let registry = PromptRegistry::with_defaults();
        let available = registry.available();
        assert!(available.contains(&"experiment_review"));
        assert!(available.contains(&"quasi_experimental_review"));
    }

    #[test]
    fn test_builtin_experiment_spec() {
        let registry = PromptRegistry::with_defaults();
        let spec = registry.get("experiment_review").unwrap();
        assert_eq!(spec.name, "experiment_review");
        assert_eq!(spec.version, "1.0");
        assert_eq!(spec.dimensions.len(), 5);
        assert!(spec.dimensions.contains(&"randomization_integrity".to_string()));
        assert!(spec.dimensions.contains(&"effect_size_plausibility".to_string()));
        assert!(!spec.system_template.is_empty());
        assert!(!spec.user_template.is_empty());
    }

    #[test]
    fn test_get_unknown_lists_available() {
        let registry = PromptRegistry::with_defaults();
        let err = registry.get("nonexistent_prompt_xyz").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("nonexistent_prompt_xyz"));
        assert!(message.contains("experiment_review"));
    }

    #[test]
    fn test_register_programmatic() {
        let mut registry = PromptRegistry::new();
        registry.register(PromptSpec {
            name: "custom".to_string(),
            version: "2.0".to_string(),
            ..Default::default()
        });
        assert_eq!(registry.get("custom").unwrap().version, "2.0");
    }

    #[test]
    fn test_dimensions_as_csv_string() {
        let spec = parse_prompt_spec("name: t\nversion: \"1.0\"\ndimensions: a, b, c\n").unwrap();
        assert_eq!(spec.dimensions, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_numeric_version_stringified() {
        let spec = parse_prompt_spec("name: t\nversion: 2\n").unwrap();
        assert_eq!(spec.version, "2");
    }

    #[test]
    fn test_load_prompt_spec_missing_file() {
        let result = load_prompt_spec("/nonexistent/path/xyz.yaml");
        assert!(matches!(result, Err(ReviewError::PromptNotFound(_))));
    }

    #[test]
    fn test_register_file_uses_explicit_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renamed.yaml");
        fs::write(&path, "name: original_name\nversion: \"1.0\"\nuser: \"{{ artifact }}\"\n")
            .unwrap();

        let mut registry = PromptRegistry::new();
        registry.register_file("alias_name", &path).unwrap();
        assert!(registry.get("alias_name").is_ok());
        assert!(registry.get("original_name").is_err());
    }

    #[test]
    fn test_scan_dir_registers_templates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("custom_review.yaml"),
            "name: custom_review\nversion: \"1.0\"\nuser: \"Review: {{ artifact }}\"\n",
        )
        .unwrap();

        let mut registry = PromptRegistry::new();
        registry.scan_dir(dir.path()).unwrap();
        assert!(registry.get("custom_review").is_ok());
    }

    #[test]
    fn test_render_basic() {
        let spec = PromptSpec {
            name: "test".to_string(),
            version: "1.0".to_string(),
            system_template: "You are a {{ role }}.".to_string(),
            user_template: "Review: {{ artifact }}".to_string(),
            ..Default::default()
        };
        let messages = render(
            &spec,
            &vars(&[("role", json!("reviewer")), ("artifact", json!("study text"))]),
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("reviewer"));
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("study text"));
    }

    #[test]
    fn test_render_empty_templates() {
        let spec = PromptSpec {
            name: "empty".to_string(),
            version: "1.0".to_string(),
            ..Default::default()
        };
        assert!(render(&spec, &BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_render_system_only() {
        let spec = PromptSpec {
            name: "sys".to_string(),
            version: "1.0".to_string(),
            system_template: "Hello {{ name }}".to_string(),
            ..Default::default()
        };
        let messages = render(&spec, &vars(&[("name", json!("world"))]));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Hello world");
    }

    #[test]
    fn test_render_undefined_variable_is_empty() {
        let spec = PromptSpec {
            name: "t".to_string(),
            version: "1.0".to_string(),
            user_template: "Value: [{{ missing }}]".to_string(),
            ..Default::default()
        };
        let messages = render(&spec, &BTreeMap::new());
        assert_eq!(messages[0].content, "Value: []");
    }

    #[test]
    fn test_render_strips_block_tags() {
        let spec = PromptSpec {
            name: "t".to_string(),
            version: "1.0".to_string(),
            user_template: "{% if extra %}Extra: {{ extra }}{% endif %} Done".to_string(),
            ..Default::default()
        };
        let messages = render(&spec, &vars(&[("extra", json!("detail"))]));
        assert_eq!(messages[0].content, "Extra: detail Done");
    }

    #[test]
    fn test_render_numeric_variable() {
        let spec = PromptSpec {
            name: "t".to_string(),
            version: "1.0".to_string(),
            user_template: "n = {{ sample_size }}".to_string(),
            ..Default::default()
        };
        let messages = render(&spec, &vars(&[("sample_size", json!(500))]));
        assert_eq!(messages[0].content, "n = 500");
    }
}
