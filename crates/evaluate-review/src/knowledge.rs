//! Knowledge context loading, registration, and retrieval.
//!
//! A knowledge context is a plain string of domain reference material
//! interpolated into review prompts. It resolves from a registered name
//! or from a reviewer-provided directory of `.md`/`.txt` files; an absent
//! source yields an empty string, never an error.
//!
//! [`StaticKnowledgeBase`] additionally offers keyword-overlap retrieval
//! over a directory for callers that want only the relevant chunks
//! instead of the full concatenation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ReviewError;

// Built-in notes, in filename order to match directory loading.
const EXPERIMENT_KNOWLEDGE: &[&str] = &[
    include_str!("../assets/knowledge/experiment/inference.md"),
    include_str!("../assets/knowledge/experiment/randomization.md"),
];

const QUASI_EXPERIMENTAL_KNOWLEDGE: &[&str] =
    &[include_str!("../assets/knowledge/quasi_experimental/identification.md")];

/// Divider between concatenated knowledge files.
const SECTION_DIVIDER: &str = "\n\n---\n\n";

/// Concatenate all `.md` and `.txt` files in a directory.
///
/// Files are sorted by name, `.md` before `.txt`, and joined with a
/// visible section divider. A missing directory yields an empty string.
pub fn load_knowledge(directory: impl AsRef<Path>) -> String {
    let directory = directory.as_ref();
    if !directory.is_dir() {
        return String::new();
    }

    let mut parts = Vec::new();
    for ext in ["md", "txt"] {
        let mut paths: Vec<_> = match fs::read_dir(directory) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|e| e == ext))
                .collect(),
            Err(_) => continue,
        };
        paths.sort();
        for path in paths {
            match fs::read_to_string(&path) {
                Ok(content) => {
                    tracing::debug!(path = %path.display(), chars = content.len(), "loaded knowledge file");
                    parts.push(content);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable knowledge file");
                }
            }
        }
    }

    parts.join(SECTION_DIVIDER)
}

/// A named knowledge source: a directory on disk, or content embedded in
/// the binary (built-ins).
#[derive(Debug, Clone)]
enum KnowledgeSource {
    Directory(PathBuf),
    Inline(String),
}

/// Registry of named knowledge bases.
///
/// Built-ins register under the methodology names ("experiment",
/// "quasi_experimental") via an explicit call list. Directory sources are
/// read at lookup time, so content edits between lookups are visible.
#[derive(Debug, Default)]
pub struct KnowledgeRegistry {
    sources: BTreeMap<String, KnowledgeSource>,
}

impl KnowledgeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in methodology notes registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_inline("experiment", join_embedded(EXPERIMENT_KNOWLEDGE));
        registry.register_inline(
            "quasi_experimental",
            join_embedded(QUASI_EXPERIMENTAL_KNOWLEDGE),
        );
        registry
    }

    /// Register a knowledge base directory under `name`.
    pub fn register_dir(&mut self, name: impl Into<String>, directory: impl Into<PathBuf>) {
        let name = name.into();
        let directory = directory.into();
        tracing::debug!(%name, path = %directory.display(), "registered knowledge base");
        self.sources.insert(name, KnowledgeSource::Directory(directory));
    }

    /// Register literal knowledge content under `name`.
    pub fn register_inline(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.sources
            .insert(name.into(), KnowledgeSource::Inline(content.into()));
    }

    /// Load the knowledge content registered under `name`.
    ///
    /// # Errors
    ///
    /// [`ReviewError::UnknownKnowledgeBase`] listing registered names.
    pub fn get(&self, name: &str) -> Result<String, ReviewError> {
        match self.sources.get(name) {
            Some(KnowledgeSource::Directory(dir)) => Ok(load_knowledge(dir)),
            Some(KnowledgeSource::Inline(content)) => Ok(content.clone()),
            None => Err(ReviewError::UnknownKnowledgeBase {
                name: name.to_string(),
                available: crate::available_names(self.sources.keys()),
            }),
        }
    }

    /// Check if a knowledge base is registered.
    pub fn has(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Sorted list of registered knowledge base names.
    pub fn available(&self) -> Vec<&str> {
        self.sources.keys().map(|s| s.as_str()).collect()
    }
}

fn join_embedded(files: &[&str]) -> String {
    files.join(SECTION_DIVIDER)
}

/// A retrieved knowledge chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub content: String,

    /// Origin identifier (e.g. file path).
    pub source: String,

    /// Relevance score, if available.
    pub score: Option<f64>,
}

/// Retrieval interface for domain knowledge.
pub trait KnowledgeBase: Send + Sync {
    /// Return relevant chunks for the query, best first.
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<Chunk>;
}

/// Knowledge base over a directory of `.md` and `.txt` files with
/// keyword-overlap scoring. No external index, no embeddings.
pub struct StaticKnowledgeBase {
    documents: Vec<(String, String)>,
}

impl StaticKnowledgeBase {
    /// Load all knowledge files from `path`. A missing directory yields
    /// an empty knowledge base.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut documents = Vec::new();

        if !path.is_dir() {
            tracing::warn!(path = %path.display(), "knowledge base path does not exist");
            return Self { documents };
        }

        for ext in ["md", "txt"] {
            let mut paths: Vec<_> = match fs::read_dir(path) {
                Ok(entries) => entries
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.extension().is_some_and(|e| e == ext))
                    .collect(),
                Err(_) => continue,
            };
            paths.sort();
            for file in paths {
                if let Ok(content) = fs::read_to_string(&file) {
                    documents.push((file.display().to_string(), content));
                }
            }
        }

        Self { documents }
    }
}

impl KnowledgeBase for StaticKnowledgeBase {
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<Chunk> {
        let query_tokens: std::collections::BTreeSet<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &str, &str)> = self
            .documents
            .iter()
            .filter_map(|(source, content)| {
                let doc_tokens: std::collections::BTreeSet<String> = content
                    .to_lowercase()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                let overlap = query_tokens.intersection(&doc_tokens).count();
                if overlap > 0 {
                    let score = overlap as f64 / query_tokens.len() as f64;
                    Some((score, source.as_str(), content.as_str()))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(top_k)
            .map(|(score, source, content)| Chunk {
                content: content.to_string(),
                source: source.to_string(),
                score: Some(score),
            })
            .collect()
    }
}
