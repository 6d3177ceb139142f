//! LLM backend abstraction and registry.
//!
//! A backend turns a sequence of chat messages into a text completion.
//! Backends register through [`BackendFactory`] so new providers can be
//! added without touching the review engine. Network reliability concerns
//! (retries, backoff, circuit breaking) are deliberately absent here;
//! callers that want them must wrap the evaluation at a higher level.
//!
//! ## Security
//!
//! All backends hold credentials through the [`secrets`] module, which
//! keeps keys out of Debug output and zeroes them on drop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

mod anthropic;
mod openai;
pub mod secrets;

pub use anthropic::{AnthropicBackend, AnthropicBackendFactory};
pub use openai::{OpenAiBackend, OpenAiBackendFactory};
pub use secrets::{ApiCredential, CredentialSource};

/// Errors from LLM backends.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse backend response: {0}")]
    Parse(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown backend {name:?}. Available: {available}")]
    UnknownBackend { name: String, available: String },
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Role: "system" or "user".
    pub role: String,

    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call completion parameters.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model override; `None` uses the backend's default model.
    pub model: Option<String>,

    /// Sampling temperature (0.0 for deterministic review).
    pub temperature: f32,

    /// Maximum tokens in the response.
    pub max_tokens: u32,

    /// Optional provider-native structured-output hint.
    ///
    /// Forwarded verbatim where the provider supports it (OpenAI),
    /// ignored otherwise. Structured JSON responses are handled by the
    /// review engine's JSON parse path.
    pub response_format: Option<JsonValue>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            max_tokens: 4096,
            response_format: None,
        }
    }
}

/// Backend abstraction allows swapping LLM providers.
///
/// Implementations must separate or merge system messages per provider
/// convention and return the assistant's text untouched; parsing belongs
/// to the review engine.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a chat completion and return the assistant's text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: &CompletionConfig,
    ) -> Result<String, BackendError>;

    /// Registered backend name, recorded in review results for audit.
    fn name(&self) -> &str;
}

/// Factory for creating backends from configuration.
///
/// Implement this trait to add a new provider type. Each factory is
/// responsible for validating its configuration and constructing
/// instances.
pub trait BackendFactory: Send + Sync {
    /// Unique identifier for this backend type (e.g. "anthropic").
    fn backend_type(&self) -> &'static str;

    /// Create a backend instance from JSON configuration.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn Backend>, BackendError>;

    /// Human-readable description of this backend.
    fn description(&self) -> &'static str {
        "LLM backend"
    }
}

/// Registry of available backend factories.
///
/// Populated by an explicit registration call list, not import-time side
/// effects. Registration is permitted at any point, but the registry is a
/// plain lookup table: do not mutate it while evaluations are in flight.
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in backends registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AnthropicBackendFactory));
        registry.register(Arc::new(OpenAiBackendFactory));
        registry
    }

    /// Register a backend factory, replacing any factory of the same type.
    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) {
        self.factories
            .insert(factory.backend_type().to_string(), factory);
    }

    /// Create a backend from type name and configuration.
    ///
    /// # Errors
    ///
    /// [`BackendError::UnknownBackend`] if the name is not registered;
    /// the message lists the registered names.
    pub fn create(
        &self,
        backend_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn Backend>, BackendError> {
        self.factories
            .get(backend_type)
            .ok_or_else(|| BackendError::UnknownBackend {
                name: backend_type.to_string(),
                available: crate::available_names(self.factories.keys()),
            })?
            .create(config)
    }

    /// List available backend types in sorted order.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a backend type is registered.
    pub fn has_backend(&self, backend_type: &str) -> bool {
        self.factories.contains_key(backend_type)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.available_types())
            .finish()
    }
}
