//! # evaluate-core
//!
//! Deterministic core of the EVALUATE pipeline stage.
//!
//! An upstream MEASURE stage writes quantitative results and a manifest
//! into a job directory; this crate reads that directory and provides the
//! pieces both evaluation strategies share:
//!
//! - Manifest loading and validation ([`manifest`])
//! - Scorer event building from MEASURE output ([`event`])
//! - Reproducible confidence scoring seeded by initiative identity ([`score`])
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the same initiative id and confidence range always
//!    produce the same confidence, across calls and process restarts
//! 2. **Read-only manifests**: nothing in this crate rewrites `manifest.json`
//! 3. **Tolerant events**: missing numeric fields in MEASURE output default
//!    to zero instead of failing the evaluation
//!
//! The LLM-backed review strategy lives in the companion `evaluate-review`
//! crate; this crate makes no network calls.
//!
//! ## Example
//!
//! ```rust,ignore
//! use evaluate_core::{load_manifest, load_scorer_event, score_confidence, EventOverrides};
//!
//! let manifest = load_manifest("jobs/rct-housing")?;
//! let event = load_scorer_event(&manifest, "jobs/rct-housing", &EventOverrides::default())?;
//! let score = score_confidence(&event.initiative_id, (0.85, 1.0));
//! println!("{:.3}", score.confidence);
//! ```

pub mod event;
pub mod manifest;
pub mod score;

pub use event::{load_scorer_event, EventError, EventOverrides, ScorerEvent, RESULTS_FILENAME};
pub use manifest::{load_manifest, FileEntry, Manifest, ManifestError, MANIFEST_FILENAME};
pub use score::{score_confidence, ScoreResult};
