//! Deterministic confidence scoring for debugging, testing, and illustration.
//!
//! The draw is reproducible across calls and process restarts: the
//! initiative identity is hashed into a stable 32-bit seed, and one uniform
//! value is drawn from the methodology's confidence range.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Result of the score strategy.
///
/// Mirrors `ReviewResult` on the review side: the computed confidence is
/// captured together with the inputs that produced it, giving the
/// deterministic path an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreResult {
    /// Initiative identifier used as seed.
    pub initiative_id: String,

    /// Deterministic confidence value.
    pub confidence: f64,

    /// `(lower, upper)` bounds from the method reviewer.
    pub confidence_range: (f64, f64),
}

/// Derive a stable 32-bit seed from a string.
///
/// SHA-256 is used for its distribution, not for security; the first four
/// digest bytes reduce to the 32-bit seed space.
fn stable_seed(s: &str) -> u32 {
    let digest = Sha256::digest(s.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Draw a reproducible confidence value from `confidence_range`.
///
/// The same `initiative_id` and range always produce the same confidence,
/// including across process restarts.
pub fn score_confidence(initiative_id: &str, confidence_range: (f64, f64)) -> ScoreResult {
    let seed = stable_seed(initiative_id);
    let mut rng = StdRng::seed_from_u64(seed as u64);
    let (lower, upper) = confidence_range;
    let confidence = rng.gen_range(lower..=upper);

    ScoreResult {
        initiative_id: initiative_id.to_string(),
        confidence,
        confidence_range,
    }
}
