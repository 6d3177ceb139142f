//! Quasi-experimental method reviewer.

use super::MethodReviewer;

/// Reviews quasi-experimental (DiD, RDD, IV, synthetic control) impact
/// measurement artifacts.
///
/// The confidence range `(0.60, 0.85)` reflects lower causal credibility
/// than an RCT: identification rests on assumptions rather than
/// randomization.
pub struct QuasiExperimentalReviewer;

impl MethodReviewer for QuasiExperimentalReviewer {
    fn name(&self) -> &str {
        "quasi_experimental"
    }

    fn prompt_name(&self) -> &str {
        "quasi_experimental_review"
    }

    fn description(&self) -> &str {
        "Review quasi-experimental (DiD, RDD, IV) impact measurement artifacts."
    }

    fn confidence_range(&self) -> (f64, f64) {
        (0.60, 0.85)
    }
}
