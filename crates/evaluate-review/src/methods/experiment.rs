//! Experiment (RCT) method reviewer.

use super::MethodReviewer;

/// Reviews experimental (RCT) impact measurement artifacts.
///
/// Covers randomization integrity, specification adequacy, statistical
/// inference, threats to validity, and effect size plausibility. The
/// confidence range sits at the top of the credibility ordering:
/// randomization carries the identification.
pub struct ExperimentReviewer;

impl MethodReviewer for ExperimentReviewer {
    fn name(&self) -> &str {
        "experiment"
    }

    fn prompt_name(&self) -> &str {
        "experiment_review"
    }

    fn description(&self) -> &str {
        "Review experimental (RCT) impact measurement artifacts."
    }

    fn confidence_range(&self) -> (f64, f64) {
        (0.85, 1.0)
    }
}
