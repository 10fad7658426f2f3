use serde::{Deserialize, Serialize};

/// Default score at or above which an assessment qualifies for alerting.
pub const DEFAULT_RISK_THRESHOLD: f64 = 0.7;

/// Derived risk verdict for one event.
///
/// Not persisted as its own entity; the score, reason, and analysis instant
/// are written back onto the event, and qualifying assessments feed the alert
/// consolidator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Risk score in the closed interval [0, 1].
    pub score: f64,
    /// Whether the score reached the configured notification threshold.
    pub notify: bool,
    /// Human-readable explanation of the triggered rules or verdict.
    pub reason: String,
    /// Confidence in the closed interval [0, 1]; 1.0 for the rule path.
    pub confidence: f64,
}

impl RiskAssessment {
    /// True when score and confidence are both finite and inside [0, 1].
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        (0.0..=1.0).contains(&self.score) && (0.0..=1.0).contains(&self.confidence)
    }
}
