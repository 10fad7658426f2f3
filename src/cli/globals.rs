use std::time::Duration;

use url::Url;

use crate::alerts::ConsolidationSettings;
use crate::risk::models::DEFAULT_RISK_THRESHOLD;

/// Detection settings shared by the scorer, the consolidator, and `/health`.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    /// Score at or above which an assessment qualifies for alerting.
    pub risk_threshold: f64,
    /// Alert consolidation window and attachment cap.
    pub consolidation: ConsolidationSettings,
    /// External assessor endpoint; `None` forces the rule path.
    pub assessor_url: Option<Url>,
    /// Upper bound on one assisted assessment round-trip.
    pub assessor_timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new() -> Self {
        Self {
            risk_threshold: DEFAULT_RISK_THRESHOLD,
            consolidation: ConsolidationSettings::default(),
            assessor_url: None,
            assessor_timeout: Duration::from_millis(5000),
        }
    }
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self::new()
    }
}
