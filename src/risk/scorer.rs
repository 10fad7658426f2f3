//! The scorer ties the two paths together: assisted first when an assessor is
//! available, rule-based otherwise and on every assisted failure mode.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::correlation::{self, RiskSignals};
use crate::error::Error;
use crate::events::models::AuthEvent;
use crate::risk::assessor::{AssessorContext, RiskAssessor};
use crate::risk::models::RiskAssessment;
use crate::risk::rules;

/// Marker prepended to reasons produced by the assisted path.
pub const ASSISTED_MARKER: &str = "[assisted]";

pub struct RiskScorer {
    threshold: f64,
    assessor: Arc<dyn RiskAssessor>,
    assessor_timeout: Duration,
}

impl RiskScorer {
    #[must_use]
    pub fn new(threshold: f64, assessor: Arc<dyn RiskAssessor>, assessor_timeout: Duration) -> Self {
        Self {
            threshold,
            assessor,
            assessor_timeout,
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Assess one event against its stored history.
    ///
    /// Signals are computed as of the event's own timestamp; only signal
    /// gathering can fail, scoring itself always yields an assessment.
    ///
    /// # Errors
    /// Returns `Error::Persistence` if the correlation queries fail.
    pub async fn assess(&self, pool: &PgPool, event: &AuthEvent) -> Result<RiskAssessment, Error> {
        let signals = correlation::gather(pool, event).await?;
        Ok(self.assess_with_signals(event, &signals).await)
    }

    /// Score pre-gathered signals, trying the assisted path first.
    async fn assess_with_signals(
        &self,
        event: &AuthEvent,
        signals: &RiskSignals,
    ) -> RiskAssessment {
        if self.assessor.is_available() {
            let context = AssessorContext::new(event, signals);
            match timeout(self.assessor_timeout, self.assessor.assess(&context)).await {
                Ok(Ok(Some(mut assessment))) => {
                    assessment.reason = format!("{ASSISTED_MARKER} {}", assessment.reason);
                    info!(
                        subject_id = event.subject_id,
                        score = assessment.score,
                        confidence = assessment.confidence,
                        "assisted risk assessment complete"
                    );
                    return assessment;
                }
                Ok(Ok(None)) => {
                    warn!(
                        subject_id = event.subject_id,
                        "assessor returned no usable verdict, falling back to rules"
                    );
                }
                Ok(Err(err)) => {
                    warn!(
                        subject_id = event.subject_id,
                        error = %err,
                        "assessor failed, falling back to rules"
                    );
                }
                Err(_) => {
                    warn!(
                        subject_id = event.subject_id,
                        timeout_ms = self.assessor_timeout.as_millis() as u64,
                        "assessor timed out, falling back to rules"
                    );
                }
            }
        }

        rules::evaluate(signals, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::models::EventKind;
    use crate::risk::assessor::{AssessFuture, NoopAssessor};
    use crate::risk::models::DEFAULT_RISK_THRESHOLD;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_event() -> AuthEvent {
        AuthEvent {
            id: Uuid::now_v7(),
            subject_id: 42,
            display_name: "ana".to_string(),
            kind: EventKind::LoginFailure,
            ip: Some("203.0.113.10".to_string()),
            client_signature: Some("Mozilla/5.0".to_string()),
            occurred_at: Utc::now(),
            metadata: serde_json::json!({}),
            risk_score: None,
            risk_reason: None,
            analyzed_at: None,
        }
    }

    fn busy_signals() -> RiskSignals {
        RiskSignals {
            failed_logins: 7,
            failed_twofa: 0,
            ip_changed: true,
            signature_changed: false,
        }
    }

    /// Assessor stub driven by a canned response closure.
    struct StubAssessor<F>
    where
        F: Fn() -> Result<Option<RiskAssessment>, Error> + Send + Sync,
    {
        available: bool,
        delay: Duration,
        respond: F,
    }

    impl<F> RiskAssessor for StubAssessor<F>
    where
        F: Fn() -> Result<Option<RiskAssessment>, Error> + Send + Sync,
    {
        fn is_available(&self) -> bool {
            self.available
        }

        fn assess<'a>(&'a self, _context: &'a AssessorContext) -> AssessFuture<'a> {
            Box::pin(async move {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                (self.respond)()
            })
        }
    }

    fn scorer_with(assessor: Arc<dyn RiskAssessor>) -> RiskScorer {
        RiskScorer::new(DEFAULT_RISK_THRESHOLD, assessor, Duration::from_millis(20))
    }

    #[tokio::test]
    async fn unavailable_assessor_matches_rule_path_exactly() {
        let scorer = scorer_with(Arc::new(NoopAssessor));
        let event = sample_event();
        let signals = busy_signals();
        let assessment = scorer.assess_with_signals(&event, &signals).await;
        assert_eq!(assessment, rules::evaluate(&signals, DEFAULT_RISK_THRESHOLD));
    }

    #[tokio::test]
    async fn assisted_verdict_is_tagged() {
        let stub = StubAssessor {
            available: true,
            delay: Duration::ZERO,
            respond: || {
                Ok(Some(RiskAssessment {
                    score: 0.9,
                    notify: true,
                    reason: "velocity anomaly".to_string(),
                    confidence: 0.85,
                }))
            },
        };
        let scorer = scorer_with(Arc::new(stub));
        let event = sample_event();
        let assessment = scorer.assess_with_signals(&event, &busy_signals()).await;
        assert_eq!(assessment.reason, "[assisted] velocity anomaly");
        assert_eq!(assessment.score, 0.9);
        assert_eq!(assessment.confidence, 0.85);
    }

    #[tokio::test]
    async fn assessor_error_falls_back_to_rules() {
        let stub = StubAssessor {
            available: true,
            delay: Duration::ZERO,
            respond: || Err(Error::AssessorUnavailable("connection refused".to_string())),
        };
        let scorer = scorer_with(Arc::new(stub));
        let event = sample_event();
        let signals = busy_signals();
        let assessment = scorer.assess_with_signals(&event, &signals).await;
        assert_eq!(assessment, rules::evaluate(&signals, DEFAULT_RISK_THRESHOLD));
    }

    #[tokio::test]
    async fn empty_verdict_falls_back_to_rules() {
        let stub = StubAssessor {
            available: true,
            delay: Duration::ZERO,
            respond: || Ok(None),
        };
        let scorer = scorer_with(Arc::new(stub));
        let event = sample_event();
        let signals = busy_signals();
        let assessment = scorer.assess_with_signals(&event, &signals).await;
        assert_eq!(assessment, rules::evaluate(&signals, DEFAULT_RISK_THRESHOLD));
    }

    #[tokio::test]
    async fn slow_assessor_times_out_and_falls_back() {
        let stub = StubAssessor {
            available: true,
            delay: Duration::from_millis(200),
            respond: || {
                Ok(Some(RiskAssessment {
                    score: 0.95,
                    notify: true,
                    reason: "too late".to_string(),
                    confidence: 1.0,
                }))
            },
        };
        let scorer = scorer_with(Arc::new(stub));
        let event = sample_event();
        let signals = busy_signals();
        let assessment = scorer.assess_with_signals(&event, &signals).await;
        assert_eq!(assessment, rules::evaluate(&signals, DEFAULT_RISK_THRESHOLD));
    }
}
