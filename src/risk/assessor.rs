//! External assessor strategy for the assisted scoring path.
//!
//! The capability is a trait so the scorer never branches on configuration:
//! a [`NoopAssessor`] simply reports itself unavailable, which forces the
//! deterministic rule path.

use std::{future::Future, pin::Pin};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::correlation::RiskSignals;
use crate::error::Error;
use crate::events::models::{AuthEvent, EventKind};
use crate::risk::models::RiskAssessment;

/// Context shipped to the external assessor: the raw event fields plus the
/// windowed signals already computed for the rule path.
#[derive(Debug, Clone, Serialize)]
pub struct AssessorContext {
    pub subject_id: i64,
    pub display_name: String,
    pub kind: EventKind,
    pub ip: Option<String>,
    pub client_signature: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub failed_logins_5m: i64,
    pub failed_twofa_5m: i64,
    pub ip_changed: bool,
    pub signature_changed: bool,
}

impl AssessorContext {
    #[must_use]
    pub fn new(event: &AuthEvent, signals: &RiskSignals) -> Self {
        Self {
            subject_id: event.subject_id,
            display_name: event.display_name.clone(),
            kind: event.kind,
            ip: event.ip.clone(),
            client_signature: event.client_signature.clone(),
            timestamp: event.occurred_at,
            failed_logins_5m: signals.failed_logins,
            failed_twofa_5m: signals.failed_twofa,
            ip_changed: signals.ip_changed,
            signature_changed: signals.signature_changed,
        }
    }
}

/// Raw verdict returned by an external assessor.
#[derive(Debug, Clone, Deserialize)]
pub struct AssessorVerdict {
    pub risk_score: f64,
    pub notify: bool,
    pub reason: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

const fn default_confidence() -> f64 {
    1.0
}

impl AssessorVerdict {
    /// Convert into an assessment, rejecting out-of-range verdicts instead of
    /// clamping them: clamping is a rule-path policy, a malformed verdict
    /// falls back.
    #[must_use]
    pub fn into_assessment(self) -> Option<RiskAssessment> {
        let assessment = RiskAssessment {
            score: self.risk_score,
            notify: self.notify,
            reason: self.reason,
            confidence: self.confidence,
        };
        if assessment.is_well_formed() {
            Some(assessment)
        } else {
            debug!(
                score = assessment.score,
                confidence = assessment.confidence,
                "discarding malformed assessor verdict"
            );
            None
        }
    }
}

pub type AssessFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<RiskAssessment>, Error>> + Send + 'a>>;

/// Capability interface for external risk assessment.
///
/// `assess` returning `Ok(None)` means "no usable verdict"; the caller falls
/// back to the rule path. Errors are reported as `AssessorUnavailable` and
/// are likewise recovered by falling back.
pub trait RiskAssessor: Send + Sync {
    fn is_available(&self) -> bool;
    fn assess<'a>(&'a self, context: &'a AssessorContext) -> AssessFuture<'a>;
}

/// Always-fallback implementation used when no assessor is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAssessor;

impl RiskAssessor for NoopAssessor {
    fn is_available(&self) -> bool {
        false
    }

    fn assess<'a>(&'a self, _context: &'a AssessorContext) -> AssessFuture<'a> {
        Box::pin(async { Ok(None) })
    }
}

/// Assessor that POSTs the context to a remote HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpAssessor {
    client: reqwest::Client,
    url: Url,
}

impl HttpAssessor {
    /// Build an assessor for the given endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()?;
        Ok(Self { client, url })
    }
}

impl RiskAssessor for HttpAssessor {
    fn is_available(&self) -> bool {
        true
    }

    fn assess<'a>(&'a self, context: &'a AssessorContext) -> AssessFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url.clone())
                .json(context)
                .send()
                .await
                .map_err(|err| Error::AssessorUnavailable(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::AssessorUnavailable(format!(
                    "assessor returned {status}"
                )));
            }

            let verdict: AssessorVerdict = response
                .json()
                .await
                .map_err(|err| Error::AssessorUnavailable(err.to_string()))?;

            Ok(verdict.into_assessment())
        })
    }
}
