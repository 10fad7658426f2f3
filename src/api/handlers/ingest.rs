//! Event ingestion endpoint.
//!
//! The 201 response is issued for the durable append alone: assessment,
//! write-back, and alert consolidation run synchronously afterwards but their
//! failures are logged and never change the response. A previously-durable
//! event is never rolled back.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::types::{ErrorBody, IngestEventRequest, IngestResponse};
use crate::alerts::consolidator;
use crate::cli::globals::GlobalArgs;
use crate::error::{Error, FieldViolation, ValidationError};
use crate::events::models::{
    AuthEvent, EventKind, NewEvent, CLIENT_SIGNATURE_MAX, DISPLAY_NAME_MAX, IP_MAX,
};
use crate::events::repo;
use crate::risk::RiskScorer;

impl IngestEventRequest {
    /// Validate the wire payload into a typed event, collecting every
    /// offending field instead of stopping at the first.
    fn validate(self) -> Result<NewEvent, ValidationError> {
        let mut violations = Vec::new();

        if self.subject_id <= 0 {
            violations.push(FieldViolation::new("subject_id", "must be positive"));
        }

        let name_len = self.display_name.chars().count();
        if name_len == 0 || name_len > DISPLAY_NAME_MAX {
            violations.push(FieldViolation::new(
                "display_name",
                format!("must be between 1 and {DISPLAY_NAME_MAX} characters"),
            ));
        }

        let kind = match self.kind.parse::<EventKind>() {
            Ok(kind) => Some(kind),
            Err(()) => {
                violations.push(FieldViolation::new(
                    "kind",
                    format!("unknown event kind: {}", self.kind),
                ));
                None
            }
        };

        if let Some(ip) = self.ip.as_deref() {
            if ip.chars().count() > IP_MAX {
                violations.push(FieldViolation::new(
                    "ip",
                    format!("must be at most {IP_MAX} characters"),
                ));
            }
        }

        if let Some(signature) = self.client_signature.as_deref() {
            if signature.chars().count() > CLIENT_SIGNATURE_MAX {
                violations.push(FieldViolation::new(
                    "client_signature",
                    format!("must be at most {CLIENT_SIGNATURE_MAX} characters"),
                ));
            }
        }

        let occurred_at = match DateTime::parse_from_rfc3339(&self.timestamp) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(_) => {
                violations.push(FieldViolation::new(
                    "timestamp",
                    "must be an RFC 3339 timestamp (e.g. 2024-01-15T10:30:00Z)",
                ));
                None
            }
        };

        let metadata = match self.metadata {
            None => serde_json::json!({}),
            Some(serde_json::Value::Object(map)) => {
                if map.values().any(|value| value.is_object() || value.is_array()) {
                    violations.push(FieldViolation::new(
                        "metadata",
                        "values must be JSON scalars",
                    ));
                }
                serde_json::Value::Object(map)
            }
            Some(_) => {
                violations.push(FieldViolation::new("metadata", "must be an object"));
                serde_json::json!({})
            }
        };

        match (kind, occurred_at) {
            (Some(kind), Some(occurred_at)) if violations.is_empty() => Ok(NewEvent {
                subject_id: self.subject_id,
                display_name: self.display_name,
                kind,
                ip: self.ip,
                client_signature: self.client_signature,
                occurred_at,
                metadata,
            }),
            _ => Err(ValidationError::new(violations)),
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = IngestEventRequest,
    responses(
        (status = 201, description = "Event accepted and durably stored.", body = IngestResponse),
        (status = 422, description = "Invalid event payload.", body = ErrorBody),
        (status = 500, description = "Event could not be stored."),
    ),
    tag = "events"
)]
/// Ingest one authentication event from the identity provider.
/// The response reflects the durable append only; scoring and alerting run
/// afterwards and degrade to logged gaps on failure.
pub async fn ingest(
    Extension(pool): Extension<PgPool>,
    Extension(scorer): Extension<Arc<RiskScorer>>,
    Extension(globals): Extension<GlobalArgs>,
    Json(payload): Json<IngestEventRequest>,
) -> impl IntoResponse {
    let new_event = match payload.validate() {
        Ok(event) => event,
        Err(validation) => return Error::from(validation).into_response(),
    };

    let event = match repo::append(&pool, &new_event).await {
        Ok(event) => event,
        Err(err) => return err.into_response(),
    };

    info!(
        event_id = %event.id,
        subject_id = event.subject_id,
        kind = event.kind.as_str(),
        "event ingested"
    );

    // The response is fixed from here on; later failures only log.
    assess_and_record(&pool, &scorer, &globals, &event).await;

    (
        StatusCode::CREATED,
        Json(IngestResponse {
            id: event.id.to_string(),
            status: "accepted".to_string(),
        }),
    )
        .into_response()
}

/// Score the event, attach the result, and raise or merge an alert when the
/// assessment qualifies. Every failure in here is a recoverable gap.
async fn assess_and_record(
    pool: &PgPool,
    scorer: &RiskScorer,
    globals: &GlobalArgs,
    event: &AuthEvent,
) {
    let assessment = match scorer.assess(pool, event).await {
        Ok(assessment) => assessment,
        Err(err) => {
            error!(
                event_id = %event.id,
                error = %err,
                "risk assessment failed, event remains unassessed"
            );
            return;
        }
    };

    if let Err(err) =
        repo::attach_assessment(pool, event.id, assessment.score, &assessment.reason, Utc::now())
            .await
    {
        error!(
            event_id = %event.id,
            error = %err,
            "failed to attach assessment, event remains unassessed"
        );
        return;
    }

    info!(
        event_id = %event.id,
        score = assessment.score,
        "risk assessment attached"
    );

    if !assessment.notify {
        return;
    }

    warn!(
        event_id = %event.id,
        subject_id = event.subject_id,
        display_name = %event.display_name,
        score = assessment.score,
        reason = %assessment.reason,
        "high risk event detected, subject notification would be sent"
    );

    match consolidator::record_if_qualifying(
        pool,
        &globals.consolidation,
        event.subject_id,
        &event.display_name,
        event.id,
        &assessment,
    )
    .await
    {
        Ok(outcome) => {
            info!(
                alert_id = %outcome.alert_id,
                merged = outcome.merged,
                "qualifying event recorded against alert"
            );
        }
        Err(err) => {
            error!(
                event_id = %event.id,
                error = %err,
                "alert consolidation failed, event stays ingested and assessed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> IngestEventRequest {
        IngestEventRequest {
            subject_id: 123,
            display_name: "john.doe".to_string(),
            kind: "login_failure".to_string(),
            ip: Some("192.168.1.100".to_string()),
            client_signature: Some("Mozilla/5.0".to_string()),
            timestamp: "2024-01-15T10:30:00Z".to_string(),
            metadata: Some(serde_json::json!({"session_id": "abc123", "device": "desktop"})),
        }
    }

    #[test]
    fn valid_payload_parses() {
        let event = base_request().validate().expect("valid payload");
        assert_eq!(event.subject_id, 123);
        assert_eq!(event.kind, EventKind::LoginFailure);
        assert_eq!(event.occurred_at.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn missing_metadata_defaults_to_empty_object() {
        let mut request = base_request();
        request.metadata = None;
        let event = request.validate().expect("valid payload");
        assert_eq!(event.metadata, serde_json::json!({}));
    }

    #[test]
    fn non_positive_subject_is_rejected() {
        let mut request = base_request();
        request.subject_id = 0;
        let err = request.validate().expect_err("must reject");
        assert_eq!(err.violations[0].field, "subject_id");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut request = base_request();
        request.kind = "session_start".to_string();
        let err = request.validate().expect_err("must reject");
        assert_eq!(err.violations[0].field, "kind");
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let mut request = base_request();
        request.timestamp = "next tuesday".to_string();
        let err = request.validate().expect_err("must reject");
        assert_eq!(err.violations[0].field, "timestamp");
    }

    #[test]
    fn nested_metadata_is_rejected() {
        let mut request = base_request();
        request.metadata = Some(serde_json::json!({"nested": {"deep": true}}));
        let err = request.validate().expect_err("must reject");
        assert_eq!(err.violations[0].field, "metadata");
    }

    #[test]
    fn oversized_fields_are_rejected_together() {
        let mut request = base_request();
        request.display_name = "x".repeat(DISPLAY_NAME_MAX + 1);
        request.ip = Some("9".repeat(IP_MAX + 1));
        request.client_signature = Some("a".repeat(CLIENT_SIGNATURE_MAX + 1));
        let err = request.validate().expect_err("must reject");
        let fields: Vec<_> = err
            .violations
            .iter()
            .map(|violation| violation.field)
            .collect();
        assert_eq!(fields, vec!["display_name", "ip", "client_signature"]);
    }
}
