//! HTTP handlers for the ingestion and query boundary.
//!
//! Handlers stay thin: validation happens here, storage and scoring live in
//! the domain modules, and every repo failure funnels through one
//! `IntoResponse` mapping so database detail never leaks to callers.

pub mod alerts;
pub mod assessments;
pub mod events;
pub mod health;
pub mod ingest;
pub mod root;
pub mod types;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use tracing::error;

use crate::error::{Error, FieldViolation, ValidationError};
use types::{ErrorBody, FieldDetail};

/// Listing page size cap; requests beyond it are rejected, not clamped.
pub const LIMIT_MAX: i64 = 1000;
/// Default page size when the caller does not pass `limit`.
pub const LIMIT_DEFAULT: i64 = 100;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(validation) => {
                let fields = validation
                    .violations
                    .into_iter()
                    .map(|violation| FieldDetail {
                        field: violation.field.to_string(),
                        message: violation.message,
                    })
                    .collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorBody {
                        detail: "validation failed".to_string(),
                        fields,
                    }),
                )
                    .into_response()
            }
            Self::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    detail: self.to_string(),
                    fields: Vec::new(),
                }),
            )
                .into_response(),
            Self::Persistence(err) => {
                error!("Database error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::AssessorUnavailable(err) => {
                // Recovered inside the scorer; reaching this arm is a bug.
                error!("Assessor error escaped the scorer: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Resolve `limit`/`offset` against defaults and bounds.
pub fn pagination(
    limit: Option<i64>,
    offset: Option<i64>,
    violations: &mut Vec<FieldViolation>,
) -> (i64, i64) {
    let limit = limit.unwrap_or(LIMIT_DEFAULT);
    if !(1..=LIMIT_MAX).contains(&limit) {
        violations.push(FieldViolation::new(
            "limit",
            format!("must be between 1 and {LIMIT_MAX}"),
        ));
    }

    let offset = offset.unwrap_or(0);
    if offset < 0 {
        violations.push(FieldViolation::new("offset", "must not be negative"));
    }

    (limit, offset)
}

/// Parse an optional RFC 3339 query timestamp, recording a violation on failure.
pub fn parse_timestamp(
    field: &'static str,
    value: Option<&str>,
    violations: &mut Vec<FieldViolation>,
) -> Option<DateTime<Utc>> {
    let raw = value?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(_) => {
            violations.push(FieldViolation::new(
                field,
                "must be an RFC 3339 timestamp (e.g. 2024-01-15T10:30:00Z)",
            ));
            None
        }
    }
}

/// Turn accumulated violations into a terminal validation error.
///
/// # Errors
/// Returns `Error::Validation` when any violation was recorded.
pub fn reject_if_invalid(violations: Vec<FieldViolation>) -> Result<(), Error> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(violations).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let mut violations = Vec::new();
        let (limit, offset) = pagination(None, None, &mut violations);
        assert_eq!(limit, 100);
        assert_eq!(offset, 0);
        assert!(violations.is_empty());
    }

    #[test]
    fn pagination_rejects_oversized_limit() {
        let mut violations = Vec::new();
        pagination(Some(1001), None, &mut violations);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "limit");
    }

    #[test]
    fn pagination_rejects_negative_offset() {
        let mut violations = Vec::new();
        pagination(Some(10), Some(-1), &mut violations);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "offset");
    }

    #[test]
    fn parse_timestamp_accepts_zulu() {
        let mut violations = Vec::new();
        let parsed = parse_timestamp("start", Some("2024-01-15T10:30:00Z"), &mut violations);
        assert!(parsed.is_some());
        assert!(violations.is_empty());
    }

    #[test]
    fn parse_timestamp_records_violation() {
        let mut violations = Vec::new();
        let parsed = parse_timestamp("start", Some("yesterday"), &mut violations);
        assert!(parsed.is_none());
        assert_eq!(violations[0].field, "start");
    }

    #[test]
    fn reject_if_invalid_passes_empty() {
        assert!(reject_if_invalid(Vec::new()).is_ok());
    }
}
