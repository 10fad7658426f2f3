//! Alert listing and human review transitions.

use axum::{
    extract::{Extension, Path, Query},
    response::Json,
};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::types::{AlertListParams, AlertListResponse, AlertResponse, AlertStatusUpdate, ErrorBody};
use super::{pagination, reject_if_invalid};
use crate::alerts::models::AlertStatus;
use crate::alerts::repo::{self, AlertFilter};
use crate::error::{Error, FieldViolation, ValidationError};

fn parse_alert_id(raw: &str) -> Result<Uuid, Error> {
    raw.parse::<Uuid>()
        .map_err(|_| Error::not_found("alert", raw))
}

#[utoipa::path(
    get,
    path = "/v1/alerts",
    params(AlertListParams),
    responses(
        (status = 200, description = "Alerts matching the filters, newest first.", body = AlertListResponse),
        (status = 422, description = "Invalid filter parameters.", body = ErrorBody),
    ),
    tag = "alerts"
)]
/// List alerts filtered by status, minimum score, and subject.
pub async fn list(
    Extension(pool): Extension<PgPool>,
    Query(params): Query<AlertListParams>,
) -> Result<Json<AlertListResponse>, Error> {
    let mut violations = Vec::new();

    let status = match params.status.as_deref() {
        Some(raw) => match raw.parse::<AlertStatus>() {
            Ok(status) => Some(status),
            Err(()) => {
                violations.push(FieldViolation::new(
                    "status",
                    format!("must be open, reviewed, or resolved, got '{raw}'"),
                ));
                None
            }
        },
        None => None,
    };

    if let Some(min) = params.min_score {
        if !(0.0..=1.0).contains(&min) {
            violations.push(FieldViolation::new(
                "min_score",
                "must be between 0.0 and 1.0",
            ));
        }
    }

    let (limit, offset) = pagination(params.limit, params.offset, &mut violations);
    reject_if_invalid(violations)?;

    let filter = AlertFilter {
        status,
        min_score: params.min_score,
        subject_id: params.subject_id,
    };
    let (alerts, total) = repo::list(&pool, &filter, limit, offset).await?;

    Ok(Json(AlertListResponse {
        items: alerts.into_iter().map(AlertResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/alerts/{alert_id}",
    params(("alert_id" = String, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Alert detail.", body = AlertResponse),
        (status = 404, description = "Unknown alert id.", body = ErrorBody),
    ),
    tag = "alerts"
)]
/// Fetch one alert by id.
pub async fn get(
    Path(alert_id): Path<String>,
    Extension(pool): Extension<PgPool>,
) -> Result<Json<AlertResponse>, Error> {
    let id = parse_alert_id(&alert_id)?;
    let alert = repo::fetch(&pool, id)
        .await?
        .ok_or_else(|| Error::not_found("alert", alert_id))?;
    Ok(Json(AlertResponse::from(alert)))
}

#[utoipa::path(
    patch,
    path = "/v1/alerts/{alert_id}",
    request_body = AlertStatusUpdate,
    params(("alert_id" = String, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Alert updated.", body = AlertResponse),
        (status = 404, description = "Unknown alert id.", body = ErrorBody),
        (status = 422, description = "Invalid status value.", body = ErrorBody),
    ),
    tag = "alerts"
)]
/// Apply a human review transition to one alert.
/// Alerts never leave `reviewed` or `resolved` automatically; this endpoint
/// is the only way out.
pub async fn update_status(
    Path(alert_id): Path<String>,
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<AlertStatusUpdate>,
) -> Result<Json<AlertResponse>, Error> {
    let status = payload.status.parse::<AlertStatus>().map_err(|()| {
        Error::from(ValidationError::single(
            "status",
            format!(
                "must be open, reviewed, or resolved, got '{}'",
                payload.status
            ),
        ))
    })?;

    let id = parse_alert_id(&alert_id)?;
    let alert = repo::update_status(&pool, id, status).await?;

    info!(alert_id = %alert.id, status = status.as_str(), "alert status updated");

    Ok(Json(AlertResponse::from(alert)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_alert_id_maps_to_not_found() {
        let err = parse_alert_id("not-a-uuid").expect_err("must fail");
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn well_formed_alert_id_parses() {
        let id = Uuid::now_v7();
        assert_eq!(parse_alert_id(&id.to_string()).ok(), Some(id));
    }
}
