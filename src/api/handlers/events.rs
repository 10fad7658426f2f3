//! Raw event listing for operators.

use axum::{
    extract::{Extension, Query},
    response::Json,
};
use sqlx::PgPool;

use super::types::{ErrorBody, EventListParams, EventListResponse, EventResponse};
use super::{pagination, parse_timestamp, reject_if_invalid};
use crate::error::{Error, FieldViolation};
use crate::events::models::EventKind;
use crate::events::repo::{self, EventFilter};

#[utoipa::path(
    get,
    path = "/v1/events",
    params(EventListParams),
    responses(
        (status = 200, description = "Events matching the filters, newest first.", body = EventListResponse),
        (status = 422, description = "Invalid filter parameters.", body = ErrorBody),
    ),
    tag = "events"
)]
/// List stored events with optional subject, kind, and time filters.
/// Time bounds are half-open: `start <= timestamp < end`.
pub async fn list(
    Extension(pool): Extension<PgPool>,
    Query(params): Query<EventListParams>,
) -> Result<Json<EventListResponse>, Error> {
    let mut violations = Vec::new();

    let kind = match params.kind.as_deref() {
        Some(raw) => match raw.parse::<EventKind>() {
            Ok(kind) => Some(kind),
            Err(()) => {
                violations.push(FieldViolation::new(
                    "kind",
                    format!("unknown event kind: {raw}"),
                ));
                None
            }
        },
        None => None,
    };

    let start = parse_timestamp("start", params.start.as_deref(), &mut violations);
    let end = parse_timestamp("end", params.end.as_deref(), &mut violations);
    let (limit, offset) = pagination(params.limit, params.offset, &mut violations);
    reject_if_invalid(violations)?;

    let filter = EventFilter {
        subject_id: params.subject_id,
        kind,
        start,
        end,
    };
    let (events, total) = repo::query(&pool, &filter, limit, offset).await?;

    Ok(Json(EventListResponse {
        items: events.into_iter().map(EventResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}
