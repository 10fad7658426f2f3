//! Database access for the alert listing and human review transitions.

use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::alerts::models::{Alert, AlertStatus};
use crate::error::Error;

const ALERT_COLUMNS: &str = r"id, subject_id, display_name, event_ids, risk_score, reason,
    status::text AS status, created_at, updated_at";

/// Optional conjunctive filters for the alert listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub min_score: Option<f64>,
    pub subject_id: Option<i64>,
}

/// List alerts newest-first with the total count of matching rows.
///
/// # Errors
/// Returns `Error::Persistence` if either query fails.
pub async fn list(
    pool: &PgPool,
    filter: &AlertFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Alert>, i64), Error> {
    const FILTER: &str = r"
        ($1::text IS NULL OR status = $1::alert_status)
        AND ($2::double precision IS NULL OR risk_score >= $2)
        AND ($3::bigint IS NULL OR subject_id = $3)";

    let status = filter.status.map(AlertStatus::as_str);

    let count_query = format!("SELECT COUNT(*) AS count FROM alerts WHERE {FILTER}");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = count_query.as_str()
    );
    let total: i64 = sqlx::query(&count_query)
        .bind(status)
        .bind(filter.min_score)
        .bind(filter.subject_id)
        .fetch_one(pool)
        .instrument(span)
        .await?
        .get("count");

    let list_query = format!(
        r"SELECT {ALERT_COLUMNS}
          FROM alerts
          WHERE {FILTER}
          ORDER BY created_at DESC
          LIMIT $4 OFFSET $5"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = list_query.as_str()
    );
    let alerts = sqlx::query_as::<_, Alert>(&list_query)
        .bind(status)
        .bind(filter.min_score)
        .bind(filter.subject_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    Ok((alerts, total))
}

/// Fetch a single alert by id.
///
/// # Errors
/// Returns `Error::Persistence` if the query fails.
pub async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<Alert>, Error> {
    let query = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let alert = sqlx::query_as::<_, Alert>(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(alert)
}

/// Apply a human-driven status transition and return the updated alert.
///
/// # Errors
/// Returns `Error::NotFound` for an unknown alert id and `Error::Persistence`
/// on database failure.
pub async fn update_status(pool: &PgPool, id: Uuid, status: AlertStatus) -> Result<Alert, Error> {
    let query = format!(
        r"UPDATE alerts
          SET status = $2::alert_status, updated_at = now()
          WHERE id = $1
          RETURNING {ALERT_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let alert = sqlx::query_as::<_, Alert>(&query)
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    alert.ok_or_else(|| Error::not_found("alert", id.to_string()))
}
