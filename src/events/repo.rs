//! Database access for the append-only event store.
//!
//! Appends are durable and immediately visible to readers; assessment results
//! are written back at most once per event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::{warn, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::Error;
use crate::events::models::{AuthEvent, EventKind, NewEvent};

/// Optional conjunctive filters for the raw event listing.
/// Time bounds are half-open: `start <= occurred_at < end`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    pub subject_id: Option<i64>,
    pub kind: Option<EventKind>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Optional conjunctive filters for the assessed-event listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssessmentFilter {
    pub subject_id: Option<i64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentSort {
    Score,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Aggregate statistics over a filtered set of assessed events.
///
/// Bands are fixed: high `> 0.7`, medium `(0.4, 0.7]`, low `<= 0.4`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Statistics {
    pub total: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub average: f64,
}

/// Append a validated event and return the stored row.
///
/// # Errors
/// Returns `Error::Persistence` if the insert fails.
pub async fn append(pool: &PgPool, event: &NewEvent) -> Result<AuthEvent, Error> {
    let id = Uuid::now_v7();
    let query = r"
        INSERT INTO auth_events
        (id, subject_id, display_name, kind, ip, client_signature, occurred_at, metadata)
        VALUES ($1, $2, $3, $4::event_kind, $5, $6, $7, $8)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(event.subject_id)
        .bind(&event.display_name)
        .bind(event.kind.as_str())
        .bind(event.ip.as_deref())
        .bind(event.client_signature.as_deref())
        .bind(event.occurred_at)
        .bind(&event.metadata)
        .execute(pool)
        .instrument(span)
        .await?;

    Ok(AuthEvent {
        id,
        subject_id: event.subject_id,
        display_name: event.display_name.clone(),
        kind: event.kind,
        ip: event.ip.clone(),
        client_signature: event.client_signature.clone(),
        occurred_at: event.occurred_at,
        metadata: event.metadata.clone(),
        risk_score: None,
        risk_reason: None,
        analyzed_at: None,
    })
}

/// Write assessment results back onto an event, exactly once.
///
/// A second attach for an already-assessed event is a logged no-op; the first
/// result is never overwritten.
///
/// # Errors
/// Returns `Error::NotFound` for an unknown event id and `Error::Persistence`
/// on database failure.
pub async fn attach_assessment(
    pool: &PgPool,
    id: Uuid,
    score: f64,
    reason: &str,
    analyzed_at: DateTime<Utc>,
) -> Result<(), Error> {
    let query = r"
        UPDATE auth_events
        SET risk_score = $2, risk_reason = $3, analyzed_at = $4
        WHERE id = $1 AND risk_score IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .bind(score)
        .bind(reason)
        .bind(analyzed_at)
        .execute(pool)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        if fetch(pool, id).await?.is_none() {
            return Err(Error::not_found("event", id.to_string()));
        }
        warn!(event_id = %id, "assessment already attached, keeping the first result");
    }

    Ok(())
}

/// Fetch a single event by id.
///
/// # Errors
/// Returns `Error::Persistence` if the query fails.
pub async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<AuthEvent>, Error> {
    let query = r"
        SELECT id, subject_id, display_name, kind::text AS kind, ip, client_signature,
               occurred_at, metadata, risk_score, risk_reason, analyzed_at
        FROM auth_events
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let event = sqlx::query_as::<_, AuthEvent>(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(event)
}

const EVENT_FILTER: &str = r"
    ($1::bigint IS NULL OR subject_id = $1)
    AND ($2::text IS NULL OR kind = $2::event_kind)
    AND ($3::timestamptz IS NULL OR occurred_at >= $3)
    AND ($4::timestamptz IS NULL OR occurred_at < $4)";

/// List events newest-first with the total count of matching rows.
///
/// # Errors
/// Returns `Error::Persistence` if either query fails.
pub async fn query(
    pool: &PgPool,
    filter: &EventFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<AuthEvent>, i64), Error> {
    let kind = filter.kind.map(EventKind::as_str);

    let count_query = format!("SELECT COUNT(*) AS count FROM auth_events WHERE {EVENT_FILTER}");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = count_query.as_str()
    );
    let total: i64 = sqlx::query(&count_query)
        .bind(filter.subject_id)
        .bind(kind)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(pool)
        .instrument(span)
        .await?
        .get("count");

    let list_query = format!(
        r"SELECT id, subject_id, display_name, kind::text AS kind, ip, client_signature,
                 occurred_at, metadata, risk_score, risk_reason, analyzed_at
          FROM auth_events
          WHERE {EVENT_FILTER}
          ORDER BY occurred_at DESC
          LIMIT $5 OFFSET $6"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = list_query.as_str()
    );
    let events = sqlx::query_as::<_, AuthEvent>(&list_query)
        .bind(filter.subject_id)
        .bind(kind)
        .bind(filter.start)
        .bind(filter.end)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    Ok((events, total))
}

const ASSESSED_FILTER: &str = r"
    risk_score IS NOT NULL
    AND ($1::bigint IS NULL OR subject_id = $1)
    AND ($2::double precision IS NULL OR risk_score >= $2)
    AND ($3::double precision IS NULL OR risk_score <= $3)
    AND ($4::timestamptz IS NULL OR occurred_at >= $4)
    AND ($5::timestamptz IS NULL OR occurred_at < $5)";

/// List assessed events with the total count of matching rows.
///
/// # Errors
/// Returns `Error::Persistence` if either query fails.
pub async fn query_assessed(
    pool: &PgPool,
    filter: &AssessmentFilter,
    sort: AssessmentSort,
    order: SortOrder,
    limit: i64,
    offset: i64,
) -> Result<(Vec<AuthEvent>, i64), Error> {
    let count_query = format!("SELECT COUNT(*) AS count FROM auth_events WHERE {ASSESSED_FILTER}");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = count_query.as_str()
    );
    let total: i64 = sqlx::query(&count_query)
        .bind(filter.subject_id)
        .bind(filter.min_score)
        .bind(filter.max_score)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(pool)
        .instrument(span)
        .await?
        .get("count");

    let order_clause = match (sort, order) {
        (AssessmentSort::Score, SortOrder::Desc) => "risk_score DESC",
        (AssessmentSort::Score, SortOrder::Asc) => "risk_score ASC",
        (AssessmentSort::Timestamp, SortOrder::Desc) => "occurred_at DESC",
        (AssessmentSort::Timestamp, SortOrder::Asc) => "occurred_at ASC",
    };
    let list_query = format!(
        r"SELECT id, subject_id, display_name, kind::text AS kind, ip, client_signature,
                 occurred_at, metadata, risk_score, risk_reason, analyzed_at
          FROM auth_events
          WHERE {ASSESSED_FILTER}
          ORDER BY {order_clause}
          LIMIT $6 OFFSET $7"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = list_query.as_str()
    );
    let events = sqlx::query_as::<_, AuthEvent>(&list_query)
        .bind(filter.subject_id)
        .bind(filter.min_score)
        .bind(filter.max_score)
        .bind(filter.start)
        .bind(filter.end)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    Ok((events, total))
}

/// Compute band counts and the mean score over the filtered assessed set in
/// one aggregate pass. The empty set yields zero counts and a 0.0 average.
///
/// # Errors
/// Returns `Error::Persistence` if the aggregate query fails.
pub async fn statistics(pool: &PgPool, filter: &AssessmentFilter) -> Result<Statistics, Error> {
    let query = format!(
        r"SELECT COUNT(*) AS total,
                 COUNT(*) FILTER (WHERE risk_score > 0.7) AS high,
                 COUNT(*) FILTER (WHERE risk_score > 0.4 AND risk_score <= 0.7) AS medium,
                 COUNT(*) FILTER (WHERE risk_score <= 0.4) AS low,
                 COALESCE(AVG(risk_score), 0.0) AS average
          FROM auth_events
          WHERE {ASSESSED_FILTER}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(filter.subject_id)
        .bind(filter.min_score)
        .bind(filter.max_score)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(Statistics {
        total: row.get("total"),
        high: row.get("high"),
        medium: row.get("medium"),
        low: row.get("low"),
        average: row.get("average"),
    })
}
