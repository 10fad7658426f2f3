//! Time-windowed correlation queries over the event store.
//!
//! Every query is parameterized by the timestamp of the event under
//! assessment, never wall-clock time, so an assessment replayed later over
//! the same stored history produces the same signals. Both query shapes ride
//! the `(subject_id, kind, occurred_at)` index.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use crate::error::Error;
use crate::events::models::{AuthEvent, EventKind};

/// The sliding window the scoring rules look back over.
pub const CORRELATION_WINDOW_MINUTES: i64 = 5;

/// Which profile field of a past event to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Ip,
    ClientSignature,
}

/// Signals computed for one event, fed to both scoring paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskSignals {
    /// Failed logins in the 5 minutes before the event.
    pub failed_logins: i64,
    /// Failed 2FA attempts in the 5 minutes before the event.
    pub failed_twofa: i64,
    /// Origin IP differs from the most recent successful login's IP.
    pub ip_changed: bool,
    /// Client signature differs from the most recent successful login's.
    pub signature_changed: bool,
}

/// Count events of `kind` for a subject inside the half-open window
/// `[since, before)`.
///
/// # Errors
/// Returns `Error::Persistence` if the count query fails.
pub async fn count_events(
    pool: &PgPool,
    subject_id: i64,
    kind: EventKind,
    since: DateTime<Utc>,
    before: DateTime<Utc>,
) -> Result<i64, Error> {
    let query = r"
        SELECT COUNT(*) AS count
        FROM auth_events
        WHERE subject_id = $1
          AND kind = $2::event_kind
          AND occurred_at >= $3
          AND occurred_at < $4
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(subject_id)
        .bind(kind.as_str())
        .bind(since)
        .bind(before)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(row.get("count"))
}

/// The non-null `field` value of the most recent event of `kind` strictly
/// before `before`, or `None` when the subject has no such history.
///
/// # Errors
/// Returns `Error::Persistence` if the lookup fails.
pub async fn last_value_before(
    pool: &PgPool,
    subject_id: i64,
    kind: EventKind,
    field: ProfileField,
    before: DateTime<Utc>,
) -> Result<Option<String>, Error> {
    let query = match field {
        ProfileField::Ip => {
            r"
            SELECT ip AS value
            FROM auth_events
            WHERE subject_id = $1
              AND kind = $2::event_kind
              AND occurred_at < $3
              AND ip IS NOT NULL
            ORDER BY occurred_at DESC
            LIMIT 1
            "
        }
        ProfileField::ClientSignature => {
            r"
            SELECT client_signature AS value
            FROM auth_events
            WHERE subject_id = $1
              AND kind = $2::event_kind
              AND occurred_at < $3
              AND client_signature IS NOT NULL
            ORDER BY occurred_at DESC
            LIMIT 1
            "
        }
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(subject_id)
        .bind(kind.as_str())
        .bind(before)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(|row| row.get("value")))
}

/// Gather all signals for one event.
///
/// The window is `[T - 5min, T)` with `T` the event's own timestamp, so the
/// event never counts against itself. A subject with no prior successful
/// login never reports a change: absence is not a change.
///
/// # Errors
/// Returns `Error::Persistence` if any of the underlying queries fail.
pub async fn gather(pool: &PgPool, event: &AuthEvent) -> Result<RiskSignals, Error> {
    let before = event.occurred_at;
    let since = before - Duration::minutes(CORRELATION_WINDOW_MINUTES);

    let failed_logins =
        count_events(pool, event.subject_id, EventKind::LoginFailure, since, before).await?;
    let failed_twofa =
        count_events(pool, event.subject_id, EventKind::TwoFaFailure, since, before).await?;

    let ip_changed = match event.ip.as_deref() {
        Some(current) => last_value_before(
            pool,
            event.subject_id,
            EventKind::LoginSuccess,
            ProfileField::Ip,
            before,
        )
        .await?
        .is_some_and(|previous| previous != current),
        None => false,
    };

    let signature_changed = match event.client_signature.as_deref() {
        Some(current) => last_value_before(
            pool,
            event.subject_id,
            EventKind::LoginSuccess,
            ProfileField::ClientSignature,
            before,
        )
        .await?
        .is_some_and(|previous| previous != current),
        None => false,
    };

    Ok(RiskSignals {
        failed_logins,
        failed_twofa,
        ip_changed,
        signature_changed,
    })
}
