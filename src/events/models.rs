use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// Upper bound accepted for a subject display name.
pub const DISPLAY_NAME_MAX: usize = 255;
/// Upper bound accepted for an origin IP string (IPv4 or IPv6 textual form).
pub const IP_MAX: usize = 45;
/// Upper bound accepted for a client signature (user agent) string.
pub const CLIENT_SIGNATURE_MAX: usize = 500;

/// Closed set of authentication lifecycle events accepted at ingestion.
///
/// Stored as the `event_kind` enum in PostgreSQL; the textual values are the
/// wire format shared with the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "login_success")]
    LoginSuccess,
    #[serde(rename = "login_failure")]
    LoginFailure,
    #[serde(rename = "2fa_success")]
    TwoFaSuccess,
    #[serde(rename = "2fa_failure")]
    TwoFaFailure,
    #[serde(rename = "password_reset")]
    PasswordReset,
    #[serde(rename = "password_reset_request")]
    PasswordResetRequest,
    #[serde(rename = "account_locked")]
    AccountLocked,
    #[serde(rename = "account_unlocked")]
    AccountUnlocked,
}

impl EventKind {
    /// Canonical string representation used in API payloads and SQL binds.
    /// The returned value must match the `event_kind` enum values in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFailure => "login_failure",
            Self::TwoFaSuccess => "2fa_success",
            Self::TwoFaFailure => "2fa_failure",
            Self::PasswordReset => "password_reset",
            Self::PasswordResetRequest => "password_reset_request",
            Self::AccountLocked => "account_locked",
            Self::AccountUnlocked => "account_unlocked",
        }
    }

    /// Parse the persisted `auth_events.kind` textual value into a typed enum.
    pub fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        value.parse().map_err(|()| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid auth_events.kind value: {value}"),
            )))
        })
    }
}

impl std::str::FromStr for EventKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "login_success" => Ok(Self::LoginSuccess),
            "login_failure" => Ok(Self::LoginFailure),
            "2fa_success" => Ok(Self::TwoFaSuccess),
            "2fa_failure" => Ok(Self::TwoFaFailure),
            "password_reset" => Ok(Self::PasswordReset),
            "password_reset_request" => Ok(Self::PasswordResetRequest),
            "account_locked" => Ok(Self::AccountLocked),
            "account_unlocked" => Ok(Self::AccountUnlocked),
            _ => Err(()),
        }
    }
}

/// A validated event ready for the durable append.
///
/// Produced by ingestion validation; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub subject_id: i64,
    pub display_name: String,
    pub kind: EventKind,
    pub ip: Option<String>,
    pub client_signature: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// A stored authentication event, including assessment results once attached.
///
/// Immutable after ingestion except for the one-time assessment write-back
/// (`risk_score`, `risk_reason`, `analyzed_at`).
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub id: Uuid,
    pub subject_id: i64,
    pub display_name: String,
    pub kind: EventKind,
    pub ip: Option<String>,
    pub client_signature: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub risk_score: Option<f64>,
    pub risk_reason: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for AuthEvent {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        Ok(Self {
            id: row.try_get("id")?,
            subject_id: row.try_get("subject_id")?,
            display_name: row.try_get("display_name")?,
            kind: EventKind::from_db(&kind)?,
            ip: row.try_get("ip")?,
            client_signature: row.try_get("client_signature")?,
            occurred_at: row.try_get("occurred_at")?,
            metadata: row.try_get("metadata")?,
            risk_score: row.try_get("risk_score")?,
            risk_reason: row.try_get("risk_reason")?,
            analyzed_at: row.try_get("analyzed_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            EventKind::LoginSuccess,
            EventKind::LoginFailure,
            EventKind::TwoFaSuccess,
            EventKind::TwoFaFailure,
            EventKind::PasswordReset,
            EventKind::PasswordResetRequest,
            EventKind::AccountLocked,
            EventKind::AccountUnlocked,
        ] {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
    }

    #[test]
    fn kind_rejects_unknown_value() {
        assert!("session_start".parse::<EventKind>().is_err());
        assert!(EventKind::from_db("session_start").is_err());
    }

    #[test]
    fn kind_serde_uses_wire_names() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(EventKind::TwoFaFailure)?;
        assert_eq!(value, serde_json::json!("2fa_failure"));
        let parsed: EventKind = serde_json::from_value(serde_json::json!("2fa_failure"))?;
        assert_eq!(parsed, EventKind::TwoFaFailure);
        Ok(())
    }
}
