use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// Review state of an alert.
///
/// `Open` is the initial state; `Reviewed` and `Resolved` are reached only by
/// explicit human action, and transitions back out are likewise human-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Reviewed,
    Resolved,
}

impl AlertStatus {
    /// Canonical string representation used in API payloads and SQL binds.
    /// The returned value must match the `alert_status` enum values in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Reviewed => "reviewed",
            Self::Resolved => "resolved",
        }
    }

    /// Parse the persisted `alerts.status` textual value into a typed enum.
    pub fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        value.parse().map_err(|()| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid alerts.status value: {value}"),
            )))
        })
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(Self::Open),
            "reviewed" => Ok(Self::Reviewed),
            "resolved" => Ok(Self::Resolved),
            _ => Err(()),
        }
    }
}

/// A consolidated security alert for one subject.
///
/// `event_ids` is an ordered, deduplicated set bounded by the configured
/// attachment cap; `risk_score` only ever rises over the alert's lifetime.
#[derive(Debug, Clone)]
pub struct Alert {
    pub id: Uuid,
    pub subject_id: i64,
    pub display_name: String,
    pub event_ids: Vec<Uuid>,
    pub risk_score: f64,
    pub reason: String,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Alert {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            subject_id: row.try_get("subject_id")?,
            display_name: row.try_get("display_name")?,
            event_ids: row.try_get("event_ids")?,
            risk_score: row.try_get("risk_score")?,
            reason: row.try_get("reason")?,
            status: AlertStatus::from_db(&status)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            AlertStatus::Open,
            AlertStatus::Reviewed,
            AlertStatus::Resolved,
        ] {
            assert_eq!(status.as_str().parse::<AlertStatus>(), Ok(status));
        }
    }

    #[test]
    fn status_rejects_unknown_value() {
        assert!("dismissed".parse::<AlertStatus>().is_err());
        assert!(AlertStatus::from_db("dismissed").is_err());
    }

    #[test]
    fn status_serde_uses_snake_case() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(AlertStatus::Reviewed)?;
        assert_eq!(value, serde_json::json!("reviewed"));
        Ok(())
    }
}
