//! Find-or-merge-or-create consolidation of qualifying assessments.
//!
//! The whole decision runs inside one transaction holding a per-subject
//! advisory lock, so two concurrent qualifying events for the same subject
//! can never create two alerts. The consolidation window is measured from
//! wall-clock now, not the event timestamp: it governs live alert fatigue,
//! not historical replay.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::alerts::models::Alert;
use crate::error::Error;
use crate::risk::models::RiskAssessment;

/// Lock class for `pg_advisory_xact_lock(class, key)`; keeps alert locks out
/// of any other advisory-lock user's keyspace.
const ALERT_LOCK_CLASS: i32 = 4_210_907;

/// Consolidation tuning, carried from the CLI configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConsolidationSettings {
    /// How far back an open alert still absorbs new qualifying events.
    pub window: Duration,
    /// Maximum number of event ids attached to one alert.
    pub max_events_per_alert: usize,
}

impl Default for ConsolidationSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5 * 60),
            max_events_per_alert: 10,
        }
    }
}

/// Result of recording a qualifying assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidationOutcome {
    pub alert_id: Uuid,
    pub merged: bool,
}

/// Decision taken against the candidate alert, computed before any write.
#[derive(Debug, Clone, PartialEq)]
enum MergePlan {
    /// No open alert inside the window: create a fresh one.
    Create,
    /// Retry of an already-recorded event: nothing to write.
    AlreadyAttached { alert_id: Uuid },
    /// Attachment cap reached: the event counts as covered, nothing to write.
    Covered { alert_id: Uuid },
    /// Extend the candidate with the new event.
    Attach {
        alert_id: Uuid,
        risk_score: f64,
        reason: String,
    },
}

/// Pure merge decision. The risk score never decreases and a reason is only
/// appended when it is not already a substring of the existing reason.
fn plan(
    candidate: Option<&Alert>,
    event_id: Uuid,
    assessment: &RiskAssessment,
    max_events_per_alert: usize,
) -> MergePlan {
    let Some(alert) = candidate else {
        return MergePlan::Create;
    };

    if alert.event_ids.contains(&event_id) {
        return MergePlan::AlreadyAttached { alert_id: alert.id };
    }

    if alert.event_ids.len() >= max_events_per_alert {
        return MergePlan::Covered { alert_id: alert.id };
    }

    let reason = if alert.reason.contains(&assessment.reason) {
        alert.reason.clone()
    } else {
        format!("{}; {}", alert.reason, assessment.reason)
    };

    MergePlan::Attach {
        alert_id: alert.id,
        risk_score: alert.risk_score.max(assessment.score),
        reason,
    }
}

/// Record a qualifying assessment against the subject's alert state.
///
/// Callers invoke this only when `assessment.notify` is true. Returns the
/// alert the event resolved to and whether it merged into an existing one.
///
/// # Errors
/// Returns `Error::Persistence` if the transaction fails.
pub async fn record_if_qualifying(
    pool: &PgPool,
    settings: &ConsolidationSettings,
    subject_id: i64,
    display_name: &str,
    event_id: Uuid,
    assessment: &RiskAssessment,
) -> Result<ConsolidationOutcome, Error> {
    let mut tx = pool.begin().await?;

    // Serialize per subject. Truncating the subject id can only make two
    // subjects share a lock key, which widens serialization, never narrows it.
    #[allow(clippy::cast_possible_truncation)]
    let lock_key = subject_id as i32;
    let lock_query = "SELECT pg_advisory_xact_lock($1, $2)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = lock_query
    );
    sqlx::query(lock_query)
        .bind(ALERT_LOCK_CLASS)
        .bind(lock_key)
        .execute(&mut *tx)
        .instrument(span)
        .await?;

    let window = chrono::Duration::from_std(settings.window)
        .unwrap_or_else(|_| chrono::Duration::minutes(5));
    let cutoff = Utc::now() - window;

    let candidate_query = r"
        SELECT id, subject_id, display_name, event_ids, risk_score, reason,
               status::text AS status, created_at, updated_at
        FROM alerts
        WHERE subject_id = $1
          AND status = 'open'
          AND created_at >= $2
        ORDER BY created_at DESC
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = candidate_query
    );
    let candidate = sqlx::query_as::<_, Alert>(candidate_query)
        .bind(subject_id)
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await?;

    let outcome = match plan(candidate.as_ref(), event_id, assessment, settings.max_events_per_alert)
    {
        MergePlan::Create => {
            let alert_id = Uuid::now_v7();
            let insert_query = r"
                INSERT INTO alerts (id, subject_id, display_name, event_ids, risk_score, reason)
                VALUES ($1, $2, $3, $4, $5, $6)
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = insert_query
            );
            sqlx::query(insert_query)
                .bind(alert_id)
                .bind(subject_id)
                .bind(display_name)
                .bind(vec![event_id])
                .bind(assessment.score)
                .bind(&assessment.reason)
                .execute(&mut *tx)
                .instrument(span)
                .await?;
            ConsolidationOutcome {
                alert_id,
                merged: false,
            }
        }
        MergePlan::AlreadyAttached { alert_id } => {
            debug!(%alert_id, %event_id, "event already attached to alert");
            ConsolidationOutcome {
                alert_id,
                merged: true,
            }
        }
        MergePlan::Covered { alert_id } => {
            debug!(%alert_id, %event_id, "alert attachment cap reached, event covered");
            ConsolidationOutcome {
                alert_id,
                merged: true,
            }
        }
        MergePlan::Attach {
            alert_id,
            risk_score,
            reason,
        } => {
            let update_query = r"
                UPDATE alerts
                SET event_ids = array_append(event_ids, $2),
                    risk_score = $3,
                    reason = $4,
                    updated_at = now()
                WHERE id = $1
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = update_query
            );
            sqlx::query(update_query)
                .bind(alert_id)
                .bind(event_id)
                .bind(risk_score)
                .bind(&reason)
                .execute(&mut *tx)
                .instrument(span)
                .await?;
            ConsolidationOutcome {
                alert_id,
                merged: true,
            }
        }
    };

    tx.commit().await?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::models::AlertStatus;

    fn assessment(score: f64, reason: &str) -> RiskAssessment {
        RiskAssessment {
            score,
            notify: true,
            reason: reason.to_string(),
            confidence: 1.0,
        }
    }

    fn open_alert(event_ids: Vec<Uuid>, risk_score: f64, reason: &str) -> Alert {
        let now = Utc::now();
        Alert {
            id: Uuid::now_v7(),
            subject_id: 7,
            display_name: "ana".to_string(),
            event_ids,
            risk_score,
            reason: reason.to_string(),
            status: AlertStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_candidate_creates() {
        let decision = plan(None, Uuid::now_v7(), &assessment(0.8, "brute force"), 10);
        assert_eq!(decision, MergePlan::Create);
    }

    #[test]
    fn retry_of_attached_event_is_a_noop() {
        let event_id = Uuid::now_v7();
        let alert = open_alert(vec![event_id], 0.8, "brute force");
        let decision = plan(Some(&alert), event_id, &assessment(0.9, "brute force"), 10);
        assert_eq!(
            decision,
            MergePlan::AlreadyAttached { alert_id: alert.id }
        );
    }

    #[test]
    fn cap_reached_reports_covered_without_mutation() {
        let alert = open_alert(vec![Uuid::now_v7(), Uuid::now_v7()], 0.8, "brute force");
        let decision = plan(Some(&alert), Uuid::now_v7(), &assessment(0.95, "new signal"), 2);
        assert_eq!(decision, MergePlan::Covered { alert_id: alert.id });
    }

    #[test]
    fn attach_raises_score_to_max() {
        let alert = open_alert(vec![Uuid::now_v7()], 0.9, "brute force");
        let decision = plan(Some(&alert), Uuid::now_v7(), &assessment(0.75, "brute force"), 10);
        match decision {
            MergePlan::Attach { risk_score, .. } => assert_eq!(risk_score, 0.9),
            other => panic!("expected attach, got {other:?}"),
        }
    }

    #[test]
    fn attach_appends_only_novel_reasons() {
        let alert = open_alert(
            vec![Uuid::now_v7()],
            0.8,
            "Multiple failed login attempts (4 in 5 minutes)",
        );

        let repeat = plan(
            Some(&alert),
            Uuid::now_v7(),
            &assessment(0.8, "Multiple failed login attempts (4 in 5 minutes)"),
            10,
        );
        match repeat {
            MergePlan::Attach { reason, .. } => {
                assert_eq!(reason, "Multiple failed login attempts (4 in 5 minutes)");
            }
            other => panic!("expected attach, got {other:?}"),
        }

        let novel = plan(
            Some(&alert),
            Uuid::now_v7(),
            &assessment(0.9, "IP address changed from previous login"),
            10,
        );
        match novel {
            MergePlan::Attach { reason, risk_score, .. } => {
                assert_eq!(
                    reason,
                    "Multiple failed login attempts (4 in 5 minutes); \
                     IP address changed from previous login"
                );
                assert_eq!(risk_score, 0.9);
            }
            other => panic!("expected attach, got {other:?}"),
        }
    }

    #[test]
    fn default_settings_match_configuration_defaults() {
        let settings = ConsolidationSettings::default();
        assert_eq!(settings.window, Duration::from_secs(300));
        assert_eq!(settings.max_events_per_alert, 10);
    }
}
