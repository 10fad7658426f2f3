//! # Waspada (Authentication Fraud Detection & Alerting)
//!
//! `waspada` ingests authentication lifecycle events from an identity
//! provider, scores each one for fraud risk, and consolidates high-risk
//! assessments into deduplicated security alerts for human review.
//!
//! ## Scoring Pipeline
//!
//! Every ingested event is durably appended first; the 201 response depends on
//! nothing else. Scoring then runs synchronously: windowed correlation signals
//! (failed logins, failed 2FA, IP and client-signature drift) are computed as
//! of the event's *own* timestamp so replaying history reproduces the same
//! scores. An optional external assessor is consulted first under a bounded
//! timeout; every failure mode of that path falls back to the deterministic
//! rule table.
//!
//! ## Alert Consolidation
//!
//! Qualifying assessments resolve to exactly one open alert per subject per
//! consolidation window. The find-or-merge-or-create decision runs inside a
//! transaction holding a per-subject `pg_advisory_xact_lock`, which keeps the
//! guarantee under concurrent ingestion and across horizontally-scaled
//! replicas. Alert risk scores only ever rise, attached event ids are
//! deduplicated and capped, and the window is measured from wall-clock now
//! (live alert fatigue is an operational concern, unlike scoring).
//!
//! ## Time-Ordered Storage (`UUIDv7`)
//!
//! Events and alerts use **`UUIDv7`** identifiers: time-ordered for efficient
//! B-Tree inserts, and range scans over recent rows stay cheap. The hot
//! correlation queries ride a `(subject_id, kind, occurred_at)` index.

pub mod alerts;
pub mod api;
pub mod cli;
pub mod correlation;
pub mod error;
pub mod events;
pub mod risk;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{ensure, Context, Result};
    use std::fs;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }

    // Normalize SQL to avoid brittle formatting checks in schema tests.
    fn canonicalize_sql(sql: &str) -> String {
        sql.chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| ch.to_ascii_lowercase())
            .collect()
    }

    fn canonical_sql(path: &Path) -> Result<String> {
        let sql = fs::read_to_string(path)
            .with_context(|| format!("Failed to read SQL file at {}", path.display()))?;
        Ok(canonicalize_sql(&sql))
    }

    fn assert_contains(path: &Path, canonical: &str, needle: &str) -> Result<()> {
        ensure!(
            canonical.contains(needle),
            "Expected {needle} is missing in {}",
            path.display()
        );
        Ok(())
    }

    fn schema_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("db/sql/01_waspada.sql")
    }

    #[test]
    fn schema_sql_declares_closed_enums() -> Result<()> {
        let path = schema_path();
        let canonical = canonical_sql(&path)?;
        assert_contains(&path, &canonical, "createtypeevent_kindasenum")?;
        assert_contains(&path, &canonical, "'2fa_failure'")?;
        assert_contains(&path, &canonical, "createtypealert_statusasenum")?;
        assert_contains(&path, &canonical, "'open','reviewed','resolved'")
    }

    #[test]
    fn schema_sql_keeps_correlation_index() -> Result<()> {
        // The correlation engine's two query shapes depend on this index.
        let path = schema_path();
        let canonical = canonical_sql(&path)?;
        assert_contains(
            &path,
            &canonical,
            "onauth_events(subject_id,kind,occurred_at)",
        )
    }

    #[test]
    fn schema_sql_guards_subject_ids() -> Result<()> {
        let path = schema_path();
        let canonical = canonical_sql(&path)?;
        assert_contains(&path, &canonical, "check(subject_id>0)")
    }

    #[test]
    fn schema_sql_keeps_alert_lookup_index() -> Result<()> {
        // The consolidator's candidate lookup rides this index.
        let path = schema_path();
        let canonical = canonical_sql(&path)?;
        assert_contains(&path, &canonical, "onalerts(subject_id,status,created_at)")
    }
}
