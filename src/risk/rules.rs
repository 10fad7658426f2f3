//! Deterministic scoring rules.
//!
//! Rules fire in a fixed order and their additions are summed, then clamped
//! to [0, 1] (clamping, not rescaling: a saturated score stays comparable
//! across events). Reason text is the "; "-joined list of triggered rule
//! descriptions in that same order.

use crate::correlation::RiskSignals;
use crate::risk::models::RiskAssessment;

/// Reason reported when no rule triggered.
pub const NORMAL_PATTERN: &str = "Normal authentication pattern detected";

/// Tiered addition for failed logins inside the window.
fn failed_login_rule(count: i64) -> Option<(f64, String)> {
    match count {
        11.. => Some((
            0.7,
            format!("Severe brute force attack detected ({count} failed logins in 5 minutes)"),
        )),
        6..=10 => Some((
            0.5,
            format!("High number of failed login attempts ({count} in 5 minutes)"),
        )),
        3..=5 => Some((
            0.3,
            format!("Multiple failed login attempts ({count} in 5 minutes)"),
        )),
        _ => None,
    }
}

/// Tiered addition for failed 2FA attempts inside the window.
fn failed_twofa_rule(count: i64) -> Option<(f64, String)> {
    match count {
        11.. => Some((
            0.8,
            format!("Severe 2FA brute force attack ({count} failed attempts in 5 minutes)"),
        )),
        6..=10 => Some((
            0.6,
            format!("High number of failed 2FA attempts ({count} in 5 minutes)"),
        )),
        3..=5 => Some((
            0.4,
            format!("Multiple failed 2FA attempts ({count} in 5 minutes)"),
        )),
        _ => None,
    }
}

/// Evaluate every rule against the gathered signals.
#[must_use]
pub fn evaluate(signals: &RiskSignals, threshold: f64) -> RiskAssessment {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if let Some((addition, reason)) = failed_login_rule(signals.failed_logins) {
        score += addition;
        reasons.push(reason);
    }

    if let Some((addition, reason)) = failed_twofa_rule(signals.failed_twofa) {
        score += addition;
        reasons.push(reason);
    }

    if signals.ip_changed {
        score += 0.2;
        reasons.push("IP address changed from previous login".to_string());
    }

    if signals.signature_changed {
        score += 0.1;
        reasons.push("Client signature changed from previous login".to_string());
    }

    let score = score.clamp(0.0, 1.0);

    let reason = if reasons.is_empty() {
        NORMAL_PATTERN.to_string()
    } else {
        reasons.join("; ")
    };

    RiskAssessment {
        score,
        notify: score >= threshold,
        reason,
        confidence: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::models::DEFAULT_RISK_THRESHOLD;

    fn quiet() -> RiskSignals {
        RiskSignals {
            failed_logins: 0,
            failed_twofa: 0,
            ip_changed: false,
            signature_changed: false,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn quiet_signals_score_zero() {
        let assessment = evaluate(&quiet(), DEFAULT_RISK_THRESHOLD);
        assert_close(assessment.score, 0.0);
        assert!(!assessment.notify);
        assert_eq!(assessment.reason, NORMAL_PATTERN);
        assert_close(assessment.confidence, 1.0);
    }

    #[test]
    fn failed_login_tiers() {
        for (count, expected) in [(0, 0.0), (2, 0.0), (3, 0.3), (5, 0.3), (6, 0.5), (10, 0.5), (11, 0.7), (40, 0.7)] {
            let signals = RiskSignals {
                failed_logins: count,
                ..quiet()
            };
            let assessment = evaluate(&signals, DEFAULT_RISK_THRESHOLD);
            assert_close(assessment.score, expected);
        }
    }

    #[test]
    fn failed_twofa_tiers() {
        for (count, expected) in [(2, 0.0), (3, 0.4), (5, 0.4), (6, 0.6), (10, 0.6), (11, 0.8)] {
            let signals = RiskSignals {
                failed_twofa: count,
                ..quiet()
            };
            let assessment = evaluate(&signals, DEFAULT_RISK_THRESHOLD);
            assert_close(assessment.score, expected);
        }
    }

    #[test]
    fn ip_change_alone_scores_exactly_point_two() {
        let signals = RiskSignals {
            ip_changed: true,
            ..quiet()
        };
        let assessment = evaluate(&signals, DEFAULT_RISK_THRESHOLD);
        assert_close(assessment.score, 0.2);
        assert_eq!(assessment.reason, "IP address changed from previous login");
        assert!(!assessment.notify);
    }

    #[test]
    fn signature_change_alone_scores_point_one() {
        let signals = RiskSignals {
            signature_changed: true,
            ..quiet()
        };
        let assessment = evaluate(&signals, DEFAULT_RISK_THRESHOLD);
        assert_close(assessment.score, 0.1);
        assert_eq!(
            assessment.reason,
            "Client signature changed from previous login"
        );
    }

    #[test]
    fn additions_sum_and_clamp_to_one() {
        let signals = RiskSignals {
            failed_logins: 11,
            failed_twofa: 11,
            ip_changed: true,
            signature_changed: true,
        };
        let assessment = evaluate(&signals, DEFAULT_RISK_THRESHOLD);
        assert_close(assessment.score, 1.0);
        assert!(assessment.notify);
    }

    #[test]
    fn reasons_join_in_fixed_order() {
        let signals = RiskSignals {
            failed_logins: 4,
            failed_twofa: 3,
            ip_changed: true,
            signature_changed: true,
        };
        let assessment = evaluate(&signals, DEFAULT_RISK_THRESHOLD);
        assert_eq!(
            assessment.reason,
            "Multiple failed login attempts (4 in 5 minutes); \
             Multiple failed 2FA attempts (3 in 5 minutes); \
             IP address changed from previous login; \
             Client signature changed from previous login"
        );
        assert_close(assessment.score, 1.0);
    }

    #[test]
    fn threshold_boundary_notifies_at_exact_score() {
        let signals = RiskSignals {
            failed_logins: 11,
            ..quiet()
        };
        let assessment = evaluate(&signals, DEFAULT_RISK_THRESHOLD);
        assert_close(assessment.score, 0.7);
        assert!(assessment.notify);
    }
}
