//! Eligibility evaluator.
//!
//! A pure function of (session record, now, override flag). It is the single
//! source of truth for the join gate and for the countdown, and is safe to call
//! at any frequency. Rules are evaluated in order, first match wins:
//!
//! 1. override → eligible
//! 2. now > end → "session has ended"
//! 3. payment not paid → "payment not confirmed"
//! 4. status not scheduled/ongoing → "session is <status>"
//! 5. now < start - 15 min → "too early to join", with the wait until the window opens
//! 6. otherwise eligible
//!
//! The `ongoing` status is never treated as authoritative for time: a stale
//! `scheduled` status inside the window is eligible and a stale `ongoing`
//! status after the end is not.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::errors::JoinError;
use crate::models::{PaymentStatus, SessionRecord, SessionStatus};

/// How far ahead of the scheduled start the join window opens, in seconds.
pub const JOIN_WINDOW_LEAD_SECS: i64 = 15 * 60;

/// Which rule decided the evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityRule {
    Override,
    Ended,
    PaymentNotConfirmed,
    StatusNotJoinable(SessionStatus),
    TooEarly,
    WindowOpen,
}

impl EligibilityRule {
    /// Returns a bounded label for metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EligibilityRule::Override => "override",
            EligibilityRule::Ended => "ended",
            EligibilityRule::PaymentNotConfirmed => "payment_not_confirmed",
            EligibilityRule::StatusNotJoinable(_) => "status_not_joinable",
            EligibilityRule::TooEarly => "too_early",
            EligibilityRule::WindowOpen => "window_open",
        }
    }
}

/// Join decision for one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub can_join: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
    /// Time until the join window opens; zero unless too early.
    pub wait: Duration,
    pub rule: EligibilityRule,
}

impl Eligibility {
    /// Wait in whole milliseconds.
    #[must_use]
    pub fn wait_ms(&self) -> u64 {
        u64::try_from(self.wait.as_millis()).unwrap_or(u64::MAX)
    }

    /// Convert a denial into `JoinError::EligibilityDenied`.
    ///
    /// # Errors
    ///
    /// Returns `EligibilityDenied` carrying the reason when `can_join` is false.
    pub fn into_result(self) -> Result<(), JoinError> {
        if self.can_join {
            Ok(())
        } else {
            Err(JoinError::EligibilityDenied {
                reason: self.reason,
            })
        }
    }

    fn allowed(rule: EligibilityRule, reason: &str) -> Self {
        Self {
            can_join: true,
            reason: reason.to_string(),
            wait: Duration::ZERO,
            rule,
        }
    }

    fn denied(rule: EligibilityRule, reason: String, wait: Duration) -> Self {
        Self {
            can_join: false,
            reason,
            wait,
            rule,
        }
    }
}

/// Evaluate whether `session` may be joined at `now`.
#[must_use]
pub fn evaluate(
    session: &SessionRecord,
    now: DateTime<Utc>,
    override_always: bool,
) -> Eligibility {
    if override_always {
        return Eligibility::allowed(
            EligibilityRule::Override,
            "preview mode, joining is always allowed",
        );
    }

    if now > session.end_time {
        return Eligibility::denied(
            EligibilityRule::Ended,
            "session has ended".to_string(),
            Duration::ZERO,
        );
    }

    if session.payment_status != PaymentStatus::Paid {
        return Eligibility::denied(
            EligibilityRule::PaymentNotConfirmed,
            "payment not confirmed".to_string(),
            Duration::ZERO,
        );
    }

    if !session.status.is_joinable() {
        return Eligibility::denied(
            EligibilityRule::StatusNotJoinable(session.status),
            format!("session is {}", session.status),
            Duration::ZERO,
        );
    }

    let opens_at = session.start_time - chrono::Duration::seconds(JOIN_WINDOW_LEAD_SECS);
    if now < opens_at {
        let wait = (opens_at - now).to_std().unwrap_or(Duration::ZERO);
        return Eligibility::denied(
            EligibilityRule::TooEarly,
            format!(
                "too early to join, the session opens {} minutes before it starts",
                JOIN_WINDOW_LEAD_SECS / 60
            ),
            wait,
        );
    }

    Eligibility::allowed(EligibilityRule::WindowOpen, "you can join now")
}
