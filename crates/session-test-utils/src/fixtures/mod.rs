//! Pre-configured test data fixtures.
//!
//! Provides builders for:
//! - Session records at any point relative to their join window
//! - Participant credentials for hosts and guests

use chrono::{DateTime, Utc};
use common::secret::SecretString;
use common::types::{SessionId, UserId};
use session_service::models::{
    ParticipantCredentials, ParticipantRole, PaymentStatus, SessionRecord, SessionStatus,
};
use std::time::Duration;
use uuid::Uuid;

/// Mentor id used by fixtures unless overridden.
pub const TEST_MENTOR_ID: &str = "mentor-1";

/// Mentee id used by fixtures unless overridden.
pub const TEST_MENTEE_ID: &str = "mentee-1";

/// Test session record fixture.
#[derive(Debug, Clone)]
pub struct TestSession {
    id: String,
    start_time: DateTime<Utc>,
    length: Duration,
    status: SessionStatus,
    payment_status: PaymentStatus,
}

impl TestSession {
    /// A paid, scheduled, one-hour session starting now.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start_time: Utc::now(),
            length: Duration::from_secs(60 * 60),
            status: SessionStatus::Scheduled,
            payment_status: PaymentStatus::Paid,
        }
    }

    /// Create a test session with a random ID.
    #[must_use]
    pub fn random() -> Self {
        Self::new(format!("session-{}", Uuid::new_v4()))
    }

    /// Start at an absolute instant.
    #[must_use]
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = start;
        self
    }

    /// Start `offset` after `now`.
    #[must_use]
    pub fn starting_in(mut self, now: DateTime<Utc>, offset: Duration) -> Self {
        self.start_time = now + chrono::Duration::from_std(offset).unwrap();
        self
    }

    /// Started `offset` before `now`.
    #[must_use]
    pub fn started_ago(mut self, now: DateTime<Utc>, offset: Duration) -> Self {
        self.start_time = now - chrono::Duration::from_std(offset).unwrap();
        self
    }

    /// Set the session length.
    #[must_use]
    pub fn lasting(mut self, length: Duration) -> Self {
        self.length = length;
        self
    }

    /// Set the registry status.
    #[must_use]
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the payment status.
    #[must_use]
    pub fn with_payment(mut self, payment_status: PaymentStatus) -> Self {
        self.payment_status = payment_status;
        self
    }

    /// Build the record.
    #[must_use]
    pub fn build(self) -> SessionRecord {
        let end_time = self.start_time + chrono::Duration::from_std(self.length).unwrap();
        SessionRecord {
            channel_ref: format!("channel-{}", self.id),
            id: SessionId::new(self.id),
            mentor_id: UserId::new(TEST_MENTOR_ID),
            counterparty_id: UserId::new(TEST_MENTEE_ID),
            start_time: self.start_time,
            end_time,
            status: self.status,
            payment_status: self.payment_status,
            recording_url: None,
            notes: None,
        }
    }
}

/// Test participant credentials fixture.
#[derive(Debug, Clone)]
pub struct TestCredentials {
    session_id: String,
    participant_id: String,
    role: ParticipantRole,
    recording_enabled: bool,
}

impl TestCredentials {
    /// Host credentials with recording enabled.
    #[must_use]
    pub fn host(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            participant_id: "1001".to_string(),
            role: ParticipantRole::Host,
            recording_enabled: true,
        }
    }

    /// Guest credentials; guests never record.
    #[must_use]
    pub fn guest(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            participant_id: "2002".to_string(),
            role: ParticipantRole::Guest,
            recording_enabled: false,
        }
    }

    /// Set the recording flag.
    #[must_use]
    pub fn with_recording(mut self, enabled: bool) -> Self {
        self.recording_enabled = enabled;
        self
    }

    /// Set the participant id.
    #[must_use]
    pub fn with_participant_id(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = participant_id.into();
        self
    }

    /// Build the credentials.
    #[must_use]
    pub fn build(self) -> ParticipantCredentials {
        ParticipantCredentials {
            channel_name: format!("channel-{}", self.session_id),
            session_id: SessionId::new(self.session_id),
            access_token: SecretString::from("test-access-token"),
            participant_id: self.participant_id,
            role: self.role,
            recording_enabled: self.recording_enabled,
            transport_app_id: "test-app".to_string(),
        }
    }
}
