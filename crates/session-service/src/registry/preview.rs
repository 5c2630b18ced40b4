//! Registry stand-in for preview mode.
//!
//! Every session exists, is paid, and starts now. Every caller is the host and
//! may record. Nothing is persisted; `complete` only logs.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use common::clock::{Clock, SystemClock};
use common::secret::SecretString;
use common::types::{SessionId, UserId};
use std::sync::Arc;
use tracing::info;

use super::{RegistryError, SessionRegistry};
use crate::models::{
    JoinVerification, ParticipantCredentials, ParticipantRole, PaymentStatus, SessionRecord,
    SessionStatus,
};

/// Length of a fabricated preview session.
const PREVIEW_SESSION_MINUTES: i64 = 60;

/// App id handed to the transport in preview.
pub const PREVIEW_APP_ID: &str = "preview";

/// Registry that fabricates sessions and credentials locally.
#[derive(Clone)]
pub struct PreviewRegistry {
    clock: Arc<dyn Clock>,
}

impl Default for PreviewRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl PreviewRegistry {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl SessionRegistry for PreviewRegistry {
    async fn get_session(&self, session_id: &SessionId) -> Result<SessionRecord, RegistryError> {
        let now = self.clock.now();
        Ok(SessionRecord {
            id: session_id.clone(),
            mentor_id: UserId::from("preview-host"),
            counterparty_id: UserId::from("preview-guest"),
            start_time: now,
            end_time: now + ChronoDuration::minutes(PREVIEW_SESSION_MINUTES),
            status: SessionStatus::Scheduled,
            payment_status: PaymentStatus::Paid,
            channel_ref: format!("preview-{session_id}"),
            recording_url: None,
            notes: None,
        })
    }

    async fn verify_join(
        &self,
        _session_id: &SessionId,
        _participant_id: &UserId,
    ) -> Result<JoinVerification, RegistryError> {
        Ok(JoinVerification::default())
    }

    async fn join(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<ParticipantCredentials, RegistryError> {
        Ok(ParticipantCredentials {
            session_id: session_id.clone(),
            channel_name: format!("preview-{session_id}"),
            access_token: SecretString::from("preview-token"),
            participant_id: user_id.as_str().to_string(),
            role: ParticipantRole::Host,
            recording_enabled: true,
            transport_app_id: PREVIEW_APP_ID.to_string(),
        })
    }

    async fn complete(
        &self,
        session_id: &SessionId,
        host_id: &UserId,
    ) -> Result<(), RegistryError> {
        info!(
            target: "session.registry",
            session_id = %session_id,
            host_id = %host_id,
            "Preview session completed (not persisted)"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::eligibility::evaluate;
    use chrono::{DateTime, TimeZone, Utc};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[tokio::test]
    async fn test_fabricated_session_is_joinable_now() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let registry = PreviewRegistry::new(Arc::new(FixedClock(now)));

        let record = registry
            .get_session(&SessionId::from("demo"))
            .await
            .unwrap();

        assert!(record.has_valid_window());
        assert_eq!(record.payment_status, PaymentStatus::Paid);
        assert!(evaluate(&record, now, false).can_join);
    }

    #[tokio::test]
    async fn test_fabricated_credentials_are_host_with_recording() {
        let registry = PreviewRegistry::default();
        let credentials = registry
            .join(&SessionId::from("demo"), &UserId::from("someone"))
            .await
            .unwrap();

        assert_eq!(credentials.role, ParticipantRole::Host);
        assert!(credentials.can_record());
        assert_eq!(credentials.participant_id, "someone");
        assert_eq!(credentials.channel_name, "preview-demo");
    }
}
