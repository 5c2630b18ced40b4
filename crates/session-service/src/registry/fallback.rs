//! Preview fallback for an unreachable registry.
//!
//! Wraps a primary registry. Network-facing failures (no response, 5xx) are
//! answered by a [`PreviewRegistry`] instead; business rejections (403, 404,
//! incomplete credentials) pass through untouched.

use async_trait::async_trait;
use common::types::{SessionId, UserId};
use std::sync::Arc;
use tracing::warn;

use super::{PreviewRegistry, RegistryError, SessionRegistry};
use crate::models::{JoinVerification, ParticipantCredentials, SessionRecord};

/// Registry that degrades to preview on network failures.
pub struct FallbackRegistry {
    primary: Arc<dyn SessionRegistry>,
    preview: PreviewRegistry,
}

impl FallbackRegistry {
    #[must_use]
    pub fn new(primary: Arc<dyn SessionRegistry>, preview: PreviewRegistry) -> Self {
        Self { primary, preview }
    }

    fn degrade(operation: &'static str, error: &RegistryError) -> bool {
        if error.is_network() {
            warn!(
                target: "session.registry",
                operation = operation,
                error = %error,
                "Registry unavailable, falling back to preview"
            );
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl SessionRegistry for FallbackRegistry {
    async fn get_session(&self, session_id: &SessionId) -> Result<SessionRecord, RegistryError> {
        match self.primary.get_session(session_id).await {
            Err(e) if Self::degrade("get_session", &e) => {
                self.preview.get_session(session_id).await
            }
            other => other,
        }
    }

    async fn verify_join(
        &self,
        session_id: &SessionId,
        participant_id: &UserId,
    ) -> Result<JoinVerification, RegistryError> {
        match self.primary.verify_join(session_id, participant_id).await {
            Err(e) if Self::degrade("verify_join", &e) => {
                self.preview.verify_join(session_id, participant_id).await
            }
            other => other,
        }
    }

    async fn join(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<ParticipantCredentials, RegistryError> {
        match self.primary.join(session_id, user_id).await {
            Err(e) if Self::degrade("join", &e) => self.preview.join(session_id, user_id).await,
            other => other,
        }
    }

    async fn complete(
        &self,
        session_id: &SessionId,
        host_id: &UserId,
    ) -> Result<(), RegistryError> {
        match self.primary.complete(session_id, host_id).await {
            Err(e) if Self::degrade("complete", &e) => {
                self.preview.complete(session_id, host_id).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::HttpRegistryClient;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn fallback_for(server: &MockServer) -> FallbackRegistry {
        let primary =
            HttpRegistryClient::new(server.uri(), None, Duration::from_millis(500)).unwrap();
        FallbackRegistry::new(Arc::new(primary), PreviewRegistry::default())
    }

    #[tokio::test]
    async fn test_server_error_falls_back_to_preview() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/sess-1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let registry = fallback_for(&server).await;
        let record = registry
            .get_session(&SessionId::from("sess-1"))
            .await
            .unwrap();
        assert_eq!(record.channel_ref, "preview-sess-1");
    }

    #[tokio::test]
    async fn test_rejection_is_not_masked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/sess-1/verify-join"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(serde_json::json!({"message": "nope"})),
            )
            .mount(&server)
            .await;

        let registry = fallback_for(&server).await;
        let err = registry
            .verify_join(&SessionId::from("sess-1"), &UserId::from("x"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Rejected {
                status: 403,
                message: "nope".to_string()
            }
        );
    }
}
