//! HTTP client for the session registry.
//!
//! # Security
//!
//! - The registry bearer token is stored as `SecretString` and never logged
//! - Issued access tokens are parsed straight into `SecretString`
//! - Failure bodies are logged at trace level only
//! - HTTP timeouts prevent hanging connections

use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::types::{SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

use super::{RegistryError, SessionRegistry};
use crate::models::{CredentialsPayload, JoinVerification, ParticipantCredentials, SessionRecord};

/// Connect timeout for the registry HTTP client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct FailureBody {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest<'a> {
    host_id: &'a str,
}

/// Session registry reached over HTTP.
pub struct HttpRegistryClient {
    base_url: String,
    token: Option<SecretString>,
    http_client: reqwest::Client,
}

impl HttpRegistryClient {
    /// Create a client for `base_url` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Unreachable` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            token,
            http_client,
        })
    }

    fn session_url(&self, session_id: &SessionId, suffix: &str) -> String {
        format!("{}/api/sessions/{}{}", self.base_url, session_id, suffix)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<reqwest::Response, RegistryError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            debug!(
                target: "session.registry",
                operation = operation,
                error = %e,
                "Registry request failed"
            );
            RegistryError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        trace!(
            target: "session.registry",
            operation = operation,
            body = %body,
            "Registry failure body"
        );

        if status == reqwest::StatusCode::NOT_FOUND && operation == "get_session" {
            return Err(RegistryError::NotFound(format!("status {status}")));
        }

        let message = serde_json::from_str::<FailureBody>(&body)
            .map(|b| b.message)
            .unwrap_or_default();
        warn!(
            target: "session.registry",
            operation = operation,
            status = %status,
            "Registry rejected request"
        );
        Err(RegistryError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<T, RegistryError> {
        response.json::<T>().await.map_err(|e| {
            warn!(
                target: "session.registry",
                operation = operation,
                error = %e,
                "Failed to parse registry response"
            );
            RegistryError::InvalidResponse(e.to_string())
        })
    }
}

#[async_trait]
impl SessionRegistry for HttpRegistryClient {
    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn get_session(&self, session_id: &SessionId) -> Result<SessionRecord, RegistryError> {
        let request = self.http_client.get(self.session_url(session_id, ""));
        let response = self.send(request, "get_session").await?;
        Self::parse(response, "get_session").await
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn verify_join(
        &self,
        session_id: &SessionId,
        participant_id: &UserId,
    ) -> Result<JoinVerification, RegistryError> {
        let request = self
            .http_client
            .get(self.session_url(session_id, "/verify-join"))
            .query(&[("participantId", participant_id.as_str())]);
        let response = self.send(request, "verify_join").await?;

        // Some registries answer with an empty 200
        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(JoinVerification::default());
        }
        serde_json::from_slice(&body).map_err(|e| RegistryError::InvalidResponse(e.to_string()))
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn join(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<ParticipantCredentials, RegistryError> {
        let request = self
            .http_client
            .post(self.session_url(session_id, "/join"))
            .json(&JoinRequest {
                user_id: user_id.as_str(),
            });
        let response = self.send(request, "join").await?;
        let payload: CredentialsPayload = Self::parse(response, "join").await?;

        let credentials = ParticipantCredentials::try_from(payload).map_err(|e| {
            warn!(target: "session.registry", error = %e, "Rejected incomplete credentials");
            RegistryError::IncompleteCredentials(e.client_message())
        })?;

        debug!(
            target: "session.registry",
            role = credentials.role.as_str(),
            recording_enabled = credentials.recording_enabled,
            "Join credentials issued"
        );
        Ok(credentials)
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn complete(
        &self,
        session_id: &SessionId,
        host_id: &UserId,
    ) -> Result<(), RegistryError> {
        let request = self
            .http_client
            .post(self.session_url(session_id, "/complete"))
            .json(&CompleteRequest {
                host_id: host_id.as_str(),
            });
        self.send(request, "complete").await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::models::{ParticipantRole, SessionStatus};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpRegistryClient {
        HttpRegistryClient::new(server.uri(), None, Duration::from_millis(500)).unwrap()
    }

    fn session_json() -> serde_json::Value {
        serde_json::json!({
            "id": "sess-1",
            "mentorId": "mentor-1",
            "counterpartyId": "mentee-1",
            "startTime": "2026-03-01T10:00:00Z",
            "endTime": "2026-03-01T11:00:00Z",
            "status": "scheduled",
            "paymentStatus": "paid",
            "channelRef": "chan-1"
        })
    }

    #[tokio::test]
    async fn test_get_session_parses_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/sess-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
            .mount(&server)
            .await;

        let record = client(&server)
            .get_session(&SessionId::from("sess-1"))
            .await
            .unwrap();

        assert_eq!(record.id.as_str(), "sess-1");
        assert_eq!(record.status, SessionStatus::Scheduled);
        assert_eq!(record.channel_ref, "chan-1");
        assert!(record.recording_url.is_none());
    }

    #[tokio::test]
    async fn test_get_session_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client(&server)
            .get_session(&SessionId::from("missing"))
            .await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/sess-1"))
            .and(header("authorization", "Bearer registry-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpRegistryClient::new(
            server.uri(),
            Some(SecretString::from("registry-secret")),
            Duration::from_millis(500),
        )
        .unwrap();
        client.get_session(&SessionId::from("sess-1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_join_surfaces_registry_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/sess-1/verify-join"))
            .and(query_param("participantId", "stranger"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"message": "You are not part of this session"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .verify_join(&SessionId::from("sess-1"), &UserId::from("stranger"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::Rejected {
                status: 403,
                message: "You are not part of this session".to_string()
            }
        );
        assert!(!err.is_network());
    }

    #[tokio::test]
    async fn test_verify_join_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/sess-1/verify-join"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let verification = client(&server)
            .verify_join(&SessionId::from("sess-1"), &UserId::from("mentee-1"))
            .await
            .unwrap();
        assert_eq!(verification, JoinVerification::default());
    }

    #[tokio::test]
    async fn test_verify_join_reads_meeting_ref() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/sess-1/verify-join"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"meetingRef": "room-42"})),
            )
            .mount(&server)
            .await;

        let verification = client(&server)
            .verify_join(&SessionId::from("sess-1"), &UserId::from("mentee-1"))
            .await
            .unwrap();
        assert_eq!(verification.meeting_ref.as_deref(), Some("room-42"));
    }

    #[tokio::test]
    async fn test_join_returns_validated_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sessions/sess-1/join"))
            .and(body_json(serde_json::json!({"userId": "mentor-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sessionId": "sess-1",
                "channelName": "mentoring-sess-1",
                "accessToken": "006abc",
                "participantId": 42,
                "role": "host",
                "recordingEnabled": true,
                "transportAppId": "app-1"
            })))
            .mount(&server)
            .await;

        let credentials = client(&server)
            .join(&SessionId::from("sess-1"), &UserId::from("mentor-1"))
            .await
            .unwrap();

        assert_eq!(credentials.role, ParticipantRole::Host);
        assert_eq!(credentials.participant_id, "42");
        assert!(credentials.can_record());
        assert_eq!(credentials.access_token.expose_secret(), "006abc");
    }

    #[tokio::test]
    async fn test_join_rejects_payload_missing_channel_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sessions/sess-1/join"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sessionId": "sess-1",
                "accessToken": "006abc",
                "participantId": "mentee-1",
                "role": "guest",
                "transportAppId": "app-1"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .join(&SessionId::from("sess-1"), &UserId::from("mentee-1"))
            .await
            .unwrap_err();

        match err {
            RegistryError::IncompleteCredentials(message) => {
                assert!(message.contains("channelName"), "got: {message}");
            }
            other => panic!("expected IncompleteCredentials, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_posts_host_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sessions/sess-1/complete"))
            .and(body_json(serde_json::json!({"hostId": "mentor-1"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .complete(&SessionId::from("sess-1"), &UserId::from("mentor-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_network_facing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sessions/sess-1/complete"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&SessionId::from("sess-1"), &UserId::from("mentor-1"))
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_unreachable_registry() {
        // Nothing listens on port 9 (discard) in the test environment
        let client = HttpRegistryClient::new(
            "http://127.0.0.1:9",
            None,
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client
            .get_session(&SessionId::from("sess-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unreachable(_)));
    }
}
