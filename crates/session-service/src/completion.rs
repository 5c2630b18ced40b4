//! Session completion trigger.
//!
//! When the host explicitly leaves, the registry is told the session is
//! completed. The request is fire-and-forget: it never blocks the leave, is
//! never retried, and its failure is only logged.

use common::types::{SessionId, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::observability::metrics;
use crate::registry::SessionRegistry;

/// Requests session completion from the registry.
#[derive(Clone)]
pub struct CompletionTrigger {
    registry: Arc<dyn SessionRegistry>,
}

impl CompletionTrigger {
    #[must_use]
    pub fn new(registry: Arc<dyn SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Send the completion request in the background.
    ///
    /// The returned handle resolves once the request has settled; callers may
    /// drop it.
    pub fn fire(&self, session_id: SessionId, host_id: UserId) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            match registry.complete(&session_id, &host_id).await {
                Ok(()) => {
                    info!(
                        target: "session.completion",
                        session_id = %session_id,
                        "Session marked completed"
                    );
                    metrics::record_completion_request("success");
                }
                Err(e) => {
                    warn!(
                        target: "session.completion",
                        session_id = %session_id,
                        error = %e,
                        "Session completion request failed"
                    );
                    metrics::record_completion_request("error");
                }
            }
        })
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

    #[tokio::test]
    async fn test_fire_sends_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sessions/sess-1/complete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let registry =
            HttpRegistryClient::new(server.uri(), None, Duration::from_millis(500)).unwrap();
        let trigger = CompletionTrigger::new(Arc::new(registry));

        trigger
            .fire(SessionId::from("sess-1"), UserId::from("mentor-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sessions/sess-1/complete"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let registry =
            HttpRegistryClient::new(server.uri(), None, Duration::from_millis(500)).unwrap();
        let trigger = CompletionTrigger::new(Arc::new(registry));

        // Settles without surfacing the failure
        trigger
            .fire(SessionId::from("sess-1"), UserId::from("mentor-1"))
            .await
            .unwrap();
    }
}
