//! In-memory session registry.
//!
//! # Example
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! let registry = MockRegistry::new()
//!     .with_session(TestSession::new("sess-1").build())
//!     .with_credentials(TestCredentials::host("sess-1").build());
//!
//! registry.fail_verify(RegistryError::Rejected {
//!     status: 403,
//!     message: "You are not a participant of this session".into(),
//! });
//! ```

use async_trait::async_trait;
use common::types::{SessionId, UserId};
use session_service::models::{JoinVerification, ParticipantCredentials, SessionRecord};
use session_service::registry::{RegistryError, SessionRegistry};
use std::collections::HashMap;
use std::sync::Mutex;

/// A call the registry received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    GetSession(SessionId),
    VerifyJoin(SessionId, UserId),
    Join(SessionId, UserId),
    Complete(SessionId, UserId),
}

#[derive(Debug, Default)]
struct MockRegistryInner {
    sessions: HashMap<SessionId, SessionRecord>,
    credentials: HashMap<SessionId, ParticipantCredentials>,
    get_failure: Option<RegistryError>,
    verify_failure: Option<RegistryError>,
    join_failure: Option<RegistryError>,
    complete_failure: Option<RegistryError>,
    calls: Vec<RegistryCall>,
}

/// Mock registry backed by in-memory maps.
#[derive(Debug, Default)]
pub struct MockRegistry {
    inner: Mutex<MockRegistryInner>,
}

impl MockRegistry {
    /// Create an empty registry. Unknown sessions are `NotFound`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session record.
    #[must_use]
    pub fn with_session(self, record: SessionRecord) -> Self {
        self.put_session(record);
        self
    }

    /// Add credentials issued for their session.
    #[must_use]
    pub fn with_credentials(self, credentials: ParticipantCredentials) -> Self {
        self.inner
            .lock()
            .unwrap()
            .credentials
            .insert(credentials.session_id.clone(), credentials);
        self
    }

    /// Replace a session record (simulates a registry-side update).
    pub fn put_session(&self, record: SessionRecord) {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(record.id.clone(), record);
    }

    pub fn fail_get_session(&self, error: RegistryError) {
        self.inner.lock().unwrap().get_failure = Some(error);
    }

    pub fn fail_verify(&self, error: RegistryError) {
        self.inner.lock().unwrap().verify_failure = Some(error);
    }

    pub fn fail_join(&self, error: RegistryError) {
        self.inner.lock().unwrap().join_failure = Some(error);
    }

    pub fn fail_complete(&self, error: RegistryError) {
        self.inner.lock().unwrap().complete_failure = Some(error);
    }

    /// Clear every injected failure.
    pub fn heal(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.get_failure = None;
        inner.verify_failure = None;
        inner.join_failure = None;
        inner.complete_failure = None;
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Completion calls so far.
    pub fn completions(&self) -> Vec<(SessionId, UserId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RegistryCall::Complete(session_id, host_id) => Some((session_id, host_id)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SessionRegistry for MockRegistry {
    async fn get_session(&self, session_id: &SessionId) -> Result<SessionRecord, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RegistryCall::GetSession(session_id.clone()));
        if let Some(error) = inner.get_failure.clone() {
            return Err(error);
        }
        inner
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(session_id.to_string()))
    }

    async fn verify_join(
        &self,
        session_id: &SessionId,
        participant_id: &UserId,
    ) -> Result<JoinVerification, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RegistryCall::VerifyJoin(
            session_id.clone(),
            participant_id.clone(),
        ));
        match inner.verify_failure.clone() {
            Some(error) => Err(error),
            None => Ok(JoinVerification::default()),
        }
    }

    async fn join(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<ParticipantCredentials, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(RegistryCall::Join(session_id.clone(), user_id.clone()));
        if let Some(error) = inner.join_failure.clone() {
            return Err(error);
        }
        inner
            .credentials
            .get(session_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(session_id.to_string()))
    }

    async fn complete(&self, session_id: &SessionId, host_id: &UserId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(RegistryCall::Complete(session_id.clone(), host_id.clone()));
        match inner.complete_failure.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
