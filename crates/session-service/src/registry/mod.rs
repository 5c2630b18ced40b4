//! Session registry seam.
//!
//! The registry owns session records and issues join credentials. This crate
//! consumes four calls from it:
//!
//! - `GET session(id)` → [`SessionRecord`]
//! - `GET verify-join(sessionId, participantId)` → [`JoinVerification`] or a human message
//! - `POST join(sessionId, userId)` → [`ParticipantCredentials`]
//! - `POST complete(sessionId, hostId)` → acknowledgement (best-effort)
//!
//! # Modules
//!
//! - [`client`] - HTTP client for the registry
//! - [`preview`] - Registry stand-in for preview mode
//! - [`fallback`] - Degrades network failures of a primary registry to preview

pub mod client;
pub mod fallback;
pub mod preview;

use async_trait::async_trait;
use common::types::{SessionId, UserId};
use thiserror::Error;

use crate::models::{JoinVerification, ParticipantCredentials, SessionRecord};

pub use client::HttpRegistryClient;
pub use fallback::FallbackRegistry;
pub use preview::PreviewRegistry;

/// Errors returned by a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Request never produced a response (connect, timeout, DNS).
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    /// Registry answered with a failure; `message` is user-facing.
    #[error("registry rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Session does not exist.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Response body could not be parsed.
    #[error("invalid registry response: {0}")]
    InvalidResponse(String),

    /// Credentials payload parsed but a required field was missing or empty.
    #[error("incomplete credentials: {0}")]
    IncompleteCredentials(String),
}

impl RegistryError {
    /// Network-facing failures that preview fallback may absorb.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            RegistryError::Unreachable(_) => true,
            RegistryError::Rejected { status, .. } => *status >= 500,
            RegistryError::NotFound(_)
            | RegistryError::InvalidResponse(_)
            | RegistryError::IncompleteCredentials(_) => false,
        }
    }

    /// Message suitable for the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RegistryError::Rejected { message, .. } if !message.is_empty() => message.clone(),
            RegistryError::IncompleteCredentials(message) => message.clone(),
            RegistryError::NotFound(_) => "Session not found".to_string(),
            RegistryError::Unreachable(_) | RegistryError::Rejected { .. } => {
                "The session service is unavailable, please try again".to_string()
            }
            RegistryError::InvalidResponse(_) => {
                "The session service returned an unexpected response".to_string()
            }
        }
    }
}

/// Session registry operations (enables mocking).
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Fetch a session record.
    async fn get_session(&self, session_id: &SessionId) -> Result<SessionRecord, RegistryError>;

    /// Check that `participant_id` may join `session_id`.
    async fn verify_join(
        &self,
        session_id: &SessionId,
        participant_id: &UserId,
    ) -> Result<JoinVerification, RegistryError>;

    /// Issue credentials for one join attempt.
    ///
    /// Payloads missing a required field are rejected with
    /// [`RegistryError::IncompleteCredentials`] naming the field.
    async fn join(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<ParticipantCredentials, RegistryError>;

    /// Mark the session completed.
    async fn complete(&self, session_id: &SessionId, host_id: &UserId)
        -> Result<(), RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_classification() {
        assert!(RegistryError::Unreachable("timeout".to_string()).is_network());
        assert!(RegistryError::Rejected {
            status: 503,
            message: String::new()
        }
        .is_network());
        assert!(!RegistryError::Rejected {
            status: 403,
            message: "not a participant".to_string()
        }
        .is_network());
        assert!(!RegistryError::NotFound("s".to_string()).is_network());
    }

    #[test]
    fn test_user_message_prefers_registry_text() {
        let err = RegistryError::Rejected {
            status: 403,
            message: "You are not part of this session".to_string(),
        };
        assert_eq!(err.user_message(), "You are not part of this session");

        let err = RegistryError::Unreachable("connection refused 10.1.2.3".to_string());
        assert!(!err.user_message().contains("10.1.2.3"));
    }
}
