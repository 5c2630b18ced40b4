//! Session service error types.
//!
//! `JoinError` is the taxonomy surfaced to the host page. Internal details are
//! logged where the failure happens; `client_message()` is what the user sees.
//! `TeardownFault` is never surfaced: teardown logs and counts it, then moves on.

use thiserror::Error;

use crate::actors::ControllerState;

/// Errors surfaced by the join pipeline and the media session controller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    /// Join gate is closed (too early, ended, unpaid, wrong status).
    #[error("Eligibility denied: {reason}")]
    EligibilityDenied { reason: String },

    /// The registry refused the verify-join check.
    #[error("Join verification failed: {message}")]
    JoinVerificationFailed { message: String },

    /// Credentials could not be fetched or were malformed.
    #[error("Credential fetch failed: {message}")]
    CredentialFetchFailed { message: String },

    /// Microphone or camera could not be acquired (permission denied, device busy).
    #[error("Media acquisition failed: {message}")]
    MediaAcquisitionFailed { message: String },

    /// The transport rejected the channel join.
    #[error("Transport join failed: {message}")]
    TransportJoinFailed { message: String },

    /// The transport rejected publishing local tracks.
    #[error("Publish failed: {message}")]
    PublishFailed { message: String },

    /// Recording toggle from a guest, or recording disabled for this session.
    #[error("Recording not permitted")]
    RecordingNotPermitted,

    /// Operation not valid in the controller's current state.
    #[error("Invalid controller state: {state}")]
    InvalidState { state: ControllerState },

    /// A pending join was overtaken by leave or teardown.
    #[error("Join aborted")]
    JoinAborted,

    /// Actor mailbox or response channel failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JoinError {
    /// Whether the host page should offer a retry affordance.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JoinError::JoinVerificationFailed { .. }
                | JoinError::CredentialFetchFailed { .. }
                | JoinError::TransportJoinFailed { .. }
        )
    }

    /// Returns a bounded label string for the error variant (for metrics).
    #[must_use]
    pub fn error_type_label(&self) -> &'static str {
        match self {
            JoinError::EligibilityDenied { .. } => "eligibility_denied",
            JoinError::JoinVerificationFailed { .. } => "join_verification_failed",
            JoinError::CredentialFetchFailed { .. } => "credential_fetch_failed",
            JoinError::MediaAcquisitionFailed { .. } => "media_acquisition_failed",
            JoinError::TransportJoinFailed { .. } => "transport_join_failed",
            JoinError::PublishFailed { .. } => "publish_failed",
            JoinError::RecordingNotPermitted => "recording_not_permitted",
            JoinError::InvalidState { .. } => "invalid_state",
            JoinError::JoinAborted => "join_aborted",
            JoinError::Internal(_) => "internal",
        }
    }

    /// Returns a user-facing error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            JoinError::EligibilityDenied { reason } => reason.clone(),
            JoinError::JoinVerificationFailed { message }
            | JoinError::CredentialFetchFailed { message } => message.clone(),
            JoinError::MediaAcquisitionFailed { .. } => {
                "Could not access your microphone or camera".to_string()
            }
            JoinError::TransportJoinFailed { .. } | JoinError::PublishFailed { .. } => {
                "Could not connect to the session, please try again".to_string()
            }
            JoinError::RecordingNotPermitted => {
                "Recording is not available for this session".to_string()
            }
            JoinError::InvalidState { .. } | JoinError::JoinAborted => {
                "The session is no longer active".to_string()
            }
            JoinError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

/// A failed teardown step. Internal only: logged, counted, never returned.
#[derive(Debug, Error)]
#[error("Teardown fault during {step}: {message}")]
pub struct TeardownFault {
    /// Teardown step label (bounded, used as a metric label).
    pub step: &'static str,
    /// Underlying failure.
    pub message: String,
}
