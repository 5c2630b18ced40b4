//! Recording service seam.
//!
//! Starting and stopping a recording is the job of an external recording
//! service. The controller only tracks "recording requested" and notifies the
//! service when that flag flips; it never waits on the service to decide state.

use async_trait::async_trait;
use common::types::SessionId;
use thiserror::Error;
use tracing::info;

/// Errors reported by the recording service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordingError {
    #[error("recording service unavailable: {0}")]
    Unavailable(String),

    #[error("recording request rejected: {0}")]
    Rejected(String),
}

/// External recording service notified by the controller.
#[async_trait]
pub trait RecordingService: Send + Sync {
    /// Recording was requested for `channel`.
    async fn start(&self, session_id: &SessionId, channel: &str) -> Result<(), RecordingError>;

    /// Recording is no longer requested for `channel`.
    async fn stop(&self, session_id: &SessionId, channel: &str) -> Result<(), RecordingError>;
}

/// Recording service that only logs notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRecorder;

#[async_trait]
impl RecordingService for LoggingRecorder {
    async fn start(&self, session_id: &SessionId, channel: &str) -> Result<(), RecordingError> {
        info!(
            target: "session.recording",
            session_id = %session_id,
            channel = %channel,
            "Recording start requested"
        );
        Ok(())
    }

    async fn stop(&self, session_id: &SessionId, channel: &str) -> Result<(), RecordingError> {
        info!(
            target: "session.recording",
            session_id = %session_id,
            channel = %channel,
            "Recording stop requested"
        );
        Ok(())
    }
}
