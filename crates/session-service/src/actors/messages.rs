//! Message types for the media session actor.
//!
//! Request-reply uses `tokio::sync::oneshot`.

use common::types::UserId;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::state::{ControllerState, LocalMedia, MediaIntent, SessionSnapshot};
use crate::errors::JoinError;
use crate::models::ParticipantCredentials;

/// Why the controller is being left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// The user pressed leave. Completes the session for a host.
    Explicit,
    /// The owning page or process is going away.
    Teardown,
    /// A terminal error upstream.
    Error,
}

impl LeaveReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::Explicit => "explicit",
            LeaveReason::Teardown => "teardown",
            LeaveReason::Error => "error",
        }
    }
}

/// Result of a leave request.
#[derive(Debug)]
pub struct LeaveSummary {
    /// State the controller was in when the leave arrived.
    pub previous_state: ControllerState,
    /// Teardown steps that failed (logged and counted, never surfaced).
    pub teardown_faults: usize,
    /// Completion request, when one was fired.
    pub completion: Option<JoinHandle<()>>,
}

/// Messages sent to the media session actor.
#[derive(Debug)]
pub enum MediaSessionMessage {
    /// Join the channel described by `credentials` as `user_id`.
    Join {
        user_id: UserId,
        credentials: ParticipantCredentials,
        /// Answered once the join settles or is aborted.
        respond_to: oneshot::Sender<Result<SessionSnapshot, JoinError>>,
    },

    /// Flip the microphone intent. Answers with the new intent.
    ToggleMic { respond_to: oneshot::Sender<bool> },

    /// Flip the camera intent. Answers with the new intent.
    ToggleCamera { respond_to: oneshot::Sender<bool> },

    /// Flip "recording requested". Answers with the new flag.
    ToggleRecording {
        respond_to: oneshot::Sender<Result<bool, JoinError>>,
    },

    /// Tear down and leave.
    Leave {
        reason: LeaveReason,
        respond_to: oneshot::Sender<LeaveSummary>,
    },

    /// Read the current state.
    GetSnapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

/// Internal: a join attempt finished its transport calls.
#[derive(Debug)]
pub(crate) struct JoinSettled {
    /// Attempt generation the task was started for.
    pub attempt: u64,
    /// Whatever was acquired before success or failure.
    pub media: LocalMedia,
    /// Intent applied to the acquired tracks.
    pub applied: MediaIntent,
    pub result: Result<(), JoinError>,
}
