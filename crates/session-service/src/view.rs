//! View models exposed to the host page.
//!
//! Pure projections of countdown and controller state. The host page renders
//! these; it never derives time math or media state itself.

use serde::Serialize;

use crate::actors::{ControllerState, SessionSnapshot};
use crate::countdown::CountdownView;
use crate::errors::JoinError;
use crate::models::{ParticipantRole, TransportUid};

/// The join affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGate {
    pub enabled: bool,
    pub reason: String,
    /// Live "you can join in" text, present only while waiting.
    pub countdown: Option<String>,
}

impl From<&CountdownView> for JoinGate {
    fn from(view: &CountdownView) -> Self {
        Self {
            enabled: view.eligibility.can_join,
            reason: view.eligibility.reason.clone(),
            countdown: view.countdown.clone(),
        }
    }
}

/// A local device as the control bar shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceControl {
    /// Never acquired (guest, or acquisition failed).
    Unavailable,
    On,
    Off,
}

impl DeviceControl {
    fn from_parts(acquired: bool, enabled: bool) -> Self {
        match (acquired, enabled) {
            (false, _) => DeviceControl::Unavailable,
            (true, true) => DeviceControl::On,
            (true, false) => DeviceControl::Off,
        }
    }
}

/// Mic, camera, record and leave controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlBar {
    /// Toggles accept input only once local acquisition has settled.
    pub interactive: bool,
    pub microphone: DeviceControl,
    pub camera: DeviceControl,
    /// `None` hides the record toggle; otherwise the requested flag.
    pub recording: Option<bool>,
    /// Leaving is always possible.
    pub can_leave: bool,
}

impl ControlBar {
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let interactive = snapshot.controls_ready
            && snapshot.state == ControllerState::Joined
            && snapshot.role == Some(ParticipantRole::Host);

        Self {
            interactive,
            microphone: DeviceControl::from_parts(
                snapshot.microphone_acquired,
                snapshot.intent.microphone,
            ),
            camera: DeviceControl::from_parts(snapshot.camera_acquired, snapshot.intent.camera),
            recording: snapshot
                .recording_available
                .then_some(snapshot.recording_requested),
            can_leave: true,
        }
    }
}

/// Remote participants as rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGrid {
    /// Participants with video, ascending uid order.
    pub tiles: Vec<TransportUid>,
    /// Participants heard but not seen.
    pub audio_only: Vec<TransportUid>,
}

impl RemoteGrid {
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let mut grid = Self::default();
        for participant in &snapshot.remote_participants {
            if participant.has_video {
                grid.tiles.push(participant.participant_id);
            } else if participant.has_audio {
                grid.audio_only.push(participant.participant_id);
            }
        }
        grid
    }
}

/// What the session page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum LobbyView {
    /// Join gate closed.
    Waiting { gate: JoinGate },
    /// Join gate open.
    Ready { gate: JoinGate },
    /// Connecting or joined.
    InSession {
        state: String,
        controls: ControlBar,
        grid: RemoteGrid,
    },
    /// Replaces the primary view; the page offers a "back" action.
    Failed { message: String, retryable: bool },
}

impl LobbyView {
    #[must_use]
    pub fn gate(view: &CountdownView) -> Self {
        let gate = JoinGate::from(view);
        if gate.enabled {
            LobbyView::Ready { gate }
        } else {
            LobbyView::Waiting { gate }
        }
    }

    #[must_use]
    pub fn in_session(snapshot: &SessionSnapshot) -> Self {
        LobbyView::InSession {
            state: snapshot.state.to_string(),
            controls: ControlBar::from_snapshot(snapshot),
            grid: RemoteGrid::from_snapshot(snapshot),
        }
    }

    #[must_use]
    pub fn failed(error: &JoinError) -> Self {
        LobbyView::Failed {
            message: error.client_message(),
            retryable: error.is_retryable(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::actors::{MediaIntent, RemoteParticipant};

    fn snapshot(role: ParticipantRole) -> SessionSnapshot {
        SessionSnapshot {
            state: ControllerState::Joined,
            role: Some(role),
            intent: MediaIntent::default(),
            microphone_acquired: role == ParticipantRole::Host,
            camera_acquired: role == ParticipantRole::Host,
            controls_ready: true,
            recording_requested: false,
            recording_available: role == ParticipantRole::Host,
            remote_participants: vec![
                RemoteParticipant {
                    participant_id: TransportUid(3),
                    has_audio: true,
                    has_video: false,
                },
                RemoteParticipant {
                    participant_id: TransportUid(5),
                    has_audio: true,
                    has_video: true,
                },
            ],
        }
    }

    #[test]
    fn test_host_control_bar() {
        let mut snap = snapshot(ParticipantRole::Host);
        snap.intent.camera = false;

        let bar = ControlBar::from_snapshot(&snap);
        assert!(bar.interactive);
        assert_eq!(bar.microphone, DeviceControl::On);
        assert_eq!(bar.camera, DeviceControl::Off);
        assert_eq!(bar.recording, Some(false));
        assert!(bar.can_leave);
    }

    #[test]
    fn test_guest_control_bar_hides_devices_and_recording() {
        let bar = ControlBar::from_snapshot(&snapshot(ParticipantRole::Guest));
        assert!(!bar.interactive);
        assert_eq!(bar.microphone, DeviceControl::Unavailable);
        assert_eq!(bar.camera, DeviceControl::Unavailable);
        assert_eq!(bar.recording, None);
        assert!(bar.can_leave);
    }

    #[test]
    fn test_controls_not_interactive_until_acquisition_settles() {
        let mut snap = snapshot(ParticipantRole::Host);
        snap.state = ControllerState::Connecting;
        snap.controls_ready = false;
        assert!(!ControlBar::from_snapshot(&snap).interactive);
    }

    #[test]
    fn test_grid_separates_video_from_audio_only() {
        let grid = RemoteGrid::from_snapshot(&snapshot(ParticipantRole::Guest));
        assert_eq!(grid.tiles, vec![TransportUid(5)]);
        assert_eq!(grid.audio_only, vec![TransportUid(3)]);
    }

    #[test]
    fn test_failed_view_carries_retry_affordance() {
        let view = LobbyView::failed(&JoinError::TransportJoinFailed {
            message: "dial tcp 10.0.0.1: timeout".to_string(),
        });
        match view {
            LobbyView::Failed { message, retryable } => {
                assert!(retryable);
                assert!(!message.contains("10.0.0.1"));
            }
            other => unreachable!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn test_view_serializes_with_tag() {
        let view = LobbyView::Failed {
            message: "payment not confirmed".to_string(),
            retryable: false,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["view"], "failed");
        assert_eq!(json["retryable"], false);
    }
}
