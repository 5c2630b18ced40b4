//! State owned by the media session actor.
//!
//! Nothing here is shared: the actor holds the only copy and hands out
//! [`SessionSnapshot`]s.

use std::collections::BTreeMap;
use std::fmt;

use crate::models::{ParticipantRole, TransportUid};
use crate::transport::{LocalTrackRef, MediaKind};

/// Lifecycle of one channel connection.
///
/// `Idle → Connecting → Joined → Leaving → Left`, with `Errored` reachable when
/// join, acquisition or publish rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Idle,
    Connecting,
    Joined,
    Leaving,
    Left,
    Errored,
}

impl ControllerState {
    /// Returns the state as a bounded string for logs and labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Connecting => "connecting",
            ControllerState::Joined => "joined",
            ControllerState::Leaving => "leaving",
            ControllerState::Left => "left",
            ControllerState::Errored => "errored",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote participant and the media kinds it currently publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub participant_id: TransportUid,
    pub has_audio: bool,
    pub has_video: bool,
}

impl RemoteParticipant {
    fn has(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.has_audio,
            MediaKind::Video => self.has_video,
        }
    }

    fn set(&mut self, kind: MediaKind, present: bool) {
        match kind {
            MediaKind::Audio => self.has_audio = present,
            MediaKind::Video => self.has_video = present,
        }
    }
}

/// Remote participants keyed by transport uid.
///
/// Every mutation is idempotent per `(participant, kind)`.
#[derive(Debug, Default)]
pub struct RemoteRoster {
    entries: BTreeMap<TransportUid, RemoteParticipant>,
}

impl RemoteRoster {
    /// Whether `participant_id` already publishes `kind`.
    #[must_use]
    pub fn has(&self, participant_id: TransportUid, kind: MediaKind) -> bool {
        self.entries
            .get(&participant_id)
            .is_some_and(|p| p.has(kind))
    }

    /// Record that `participant_id` publishes `kind`.
    ///
    /// Returns `false` if the pair was already present.
    pub fn publish(&mut self, participant_id: TransportUid, kind: MediaKind) -> bool {
        let entry = self
            .entries
            .entry(participant_id)
            .or_insert(RemoteParticipant {
                participant_id,
                has_audio: false,
                has_video: false,
            });
        if entry.has(kind) {
            return false;
        }
        entry.set(kind, true);
        true
    }

    /// Record that `participant_id` stopped publishing `kind`.
    ///
    /// The entry is dropped once it publishes nothing.
    pub fn unpublish(&mut self, participant_id: TransportUid, kind: MediaKind) {
        if let Some(entry) = self.entries.get_mut(&participant_id) {
            entry.set(kind, false);
            if !entry.has_audio && !entry.has_video {
                self.entries.remove(&participant_id);
            }
        }
    }

    /// Drop `participant_id` regardless of kind.
    pub fn remove(&mut self, participant_id: TransportUid) -> bool {
        self.entries.remove(&participant_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Participants in ascending uid order.
    #[must_use]
    pub fn participants(&self) -> Vec<RemoteParticipant> {
        self.entries.values().copied().collect()
    }
}

/// The caller's last-known enabled/disabled wish for each local device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaIntent {
    pub microphone: bool,
    pub camera: bool,
}

impl Default for MediaIntent {
    fn default() -> Self {
        Self {
            microphone: true,
            camera: true,
        }
    }
}

/// Resources acquired for one join attempt.
///
/// A track is `Some` only between successful acquisition and close.
#[derive(Debug, Default)]
pub struct LocalMedia {
    pub microphone: Option<LocalTrackRef>,
    pub camera: Option<LocalTrackRef>,
    pub channel_joined: bool,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ControllerState,
    /// `None` until credentials have been handed to `join`.
    pub role: Option<ParticipantRole>,
    pub intent: MediaIntent,
    pub microphone_acquired: bool,
    pub camera_acquired: bool,
    /// Local track acquisition has settled (success or failure).
    pub controls_ready: bool,
    pub recording_requested: bool,
    /// Host with recording enabled on the credentials.
    pub recording_available: bool,
    /// Ascending uid order.
    pub remote_participants: Vec<RemoteParticipant>,
}
