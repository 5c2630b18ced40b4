//! Real-time transport seam.
//!
//! The vendor audio/video SDK is an opaque boundary. The controller talks to it
//! only through [`RealtimeTransport`] and [`LocalTrack`], and receives its
//! callbacks as a typed, ordered stream of [`TransportEvent`]s on the channel it
//! hands to [`RealtimeTransport::join`].
//!
//! - [`loopback`] - In-process transport used by preview mode

pub mod loopback;

use async_trait::async_trait;
use common::secret::SecretString;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::TransportUid;

pub use loopback::LoopbackTransport;

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Returns the kind as a bounded string for labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound signal from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A remote participant published a track of `kind`.
    ParticipantPublished {
        participant_id: TransportUid,
        kind: MediaKind,
    },
    /// A remote participant stopped publishing a track of `kind`.
    ParticipantUnpublished {
        participant_id: TransportUid,
        kind: MediaKind,
    },
    /// A remote participant left the channel.
    ParticipantLeft { participant_id: TransportUid },
}

impl TransportEvent {
    /// Returns the event type as a bounded string for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportEvent::ParticipantPublished { .. } => "participant_published",
            TransportEvent::ParticipantUnpublished { .. } => "participant_unpublished",
            TransportEvent::ParticipantLeft { .. } => "participant_left",
        }
    }
}

/// Parameters for joining a channel.
#[derive(Debug, Clone)]
pub struct ChannelJoinParams {
    pub app_id: String,
    pub channel: String,
    /// Redacted in Debug.
    pub token: SecretString,
    pub uid: TransportUid,
}

/// Surface a local video track renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSurface(pub String);

impl PreviewSurface {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Errors reported by the transport SDK.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Channel join rejected (bad token, network).
    #[error("join rejected: {0}")]
    Join(String),

    /// User denied device permission.
    #[error("device permission denied: {0}")]
    PermissionDenied(String),

    /// Device busy or missing.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Publish rejected.
    #[error("publish rejected: {0}")]
    Publish(String),

    /// Subscribe rejected.
    #[error("subscribe rejected: {0}")]
    Subscribe(String),

    /// Operation on a track failed (enable, play, close).
    #[error("track operation failed: {0}")]
    Track(String),

    /// Leave failed.
    #[error("leave failed: {0}")]
    Leave(String),
}

/// A local microphone or camera track.
#[async_trait]
pub trait LocalTrack: Send + Sync + fmt::Debug {
    /// Audio for microphones, video for cameras.
    fn kind(&self) -> MediaKind;

    /// Enable or disable capture without releasing the device.
    async fn set_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    /// Render into a local surface.
    fn play(&self, surface: &PreviewSurface) -> Result<(), TransportError>;

    /// Release the device.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Shared handle to a local track.
pub type LocalTrackRef = Arc<dyn LocalTrack>;

/// Builds a fresh transport client for each media session.
pub type TransportFactory = Arc<dyn Fn() -> Arc<dyn RealtimeTransport> + Send + Sync>;

/// The real-time transport client for one channel connection.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Join the channel. Inbound signals are delivered on `events` from this
    /// point until [`RealtimeTransport::leave`].
    async fn join(
        &self,
        params: &ChannelJoinParams,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError>;

    /// Acquire the microphone. May wait on a permission prompt.
    async fn create_microphone_track(&self) -> Result<LocalTrackRef, TransportError>;

    /// Acquire the camera. May wait on a permission prompt.
    async fn create_camera_track(&self) -> Result<LocalTrackRef, TransportError>;

    /// Publish local tracks to the channel.
    async fn publish(&self, tracks: &[LocalTrackRef]) -> Result<(), TransportError>;

    /// Subscribe to one media kind of a remote participant.
    async fn subscribe(
        &self,
        participant_id: TransportUid,
        kind: MediaKind,
    ) -> Result<(), TransportError>;

    /// Leave the channel.
    async fn leave(&self) -> Result<(), TransportError>;
}
