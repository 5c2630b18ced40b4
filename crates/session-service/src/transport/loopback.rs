//! In-process loopback transport.
//!
//! Used by preview mode where there is no vendor SDK and no remote peer. Local
//! tracks are virtual devices; publishing echoes the published kinds back as a
//! single remote participant so the remote grid has something to render.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::{
    ChannelJoinParams, LocalTrack, LocalTrackRef, MediaKind, PreviewSurface, RealtimeTransport,
    TransportError, TransportEvent,
};
use crate::models::TransportUid;

/// Uid the echoed remote participant appears under.
pub const ECHO_PARTICIPANT_UID: TransportUid = TransportUid(u32::MAX);

/// Virtual capture device.
#[derive(Debug)]
pub struct LoopbackTrack {
    kind: MediaKind,
    enabled: AtomicBool,
    closed: AtomicBool,
}

impl LoopbackTrack {
    fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether capture is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Whether the device has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalTrack for LoopbackTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Track("track is closed".to_string()));
        }
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self, surface: &PreviewSurface) -> Result<(), TransportError> {
        debug!(
            target: "session.transport.loopback",
            kind = %self.kind,
            surface = %surface.0,
            "Rendering local track"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// In-process transport with an echoing remote peer.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn emit(&self, event: TransportEvent) {
        let events = self.events.lock().await;
        if let Some(sender) = events.as_ref() {
            // Receiver gone means the controller already tore down
            let _ = sender.send(event).await;
        }
    }
}

#[async_trait]
impl RealtimeTransport for LoopbackTransport {
    async fn join(
        &self,
        params: &ChannelJoinParams,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        debug!(
            target: "session.transport.loopback",
            channel = %params.channel,
            uid = %params.uid,
            "Joined loopback channel"
        );
        *self.events.lock().await = Some(events);
        Ok(())
    }

    async fn create_microphone_track(&self) -> Result<LocalTrackRef, TransportError> {
        Ok(Arc::new(LoopbackTrack::new(MediaKind::Audio)))
    }

    async fn create_camera_track(&self) -> Result<LocalTrackRef, TransportError> {
        Ok(Arc::new(LoopbackTrack::new(MediaKind::Video)))
    }

    async fn publish(&self, tracks: &[LocalTrackRef]) -> Result<(), TransportError> {
        for track in tracks {
            self.emit(TransportEvent::ParticipantPublished {
                participant_id: ECHO_PARTICIPANT_UID,
                kind: track.kind(),
            })
            .await;
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        _participant_id: TransportUid,
        _kind: MediaKind,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn leave(&self) -> Result<(), TransportError> {
        self.emit(TransportEvent::ParticipantLeft {
            participant_id: ECHO_PARTICIPANT_UID,
        })
        .await;
        *self.events.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::SecretString;

    fn params() -> ChannelJoinParams {
        ChannelJoinParams {
            app_id: "preview".to_string(),
            channel: "preview-channel".to_string(),
            token: SecretString::from("preview-token"),
            uid: TransportUid(7),
        }
    }

    #[tokio::test]
    async fn test_publish_echoes_remote_participant() {
        let transport = LoopbackTransport::new();
        let (tx, mut rx) = mpsc::channel(8);
        transport.join(&params(), tx).await.unwrap();

        let mic = transport.create_microphone_track().await.unwrap();
        let cam = transport.create_camera_track().await.unwrap();
        transport.publish(&[mic, cam]).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::ParticipantPublished {
                participant_id: ECHO_PARTICIPANT_UID,
                kind: MediaKind::Audio
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::ParticipantPublished {
                participant_id: ECHO_PARTICIPANT_UID,
                kind: MediaKind::Video
            })
        );

        transport.leave().await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::ParticipantLeft {
                participant_id: ECHO_PARTICIPANT_UID
            })
        );
        // Sender dropped on leave
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_closed_track_rejects_enable() {
        let track = LoopbackTrack::new(MediaKind::Video);
        track.set_enabled(false).await.unwrap();
        assert!(!track.is_enabled());

        track.close().await.unwrap();
        assert!(track.is_closed());
        assert!(track.set_enabled(true).await.is_err());
    }
}
