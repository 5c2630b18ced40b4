//! Scriptable real-time transport.
//!
//! Records every call (including calls on the tracks it hands out), injects
//! failures per operation, can hold a join or the microphone prompt
//! outstanding until released, and
//! pushes transport events into the controller through the sender captured at
//! join.
//!
//! # Example
//!
//! ```rust,ignore
//! use session_test_utils::MockTransport;
//!
//! let transport = Arc::new(MockTransport::new());
//! let release = transport.hold_join();
//!
//! // join from a task, then:
//! transport.join_started().await;
//! handle.leave(LeaveReason::Explicit).await?;
//! release.release();
//! ```

use async_trait::async_trait;
use session_service::models::TransportUid;
use session_service::transport::{
    ChannelJoinParams, LocalTrack, LocalTrackRef, MediaKind, PreviewSurface, RealtimeTransport,
    TransportError, TransportEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Notify};

/// A call the transport (or one of its tracks) received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Join { channel: String, uid: TransportUid },
    CreateMicrophone,
    CreateCamera,
    SetEnabled { kind: MediaKind, enabled: bool },
    Play { kind: MediaKind },
    Publish(Vec<MediaKind>),
    Subscribe { participant_id: TransportUid, kind: MediaKind },
    Close { kind: MediaKind },
    Leave,
}

type CallLog = Arc<Mutex<Vec<TransportCall>>>;

/// A virtual capture device handed out by [`MockTransport`].
#[derive(Debug)]
pub struct MockTrack {
    kind: MediaKind,
    enabled: AtomicBool,
    closed: AtomicBool,
    close_failure: Option<TransportError>,
    calls: CallLog,
}

impl MockTrack {
    fn new(kind: MediaKind, close_failure: Option<TransportError>, calls: CallLog) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            close_failure,
            calls,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalTrack for MockTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(TransportCall::SetEnabled {
            kind: self.kind,
            enabled,
        });
        if self.is_closed() {
            return Err(TransportError::Track("track is closed".to_string()));
        }
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self, _surface: &PreviewSurface) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Play { kind: self.kind });
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Close { kind: self.kind });
        self.closed.store(true, Ordering::SeqCst);
        match self.close_failure.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct Failures {
    join: Option<TransportError>,
    microphone: Option<TransportError>,
    camera: Option<TransportError>,
    publish: Option<TransportError>,
    subscribe: Option<TransportError>,
    track_close: Option<TransportError>,
    leave: Option<TransportError>,
}

/// Releases a call held by [`MockTransport::hold_join`] or
/// [`MockTransport::hold_microphone`].
#[derive(Debug)]
pub struct HoldRelease(oneshot::Sender<()>);

impl HoldRelease {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

/// Mock transport for controller tests.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: CallLog,
    failures: Mutex<Failures>,
    join_hold: Mutex<Option<oneshot::Receiver<()>>>,
    join_started: Notify,
    microphone_hold: Mutex<Option<oneshot::Receiver<()>>>,
    microphone_requested: Notify,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    microphone: Mutex<Option<Arc<MockTrack>>>,
    camera: Mutex<Option<Arc<MockTrack>>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_join(&self, error: TransportError) {
        self.failures.lock().unwrap().join = Some(error);
    }

    pub fn fail_microphone(&self, error: TransportError) {
        self.failures.lock().unwrap().microphone = Some(error);
    }

    pub fn fail_camera(&self, error: TransportError) {
        self.failures.lock().unwrap().camera = Some(error);
    }

    pub fn fail_publish(&self, error: TransportError) {
        self.failures.lock().unwrap().publish = Some(error);
    }

    pub fn fail_subscribe(&self, error: TransportError) {
        self.failures.lock().unwrap().subscribe = Some(error);
    }

    /// Tracks created from now on fail to close.
    pub fn fail_track_close(&self, error: TransportError) {
        self.failures.lock().unwrap().track_close = Some(error);
    }

    pub fn fail_leave(&self, error: TransportError) {
        self.failures.lock().unwrap().leave = Some(error);
    }

    /// Make the next join wait until the returned release is used (or dropped).
    #[must_use]
    pub fn hold_join(&self) -> HoldRelease {
        let (tx, rx) = oneshot::channel();
        *self.join_hold.lock().unwrap() = Some(rx);
        HoldRelease(tx)
    }

    /// Make the next microphone acquisition wait, like an open permission
    /// prompt, until the returned release is used (or dropped).
    #[must_use]
    pub fn hold_microphone(&self) -> HoldRelease {
        let (tx, rx) = oneshot::channel();
        *self.microphone_hold.lock().unwrap() = Some(rx);
        HoldRelease(tx)
    }

    /// Resolves once a microphone acquisition has been requested.
    pub async fn microphone_requested(&self) {
        self.microphone_requested.notified().await;
    }

    /// Resolves once a join call has been made.
    pub async fn join_started(&self) {
        self.join_started.notified().await;
    }

    /// Deliver an event to the joined controller. Returns `false` if nobody is
    /// listening.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        let sender = self.events.lock().unwrap().clone();
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    /// The last microphone track created.
    pub fn microphone(&self) -> Option<Arc<MockTrack>> {
        self.microphone.lock().unwrap().clone()
    }

    /// The last camera track created.
    pub fn camera(&self) -> Option<Arc<MockTrack>> {
        self.camera.lock().unwrap().clone()
    }

    fn log(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn create_track(
        &self,
        kind: MediaKind,
        failure: Option<TransportError>,
        slot: &Mutex<Option<Arc<MockTrack>>>,
    ) -> Result<LocalTrackRef, TransportError> {
        if let Some(error) = failure {
            return Err(error);
        }
        let close_failure = self.failures.lock().unwrap().track_close.clone();
        let track = Arc::new(MockTrack::new(kind, close_failure, Arc::clone(&self.calls)));
        *slot.lock().unwrap() = Some(Arc::clone(&track));
        Ok(track as LocalTrackRef)
    }
}

#[async_trait]
impl RealtimeTransport for MockTransport {
    async fn join(
        &self,
        params: &ChannelJoinParams,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        self.log(TransportCall::Join {
            channel: params.channel.clone(),
            uid: params.uid,
        });
        self.join_started.notify_one();

        let hold = self.join_hold.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }

        if let Some(error) = self.failures.lock().unwrap().join.clone() {
            return Err(error);
        }
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn create_microphone_track(&self) -> Result<LocalTrackRef, TransportError> {
        self.log(TransportCall::CreateMicrophone);
        self.microphone_requested.notify_one();

        let hold = self.microphone_hold.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }

        let failure = self.failures.lock().unwrap().microphone.clone();
        self.create_track(MediaKind::Audio, failure, &self.microphone)
    }

    async fn create_camera_track(&self) -> Result<LocalTrackRef, TransportError> {
        self.log(TransportCall::CreateCamera);
        let failure = self.failures.lock().unwrap().camera.clone();
        self.create_track(MediaKind::Video, failure, &self.camera)
    }

    async fn publish(&self, tracks: &[LocalTrackRef]) -> Result<(), TransportError> {
        self.log(TransportCall::Publish(
            tracks.iter().map(|track| track.kind()).collect(),
        ));
        match self.failures.lock().unwrap().publish.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn subscribe(
        &self,
        participant_id: TransportUid,
        kind: MediaKind,
    ) -> Result<(), TransportError> {
        self.log(TransportCall::Subscribe {
            participant_id,
            kind,
        });
        match self.failures.lock().unwrap().subscribe.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn leave(&self) -> Result<(), TransportError> {
        self.log(TransportCall::Leave);
        *self.events.lock().unwrap() = None;
        match self.failures.lock().unwrap().leave.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
