//! `MediaSessionActor` - owns one real-time channel connection.
//!
//! Each actor:
//! - Joins at most once (from `Idle`)
//! - Acquires and publishes local tracks for a host, nothing for a guest
//! - Applies transport events one at a time against the remote roster
//! - Tears down on leave, on cancellation, and on any join failure
//!
//! # Lifecycle
//!
//! 1. Spawned idle; the caller sets mic/camera intent freely
//! 2. `join` moves to `Connecting` and hands the transport calls to a task
//! 3. The task reports back through the settle channel; the actor moves to
//!    `Joined` or `Errored`
//! 4. `leave` (or cancellation) runs teardown and moves to `Left`
//!
//! Leaving cancels the attempt's token, so the join task stops before its next
//! acquisition or publish. A settle that arrives for an old attempt, or after
//! the actor left `Connecting`, only releases what it acquired. If the actor
//! has already exited, the join task releases its own resources.

use common::types::{SessionId, UserId};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::messages::{JoinSettled, LeaveReason, LeaveSummary, MediaSessionMessage};
use super::state::{ControllerState, LocalMedia, MediaIntent, RemoteRoster, SessionSnapshot};
use crate::completion::CompletionTrigger;
use crate::errors::{JoinError, TeardownFault};
use crate::models::{ParticipantCredentials, ParticipantRole};
use crate::observability::metrics;
use crate::recording::RecordingService;
use crate::transport::{
    ChannelJoinParams, LocalTrackRef, PreviewSurface, RealtimeTransport, TransportError,
    TransportEvent,
};

/// Mailbox buffer size.
const MEDIA_SESSION_CHANNEL_BUFFER: usize = 32;

/// Transport event buffer size.
const TRANSPORT_EVENT_BUFFER: usize = 64;

/// Collaborators of one media session.
#[derive(Clone)]
pub struct MediaSessionDeps {
    pub transport: Arc<dyn RealtimeTransport>,
    pub recorder: Arc<dyn RecordingService>,
    pub completion: CompletionTrigger,
    pub preview_surface: PreviewSurface,
}

/// Handle to a `MediaSessionActor`.
#[derive(Clone, Debug)]
pub struct MediaSessionHandle {
    sender: mpsc::Sender<MediaSessionMessage>,
    cancel_token: CancellationToken,
    state_rx: watch::Receiver<ControllerState>,
}

impl MediaSessionHandle {
    async fn request<T>(
        &self,
        message: MediaSessionMessage,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, JoinError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| JoinError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JoinError::Internal(format!("response receive failed: {e}")))
    }

    /// Join the channel. Resolves once media is published (host) or the
    /// channel is joined (guest).
    ///
    /// # Errors
    ///
    /// `InvalidState` unless idle, `JoinAborted` if left while connecting,
    /// otherwise the failing stage's variant.
    pub async fn join(
        &self,
        user_id: UserId,
        credentials: ParticipantCredentials,
    ) -> Result<SessionSnapshot, JoinError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            MediaSessionMessage::Join {
                user_id,
                credentials,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Flip the microphone intent; returns the new intent.
    ///
    /// # Errors
    ///
    /// `Internal` if the actor is gone.
    pub async fn toggle_mic(&self) -> Result<bool, JoinError> {
        let (tx, rx) = oneshot::channel();
        self.request(MediaSessionMessage::ToggleMic { respond_to: tx }, rx)
            .await
    }

    /// Flip the camera intent; returns the new intent.
    ///
    /// # Errors
    ///
    /// `Internal` if the actor is gone.
    pub async fn toggle_camera(&self) -> Result<bool, JoinError> {
        let (tx, rx) = oneshot::channel();
        self.request(MediaSessionMessage::ToggleCamera { respond_to: tx }, rx)
            .await
    }

    /// Flip "recording requested"; returns the new flag.
    ///
    /// # Errors
    ///
    /// `RecordingNotPermitted` unless host with recording enabled,
    /// `InvalidState` unless joined.
    pub async fn toggle_recording(&self) -> Result<bool, JoinError> {
        let (tx, rx) = oneshot::channel();
        self.request(MediaSessionMessage::ToggleRecording { respond_to: tx }, rx)
            .await?
    }

    /// Tear down and leave. A second leave is a no-op.
    ///
    /// # Errors
    ///
    /// `Internal` if the actor is gone.
    pub async fn leave(&self, reason: LeaveReason) -> Result<LeaveSummary, JoinError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            MediaSessionMessage::Leave {
                reason,
                respond_to: tx,
            },
            rx,
        )
        .await
    }

    /// Current state of the controller.
    ///
    /// # Errors
    ///
    /// `Internal` if the actor is gone.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, JoinError> {
        let (tx, rx) = oneshot::channel();
        self.request(MediaSessionMessage::GetSnapshot { respond_to: tx }, rx)
            .await
    }

    /// Watch state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ControllerState> {
        self.state_rx.clone()
    }

    /// Last published state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        *self.state_rx.borrow()
    }

    /// Cancel the actor. Teardown runs before it exits.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

struct PendingJoin {
    respond_to: oneshot::Sender<Result<SessionSnapshot, JoinError>>,
    started: Instant,
}

/// The `MediaSessionActor` implementation.
pub struct MediaSessionActor {
    deps: MediaSessionDeps,
    receiver: mpsc::Receiver<MediaSessionMessage>,
    settle_tx: mpsc::Sender<JoinSettled>,
    settle_rx: mpsc::Receiver<JoinSettled>,
    /// Present from join until teardown.
    events: Option<mpsc::Receiver<TransportEvent>>,
    cancel_token: CancellationToken,
    state: ControllerState,
    state_tx: watch::Sender<ControllerState>,
    /// Join attempt generation; settles for other generations are stale.
    attempt: u64,
    /// Cancels the outstanding join task.
    join_abort: Option<CancellationToken>,
    pending_join: Option<PendingJoin>,
    user_id: Option<UserId>,
    credentials: Option<ParticipantCredentials>,
    intent: MediaIntent,
    media: LocalMedia,
    controls_ready: bool,
    recording_requested: bool,
    reached_joined: bool,
    remotes: RemoteRoster,
}

impl MediaSessionActor {
    /// Spawn a new media session actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        deps: MediaSessionDeps,
        cancel_token: CancellationToken,
    ) -> (MediaSessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(MEDIA_SESSION_CHANNEL_BUFFER);
        let (settle_tx, settle_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(ControllerState::Idle);

        let actor = Self {
            deps,
            receiver,
            settle_tx,
            settle_rx,
            events: None,
            cancel_token: cancel_token.clone(),
            state: ControllerState::Idle,
            state_tx,
            attempt: 0,
            join_abort: None,
            pending_join: None,
            user_id: None,
            credentials: None,
            intent: MediaIntent::default(),
            media: LocalMedia::default(),
            controls_ready: false,
            recording_requested: false,
            reached_joined: false,
            remotes: RemoteRoster::default(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = MediaSessionHandle {
            sender,
            cancel_token,
            state_rx,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "session.actor.media")]
    async fn run(mut self) {
        debug!(target: "session.actor.media", "MediaSessionActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "session.actor.media",
                        state = %self.state,
                        "MediaSessionActor received cancellation signal"
                    );
                    self.leave(LeaveReason::Teardown).await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            debug!(
                                target: "session.actor.media",
                                "MediaSessionActor channel closed, exiting"
                            );
                            self.leave(LeaveReason::Teardown).await;
                            break;
                        }
                    }
                }

                Some(settled) = self.settle_rx.recv() => {
                    self.handle_settled(settled).await;
                }

                event = next_event(&mut self.events) => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            debug!(
                                target: "session.actor.media",
                                "Transport event stream ended"
                            );
                            self.events = None;
                        }
                    }
                }
            }
        }

        info!(
            target: "session.actor.media",
            state = %self.state,
            "MediaSessionActor stopped"
        );
    }

    async fn handle_message(&mut self, message: MediaSessionMessage) {
        match message {
            MediaSessionMessage::Join {
                user_id,
                credentials,
                respond_to,
            } => self.handle_join(user_id, credentials, respond_to),

            MediaSessionMessage::ToggleMic { respond_to } => {
                let enabled = self.toggle_microphone().await;
                let _ = respond_to.send(enabled);
            }

            MediaSessionMessage::ToggleCamera { respond_to } => {
                let enabled = self.toggle_camera().await;
                let _ = respond_to.send(enabled);
            }

            MediaSessionMessage::ToggleRecording { respond_to } => {
                let result = self.toggle_recording().await;
                let _ = respond_to.send(result);
            }

            MediaSessionMessage::Leave { reason, respond_to } => {
                let summary = self.leave(reason).await;
                let _ = respond_to.send(summary);
            }

            MediaSessionMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn set_state(&mut self, state: ControllerState) {
        if self.state != state {
            debug!(
                target: "session.actor.media",
                from = %self.state,
                to = %state,
                "State transition"
            );
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn role(&self) -> Option<ParticipantRole> {
        self.credentials.as_ref().map(|c| c.role)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            role: self.role(),
            intent: self.intent,
            microphone_acquired: self.media.microphone.is_some(),
            camera_acquired: self.media.camera.is_some(),
            controls_ready: self.controls_ready,
            recording_requested: self.recording_requested,
            recording_available: self
                .credentials
                .as_ref()
                .is_some_and(ParticipantCredentials::can_record),
            remote_participants: self.remotes.participants(),
        }
    }

    // ------------------------------------------------------------------------
    // Join
    // ------------------------------------------------------------------------

    fn handle_join(
        &mut self,
        user_id: UserId,
        credentials: ParticipantCredentials,
        respond_to: oneshot::Sender<Result<SessionSnapshot, JoinError>>,
    ) {
        if self.state != ControllerState::Idle {
            warn!(
                target: "session.actor.media",
                state = %self.state,
                "Join rejected outside idle"
            );
            let _ = respond_to.send(Err(JoinError::InvalidState { state: self.state }));
            return;
        }

        self.attempt += 1;
        let attempt = self.attempt;

        let (events_tx, events_rx) = mpsc::channel(TRANSPORT_EVENT_BUFFER);
        self.events = Some(events_rx);

        let abort = self.cancel_token.child_token();
        self.join_abort = Some(abort.clone());

        let params = ChannelJoinParams {
            app_id: credentials.transport_app_id.clone(),
            channel: credentials.channel_name.clone(),
            token: credentials.access_token.clone(),
            uid: credentials.transport_uid(),
        };
        let role = credentials.role;

        info!(
            target: "session.actor.media",
            session_id = %credentials.session_id,
            role = role.as_str(),
            uid = %params.uid,
            attempt = attempt,
            "Joining channel"
        );

        self.user_id = Some(user_id);
        self.credentials = Some(credentials);
        self.pending_join = Some(PendingJoin {
            respond_to,
            started: Instant::now(),
        });
        self.set_state(ControllerState::Connecting);

        let transport = Arc::clone(&self.deps.transport);
        let surface = self.deps.preview_surface.clone();
        let intent = self.intent;
        let settle_tx = self.settle_tx.clone();

        tokio::spawn(async move {
            let mut media = LocalMedia::default();
            let result = connect(
                transport.as_ref(),
                params,
                events_tx,
                role,
                intent,
                &surface,
                &abort,
                &mut media,
            )
            .await;

            let settled = JoinSettled {
                attempt,
                media,
                applied: intent,
                result,
            };
            if let Err(mpsc::error::SendError(mut orphaned)) = settle_tx.send(settled).await {
                // Actor is gone; nobody else will release these
                release_media(transport.as_ref(), &mut orphaned.media).await;
            }
        });
    }

    async fn handle_settled(&mut self, mut settled: JoinSettled) {
        if settled.attempt != self.attempt || self.state != ControllerState::Connecting {
            debug!(
                target: "session.actor.media",
                attempt = settled.attempt,
                state = %self.state,
                "Discarding stale join result"
            );
            release_media(self.deps.transport.as_ref(), &mut settled.media).await;
            return;
        }

        let role = self.role().map_or("unknown", |r| r.as_str());
        let elapsed = self
            .pending_join
            .as_ref()
            .map(|p| p.started.elapsed())
            .unwrap_or_default();
        self.media = settled.media;

        match settled.result {
            Ok(()) => {
                self.set_state(ControllerState::Joined);
                self.reached_joined = true;
                self.controls_ready = true;

                if settled.applied != self.intent {
                    self.apply_intent().await;
                }

                info!(
                    target: "session.actor.media",
                    role = role,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "Joined channel"
                );
                metrics::record_join_attempt("success", role, elapsed);
                self.answer_join(Ok(()));
            }
            Err(e) => {
                error!(
                    target: "session.actor.media",
                    role = role,
                    error = %e,
                    "Join failed, tearing down"
                );
                self.set_state(ControllerState::Errored);
                self.teardown().await;
                metrics::record_join_attempt(e.error_type_label(), role, elapsed);
                self.answer_join(Err(e));
            }
        }
    }

    fn answer_join(&mut self, result: Result<(), JoinError>) {
        if let Some(pending) = self.pending_join.take() {
            let reply = result.map(|()| self.snapshot());
            let _ = pending.respond_to.send(reply);
        }
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    async fn handle_event(&mut self, event: TransportEvent) {
        if !matches!(
            self.state,
            ControllerState::Connecting | ControllerState::Joined
        ) {
            debug!(
                target: "session.actor.media",
                event = event.as_str(),
                state = %self.state,
                "Ignoring transport event"
            );
            return;
        }

        match event {
            TransportEvent::ParticipantPublished {
                participant_id,
                kind,
            } => {
                if self.remotes.has(participant_id, kind) {
                    debug!(
                        target: "session.actor.media",
                        participant = %participant_id,
                        kind = %kind,
                        "Duplicate publish ignored"
                    );
                    return;
                }
                match self.deps.transport.subscribe(participant_id, kind).await {
                    Ok(()) => {
                        self.remotes.publish(participant_id, kind);
                    }
                    Err(e) => {
                        warn!(
                            target: "session.actor.media",
                            participant = %participant_id,
                            kind = %kind,
                            error = %e,
                            "Subscribe failed"
                        );
                    }
                }
            }
            TransportEvent::ParticipantUnpublished {
                participant_id,
                kind,
            } => {
                self.remotes.unpublish(participant_id, kind);
            }
            TransportEvent::ParticipantLeft { participant_id } => {
                self.remotes.remove(participant_id);
            }
        }

        metrics::set_remote_participants(self.remotes.len());
    }

    // ------------------------------------------------------------------------
    // Controls
    // ------------------------------------------------------------------------

    async fn toggle_microphone(&mut self) -> bool {
        if self.role() == Some(ParticipantRole::Guest) {
            return self.intent.microphone;
        }
        self.intent.microphone = !self.intent.microphone;
        if let Some(track) = self.media.microphone.clone() {
            set_track_enabled(&track, self.intent.microphone, "microphone").await;
        }
        self.intent.microphone
    }

    async fn toggle_camera(&mut self) -> bool {
        if self.role() == Some(ParticipantRole::Guest) {
            return self.intent.camera;
        }
        self.intent.camera = !self.intent.camera;
        if let Some(track) = self.media.camera.clone() {
            set_track_enabled(&track, self.intent.camera, "camera").await;
        }
        self.intent.camera
    }

    async fn apply_intent(&mut self) {
        if let Some(track) = self.media.microphone.clone() {
            set_track_enabled(&track, self.intent.microphone, "microphone").await;
        }
        if let Some(track) = self.media.camera.clone() {
            set_track_enabled(&track, self.intent.camera, "camera").await;
        }
    }

    async fn toggle_recording(&mut self) -> Result<bool, JoinError> {
        let Some(credentials) = self.credentials.as_ref().filter(|c| c.can_record()) else {
            return Err(JoinError::RecordingNotPermitted);
        };
        if self.state != ControllerState::Joined {
            return Err(JoinError::InvalidState { state: self.state });
        }

        let requested = !self.recording_requested;
        let session_id = credentials.session_id.clone();
        let channel = credentials.channel_name.clone();
        let notified = if requested {
            self.deps.recorder.start(&session_id, &channel).await
        } else {
            self.deps.recorder.stop(&session_id, &channel).await
        };
        if let Err(e) = notified {
            warn!(
                target: "session.actor.media",
                session_id = %session_id,
                requested = requested,
                error = %e,
                "Recording service notification failed"
            );
        }

        self.recording_requested = requested;
        info!(
            target: "session.actor.media",
            session_id = %session_id,
            requested = requested,
            "Recording toggled"
        );
        Ok(requested)
    }

    // ------------------------------------------------------------------------
    // Leave and teardown
    // ------------------------------------------------------------------------

    async fn leave(&mut self, reason: LeaveReason) -> LeaveSummary {
        let previous_state = self.state;
        if previous_state == ControllerState::Left {
            debug!(
                target: "session.actor.media",
                reason = reason.as_str(),
                "Already left"
            );
            return LeaveSummary {
                previous_state,
                teardown_faults: 0,
                completion: None,
            };
        }

        info!(
            target: "session.actor.media",
            reason = reason.as_str(),
            state = %previous_state,
            "Leaving session"
        );

        if let Some(pending) = self.pending_join.take() {
            let _ = pending.respond_to.send(Err(JoinError::JoinAborted));
            if let Some(role) = self.role() {
                metrics::record_join_attempt(
                    JoinError::JoinAborted.error_type_label(),
                    role.as_str(),
                    pending.started.elapsed(),
                );
            }
        }

        self.set_state(ControllerState::Leaving);
        let teardown_faults = self.teardown().await;
        self.set_state(ControllerState::Left);

        let completion = match (reason, self.role(), self.reached_joined) {
            (LeaveReason::Explicit, Some(ParticipantRole::Host), true) => {
                self.completion_target().map(|(session_id, host_id)| {
                    self.deps.completion.fire(session_id, host_id)
                })
            }
            _ => None,
        };

        LeaveSummary {
            previous_state,
            teardown_faults,
            completion,
        }
    }

    fn completion_target(&self) -> Option<(SessionId, UserId)> {
        let session_id = self.credentials.as_ref()?.session_id.clone();
        let host_id = self.user_id.clone()?;
        Some((session_id, host_id))
    }

    /// Release everything this actor holds. Never fails; returns the number of
    /// steps that faulted.
    async fn teardown(&mut self) -> usize {
        let mut faults = Vec::new();

        if let Some(abort) = self.join_abort.take() {
            abort.cancel();
        }

        // Stop listening first so a transport emitting during leave never
        // blocks on a full event buffer
        self.events = None;

        if self.recording_requested {
            if let Some(credentials) = self.credentials.as_ref() {
                if let Err(e) = self
                    .deps
                    .recorder
                    .stop(&credentials.session_id, &credentials.channel_name)
                    .await
                {
                    faults.push(TeardownFault {
                        step: "recording",
                        message: e.to_string(),
                    });
                }
            }
            self.recording_requested = false;
        }

        faults.extend(release_media(self.deps.transport.as_ref(), &mut self.media).await);

        self.remotes.clear();
        self.controls_ready = false;
        metrics::set_remote_participants(0);

        for fault in &faults {
            warn!(
                target: "session.actor.media",
                step = fault.step,
                error = %fault,
                "Teardown step failed"
            );
            metrics::record_teardown_fault(fault.step);
        }
        faults.len()
    }
}

/// Wait for the next transport event, or forever if there is no stream.
async fn next_event(
    events: &mut Option<mpsc::Receiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Transport calls for one join attempt. Everything acquired is recorded in
/// `media` as soon as it exists, so a failure midway can still be released.
///
/// `abort` is checked after every await: once the attempt is cancelled no
/// further device is acquired and nothing is published.
#[allow(clippy::too_many_arguments)]
async fn connect(
    transport: &dyn RealtimeTransport,
    params: ChannelJoinParams,
    events: mpsc::Sender<TransportEvent>,
    role: ParticipantRole,
    intent: MediaIntent,
    surface: &PreviewSurface,
    abort: &CancellationToken,
    media: &mut LocalMedia,
) -> Result<(), JoinError> {
    transport
        .join(&params, events)
        .await
        .map_err(|e| JoinError::TransportJoinFailed {
            message: e.to_string(),
        })?;
    media.channel_joined = true;
    ensure_live(abort)?;

    if role == ParticipantRole::Guest {
        return Ok(());
    }

    let microphone = transport
        .create_microphone_track()
        .await
        .map_err(acquisition_failed)?;
    media.microphone = Some(Arc::clone(&microphone));
    ensure_live(abort)?;
    microphone
        .set_enabled(intent.microphone)
        .await
        .map_err(acquisition_failed)?;
    ensure_live(abort)?;

    let camera = transport
        .create_camera_track()
        .await
        .map_err(acquisition_failed)?;
    media.camera = Some(Arc::clone(&camera));
    ensure_live(abort)?;
    camera
        .set_enabled(intent.camera)
        .await
        .map_err(acquisition_failed)?;
    ensure_live(abort)?;
    camera.play(surface).map_err(acquisition_failed)?;

    transport
        .publish(&[microphone, camera])
        .await
        .map_err(|e| JoinError::PublishFailed {
            message: e.to_string(),
        })
}

fn ensure_live(abort: &CancellationToken) -> Result<(), JoinError> {
    if abort.is_cancelled() {
        Err(JoinError::JoinAborted)
    } else {
        Ok(())
    }
}

fn acquisition_failed(e: TransportError) -> JoinError {
    JoinError::MediaAcquisitionFailed {
        message: e.to_string(),
    }
}

async fn set_track_enabled(track: &LocalTrackRef, enabled: bool, device: &'static str) {
    if let Err(e) = track.set_enabled(enabled).await {
        warn!(
            target: "session.actor.media",
            device = device,
            enabled = enabled,
            error = %e,
            "Failed to apply track state"
        );
    }
}

/// Camera, then microphone, then the channel. Each reference is cleared only
/// after its close call returns.
async fn release_media(
    transport: &dyn RealtimeTransport,
    media: &mut LocalMedia,
) -> Vec<TeardownFault> {
    let mut faults = Vec::new();

    if let Some(camera) = media.camera.clone() {
        release_track(&camera, "camera", &mut faults).await;
        media.camera = None;
    }

    if let Some(microphone) = media.microphone.clone() {
        release_track(&microphone, "microphone", &mut faults).await;
        media.microphone = None;
    }

    if media.channel_joined {
        if let Err(e) = transport.leave().await {
            faults.push(TeardownFault {
                step: "transport",
                message: e.to_string(),
            });
        }
        media.channel_joined = false;
    }

    faults
}

async fn release_track(
    track: &LocalTrackRef,
    step: &'static str,
    faults: &mut Vec<TeardownFault>,
) {
    if let Err(e) = track.set_enabled(false).await {
        faults.push(TeardownFault {
            step,
            message: e.to_string(),
        });
    }
    if let Err(e) = track.close().await {
        faults.push(TeardownFault {
            step,
            message: e.to_string(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::recording::LoggingRecorder;
    use crate::registry::PreviewRegistry;
    use crate::transport::loopback::ECHO_PARTICIPANT_UID;
    use crate::transport::LoopbackTransport;
    use common::secret::SecretString;
    use std::time::Duration;

    fn deps() -> MediaSessionDeps {
        MediaSessionDeps {
            transport: Arc::new(LoopbackTransport::new()),
            recorder: Arc::new(LoggingRecorder),
            completion: CompletionTrigger::new(Arc::new(PreviewRegistry::default())),
            preview_surface: PreviewSurface::new("local-preview"),
        }
    }

    fn credentials(role: ParticipantRole, recording_enabled: bool) -> ParticipantCredentials {
        ParticipantCredentials {
            session_id: SessionId::from("sess-1"),
            channel_name: "chan-1".to_string(),
            access_token: SecretString::from("token"),
            participant_id: "42".to_string(),
            role,
            recording_enabled,
            transport_app_id: "app".to_string(),
        }
    }

    async fn wait_for_remotes(handle: &MediaSessionHandle, count: usize) -> SessionSnapshot {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let snapshot = handle.snapshot().await.unwrap();
                if snapshot.remote_participants.len() == count {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("remote participants did not settle")
    }

    #[tokio::test]
    async fn test_host_join_publishes_and_sees_echo() {
        let (handle, _task) = MediaSessionActor::spawn(deps(), CancellationToken::new());

        let snapshot = handle
            .join(UserId::from("mentor-1"), credentials(ParticipantRole::Host, true))
            .await
            .unwrap();

        assert_eq!(snapshot.state, ControllerState::Joined);
        assert!(snapshot.microphone_acquired);
        assert!(snapshot.camera_acquired);
        assert!(snapshot.controls_ready);
        assert!(snapshot.recording_available);
        assert_eq!(handle.state(), ControllerState::Joined);

        let snapshot = wait_for_remotes(&handle, 1).await;
        let echo = snapshot.remote_participants.first().unwrap();
        assert_eq!(echo.participant_id, ECHO_PARTICIPANT_UID);
        assert!(echo.has_audio && echo.has_video);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_guest_join_acquires_nothing() {
        let (handle, _task) = MediaSessionActor::spawn(deps(), CancellationToken::new());

        let snapshot = handle
            .join(UserId::from("mentee-1"), credentials(ParticipantRole::Guest, false))
            .await
            .unwrap();

        assert_eq!(snapshot.state, ControllerState::Joined);
        assert!(!snapshot.microphone_acquired);
        assert!(!snapshot.camera_acquired);
        assert!(!snapshot.recording_available);

        // Toggles leave a guest untouched
        assert!(handle.toggle_mic().await.unwrap());
        assert!(handle.toggle_camera().await.unwrap());
        assert_eq!(
            handle.toggle_recording().await,
            Err(JoinError::RecordingNotPermitted)
        );

        handle.cancel();
    }

    #[tokio::test]
    async fn test_second_join_is_invalid_state() {
        let (handle, _task) = MediaSessionActor::spawn(deps(), CancellationToken::new());
        handle
            .join(UserId::from("mentor-1"), credentials(ParticipantRole::Host, false))
            .await
            .unwrap();

        let err = handle
            .join(UserId::from("mentor-1"), credentials(ParticipantRole::Host, false))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            JoinError::InvalidState {
                state: ControllerState::Joined
            }
        );

        handle.cancel();
    }

    #[tokio::test]
    async fn test_leave_twice_is_noop() {
        let (handle, _task) = MediaSessionActor::spawn(deps(), CancellationToken::new());
        handle
            .join(UserId::from("mentee-1"), credentials(ParticipantRole::Guest, false))
            .await
            .unwrap();

        let first = handle.leave(LeaveReason::Explicit).await.unwrap();
        assert_eq!(first.previous_state, ControllerState::Joined);
        assert_eq!(first.teardown_faults, 0);
        // Guests never complete the session
        assert!(first.completion.is_none());

        let second = handle.leave(LeaveReason::Explicit).await.unwrap();
        assert_eq!(second.previous_state, ControllerState::Left);
        assert!(second.completion.is_none());

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, ControllerState::Left);
        assert!(snapshot.remote_participants.is_empty());
    }

    #[tokio::test]
    async fn test_intent_set_before_join_is_applied() {
        let (handle, _task) = MediaSessionActor::spawn(deps(), CancellationToken::new());
        assert!(!handle.toggle_camera().await.unwrap());

        let snapshot = handle
            .join(UserId::from("mentor-1"), credentials(ParticipantRole::Host, false))
            .await
            .unwrap();

        assert!(snapshot.intent.microphone);
        assert!(!snapshot.intent.camera);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_cancel_stops_actor() {
        let (handle, task) = MediaSessionActor::spawn(deps(), CancellationToken::new());
        handle
            .join(UserId::from("mentor-1"), credentials(ParticipantRole::Host, true))
            .await
            .unwrap();

        let states = handle.state_changes();
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("actor did not stop")
            .unwrap();

        assert!(handle.is_cancelled());
        assert_eq!(*states.borrow(), ControllerState::Left);
    }
}
