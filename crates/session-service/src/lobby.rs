//! Join pipeline for one opened session page.
//!
//! `open` fetches the session record and starts the countdown. `enter` runs
//! the pipeline in order, stopping at the first failure:
//!
//! 1. eligibility gate (fresh evaluation, never the countdown's cached view)
//! 2. registry verify-join
//! 3. registry credentials
//! 4. a fresh `MediaSessionActor` join
//!
//! Failures other than a closed gate replace the page with a failed view that
//! carries a retry flag and a way back.

use common::clock::Clock;
use common::types::{SessionId, UserId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::actors::{
    ControllerState, LeaveReason, LeaveSummary, MediaSessionActor, MediaSessionDeps,
    MediaSessionHandle, SessionSnapshot,
};
use crate::completion::CompletionTrigger;
use crate::config::Config;
use crate::countdown::{CountdownScheduler, CountdownView};
use crate::eligibility::evaluate;
use crate::errors::JoinError;
use crate::models::SessionRecord;
use crate::observability::metrics;
use crate::recording::RecordingService;
use crate::registry::{
    FallbackRegistry, HttpRegistryClient, PreviewRegistry, RegistryError, SessionRegistry,
};
use crate::transport::{PreviewSurface, TransportFactory};
use crate::view::LobbyView;

/// Collaborators shared by every lobby.
#[derive(Clone)]
pub struct LobbyDeps {
    pub registry: Arc<dyn SessionRegistry>,
    pub transports: TransportFactory,
    pub recorder: Arc<dyn RecordingService>,
    pub clock: Arc<dyn Clock>,
    pub preview_surface: PreviewSurface,
    pub countdown_tick: Duration,
    /// Forces the eligibility override.
    pub preview_mode: bool,
}

impl LobbyDeps {
    /// Wire the registry the configuration asks for.
    ///
    /// Preview mode bypasses the registry entirely; preview fallback wraps the
    /// HTTP client so network failures degrade to preview.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the HTTP client cannot be built.
    pub fn from_config(
        config: &Config,
        transports: TransportFactory,
        recorder: Arc<dyn RecordingService>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RegistryError> {
        let registry: Arc<dyn SessionRegistry> = if config.preview_mode {
            Arc::new(PreviewRegistry::new(Arc::clone(&clock)))
        } else {
            let client = HttpRegistryClient::new(
                config.registry_url.clone(),
                config.registry_token.clone(),
                config.registry_timeout,
            )?;
            if config.preview_fallback {
                Arc::new(FallbackRegistry::new(
                    Arc::new(client),
                    PreviewRegistry::new(Arc::clone(&clock)),
                ))
            } else {
                Arc::new(client)
            }
        };

        Ok(Self {
            registry,
            transports,
            recorder,
            clock,
            preview_surface: PreviewSurface::new(config.preview_surface.clone()),
            countdown_tick: config.countdown_tick,
            preview_mode: config.preview_mode,
        })
    }
}

/// Whether `error` replaces the page with the failed view.
fn replaces_view(error: &JoinError) -> bool {
    !matches!(
        error,
        JoinError::EligibilityDenied { .. } | JoinError::InvalidState { .. } | JoinError::JoinAborted
    )
}

/// One opened session page.
pub struct SessionLobby {
    session_id: SessionId,
    user_id: UserId,
    deps: LobbyDeps,
    completion: CompletionTrigger,
    record: SessionRecord,
    countdown: CountdownScheduler,
    media: Option<MediaSessionHandle>,
    failure: Option<JoinError>,
    cancel_token: CancellationToken,
}

impl SessionLobby {
    /// Fetch the session record and start the countdown.
    ///
    /// # Errors
    ///
    /// `JoinVerificationFailed` if the session cannot be loaded.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn open(
        session_id: SessionId,
        user_id: UserId,
        deps: LobbyDeps,
        cancel_token: CancellationToken,
    ) -> Result<Self, JoinError> {
        let record = fetch_record(deps.registry.as_ref(), &session_id).await?;
        let countdown = CountdownScheduler::start(
            record.clone(),
            Arc::clone(&deps.clock),
            deps.countdown_tick,
            deps.preview_mode,
            cancel_token.child_token(),
        );

        info!(
            target: "session.lobby",
            session_id = %session_id,
            status = %record.status,
            can_join = countdown.current().eligibility.can_join,
            "Session opened"
        );

        Ok(Self {
            session_id,
            user_id,
            completion: CompletionTrigger::new(Arc::clone(&deps.registry)),
            deps,
            record,
            countdown,
            media: None,
            failure: None,
            cancel_token,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Watch the join gate.
    #[must_use]
    pub fn countdown(&self) -> watch::Receiver<CountdownView> {
        self.countdown.subscribe()
    }

    /// The current media session, if one was started.
    #[must_use]
    pub fn media_session(&self) -> Option<&MediaSessionHandle> {
        self.media.as_ref()
    }

    /// Re-fetch the record and restart the countdown against it.
    ///
    /// # Errors
    ///
    /// `JoinVerificationFailed` if the session cannot be loaded.
    pub async fn refresh(&mut self) -> Result<(), JoinError> {
        match fetch_record(self.deps.registry.as_ref(), &self.session_id).await {
            Ok(record) => {
                self.countdown.restart(record.clone());
                self.record = record;
                self.failure = None;
                Ok(())
            }
            Err(e) => {
                self.failure = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Run the join pipeline.
    ///
    /// # Errors
    ///
    /// The first failing stage's `JoinError`.
    #[instrument(skip_all, fields(session_id = %self.session_id))]
    pub async fn enter(&mut self) -> Result<SessionSnapshot, JoinError> {
        let started = Instant::now();
        let result = self.run_pipeline(started).await;

        match &result {
            Ok(_) => self.failure = None,
            Err(e) if replaces_view(e) => {
                warn!(
                    target: "session.lobby",
                    error = %e,
                    "Join pipeline failed"
                );
                self.failure = Some(e.clone());
            }
            Err(e) => {
                debug!(target: "session.lobby", error = %e, "Join not started");
            }
        }
        result
    }

    async fn run_pipeline(&mut self, started: Instant) -> Result<SessionSnapshot, JoinError> {
        if let Some(media) = &self.media {
            let state = media.state();
            if matches!(
                state,
                ControllerState::Connecting | ControllerState::Joined | ControllerState::Leaving
            ) {
                return Err(JoinError::InvalidState { state });
            }
        }

        let eligibility = evaluate(&self.record, self.deps.clock.now(), self.deps.preview_mode);
        let rule = eligibility.rule;
        if let Err(e) = eligibility.into_result() {
            metrics::record_eligibility_denied(rule.as_str());
            return Err(e);
        }

        match self
            .deps
            .registry
            .verify_join(&self.session_id, &self.user_id)
            .await
        {
            Ok(verification) => {
                debug!(
                    target: "session.lobby",
                    meeting_ref = verification.meeting_ref.as_deref().unwrap_or("none"),
                    "Join verified"
                );
            }
            Err(e) => {
                let err = JoinError::JoinVerificationFailed {
                    message: e.user_message(),
                };
                metrics::record_join_attempt(err.error_type_label(), "unknown", started.elapsed());
                return Err(err);
            }
        }

        let credentials = match self
            .deps
            .registry
            .join(&self.session_id, &self.user_id)
            .await
        {
            Ok(credentials) => credentials,
            Err(e) => {
                let err = JoinError::CredentialFetchFailed {
                    message: e.user_message(),
                };
                metrics::record_join_attempt(err.error_type_label(), "unknown", started.elapsed());
                return Err(err);
            }
        };

        // Devices are exclusive: the previous controller must be fully torn
        // down before a new one acquires them
        if let Some(previous) = self.media.take() {
            if let Err(e) = previous.leave(LeaveReason::Teardown).await {
                debug!(target: "session.lobby", error = %e, "Previous session already gone");
            }
            previous.cancel();
        }

        let (handle, _task) = MediaSessionActor::spawn(
            MediaSessionDeps {
                transport: (self.deps.transports)(),
                recorder: Arc::clone(&self.deps.recorder),
                completion: self.completion.clone(),
                preview_surface: self.deps.preview_surface.clone(),
            },
            self.cancel_token.child_token(),
        );
        self.media = Some(handle.clone());

        handle.join(self.user_id.clone(), credentials).await
    }

    fn active_media(&self) -> Result<&MediaSessionHandle, JoinError> {
        self.media.as_ref().ok_or(JoinError::InvalidState {
            state: ControllerState::Idle,
        })
    }

    /// # Errors
    ///
    /// `InvalidState` before a join was started.
    pub async fn toggle_mic(&self) -> Result<bool, JoinError> {
        self.active_media()?.toggle_mic().await
    }

    /// # Errors
    ///
    /// `InvalidState` before a join was started.
    pub async fn toggle_camera(&self) -> Result<bool, JoinError> {
        self.active_media()?.toggle_camera().await
    }

    /// # Errors
    ///
    /// `RecordingNotPermitted` or `InvalidState`.
    pub async fn toggle_recording(&self) -> Result<bool, JoinError> {
        self.active_media()?.toggle_recording().await
    }

    /// Leave the media session, if any, and stop the countdown.
    ///
    /// # Errors
    ///
    /// `Internal` if the controller is gone.
    pub async fn leave(&mut self, reason: LeaveReason) -> Result<Option<LeaveSummary>, JoinError> {
        self.countdown.stop();
        match &self.media {
            Some(media) => media.leave(reason).await.map(Some),
            None => Ok(None),
        }
    }

    /// Dismiss the failed view ("back").
    pub fn back(&mut self) {
        self.failure = None;
    }

    /// What the page should show now.
    pub async fn view(&self) -> LobbyView {
        if let Some(error) = &self.failure {
            return LobbyView::failed(error);
        }
        if let Some(media) = &self.media {
            if let Ok(snapshot) = media.snapshot().await {
                if matches!(
                    snapshot.state,
                    ControllerState::Connecting | ControllerState::Joined
                ) {
                    return LobbyView::in_session(&snapshot);
                }
            }
        }
        LobbyView::gate(&self.countdown.current())
    }

    /// Tear everything down (page closed).
    pub async fn close(mut self) {
        if let Err(e) = self.leave(LeaveReason::Teardown).await {
            debug!(target: "session.lobby", error = %e, "Controller already gone on close");
        }
        self.cancel_token.cancel();
    }
}

async fn fetch_record(
    registry: &dyn SessionRegistry,
    session_id: &SessionId,
) -> Result<SessionRecord, JoinError> {
    let record = registry.get_session(session_id).await.map_err(|e| {
        warn!(
            target: "session.lobby",
            session_id = %session_id,
            error = %e,
            "Failed to load session"
        );
        JoinError::JoinVerificationFailed {
            message: e.user_message(),
        }
    })?;

    if !record.has_valid_window() {
        warn!(
            target: "session.lobby",
            session_id = %session_id,
            "Session record ends before it starts"
        );
    }
    Ok(record)
}
