//! Session Service
//!
//! Opens one scheduled mentoring session and runs its live join pipeline.
//!
//! # Startup Flow
//!
//! 1. Load configuration and the launch target from environment
//! 2. Initialize tracing and the Prometheus metrics recorder
//! 3. Start the health HTTP server (liveness, readiness, metrics)
//! 4. Wire the session registry (HTTP, preview, or HTTP with preview fallback)
//! 5. Open the session lobby and wait for the join gate to open
//! 6. Enter the session; readiness follows the media session state
//! 7. On shutdown signal, leave explicitly (a host completes the session)

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::clock::SystemClock;
use common::types::{SessionId, UserId};
use session_service::actors::{ControllerState, LeaveReason};
use session_service::config::{Config, LaunchTarget};
use session_service::countdown::CountdownView;
use session_service::lobby::{LobbyDeps, SessionLobby};
use session_service::observability::{health_router, init_metrics_recorder, HealthState};
use session_service::recording::LoggingRecorder;
use session_service::transport::{LoopbackTransport, RealtimeTransport, TransportFactory};
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for the completion request to finish.
const COMPLETION_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    let config = Config::from_vars(&vars)?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "session_service=debug".into());
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Session Service");
    info!(
        registry_url = %config.registry_url,
        preview_mode = config.preview_mode,
        preview_fallback = config.preview_fallback,
        countdown_tick_ms = u64::try_from(config.countdown_tick.as_millis()).unwrap_or(u64::MAX),
        health_bind_address = %config.health_bind_address,
        "Configuration loaded successfully"
    );

    let target = LaunchTarget::from_vars(&vars, config.preview_mode).map_err(|e| {
        error!(error = %e, "Failed to resolve launch target");
        e
    })?;

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let app = health_router(Arc::clone(&health_state), Some(prometheus_handle));
    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    let transports: TransportFactory =
        Arc::new(|| Arc::new(LoopbackTransport::new()) as Arc<dyn RealtimeTransport>);
    let deps = LobbyDeps::from_config(
        &config,
        transports,
        Arc::new(LoggingRecorder),
        Arc::new(SystemClock),
    )
    .map_err(|e| {
        error!(error = %e, "Failed to create session registry client");
        e
    })?;

    let mut lobby = SessionLobby::open(
        SessionId::new(target.session_id),
        UserId::new(target.user_id),
        deps,
        shutdown_token.child_token(),
    )
    .await?;

    info!("Waiting for the join window - press Ctrl+C to abort");
    let gate_open = tokio::select! {
        open = wait_for_gate(lobby.countdown()) => open,
        () = shutdown_signal() => {
            info!("Shutdown signal received before join");
            false
        }
    };

    if !gate_open {
        let view = lobby.countdown().borrow().clone();
        if !view.eligibility.can_join {
            warn!(reason = %view.eligibility.reason, "Session cannot be joined");
        }
        lobby.close().await;
        shutdown_token.cancel();
        return Ok(());
    }

    let snapshot = match lobby.enter().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "Failed to join session");
            lobby.close().await;
            shutdown_token.cancel();
            return Err(e.into());
        }
    };
    info!(
        role = ?snapshot.role,
        recording_available = snapshot.recording_available,
        "Session joined - press Ctrl+C to leave"
    );

    let Some(states) = lobby.media_session().map(|media| media.state_changes()) else {
        lobby.close().await;
        shutdown_token.cancel();
        return Ok(());
    };

    tokio::spawn(track_readiness(
        states.clone(),
        Arc::clone(&health_state),
        shutdown_token.child_token(),
    ));

    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received, leaving session");
        }
        () = wait_for_end(states) => {
            warn!("Media session ended without an explicit leave");
        }
    }

    // Mark as not ready immediately
    health_state.set_not_ready();

    match lobby.leave(LeaveReason::Explicit).await {
        Ok(Some(summary)) => {
            if summary.teardown_faults > 0 {
                warn!(faults = summary.teardown_faults, "Teardown finished with faults");
            }
            if let Some(completion) = summary.completion {
                if tokio::time::timeout(COMPLETION_GRACE, completion).await.is_err() {
                    warn!("Completion request still running at shutdown");
                }
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Leave failed"),
    }

    lobby.close().await;
    shutdown_token.cancel();

    info!("Session Service shutdown complete");
    Ok(())
}

/// Resolves once the countdown stops; `true` if the gate ended open.
async fn wait_for_gate(mut views: watch::Receiver<CountdownView>) -> bool {
    loop {
        {
            let view = views.borrow_and_update();
            if view.is_settled() {
                return view.eligibility.can_join;
            }
        }
        if views.changed().await.is_err() {
            return views.borrow().eligibility.can_join;
        }
    }
}

/// Mirror the media session state into readiness.
async fn track_readiness(
    mut states: watch::Receiver<ControllerState>,
    health_state: Arc<HealthState>,
    cancel_token: CancellationToken,
) {
    loop {
        if *states.borrow_and_update() == ControllerState::Joined {
            health_state.set_ready();
        } else {
            health_state.set_not_ready();
        }

        tokio::select! {
            () = cancel_token.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    health_state.set_not_ready();
                    break;
                }
            }
        }
    }
}

/// Resolves once the media session is left or errored.
async fn wait_for_end(mut states: watch::Receiver<ControllerState>) {
    loop {
        if matches!(
            *states.borrow_and_update(),
            ControllerState::Left | ControllerState::Errored
        ) {
            return;
        }
        if states.changed().await.is_err() {
            return;
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
