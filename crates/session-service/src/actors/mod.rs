//! Actor that owns the media session.
//!
//! ```text
//! SessionLobby
//! └── MediaSessionActor (one per join attempt)
//!     ├── owns local tracks, channel membership, remote roster
//!     ├── receives transport events on its own queue
//!     └── fires CompletionTrigger on a host's explicit leave
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single owner**: every piece of media state lives inside the actor; callers get snapshots
//! - **Ordered events**: transport callbacks arrive on one channel, applied one at a time
//! - **Attempt generation**: a join result is applied only if it belongs to the current attempt
//! - **CancellationToken**: the parent passes a child token; cancellation runs teardown
//!
//! # Modules
//!
//! - [`media_session`] - `MediaSessionActor` and its handle
//! - [`messages`] - Message types for the actor mailbox
//! - [`state`] - Controller state, remote roster, snapshots

pub mod media_session;
pub mod messages;
pub mod state;

pub use media_session::{MediaSessionActor, MediaSessionDeps, MediaSessionHandle};
pub use messages::{LeaveReason, LeaveSummary, MediaSessionMessage};
pub use state::{
    ControllerState, LocalMedia, MediaIntent, RemoteParticipant, RemoteRoster, SessionSnapshot,
};
