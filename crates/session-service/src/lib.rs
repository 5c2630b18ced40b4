//! Session Service Library
//!
//! This library provides the live session join pipeline for the Mentor Live
//! marketplace - the part of a scheduled mentoring call that decides *when* a
//! participant may enter and *how* the real-time audio/video channel is
//! acquired, published, observed and torn down:
//!
//! - Pure eligibility evaluation against the join window, payment and status
//! - A cancellable 1 Hz countdown that re-evaluates eligibility for display
//! - A media session controller actor owning one real-time channel connection
//! - A best-effort completion trigger fired when a host explicitly leaves
//!
//! # Architecture
//!
//! ```text
//! SessionLobby (one per opened session page)
//! ├── CountdownScheduler (re-arms the EligibilityEvaluator at 1 Hz)
//! ├── SessionRegistry (verify-join, credentials, completion)
//! └── MediaSessionActor (one per channel connection)
//!     ├── RealtimeTransport (opaque SDK boundary)
//!     ├── RecordingService (start/stop notifications)
//!     └── CompletionTrigger (fire-and-forget registry call)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Time is authoritative**: eligibility is always recomputed from the
//!   scheduled start/end, never inferred from a possibly stale `ongoing` status
//! - **One event queue**: user intents, join results and transport signals all
//!   arrive at the controller actor one at a time
//! - **Generation guards**: stale countdown ticks and stale join results never
//!   write into state that has been restarted or torn down
//! - **Teardown never fails**: faults are logged and counted, never surfaced
//!
//! # Modules
//!
//! - [`actors`] - Media session controller actor and its message types
//! - [`completion`] - Session completion trigger
//! - [`config`] - Service configuration from environment
//! - [`countdown`] - Countdown scheduler
//! - [`eligibility`] - Eligibility evaluator
//! - [`errors`] - Error taxonomy
//! - [`lobby`] - Join pipeline orchestration for a session page
//! - [`models`] - Session record and participant credential types
//! - [`observability`] - Metrics and health endpoints
//! - [`recording`] - Recording service seam
//! - [`registry`] - Session registry client, preview registry
//! - [`transport`] - Real-time transport seam and loopback implementation
//! - [`view`] - View models exposed to the host page

pub mod actors;
pub mod completion;
pub mod config;
pub mod countdown;
pub mod eligibility;
pub mod errors;
pub mod lobby;
pub mod models;
pub mod observability;
pub mod recording;
pub mod registry;
pub mod transport;
pub mod view;
