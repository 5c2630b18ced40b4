//! # Session Test Utilities
//!
//! Shared test utilities for the session service.
//!
//! Mock implementations of every seam the join pipeline talks to, plus
//! fixtures for session records and credentials, so pipeline tests run
//! without a registry, a media SDK or a recording service.
//!
//! ## Modules
//!
//! - `mock_transport` - Scriptable real-time transport with a call log
//! - `mock_registry` - In-memory session registry
//! - `mock_recorder` - Recording service that records notifications
//! - `clock` - Manually advanced clock
//! - `fixtures` - Session records and participant credentials
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let transport = MockTransport::new();
//!     transport.fail_camera(TransportError::DeviceUnavailable("busy".into()));
//!
//!     let credentials = TestCredentials::host("sess-1").build();
//!     // Spawn a MediaSessionActor with `transport` and join...
//! }
//! ```

pub mod clock;
pub mod fixtures;
pub mod mock_recorder;
pub mod mock_registry;
pub mod mock_transport;

// Re-export commonly used items
pub use clock::*;
pub use fixtures::*;
pub use mock_recorder::*;
pub use mock_registry::*;
pub use mock_transport::*;
