//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Channel access
//! tokens and the registry bearer token are held as [`SecretString`] so that
//! any struct deriving `Debug` around them prints `[REDACTED]` instead of the
//! value.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ChannelGrant {
//!     channel_name: String,
//!     access_token: SecretString,
//! }
//!
//! let grant = ChannelGrant {
//!     channel_name: "mentoring-1".to_string(),
//!     access_token: SecretString::from("006abc"),
//! };
//!
//! assert!(!format!("{grant:?}").contains("006abc"));
//! assert_eq!(grant.access_token.expose_secret(), "006abc");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let token = SecretString::from("channel-token-123");
        let debug_str = format!("{token:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("channel-token-123"));
    }

    #[test]
    fn test_deserialized_token_stays_redacted() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Grant {
            channel: String,
            token: SecretString,
        }

        let json = r#"{"channel": "room-9", "token": "rtc-secret"}"#;
        let grant: Grant = serde_json::from_str(json).expect("deserialize");

        assert_eq!(grant.token.expose_secret(), "rtc-secret");
        let debug = format!("{grant:?}");
        assert!(debug.contains("room-9"));
        assert!(!debug.contains("rtc-secret"));
    }
}
