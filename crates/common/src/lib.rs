//! Common utilities and types shared across Mentor Live components.

#![warn(clippy::pedantic)]

/// Module for common data types
pub mod types;

/// Module for the wall-clock seam
pub mod clock;

/// Module for secret types that prevent accidental logging
pub mod secret;
