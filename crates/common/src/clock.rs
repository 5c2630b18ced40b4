//! Wall-clock seam.
//!
//! Eligibility is always derived from the scheduled start/end instants and
//! "now". Everything that needs "now" goes through [`Clock`] so that timer
//! driven code can be tested against a controlled clock.

use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
