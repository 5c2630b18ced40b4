//! Observability for the session join pipeline.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `session_join_attempts_total` | Counter | `outcome`, `role` | Join attempts by result |
//! | `session_join_duration_seconds` | Histogram | `outcome` | Time from join request to settle |
//! | `session_eligibility_denied_total` | Counter | `reason` | Closed join gates |
//! | `session_teardown_faults_total` | Counter | `step` | Swallowed teardown failures |
//! | `session_completion_requests_total` | Counter | `outcome` | Host completion requests |
//! | `session_remote_participants` | Gauge | none | Remote participants tracked |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use self::metrics::{
    init_metrics_recorder, record_completion_request, record_eligibility_denied,
    record_join_attempt, record_teardown_fault, set_remote_participants,
};
