//! Metrics definitions for the session join pipeline.
//!
//! All metrics follow Prometheus naming conventions:
//! - `session_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: `success` or a `JoinError` variant label (~10 values)
//! - `reason`: eligibility rule labels (6 values)
//! - `step`: teardown step labels (recording, camera, microphone, transport)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Join duration buckets
/// cover a permission prompt the user may sit on for tens of seconds.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("session_join_duration_seconds".to_string()),
            &[
                0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000, 60.000,
            ],
        )
        .map_err(|e| format!("Failed to set join duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Record the outcome of a join attempt.
///
/// Metrics: `session_join_attempts_total`, `session_join_duration_seconds`
/// Labels: `outcome`, `role`
pub fn record_join_attempt(outcome: &str, role: &str, duration: Duration) {
    counter!(
        "session_join_attempts_total",
        "outcome" => outcome.to_string(),
        "role" => role.to_string()
    )
    .increment(1);
    histogram!(
        "session_join_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a closed join gate.
///
/// Metric: `session_eligibility_denied_total`
/// Labels: `reason` (eligibility rule label)
pub fn record_eligibility_denied(reason: &str) {
    counter!("session_eligibility_denied_total", "reason" => reason.to_string()).increment(1);
}

/// Record a swallowed teardown failure.
///
/// Metric: `session_teardown_faults_total`
/// Labels: `step`
pub fn record_teardown_fault(step: &str) {
    counter!("session_teardown_faults_total", "step" => step.to_string()).increment(1);
}

/// Record a completion request.
///
/// Metric: `session_completion_requests_total`
/// Labels: `outcome` (success, error)
pub fn record_completion_request(outcome: &str) {
    counter!("session_completion_requests_total", "outcome" => outcome.to_string())
        .increment(1);
}

/// Set the number of remote participants tracked by the controller.
///
/// Metric: `session_remote_participants`
pub fn set_remote_participants(count: usize) {
    // usize to f64 conversion is safe for realistic participant counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("session_remote_participants").set(count as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_recording_functions_without_recorder() {
        // Global no-op recorder when none is installed
        record_join_attempt("success", "host", Duration::from_millis(120));
        record_eligibility_denied("too_early");
        record_teardown_fault("camera");
        record_completion_request("error");
        set_remote_participants(0);
    }

    #[test]
    fn test_metric_names_and_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_join_attempt("media_acquisition_failed", "host", Duration::from_secs(2));
            record_eligibility_denied("payment_not_confirmed");
            record_teardown_fault("transport");
            record_teardown_fault("transport");
            record_completion_request("success");
            set_remote_participants(2);
        });

        let metrics = snapshotter.snapshot().into_vec();
        let find = |name: &str| {
            metrics
                .iter()
                .find(|(key, _, _, _)| key.key().name() == name)
                .map(|(key, _, _, value)| (key.key().clone(), value.clone()))
        };

        let (key, value) = find("session_teardown_faults_total").expect("teardown counter");
        assert!(key
            .labels()
            .any(|l| l.key() == "step" && l.value() == "transport"));
        assert_eq!(*value, DebugValue::Counter(2));

        let (key, _) = find("session_join_attempts_total").expect("join counter");
        assert!(key
            .labels()
            .any(|l| l.key() == "outcome" && l.value() == "media_acquisition_failed"));

        assert!(find("session_join_duration_seconds").is_some());
        assert!(find("session_eligibility_denied_total").is_some());
        assert!(find("session_completion_requests_total").is_some());

        let (_, value) = find("session_remote_participants").expect("participants gauge");
        assert_eq!(*value, DebugValue::Gauge(2.0.into()));
    }
}
