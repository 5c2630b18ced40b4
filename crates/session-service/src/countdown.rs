//! Countdown scheduler.
//!
//! Re-evaluates eligibility on a fixed tick while the join window has not yet
//! opened, publishing a [`CountdownView`] with the remaining wait formatted
//! for display. The tick task stops itself once joining is allowed or the wait
//! reaches zero.
//!
//! `restart` swaps in a refreshed session record. Each start bumps a
//! generation counter; a tick only writes if its generation is still current,
//! checked under the watch channel's lock, so a tick from a replaced record
//! can never overwrite the new view.

use common::clock::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::eligibility::{evaluate, Eligibility};
use crate::models::SessionRecord;

/// What the join gate shows at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownView {
    /// Start generation that produced this view.
    pub generation: u64,
    pub eligibility: Eligibility,
    /// Remaining wait (`"14m 3s"`), present only while waiting.
    pub countdown: Option<String>,
}

impl CountdownView {
    fn new(generation: u64, eligibility: Eligibility) -> Self {
        let countdown = if eligibility.can_join || eligibility.wait.is_zero() {
            None
        } else {
            Some(format_wait(eligibility.wait))
        };
        Self {
            generation,
            eligibility,
            countdown,
        }
    }

    /// No further ticks will change this view.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.eligibility.can_join || self.eligibility.wait.is_zero()
    }
}

/// Format a wait as `h m s`, omitting zero leading units.
///
/// Partial seconds round up so the display never reads `0s` while still
/// waiting.
#[must_use]
pub fn format_wait(wait: Duration) -> String {
    let mut secs = wait.as_secs();
    if wait.subsec_nanos() > 0 {
        secs += 1;
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Write `view` only if `generation` is still the current one.
fn write_if_current(
    tx: &watch::Sender<CountdownView>,
    generation: u64,
    view: CountdownView,
) -> bool {
    tx.send_if_modified(|current| {
        if current.generation != generation {
            return false;
        }
        *current = view;
        true
    })
}

/// Owns the countdown tick task for one session page.
pub struct CountdownScheduler {
    clock: Arc<dyn Clock>,
    tick: Duration,
    override_always: bool,
    tx: Arc<watch::Sender<CountdownView>>,
    parent_token: CancellationToken,
    task: Option<(CancellationToken, JoinHandle<()>)>,
    generation: u64,
}

impl CountdownScheduler {
    /// Evaluate `record` now and, if still waiting, start ticking.
    #[must_use]
    pub fn start(
        record: SessionRecord,
        clock: Arc<dyn Clock>,
        tick: Duration,
        override_always: bool,
        parent_token: CancellationToken,
    ) -> Self {
        let initial = CountdownView::new(0, evaluate(&record, clock.now(), override_always));
        let (tx, _rx) = watch::channel(initial);

        let mut scheduler = Self {
            clock,
            tick,
            override_always,
            tx: Arc::new(tx),
            parent_token,
            task: None,
            generation: 0,
        };
        scheduler.restart(record);
        scheduler
    }

    /// Replace the session record. Any running tick task is cancelled and its
    /// pending writes are discarded.
    pub fn restart(&mut self, record: SessionRecord) {
        self.stop();

        self.generation += 1;
        let generation = self.generation;
        let view = CountdownView::new(
            generation,
            evaluate(&record, self.clock.now(), self.override_always),
        );
        let settled = view.is_settled();
        self.tx.send_replace(view);

        debug!(
            target: "session.countdown",
            session_id = %record.id,
            generation = generation,
            settled = settled,
            "Countdown restarted"
        );

        if settled {
            return;
        }

        let token = self.parent_token.child_token();
        let handle = tokio::spawn(tick_loop(
            record,
            Arc::clone(&self.clock),
            self.tick,
            self.override_always,
            Arc::clone(&self.tx),
            generation,
            token.clone(),
        ));
        self.task = Some((token, handle));
    }

    /// Cancel the tick task, if any. The last view stays readable.
    pub fn stop(&mut self) {
        if let Some((token, _handle)) = self.task.take() {
            token.cancel();
        }
    }

    /// Whether a tick task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|(token, handle)| !token.is_cancelled() && !handle.is_finished())
    }

    /// Current view.
    #[must_use]
    pub fn current(&self) -> CountdownView {
        self.tx.borrow().clone()
    }

    /// Watch view updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CountdownView> {
        self.tx.subscribe()
    }
}

impl Drop for CountdownScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_loop(
    record: SessionRecord,
    clock: Arc<dyn Clock>,
    tick: Duration,
    override_always: bool,
    tx: Arc<watch::Sender<CountdownView>>,
    generation: u64,
    cancel_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately; the initial view is already published
    interval.tick().await;

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let view = CountdownView::new(
            generation,
            evaluate(&record, clock.now(), override_always),
        );
        let settled = view.is_settled();

        if !write_if_current(&tx, generation, view) {
            debug!(
                target: "session.countdown",
                generation = generation,
                "Stale countdown tick discarded"
            );
            break;
        }
        if settled {
            debug!(
                target: "session.countdown",
                generation = generation,
                "Countdown settled"
            );
            break;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::eligibility::EligibilityRule;
    use crate::models::{PaymentStatus, SessionStatus};
    use chrono::{DateTime, TimeZone, Utc};
    use common::types::{SessionId, UserId};

    /// Wall clock that moves with tokio's (paused) time.
    struct PausedClock {
        wall_origin: DateTime<Utc>,
        origin: tokio::time::Instant,
    }

    impl PausedClock {
        fn new() -> Self {
            Self {
                wall_origin: Utc.with_ymd_and_hms(2026, 4, 2, 17, 0, 0).unwrap(),
                origin: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for PausedClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = tokio::time::Instant::now() - self.origin;
            self.wall_origin + chrono::Duration::from_std(elapsed).unwrap()
        }
    }

    fn record(clock: &PausedClock, opens_in: chrono::Duration) -> SessionRecord {
        let start = clock.now() + opens_in + chrono::Duration::minutes(15);
        SessionRecord {
            id: SessionId::from("sess-1"),
            mentor_id: UserId::from("mentor-1"),
            counterparty_id: UserId::from("mentee-1"),
            start_time: start,
            end_time: start + chrono::Duration::minutes(45),
            status: SessionStatus::Scheduled,
            payment_status: PaymentStatus::Paid,
            channel_ref: "chan-1".to_string(),
            recording_url: None,
            notes: None,
        }
    }

    #[test]
    fn test_format_wait() {
        assert_eq!(format_wait(Duration::from_secs(45)), "45s");
        assert_eq!(format_wait(Duration::from_secs(14 * 60 + 3)), "14m 3s");
        assert_eq!(format_wait(Duration::from_secs(3600 + 5)), "1h 0m 5s");
        assert_eq!(format_wait(Duration::from_secs(2 * 3600)), "2h 0m 0s");
        assert_eq!(format_wait(Duration::from_millis(200)), "1s");
        assert_eq!(format_wait(Duration::from_millis(59_001)), "1m 0s");
        assert_eq!(format_wait(Duration::ZERO), "0s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_down_and_stops_when_window_opens() {
        let clock = Arc::new(PausedClock::new());
        let record = record(&clock, chrono::Duration::seconds(3));

        let scheduler = CountdownScheduler::start(
            record,
            clock.clone(),
            Duration::from_secs(1),
            false,
            CancellationToken::new(),
        );
        let mut rx = scheduler.subscribe();

        let initial = scheduler.current();
        assert!(!initial.eligibility.can_join);
        assert_eq!(initial.countdown.as_deref(), Some("3s"));
        assert!(scheduler.is_running());

        let mut seen = Vec::new();
        loop {
            rx.changed().await.unwrap();
            let view = rx.borrow_and_update().clone();
            seen.push(view.countdown.clone());
            if view.eligibility.can_join {
                break;
            }
        }

        assert_eq!(
            seen,
            vec![Some("2s".to_string()), Some("1s".to_string()), None]
        );
        assert_eq!(
            scheduler.current().eligibility.rule,
            EligibilityRule::WindowOpen
        );

        // Task exits on its own after settling
        tokio::task::yield_now().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_discards_old_generation() {
        let clock = Arc::new(PausedClock::new());
        let waiting = record(&clock, chrono::Duration::hours(1));
        let open = record(&clock, chrono::Duration::seconds(-60));

        let mut scheduler = CountdownScheduler::start(
            waiting,
            clock.clone(),
            Duration::from_secs(1),
            false,
            CancellationToken::new(),
        );
        assert!(scheduler.is_running());
        let first_generation = scheduler.current().generation;

        scheduler.restart(open);
        let restarted = scheduler.current();
        assert!(restarted.generation > first_generation);
        assert!(restarted.eligibility.can_join);
        assert!(!scheduler.is_running());

        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(scheduler.current(), restarted);
    }

    #[tokio::test]
    async fn test_stale_generation_write_is_rejected() {
        let clock = PausedClock::new();
        let record = record(&clock, chrono::Duration::minutes(5));
        let eligibility = evaluate(&record, clock.now(), false);

        let (tx, _rx) = watch::channel(CountdownView::new(2, eligibility.clone()));

        assert!(!write_if_current(
            &tx,
            1,
            CountdownView::new(1, eligibility.clone())
        ));
        assert_eq!(tx.borrow().generation, 2);
        assert!(write_if_current(&tx, 2, CountdownView::new(2, eligibility)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_records_never_tick() {
        let clock = Arc::new(PausedClock::new());

        let mut ended = record(&clock, chrono::Duration::hours(-3));
        ended.end_time = clock.now() - chrono::Duration::minutes(1);
        let scheduler = CountdownScheduler::start(
            ended,
            clock.clone(),
            Duration::from_secs(1),
            false,
            CancellationToken::new(),
        );
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.current().eligibility.rule, EligibilityRule::Ended);
        assert!(scheduler.current().countdown.is_none());

        let overridden = CountdownScheduler::start(
            record(&clock, chrono::Duration::days(2)),
            clock.clone(),
            Duration::from_secs(1),
            true,
            CancellationToken::new(),
        );
        assert!(overridden.current().eligibility.can_join);
        assert!(!overridden.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_ticking() {
        let clock = Arc::new(PausedClock::new());
        let parent = CancellationToken::new();
        let scheduler = CountdownScheduler::start(
            record(&clock, chrono::Duration::minutes(10)),
            clock.clone(),
            Duration::from_secs(1),
            false,
            parent.clone(),
        );
        assert!(scheduler.is_running());

        parent.cancel();
        assert!(!scheduler.is_running());

        let before = scheduler.current();
        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert_eq!(scheduler.current(), before);
    }
}
