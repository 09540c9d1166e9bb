use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Sentinel stored while no countdown is active.
const NO_COUNTDOWN: i64 = -1;

/// Owner of the single per-process countdown.
///
/// Only the session orchestrator drives this type; nothing else in the
/// crate holds a handle to it. `start` always supersedes whatever countdown
/// is running, `stop` cancels without firing the expiry action, and a
/// generation counter guarantees that a tick belonging to a cancelled
/// countdown is suppressed even if its task was already scheduled.
///
/// The tick cadence uses [`MissedTickBehavior::Delay`], so a busy process
/// stretches the countdown rather than shortening it.
pub struct TimerScheduler {
    generation: Arc<AtomicU64>,
    remaining: Arc<AtomicI64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            remaining: Arc::new(AtomicI64::new(NO_COUNTDOWN)),
            task: Mutex::new(None),
        }
    }
}

impl TimerScheduler {
    /// Create a scheduler with no countdown armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a countdown of `duration_seconds`, superseding any countdown
    /// that is currently running.
    ///
    /// `on_tick` runs once per second after each decrement with the
    /// remaining seconds; `on_expire` runs exactly once when the counter
    /// reaches zero, after which the countdown is torn down.
    pub fn start<T, E, Fut>(&self, duration_seconds: u32, on_tick: T, on_expire: E)
    where
        T: Fn(u32) + Send + Sync + 'static,
        E: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Invalidate the previous countdown before its task is aborted so
        // an already-scheduled tick can never fire with a stale value.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.abort_task();
        self.remaining
            .store(i64::from(duration_seconds), Ordering::SeqCst);

        let generations = Arc::clone(&self.generation);
        let remaining_slot = Arc::clone(&self.remaining);
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut remaining = duration_seconds;
            loop {
                ticker.tick().await;
                if generations.load(Ordering::SeqCst) != generation {
                    return;
                }
                remaining = remaining.saturating_sub(1);
                remaining_slot.store(i64::from(remaining), Ordering::SeqCst);
                on_tick(remaining);
                if remaining == 0 {
                    break;
                }
            }

            if generations.load(Ordering::SeqCst) != generation {
                return;
            }
            on_expire().await;
            remaining_slot.store(NO_COUNTDOWN, Ordering::SeqCst);
        });

        *self.task.lock().expect("timer task lock poisoned") = Some(handle);
    }

    /// Cancel the running countdown without invoking its expiry action.
    /// Safe to call when nothing is armed.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_task();
        self.remaining.store(NO_COUNTDOWN, Ordering::SeqCst);
    }

    /// Remaining seconds of the armed countdown, if one is running. This is
    /// the fast path for tick emission; resynchronisation always re-derives
    /// remaining time from the persisted start timestamp instead.
    pub fn remaining_seconds(&self) -> Option<u32> {
        let value = self.remaining.load(Ordering::SeqCst);
        u32::try_from(value).ok()
    }

    /// Whether a countdown is currently armed.
    pub fn is_running(&self) -> bool {
        self.remaining.load(Ordering::SeqCst) != NO_COUNTDOWN
    }

    fn abort_task(&self) {
        if let Some(handle) = self.task.lock().expect("timer task lock poisoned").take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    fn channels() -> (
        mpsc::UnboundedSender<u32>,
        mpsc::UnboundedReceiver<u32>,
        mpsc::UnboundedSender<()>,
        mpsc::UnboundedReceiver<()>,
    ) {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (expire_tx, expire_rx) = mpsc::unbounded_channel();
        (tick_tx, tick_rx, expire_tx, expire_rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<u32>) -> Vec<u32> {
        let mut values = Vec::new();
        while let Ok(value) = rx.try_recv() {
            values.push(value);
        }
        values
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_and_expires_exactly_once() {
        let timer = TimerScheduler::new();
        let (tick_tx, mut tick_rx, expire_tx, mut expire_rx) = channels();

        timer.start(
            3,
            move |remaining| {
                let _ = tick_tx.send(remaining);
            },
            move || async move {
                let _ = expire_tx.send(());
            },
        );

        sleep(Duration::from_secs(5)).await;

        assert_eq!(drain(&mut tick_rx), vec![2, 1, 0]);
        assert!(expire_rx.try_recv().is_ok());
        assert!(expire_rx.try_recv().is_err());
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn starting_supersedes_the_running_countdown() {
        let timer = TimerScheduler::new();
        let (first_tick_tx, mut first_tick_rx, first_expire_tx, mut first_expire_rx) = channels();
        let (second_tick_tx, mut second_tick_rx, second_expire_tx, mut second_expire_rx) =
            channels();

        timer.start(
            60,
            move |remaining| {
                let _ = first_tick_tx.send(remaining);
            },
            move || async move {
                let _ = first_expire_tx.send(());
            },
        );
        timer.start(
            2,
            move |remaining| {
                let _ = second_tick_tx.send(remaining);
            },
            move || async move {
                let _ = second_expire_tx.send(());
            },
        );

        sleep(Duration::from_secs(4)).await;

        // The superseded countdown never ticks or expires.
        assert!(drain(&mut first_tick_rx).is_empty());
        assert!(first_expire_rx.try_recv().is_err());

        assert_eq!(drain(&mut second_tick_rx), vec![1, 0]);
        assert!(second_expire_rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_without_expiry() {
        let timer = TimerScheduler::new();
        let (tick_tx, mut tick_rx, expire_tx, mut expire_rx) = channels();

        timer.start(
            5,
            move |remaining| {
                let _ = tick_tx.send(remaining);
            },
            move || async move {
                let _ = expire_tx.send(());
            },
        );

        sleep(Duration::from_millis(2_500)).await;
        timer.stop();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(drain(&mut tick_rx), vec![4, 3]);
        assert!(expire_rx.try_recv().is_err());
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_seconds_tracks_the_countdown() {
        let timer = TimerScheduler::new();
        assert_eq!(timer.remaining_seconds(), None);

        timer.start(10, |_| {}, || async {});
        assert_eq!(timer.remaining_seconds(), Some(10));

        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(timer.remaining_seconds(), Some(7));

        timer.stop();
        assert_eq!(timer.remaining_seconds(), None);
    }
}
