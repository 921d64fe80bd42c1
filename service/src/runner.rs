//! Drives a [`PeriodicTask`] on a fixed schedule until told to stop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use forexalert_common::{PeriodicTask, TickOutcome};
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a scheduled task.
pub struct EngineHandle {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl EngineHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop scheduling new ticks and wait for the loop to exit.
    ///
    /// A tick already running is allowed to finish; it is never cancelled
    /// half way through a commit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(task = %self.name, error = %e, "Task loop ended abnormally");
        }
    }
}

/// Spawns task loops.
pub struct EngineRunner;

impl EngineRunner {
    /// Schedule `task`: the first tick after its initial delay, then once per
    /// interval. A tick that overruns its interval delays the next one; ticks
    /// never overlap.
    pub fn start(task: Arc<dyn PeriodicTask>) -> EngineHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let name = task.name().to_string();
        let join = tokio::spawn(run_loop(task, shutdown_rx));

        EngineHandle {
            name,
            shutdown_tx,
            join,
        }
    }
}

async fn run_loop(task: Arc<dyn PeriodicTask>, mut shutdown_rx: watch::Receiver<bool>) {
    let period = task.interval().max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + task.initial_delay(), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        task = task.name(),
        interval_secs = period.as_secs_f64(),
        initial_delay_secs = task.initial_delay().as_secs_f64(),
        "Task scheduled"
    );

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                match AssertUnwindSafe(task.tick()).catch_unwind().await {
                    Ok(TickOutcome::Completed { items }) => {
                        debug!(task = task.name(), items, "Tick completed");
                    }
                    Ok(TickOutcome::Failed { reason }) => {
                        warn!(task = task.name(), reason = %reason, "Tick failed");
                    }
                    Err(payload) => {
                        error!(task = task.name(), panic = %panic_message(&*payload), "Tick panicked");
                    }
                }
            }
        }
    }

    info!(task = task.name(), "Task stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        ticks: AtomicUsize,
        interval: Duration,
        initial_delay: Duration,
        fail: bool,
    }

    impl CountingTask {
        fn new(interval: Duration, initial_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                ticks: AtomicUsize::new(0),
                interval,
                initial_delay,
                fail: false,
            })
        }

        fn count(&self) -> usize {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeriodicTask for CountingTask {
        fn name(&self) -> &str {
            "counting"
        }

        fn interval(&self) -> Duration {
            self.interval
        }

        fn initial_delay(&self) -> Duration {
            self.initial_delay
        }

        async fn tick(&self) -> TickOutcome {
            let items = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                TickOutcome::Failed {
                    reason: "upstream down".to_string(),
                }
            } else {
                TickOutcome::Completed { items }
            }
        }
    }

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let task = CountingTask::new(Duration::from_millis(10), Duration::ZERO);
        let handle = EngineRunner::start(task.clone());
        assert_eq!(handle.name(), "counting");

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;

        let after_stop = task.count();
        assert!(after_stop >= 2, "expected several ticks, got {}", after_stop);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(task.count(), after_stop);
    }

    #[tokio::test]
    async fn test_initial_delay_is_honoured() {
        let task = CountingTask::new(Duration::from_millis(10), Duration::from_secs(60));
        let handle = EngineRunner::start(task.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;

        assert_eq!(task.count(), 0);
    }

    struct PanickingTask {
        ticks: AtomicUsize,
    }

    #[async_trait]
    impl PeriodicTask for PanickingTask {
        fn name(&self) -> &str {
            "panicking"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }

        async fn tick(&self) -> TickOutcome {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            if tick == 0 {
                panic!("store poisoned");
            }
            TickOutcome::Completed { items: tick }
        }
    }

    #[tokio::test]
    async fn test_panicking_tick_keeps_schedule() {
        let task = Arc::new(PanickingTask {
            ticks: AtomicUsize::new(0),
        });
        let handle = EngineRunner::start(task.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;

        assert!(task.ticks.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_failed_ticks_keep_schedule() {
        let task = Arc::new(CountingTask {
            ticks: AtomicUsize::new(0),
            interval: Duration::from_millis(10),
            initial_delay: Duration::ZERO,
            fail: true,
        });
        let handle = EngineRunner::start(task.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;

        assert!(task.count() >= 2);
    }
}
