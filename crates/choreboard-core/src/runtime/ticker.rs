//! Background loop driving [`Engine::tick`].

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::Engine;

/// Shortest sleep between two ticks.
const MIN_WAIT: Duration = Duration::from_millis(50);

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Sleep length from `now` until `next_due`, never below [`MIN_WAIT`].
fn wait_until(next_due: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next_due - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(MIN_WAIT)
}

/// Sleeps until the engine has work due, wakes early when a kid is marked
/// dirty, and exits when the shutdown flag flips to `true`.
pub struct Ticker {
    engine: Arc<Mutex<Engine>>,
    wake: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
    clock: Clock,
}

impl Ticker {
    pub fn new(engine: Arc<Mutex<Engine>>, wake: Arc<Notify>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            engine,
            wake,
            shutdown,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("ticker started");
        loop {
            let now = (self.clock)();
            let next_due = {
                let mut engine = self.engine.lock().await;
                match engine.tick(now) {
                    Ok(report) => {
                        if report.swept || report.evaluated > 0 {
                            debug!(
                                swept = report.swept,
                                evaluated = report.evaluated,
                                pruned = report.pruned,
                                "tick"
                            );
                        }
                        report.next_due.unwrap_or_else(|| engine.next_due(now))
                    }
                    Err(e) => {
                        warn!("tick failed: {e}");
                        engine.next_due(now)
                    }
                }
            };
            let wait = wait_until(next_due, now);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {},
                _ = self.wake.notified() => {},
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("ticker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chore, Kid};
    use crate::storage::EngineConfig;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn wait_is_measured_from_the_tick_time() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        assert_eq!(
            wait_until(now + chrono::Duration::seconds(2), now),
            Duration::from_secs(2)
        );
        assert_eq!(wait_until(now - chrono::Duration::seconds(2), now), MIN_WAIT);
    }

    #[tokio::test]
    async fn clock_is_read_once_per_iteration() {
        let fixed = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);

        let engine = Engine::in_memory(EngineConfig::default());
        let wake = engine.wake_handle();
        let engine = Arc::new(Mutex::new(engine));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Ticker::new(engine, wake, stop_rx)
            .with_clock(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                fixed
            })
            .spawn();

        // The first pass sweeps, then sleeps until the next sweep is due.
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evaluates_dirty_kids_and_stops_on_shutdown() {
        let mut config = EngineConfig::default();
        config.scheduler.debounce_secs = 0;
        let mut engine = Engine::in_memory(config);
        let kid = engine.add_kid(Kid::new("Ava")).unwrap();
        let mut chore = Chore::new("Dishes", 10.0);
        chore.assigned_kids.push(kid.clone());
        let chore = engine.add_chore(chore).unwrap();

        let wake = engine.wake_handle();
        let engine = Arc::new(Mutex::new(engine));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Ticker::new(Arc::clone(&engine), wake, stop_rx).spawn();

        engine
            .lock()
            .await
            .claim_chore(&kid, &chore, Utc::now())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(engine.lock().await.dirty_queue().is_empty());

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
