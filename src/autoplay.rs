use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// Message sent by a running lease on every period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoplayTick {
    pub lease: u64,
}

/// Owns the periodic autoplay timer task. Dropping the lease aborts the
/// task, so no tick is produced after the lease is gone.
#[derive(Debug)]
pub struct AutoplayLease {
    id: u64,
    task: JoinHandle<()>,
}

impl AutoplayLease {
    /// Spawns the timer. The first tick fires one full `interval` after
    /// acquisition, never immediately. Must be called inside a tokio runtime.
    pub fn acquire(id: u64, interval: Duration, ticks: UnboundedSender<AutoplayTick>) -> Self {
        debug!(lease = id, interval_ms = interval.as_millis() as u64, "autoplay lease acquired");
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if ticks.send(AutoplayTick { lease: id }).is_err() {
                    break;
                }
            }
        });
        Self { id, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn owns(&self, tick: AutoplayTick) -> bool {
        tick.lease == self.id
    }
}

impl Drop for AutoplayLease {
    fn drop(&mut self) {
        self.task.abort();
        debug!(lease = self.id, "autoplay lease released");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::{AutoplayLease, AutoplayTick};

    #[tokio::test(start_paused = true)]
    async fn lease_ticks_on_its_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let lease = AutoplayLease::acquire(7, Duration::from_millis(2_000), tx);

        tokio::time::advance(Duration::from_millis(1_999)).await;
        assert!(rx.try_recv().is_err());

        let tick = rx.recv().await.expect("tick");
        assert_eq!(tick, AutoplayTick { lease: 7 });
        assert!(lease.owns(tick));
        assert!(!lease.owns(AutoplayTick { lease: 6 }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_lease_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let lease = AutoplayLease::acquire(1, Duration::from_millis(100), tx);
        rx.recv().await.expect("first tick");
        drop(lease);

        // The aborted task drops its sender, closing the channel.
        assert_eq!(rx.recv().await, None);
    }
}
