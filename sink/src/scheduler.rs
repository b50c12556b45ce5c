//! FlushScheduler triggers the flush of the batching sink at regular interval.
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

pub struct FlushScheduler {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FlushScheduler {
    /// Calls `tick` every `period`, the first call happens one period from now.
    /// The task ends when cancelled or when `tick` returns false.
    pub fn spawn<F>(runtime: &Handle, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(period_ms = period.as_millis() as u64, "flush scheduler started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        if !tick() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("flush scheduler stopped");
        });
        Self { cancel, task }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels and waits for the task, no tick runs after this returns
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("flush scheduler task failed: {e}");
        }
    }
}
