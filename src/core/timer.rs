use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Owns the recurring expiry-check task. At most one loop runs at a time;
/// starting again replaces the previous loop, and dropping cancels it.
#[derive(Debug, Default)]
pub struct TimerCheck {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `tick` every `period`, first after one full period, until it
    /// returns [`TickOutcome::Stop`] or the loop is cancelled.
    pub fn start<F, Fut>(&self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickOutcome> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if tick().await == TickOutcome::Stop {
                    break;
                }
            }
            tracing::debug!("Timer check loop finished");
        });

        let mut slot = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
        tracing::debug!("Timer check loop started (every {:?})", period);
    }

    pub fn stop(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(task) = slot.take() {
            task.abort();
            tracing::debug!("Timer check loop cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        let slot = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TimerCheck {
    fn drop(&mut self) {
        self.stop();
    }
}
