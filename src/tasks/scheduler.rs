use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

/// Handle to a repeating job. Cancelling or dropping it stops the job.
#[derive(Debug)]
pub struct TimerHandle {
    handle: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Runs `tick` every `period`, first after one full period.
pub fn schedule_repeating<F>(label: &'static str, period: Duration, mut tick: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(target: "scheduler", job = label, period = ?period, "timer started");
        loop {
            ticker.tick().await;
            tick();
        }
    });
    TimerHandle { handle }
}
