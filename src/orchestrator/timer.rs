//! Repeating elapsed-time reporter.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// One-second (configurable) ticker that only fires while armed.
pub(crate) struct RunTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl RunTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// First tick lands one period after arming.
    pub fn arm(&mut self) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
    }

    pub fn disarm(&mut self) {
        self.interval = None;
    }

    /// Resolves on the next tick; never resolves while disarmed. Cancel safe.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => futures::future::pending().await,
        }
    }
}
