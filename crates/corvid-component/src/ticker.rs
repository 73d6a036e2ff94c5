//! PeriodicRunner: drives a component's once-per-second, per-minute and
//! per-hour hooks until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::component::Component;

pub struct PeriodicRunner {
    component: Arc<Component>,
    second: Duration,
    minute: Duration,
    hour: Duration,
}

impl PeriodicRunner {
    pub fn new(component: Arc<Component>) -> Self {
        Self {
            component,
            second: Duration::from_secs(1),
            minute: Duration::from_secs(60),
            hour: Duration::from_secs(3600),
        }
    }

    /// Override the three tick periods.
    pub fn with_periods(mut self, second: Duration, minute: Duration, hour: Duration) -> Self {
        self.second = second;
        self.minute = minute;
        self.hour = hour;
        self
    }

    /// Run until `shutdown` changes. Hooks are called from this task only,
    /// so they never overlap with each other.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let start = Instant::now();
        let mut second = interval_at(start + self.second, self.second);
        let mut minute = interval_at(start + self.minute, self.minute);
        let mut hour = interval_at(start + self.hour, self.hour);
        for ticker in [&mut second, &mut minute, &mut hour] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        info!(
            component = %self.component.name(),
            second_ms = self.second.as_millis() as u64,
            minute_ms = self.minute.as_millis() as u64,
            hour_ms = self.hour.as_millis() as u64,
            "periodic runner started"
        );

        loop {
            tokio::select! {
                _ = second.tick() => self.component.every_second(),
                _ = minute.tick() => {
                    debug!(component = %self.component.name(), "minute tick");
                    self.component.every_minute();
                }
                _ = hour.tick() => {
                    debug!(component = %self.component.name(), "hour tick");
                    self.component.every_hour();
                }
                _ = shutdown.changed() => {
                    info!(component = %self.component.name(), "periodic runner shutting down");
                    break;
                }
            }
        }
    }
}
