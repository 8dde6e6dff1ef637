//! The recurring refresh timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::service::BackgroundEvent;

/// A named periodic trigger. At most one timer runs at a time; creating it
/// again replaces the previous one.
pub struct Alarm {
    name: &'static str,
    period: Duration,
    timer: Option<JoinHandle<()>>,
}

impl Alarm {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            timer: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Arm the timer. The first firing is one full period from now.
    pub fn create(&mut self, events: mpsc::Sender<BackgroundEvent>) {
        self.clear();

        let period = self.period;
        let name = self.name;
        self.timer = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                debug!(alarm = name, "alarm fired");
                if events.send(BackgroundEvent::AlarmFired).await.is_err() {
                    break;
                }
            }
        }));

        info!(alarm = name, period_secs = period.as_secs(), "alarm created");
    }

    /// Disarm the timer. Returns whether one was running.
    pub fn clear(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                info!(alarm = self.name, "alarm cleared");
                true
            }
            None => false,
        }
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
