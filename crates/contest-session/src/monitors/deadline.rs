//! Deadline monitor
//!
//! Checks the clock once at start and then on every tick. Emits exactly one
//! `TimedOut` and stops. Dropping the [`DeadlineHandle`] aborts the task.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::events::SessionEvent;
use crate::ports::outbound::Clock;

/// One-shot deadline check.
#[derive(Clone, Copy, Debug)]
pub struct DeadlineMonitor {
    end_time: DateTime<Utc>,
    fired: bool,
}

impl DeadlineMonitor {
    pub fn new(end_time: DateTime<Utc>) -> Self {
        Self {
            end_time,
            fired: false,
        }
    }

    /// `true` the first time `now` reaches the end time, `false` ever after.
    pub fn check(&mut self, now: DateTime<Utc>) -> bool {
        if self.fired || now < self.end_time {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Spawn the polling task.
    ///
    /// The first tick completes immediately, so a contest that has already
    /// ended times out without waiting a full interval.
    pub fn spawn<C>(
        end_time: DateTime<Utc>,
        clock: Arc<C>,
        poll_interval: Duration,
        events: mpsc::Sender<SessionEvent>,
    ) -> DeadlineHandle
    where
        C: Clock + 'static,
    {
        let task = tokio::spawn(async move {
            let mut monitor = DeadlineMonitor::new(end_time);
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if monitor.check(clock.now()) {
                    info!(%end_time, "Contest window closed");
                    if events.send(SessionEvent::TimedOut).await.is_err() {
                        debug!("Session gone before deadline event was delivered");
                    }
                    break;
                }
            }
        });

        DeadlineHandle { task }
    }
}

/// Owns the polling task; aborts it on drop.
#[derive(Debug)]
pub struct DeadlineHandle {
    task: JoinHandle<()>,
}

impl DeadlineHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for DeadlineHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
