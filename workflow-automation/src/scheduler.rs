//! Host-owned polling loop that dispatches triggered workflows

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use workflow_automation_sdk::log_warning;

use crate::engine::AutomationEngine;

/// Polls `check_triggers` on a fixed interval and dispatches each triggered
/// workflow id to `run_workflow` on its own task. The engine serializes
/// concurrent runs of the same id, so a slow run cannot race its own
/// counters when the next tick fires it again.
pub struct Scheduler {
    engine: Arc<AutomationEngine>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<AutomationEngine>, poll_interval: Duration) -> Self {
        Self {
            engine,
            poll_interval,
        }
    }

    /// Run until `shutdown` observes a change. On shutdown, in-flight runs
    /// are aborted; dropping an action future kills any child process it
    /// spawned.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for workflow_id in self.engine.check_triggers() {
                        let engine = self.engine.clone();
                        in_flight.spawn(async move {
                            if let Err(e) = engine.run_workflow(&workflow_id).await {
                                log_warning!("Scheduled run skipped: {}", e);
                            }
                        });
                    }
                    // Reap finished runs without blocking the tick
                    while in_flight.try_join_next().is_some() {}
                }
                _ = shutdown.changed() => break,
            }
        }

        in_flight.shutdown().await;
    }
}
