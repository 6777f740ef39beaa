use super::service::ApprovalService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Periodic driver for the approval deadline sweep.
pub struct Sweeper {
    service: Arc<ApprovalService>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(service: Arc<ApprovalService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Sweeps once per interval until `shutdown` turns `true` or its sender
    /// is dropped. Returns the number of sweeps that ran.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut runs = 0;

        tracing::info!(interval = ?self.interval, "approval sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    runs += 1;
                    if let Err(e) = self.service.sweep().await {
                        tracing::error!(error = %e, "approval sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(runs, "approval sweeper stopped");
        runs
    }
}
