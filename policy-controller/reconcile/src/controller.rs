use crate::{Cleanup, ControllerMetrics, Reconciler, WorkQueue};
use netpol_controller_core::PolicyKey;
use tracing::{debug, error, info, warn};

/// Drains the update and delete queues through a [`Reconciler`].
///
/// Any number of workers may run against the same queues.
#[derive(Clone)]
pub struct Controller {
    reconciler: Reconciler,
    updates: WorkQueue<PolicyKey>,
    deletes: WorkQueue<PolicyKey>,
    metrics: ControllerMetrics,
}

impl Controller {
    pub fn new(
        reconciler: Reconciler,
        updates: WorkQueue<PolicyKey>,
        deletes: WorkQueue<PolicyKey>,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            reconciler,
            updates,
            deletes,
            metrics,
        }
    }

    /// Processes updates until the update queue is shut down and drained.
    pub async fn run_update_worker(self) {
        while self.process_next_update().await {}
        debug!("Update worker finished");
    }

    /// Processes deletes until the delete queue is shut down and drained.
    pub async fn run_delete_worker(self) {
        while self.process_next_delete().await {}
        debug!("Delete worker finished");
    }

    /// Reconciles the next key from the update queue. Returns false once the queue is shut down.
    pub async fn process_next_update(&self) -> bool {
        let queue = &self.updates;
        let Some(key) = queue.get().await else {
            return false;
        };

        match self.reconciler.reconcile(&key).await {
            Ok(()) => {
                queue.forget(&key);
                self.metrics.reconciled(queue.name(), "ok");
            }
            Err(err) => {
                if err.is_transient() {
                    warn!(policy = %key, error = %err, "Failed to reconcile NetworkPolicy");
                } else {
                    error!(policy = %key, error = %err, "Invalid NetworkPolicy");
                }
                self.metrics.reconciled(queue.name(), "error");
                self.metrics.requeued(queue.name());
                queue.add_rate_limited(key.clone());
            }
        }

        queue.done(&key);
        true
    }

    /// Cleans up after the next key from the delete queue. Returns false once the queue is shut
    /// down.
    pub async fn process_next_delete(&self) -> bool {
        let queue = &self.deletes;
        let Some(key) = queue.get().await else {
            return false;
        };

        match self.reconciler.reconcile_delete(&key).await {
            Ok(cleanup) => {
                if let Cleanup::PortGroupRetained(error) = cleanup {
                    info!(policy = %key, %error, "Port group left in place");
                }
                queue.forget(&key);
                self.metrics.reconciled(queue.name(), "ok");
            }
            Err(error) => {
                warn!(policy = %key, %error, "Failed to clean up NetworkPolicy");
                self.metrics.reconciled(queue.name(), "error");
                self.metrics.requeued(queue.name());
                queue.add_rate_limited(key.clone());
            }
        }

        queue.done(&key);
        true
    }
}
