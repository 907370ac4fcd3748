use crate::WorkQueue;
use kubert::lease::Claim;
use netpol_controller_core::PolicyKey;
use netpol_controller_k8s_index::{PolicyEvent, Store};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Turns policy events into work for the update and delete queues.
///
/// Only the replica holding the write lease enqueues anything; events seen by other replicas are
/// dropped.
pub struct Notifier {
    hostname: String,
    claims: watch::Receiver<Arc<Claim>>,
    updates: WorkQueue<PolicyKey>,
    deletes: WorkQueue<PolicyKey>,
}

impl Notifier {
    pub fn new(
        hostname: impl ToString,
        claims: watch::Receiver<Arc<Claim>>,
        updates: WorkQueue<PolicyKey>,
        deletes: WorkQueue<PolicyKey>,
    ) -> Self {
        Self {
            hostname: hostname.to_string(),
            claims,
            updates,
            deletes,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.claims.borrow().is_current_for(&self.hostname)
    }

    pub fn handle(&self, event: PolicyEvent) {
        if !self.is_leader() {
            trace!(?event, "Not the leader; ignoring event");
            return;
        }

        match event {
            PolicyEvent::Added(policy) => self.updates.add(policy.key.clone()),
            PolicyEvent::Updated { old, new } => {
                if old == new {
                    trace!(policy = %new.key, "NetworkPolicy unchanged");
                    return;
                }
                self.updates.add(new.key.clone());
            }
            PolicyEvent::Deleted(policy) => self.deletes.add(policy.key.clone()),
            PolicyEvent::Resync(keys) => {
                for key in keys {
                    self.updates.add(key);
                }
            }
        }
    }

    /// Enqueues every indexed policy for an update.
    pub fn resync_all<S: Store + ?Sized>(&self, store: &S) {
        match store.list_policies() {
            Ok(policies) => {
                debug!(policies = policies.len(), "Resyncing all NetworkPolicies");
                for policy in policies {
                    self.updates.add(policy.key.clone());
                }
            }
            Err(error) => warn!(%error, "Failed to list NetworkPolicies"),
        }
    }

    /// Handles events until the event stream ends, resyncing all policies whenever this replica
    /// becomes the leader. Both queues are shut down on return.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PolicyEvent>, store: Arc<dyn Store>) {
        let mut leader = self.is_leader();
        if leader {
            info!(hostname = %self.hostname, "Leading");
            self.resync_all(&*store);
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => {
                        debug!("Policy events closed");
                        break;
                    }
                },

                res = self.claims.changed() => {
                    if res.is_err() {
                        warn!("Lease claims closed");
                        break;
                    }
                    let is_leader = self.is_leader();
                    if is_leader && !leader {
                        info!(hostname = %self.hostname, "Became leader");
                        self.resync_all(&*store);
                    } else if !is_leader && leader {
                        info!(hostname = %self.hostname, "Lost leadership");
                    }
                    leader = is_leader;
                }
            }
        }

        self.updates.shut_down();
        self.deletes.shut_down();
    }
}
