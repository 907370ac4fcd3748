use crate::{resolve_addresses, Error, EventRecorder};
use netpol_controller_core::{Backend, BackendError, BackendNames, Direction, PolicyKey};
use netpol_controller_k8s_api::Selector;
use netpol_controller_k8s_index::{NetworkPolicy, Store};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// The reason attached to warning events for failed passes.
pub const CREATE_ACL_FAILED: &str = "CreateACLFailed";

/// Programs the backend objects of a policy from the indexed cluster state.
///
/// Every step of a pass is idempotent, so a failed pass leaves partial state that the next
/// successful pass corrects.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn Store>,
    backend: Arc<dyn Backend>,
    events: Arc<dyn EventRecorder>,
}

/// The outcome of a successful delete pass.
#[derive(Debug, PartialEq)]
pub enum Cleanup {
    Complete,

    /// The ACLs and address sets were removed but the port group could not be.
    PortGroupRetained(BackendError),
}

// === impl Reconciler ===

impl Reconciler {
    pub fn new(
        store: Arc<dyn Store>,
        backend: Arc<dyn Backend>,
        events: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            store,
            backend,
            events,
        }
    }

    /// Makes the backend state of the policy identified by `key` match the policy.
    ///
    /// A policy that no longer exists is left to [`Reconciler::reconcile_delete`].
    #[instrument(skip_all, fields(policy = %key))]
    pub async fn reconcile(&self, key: &PolicyKey) -> Result<(), Error> {
        let Some(policy) = self.store.get_policy(key)? else {
            debug!("NetworkPolicy not found");
            return Ok(());
        };

        let result = self.apply(&policy).await;
        if let Err(error) = &result {
            self.events.warn(key, CREATE_ACL_FAILED, error.to_string());
        }
        result
    }

    async fn apply(&self, policy: &NetworkPolicy) -> Result<(), Error> {
        let names = BackendNames::new(&policy.key);

        self.backend.create_port_group(&names.port_group).await?;
        let members = self.port_group_members(policy)?;
        debug!(port_group = %names.port_group, members = members.len(), "Setting port group members");
        self.backend
            .set_port_group_members(&names.port_group, &members)
            .await?;

        for direction in Direction::ALL {
            if policy.has_direction(direction) {
                self.apply_direction(policy, &names, direction).await?;
            } else {
                self.remove_direction(&names, direction).await?;
            }
        }

        Ok(())
    }

    /// The logical ports of the workloads in the policy's namespace that it targets.
    fn port_group_members(&self, policy: &NetworkPolicy) -> Result<Vec<String>, Error> {
        let selector = Selector::try_from(&policy.pod_selector)?;
        let workloads = self
            .store
            .list_workloads(&policy.key.namespace, &selector)?;
        Ok(workloads
            .iter()
            .filter(|w| !w.host_network)
            .map(|w| w.port_name())
            .collect())
    }

    async fn apply_direction(
        &self,
        policy: &NetworkPolicy,
        names: &BackendNames,
        direction: Direction,
    ) -> Result<(), Error> {
        let sets = names.address_sets(direction);
        self.backend.create_address_set(&sets.allow).await?;
        self.backend.create_address_set(&sets.except).await?;

        let mut allow = Vec::new();
        let mut except = Vec::new();
        for peer in policy.peers(direction) {
            let addrs = resolve_addresses(&*self.store, &policy.key.namespace, peer)?;
            allow.extend(addrs.allow);
            except.extend(addrs.except);
        }
        debug!(%direction, allow = allow.len(), except = except.len(), "Setting address sets");
        self.backend
            .set_address_set_members(&sets.allow, &allow)
            .await?;
        self.backend
            .set_address_set_members(&sets.except, &except)
            .await?;

        let ports = policy.acl_ports(direction)?;
        match direction {
            Direction::Ingress => {
                self.backend
                    .create_ingress_acl(&names.port_group, &sets.allow, &sets.except, &ports)
                    .await?
            }
            Direction::Egress => {
                self.backend
                    .create_egress_acl(&names.port_group, &sets.allow, &sets.except, &ports)
                    .await?
            }
        }

        Ok(())
    }

    async fn remove_direction(&self, names: &BackendNames, direction: Direction) -> Result<(), Error> {
        let sets = names.address_sets(direction);
        self.backend.delete_acl(&names.port_group, direction).await?;
        self.backend.delete_address_set(&sets.allow).await?;
        self.backend.delete_address_set(&sets.except).await?;
        Ok(())
    }

    /// Removes every backend object derived from `key`.
    ///
    /// All ACLs and address sets are attempted even if some fail; the port group is only removed
    /// once they are all gone, and a failure to remove it does not fail the pass.
    #[instrument(skip_all, fields(policy = %key))]
    pub async fn reconcile_delete(&self, key: &PolicyKey) -> Result<Cleanup, Error> {
        let names = BackendNames::new(key);
        let mut failure = None;

        for direction in Direction::ALL {
            if let Err(error) = self.backend.delete_acl(&names.port_group, direction).await {
                warn!(%error, %direction, "Failed to delete ACL");
                failure = failure.or(Some(error));
            }
        }

        for direction in Direction::ALL {
            let sets = names.address_sets(direction);
            for set in [&sets.allow, &sets.except] {
                if let Err(error) = self.backend.delete_address_set(set).await {
                    warn!(%error, address_set = %set, "Failed to delete address set");
                    failure = failure.or(Some(error));
                }
            }
        }

        if let Some(error) = failure {
            return Err(error.into());
        }

        match self.backend.delete_port_group(&names.port_group).await {
            Ok(()) => Ok(Cleanup::Complete),
            Err(error) => {
                warn!(%error, port_group = %names.port_group, "Failed to delete port group");
                Ok(Cleanup::PortGroupRetained(error))
            }
        }
    }
}
