//! Handles all of the indexing logic. Resource-specific conversion is done in the `policy`, `pod`
//! and `namespace` modules; the `Store` trait exposes the indexed state to the reconciler.

use crate::{ClusterNamespace, NetworkPolicy, Workload};
use netpol_controller_core::PolicyKey;
use netpol_controller_k8s_api::{self as k8s, Selector};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

pub type SharedIndex = Arc<RwLock<Index>>;

/// Holds all indexing state. Updated by the `kubert::index` watch tasks and read by reconcilers.
#[derive(Debug)]
pub struct Index {
    /// Holds policies by namespace and name.
    pub(crate) policies: BTreeMap<String, BTreeMap<String, Arc<NetworkPolicy>>>,

    /// Holds workloads by namespace and name.
    pub(crate) workloads: BTreeMap<String, BTreeMap<String, Arc<Workload>>>,

    pub(crate) namespaces: BTreeMap<String, Arc<ClusterNamespace>>,

    events: UnboundedSender<PolicyEvent>,
}

/// A change to the set of policies, or to state that a set of policies depends on.
#[derive(Clone, Debug, PartialEq)]
pub enum PolicyEvent {
    Added(Arc<NetworkPolicy>),
    Updated {
        old: Arc<NetworkPolicy>,
        new: Arc<NetworkPolicy>,
    },
    Deleted(Arc<NetworkPolicy>),

    /// A workload or namespace that these policies select has changed.
    Resync(Vec<PolicyKey>),
}

/// Read access to indexed cluster state.
///
/// Lookups report a missing object as `None` rather than as an error.
pub trait Store: Send + Sync {
    fn get_policy(&self, key: &PolicyKey) -> Result<Option<Arc<NetworkPolicy>>, StoreError>;

    fn list_policies(&self) -> Result<Vec<Arc<NetworkPolicy>>, StoreError>;

    /// Lists the workloads in `namespace` whose labels match `selector`.
    fn list_workloads(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Arc<Workload>>, StoreError>;

    /// Lists the namespaces whose labels match `selector`.
    fn list_namespaces(&self, selector: &Selector) -> Result<Vec<Arc<ClusterNamespace>>, StoreError>;
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("failed to list {kind}: {reason}")]
pub struct StoreError {
    pub kind: &'static str,
    pub reason: String,
}

// === impl Index ===

impl Index {
    pub fn shared(events: UnboundedSender<PolicyEvent>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            policies: BTreeMap::new(),
            workloads: BTreeMap::new(),
            namespaces: BTreeMap::new(),
            events,
        }))
    }

    /// Returns the indexed namespace, or an unlabeled stand-in if it has not been seen yet.
    pub fn namespace(&self, name: &str) -> Arc<ClusterNamespace> {
        self.namespaces
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::new(ClusterNamespace::unlabeled(name)))
    }

    pub(crate) fn all_policies(&self) -> impl Iterator<Item = &Arc<NetworkPolicy>> + '_ {
        self.policies.values().flat_map(|by_name| by_name.values())
    }

    fn publish(&self, event: PolicyEvent) {
        if self.events.send(event).is_err() {
            warn!("Policy event receiver dropped");
        }
    }

    fn resync(&self, keys: BTreeSet<PolicyKey>) {
        if keys.is_empty() {
            return;
        }
        debug!(policies = keys.len(), "Resyncing policies");
        self.publish(PolicyEvent::Resync(keys.into_iter().collect()));
    }

    fn apply_workload(&mut self, workload: Workload) {
        let workload = Arc::new(workload);
        let old = self
            .workloads
            .entry(workload.namespace.clone())
            .or_default()
            .insert(workload.name.clone(), workload.clone());

        if old.as_deref() == Some(&*workload) {
            return;
        }

        let mut keys = self.workload_policy_keys(&workload);
        if let Some(old) = old {
            keys.extend(self.workload_policy_keys(&old));
        }
        self.resync(keys);
    }

    fn delete_workload(&mut self, namespace: &str, name: &str) {
        let Some(by_name) = self.workloads.get_mut(namespace) else {
            return;
        };
        let Some(old) = by_name.remove(name) else {
            return;
        };
        if by_name.is_empty() {
            self.workloads.remove(namespace);
        }

        let keys = self.workload_policy_keys(&old);
        self.resync(keys);
    }

    fn apply_namespace(&mut self, ns: ClusterNamespace) {
        let ns = Arc::new(ns);
        let old = self.namespaces.insert(ns.name.clone(), ns.clone());
        if old.as_deref() == Some(&*ns) {
            return;
        }

        let mut keys = self.namespace_policy_keys(&ns);
        if let Some(old) = old {
            keys.extend(self.namespace_policy_keys(&old));
        }
        self.resync(keys);
    }

    fn delete_namespace(&mut self, name: &str) {
        if let Some(old) = self.namespaces.remove(name) {
            let keys = self.namespace_policy_keys(&old);
            self.resync(keys);
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::NetworkPolicy> for Index {
    fn apply(&mut self, resource: k8s::NetworkPolicy) {
        let policy = match NetworkPolicy::try_from(resource) {
            Ok(policy) => Arc::new(policy),
            Err(error) => {
                warn!(%error, "Ignoring NetworkPolicy");
                return;
            }
        };

        let old = self
            .policies
            .entry(policy.key.namespace.clone())
            .or_default()
            .insert(policy.key.name.clone(), policy.clone());

        match old {
            Some(old) => self.publish(PolicyEvent::Updated { old, new: policy }),
            None => {
                info!(policy = %policy.key, "Indexed NetworkPolicy");
                self.publish(PolicyEvent::Added(policy));
            }
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        let Some(by_name) = self.policies.get_mut(&namespace) else {
            return;
        };
        if let Some(old) = by_name.remove(&name) {
            if by_name.is_empty() {
                self.policies.remove(&namespace);
            }
            info!(policy = %old.key, "Removed NetworkPolicy");
            self.publish(PolicyEvent::Deleted(old));
        }
    }

    // Resets are handled by the default implementation, which applies every current resource and
    // deletes those that were removed. Unchanged policies surface as no-op updates.
}

impl kubert::index::IndexNamespacedResource<k8s::Pod> for Index {
    fn apply(&mut self, resource: k8s::Pod) {
        match Workload::try_from(&resource) {
            Ok(workload) => self.apply_workload(workload),
            Err(error) => warn!(%error, "Ignoring Pod"),
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_workload(&namespace, &name);
    }
}

impl kubert::index::IndexClusterResource<k8s::Namespace> for Index {
    fn apply(&mut self, resource: k8s::Namespace) {
        match ClusterNamespace::try_from(&resource) {
            Ok(ns) => self.apply_namespace(ns),
            Err(error) => warn!(%error, "Ignoring Namespace"),
        }
    }

    fn delete(&mut self, name: String) {
        self.delete_namespace(&name);
    }
}

// === impl Store ===

impl Store for RwLock<Index> {
    fn get_policy(&self, key: &PolicyKey) -> Result<Option<Arc<NetworkPolicy>>, StoreError> {
        Ok(self
            .read()
            .policies
            .get(&key.namespace)
            .and_then(|by_name| by_name.get(&key.name))
            .cloned())
    }

    fn list_policies(&self) -> Result<Vec<Arc<NetworkPolicy>>, StoreError> {
        Ok(self.read().all_policies().cloned().collect())
    }

    fn list_workloads(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Arc<Workload>>, StoreError> {
        Ok(self
            .read()
            .workloads
            .get(namespace)
            .into_iter()
            .flat_map(|by_name| by_name.values())
            .filter(|w| selector.matches(&w.labels))
            .cloned()
            .collect())
    }

    fn list_namespaces(&self, selector: &Selector) -> Result<Vec<Arc<ClusterNamespace>>, StoreError> {
        Ok(self
            .read()
            .namespaces
            .values()
            .filter(|ns| selector.matches(&ns.labels))
            .cloned()
            .collect())
    }
}
