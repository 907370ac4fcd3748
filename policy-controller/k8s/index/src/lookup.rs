//! Reverse lookups from workloads and namespaces to the policies that depend on them.

use crate::{matches, ClusterNamespace, Index, Workload};
use netpol_controller_core::PolicyKey;
use std::collections::BTreeSet;

impl Index {
    /// Returns the keys of all policies that target `workload` or select it as a peer.
    pub fn workload_matching_policies(&self, workload: &Workload) -> Vec<PolicyKey> {
        self.workload_policy_keys(workload).into_iter().collect()
    }

    /// Returns the keys of all policies with a peer whose namespace selector matches `ns`, whether
    /// or not any workload currently lives in it.
    pub fn namespace_matching_policies(&self, ns: &ClusterNamespace) -> Vec<PolicyKey> {
        self.namespace_policy_keys(ns).into_iter().collect()
    }

    pub(crate) fn workload_policy_keys(&self, workload: &Workload) -> BTreeSet<PolicyKey> {
        let ns = self.namespace(&workload.namespace);
        self.all_policies()
            .filter(|policy| matches::policy_targets(workload, &ns, policy))
            .map(|policy| policy.key.clone())
            .collect()
    }

    pub(crate) fn namespace_policy_keys(&self, ns: &ClusterNamespace) -> BTreeSet<PolicyKey> {
        self.all_policies()
            .filter(|policy| matches::namespace_selected(ns, policy))
            .map(|policy| policy.key.clone())
            .collect()
    }
}
