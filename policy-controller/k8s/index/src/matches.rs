//! Evaluates whether a workload is selected by a policy or one of its peers.
//!
//! These checks never fail: a selector that cannot be parsed selects nothing. Translation parses
//! the same selectors and reports the error there.

use crate::{ClusterNamespace, NetworkPolicy, Peer, Workload};
use netpol_controller_core::Direction;
use netpol_controller_k8s_api::{self as k8s, Selector};
use tracing::debug;

/// Indicates whether `workload`, living in namespace `ns`, is selected by `peer` of a policy in
/// `policy_ns`.
///
/// CIDR peers never match a workload; they are resolved to addresses directly.
pub fn peer_matches(workload: &Workload, ns: &ClusterNamespace, peer: &Peer, policy_ns: &str) -> bool {
    let (pod_selector, namespace_selector) = match peer {
        Peer::IpBlock { .. } => return false,
        Peer::Selector {
            pod_selector,
            namespace_selector,
        } => (pod_selector, namespace_selector),
    };

    match namespace_selector {
        None if policy_ns != ns.name => return false,
        None => {}
        Some(selector) if !selects(selector, &ns.labels) => return false,
        Some(_) => {}
    }

    match pod_selector {
        None => true,
        Some(selector) => selects(selector, &workload.labels),
    }
}

/// Indicates whether `workload` is relevant to `policy`: its labels match the policy's pod
/// selector, or it matches any ingress or egress peer.
///
/// The pod selector is matched on labels alone, so a workload in another namespace with matching
/// labels is still reported. Such a workload only causes a redundant resync.
pub fn policy_targets(workload: &Workload, ns: &ClusterNamespace, policy: &NetworkPolicy) -> bool {
    if selects(&policy.pod_selector, &workload.labels) {
        return true;
    }

    Direction::ALL.iter().any(|dir| {
        policy
            .peers(*dir)
            .any(|peer| peer_matches(workload, ns, peer, &policy.key.namespace))
    })
}

/// Indicates whether some peer of `policy` selects namespace `ns` through a namespace selector.
pub fn namespace_selected(ns: &ClusterNamespace, policy: &NetworkPolicy) -> bool {
    Direction::ALL.iter().any(|dir| {
        policy
            .peers(*dir)
            .filter_map(Peer::namespace_selector)
            .any(|selector| selects(selector, &ns.labels))
    })
}

fn selects(selector: &k8s::LabelSelector, labels: &k8s::Labels) -> bool {
    match Selector::try_from(selector) {
        Ok(selector) => selector.matches(labels),
        Err(error) => {
            debug!(%error, "Ignoring invalid selector");
            false
        }
    }
}
