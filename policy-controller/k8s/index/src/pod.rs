use anyhow::{anyhow, Result};
use netpol_controller_k8s_api::{self as k8s, ResourceExt};

/// The parts of a `Pod` that policy translation depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub labels: k8s::Labels,

    /// Host-network pods share the node's address and have no logical port, so they never appear
    /// in port groups or address sets.
    pub host_network: bool,

    /// The assigned address, if one is known.
    pub address: Option<String>,
}

// === impl Workload ===

impl Workload {
    /// The name of the workload's logical port on the backend.
    pub fn port_name(&self) -> String {
        format!("{}.{}", self.name, self.namespace)
    }

    /// The address to program into address sets, unless the workload uses the host network.
    pub fn policy_address(&self) -> Option<&str> {
        if self.host_network {
            return None;
        }
        self.address.as_deref()
    }
}

impl TryFrom<&k8s::Pod> for Workload {
    type Error = anyhow::Error;

    fn try_from(pod: &k8s::Pod) -> Result<Self> {
        let namespace = pod
            .namespace()
            .ok_or_else(|| anyhow!("pod must have a namespace"))?;
        let name = pod
            .metadata
            .name
            .clone()
            .ok_or_else(|| anyhow!("pod must have a name"))?;
        let host_network = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.host_network)
            .unwrap_or(false);

        Ok(Self {
            namespace,
            name,
            labels: pod.labels().clone().into(),
            host_network,
            address: pod_address(pod),
        })
    }
}

/// Prefers the address assigned by the network plugin over the one reported in the pod's status.
fn pod_address(pod: &k8s::Pod) -> Option<String> {
    let annotated = pod
        .annotations()
        .get(k8s::IP_ADDRESS_ANNOTATION)
        .filter(|addr| !addr.is_empty())
        .and_then(|addr| addr.split('/').next())
        .filter(|addr| !addr.is_empty());
    if let Some(addr) = annotated {
        return Some(addr.to_string());
    }

    pod.status
        .as_ref()
        .and_then(|status| status.pod_ip.as_deref())
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
