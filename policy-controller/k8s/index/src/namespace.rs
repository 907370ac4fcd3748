use anyhow::{anyhow, Result};
use netpol_controller_k8s_api::{self as k8s, ResourceExt};

/// The parts of a `Namespace` that namespace selectors match against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterNamespace {
    pub name: String,
    pub labels: k8s::Labels,
}

// === impl ClusterNamespace ===

impl ClusterNamespace {
    /// A namespace that is not (yet) known to the index. It has no labels.
    pub fn unlabeled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: k8s::Labels::default(),
        }
    }
}

impl TryFrom<&k8s::Namespace> for ClusterNamespace {
    type Error = anyhow::Error;

    fn try_from(ns: &k8s::Namespace) -> Result<Self> {
        let name = ns
            .metadata
            .name
            .clone()
            .ok_or_else(|| anyhow!("namespace must have a name"))?;
        Ok(Self {
            name,
            labels: ns.labels().clone().into(),
        })
    }
}
