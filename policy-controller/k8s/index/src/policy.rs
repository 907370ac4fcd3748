use anyhow::{anyhow, Result};
use netpol_controller_core::{AclPort, Direction, InvalidPort, PolicyKey, PortRef};
use netpol_controller_k8s_api::{self as k8s, IntOrString, ResourceExt};

/// The parts of a `NetworkPolicy` that translation depends on.
///
/// Selectors and ports are kept as written so that malformed values are reported when the policy
/// is reconciled.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkPolicy {
    pub key: PolicyKey,

    /// Selects the pods in the policy's namespace that the policy applies to.
    pub pod_selector: k8s::LabelSelector,

    /// `None` when the policy has no `ingress` list. An empty list denies all ingress.
    pub ingress: Option<Vec<Rule>>,

    /// `None` when the policy has no `egress` list. An empty list denies all egress.
    pub egress: Option<Vec<Rule>>,

    pub policy_types: Vec<String>,
}

/// A single ingress or egress rule. Peers and rules are OR-combined.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub peers: Vec<Peer>,
    pub ports: Vec<k8s::NetworkPolicyPort>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Peer {
    IpBlock {
        cidr: String,
        except: Vec<String>,
    },

    /// An unset namespace selector means the policy's own namespace. An unset pod selector means
    /// every pod in the selected namespaces.
    Selector {
        pod_selector: Option<k8s::LabelSelector>,
        namespace_selector: Option<k8s::LabelSelector>,
    },
}

// === impl NetworkPolicy ===

impl NetworkPolicy {
    /// Indicates whether the policy constrains traffic in the given direction, either because the
    /// direction is listed in `policyTypes` or because rules are present for it.
    pub fn has_direction(&self, direction: Direction) -> bool {
        let ty = match direction {
            Direction::Ingress => "Ingress",
            Direction::Egress => "Egress",
        };
        self.policy_types.iter().any(|t| t == ty) || self.direction_rules(direction).is_some()
    }

    pub fn rules(&self, direction: Direction) -> &[Rule] {
        self.direction_rules(direction).unwrap_or_default()
    }

    pub fn peers(&self, direction: Direction) -> impl Iterator<Item = &Peer> + '_ {
        self.rules(direction).iter().flat_map(|rule| rule.peers.iter())
    }

    /// Concatenates the port restrictions of every rule in the given direction.
    pub fn acl_ports(&self, direction: Direction) -> Result<Vec<AclPort>, InvalidPort> {
        self.rules(direction)
            .iter()
            .flat_map(|rule| rule.ports.iter())
            .map(acl_port)
            .collect()
    }

    fn direction_rules(&self, direction: Direction) -> Option<&[Rule]> {
        match direction {
            Direction::Ingress => self.ingress.as_deref(),
            Direction::Egress => self.egress.as_deref(),
        }
    }
}

impl TryFrom<k8s::NetworkPolicy> for NetworkPolicy {
    type Error = anyhow::Error;

    fn try_from(np: k8s::NetworkPolicy) -> Result<Self> {
        let namespace = np
            .namespace()
            .ok_or_else(|| anyhow!("NetworkPolicy must have a namespace"))?;
        let name = np
            .metadata
            .name
            .clone()
            .ok_or_else(|| anyhow!("NetworkPolicy must have a name"))?;
        let spec = np.spec.unwrap_or_default();

        let ingress = spec.ingress.map(|rules| {
            rules
                .into_iter()
                .map(|rule| Rule::new(rule.from, rule.ports))
                .collect()
        });
        let egress = spec.egress.map(|rules| {
            rules
                .into_iter()
                .map(|rule| Rule::new(rule.to, rule.ports))
                .collect()
        });

        Ok(Self {
            key: PolicyKey::new(namespace, name),
            pod_selector: spec.pod_selector,
            ingress,
            egress,
            policy_types: spec.policy_types.unwrap_or_default(),
        })
    }
}

// === impl Rule ===

impl Rule {
    fn new(
        peers: Option<Vec<k8s::NetworkPolicyPeer>>,
        ports: Option<Vec<k8s::NetworkPolicyPort>>,
    ) -> Self {
        Self {
            peers: peers.into_iter().flatten().map(Peer::from).collect(),
            ports: ports.unwrap_or_default(),
        }
    }
}

// === impl Peer ===

impl Peer {
    pub fn namespace_selector(&self) -> Option<&k8s::LabelSelector> {
        match self {
            Self::IpBlock { .. } => None,
            Self::Selector {
                namespace_selector, ..
            } => namespace_selector.as_ref(),
        }
    }
}

impl From<k8s::NetworkPolicyPeer> for Peer {
    fn from(peer: k8s::NetworkPolicyPeer) -> Self {
        if let Some(block) = peer.ip_block {
            return Self::IpBlock {
                cidr: block.cidr,
                except: block.except.unwrap_or_default(),
            };
        }

        Self::Selector {
            pod_selector: peer.pod_selector,
            namespace_selector: peer.namespace_selector,
        }
    }
}

/// Converts a policy port to the backend's representation. An unset protocol means TCP.
pub fn acl_port(port: &k8s::NetworkPolicyPort) -> Result<AclPort, InvalidPort> {
    let protocol = port
        .protocol
        .as_deref()
        .map(str::parse)
        .transpose()?
        .unwrap_or_default();

    let acl = match &port.port {
        None => AclPort::all(protocol),
        Some(IntOrString::Int(n)) => AclPort::number(protocol, *n)?,
        Some(IntOrString::String(name)) => AclPort {
            protocol,
            port: Some(PortRef::Name(name.clone())),
            end_port: None,
        },
    };

    match port.end_port {
        Some(end) => acl.with_end_port(end),
        None => Ok(acl),
    }
}
