use crate::Error;
use netpol_controller_k8s_api::Selector;
use netpol_controller_k8s_index::{Peer, Store};

/// The addresses a peer allows, and those it carves out of the allowed ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Addresses {
    pub allow: Vec<String>,
    pub except: Vec<String>,
}

/// Resolves a peer of a policy in `policy_ns` to addresses.
///
/// CIDR peers are returned as written without consulting the store. Selector peers resolve to
/// the addresses of the matching workloads; workloads without an address are skipped.
pub fn resolve_addresses<S: Store + ?Sized>(
    store: &S,
    policy_ns: &str,
    peer: &Peer,
) -> Result<Addresses, Error> {
    let (pod_selector, namespace_selector) = match peer {
        Peer::IpBlock { cidr, except } => {
            return Ok(Addresses {
                allow: vec![cidr.clone()],
                except: except.clone(),
            })
        }
        Peer::Selector {
            pod_selector,
            namespace_selector,
        } => (pod_selector, namespace_selector),
    };

    let pods = match pod_selector {
        Some(selector) => Selector::try_from(selector)?,
        None => Selector::default(),
    };

    let namespaces = match namespace_selector {
        None => vec![policy_ns.to_string()],
        Some(selector) => {
            let selector = Selector::try_from(selector)?;
            store
                .list_namespaces(&selector)?
                .iter()
                .map(|ns| ns.name.clone())
                .collect()
        }
    };

    let mut allow = Vec::new();
    for ns in &namespaces {
        let workloads = store.list_workloads(ns, &pods)?;
        allow.extend(
            workloads
                .iter()
                .filter_map(|w| w.policy_address())
                .map(str::to_string),
        );
    }

    Ok(Addresses {
        allow,
        except: Vec::new(),
    })
}
