use crate::{
    core::CONTROLLER_NAME,
    k8s::{self, ObjectMeta, OwnerReference, PatchParams, Resource},
};
use anyhow::{anyhow, Result};
use k8s_openapi::api::{apps::v1::Deployment, coordination::v1 as coordv1};
use std::sync::Arc;
use tokio::{sync::watch, time};

/// Only the holder of this Lease enqueues NetworkPolicy work.
const LEASE_NAME: &str = "netpol-controller-write";

const CLAIM_PARAMS: kubert::lease::ClaimParams = kubert::lease::ClaimParams {
    lease_duration: time::Duration::from_secs(30),
    renew_grace_period: time::Duration::from_secs(1),
};

/// Ensures the write Lease exists and starts competing for it as `hostname`.
///
/// The Lease is owned by the controller's Deployment so that it is garbage collected with it.
pub async fn init<T>(
    runtime: &kubert::Runtime<T>,
    ns: &str,
    deployment_name: &str,
    hostname: &str,
) -> Result<watch::Receiver<Arc<kubert::lease::Claim>>> {
    let deployment = k8s::Api::<Deployment>::namespaced(runtime.client(), ns)
        .get(deployment_name)
        .await?;
    let owner = deployment
        .controller_owner_ref(&())
        .ok_or_else(|| anyhow!("deployment {ns}/{deployment_name} has no name or uid"))?;

    let api = k8s::Api::<coordv1::Lease>::namespaced(runtime.client(), ns);
    let params = PatchParams {
        field_manager: Some(CONTROLLER_NAME.to_string()),
        ..Default::default()
    };
    match api
        .patch(LEASE_NAME, &params, &k8s::Patch::Apply(write_lease(ns, owner)))
        .await
    {
        Ok(lease) => tracing::info!(name = ?lease.metadata.name, "Created write Lease"),
        // A conflict on resource version "0" means another replica already created it.
        Err(k8s::Error::Api(_)) => tracing::debug!("Write Lease already exists"),
        Err(error) => return Err(error.into()),
    }

    let (claims, _task) = kubert::lease::LeaseManager::init(api, LEASE_NAME)
        .await?
        .spawn(hostname, CLAIM_PARAMS)
        .await?;
    Ok(claims)
}

/// Builds the write Lease. It carries no spec: the lease manager fills in the holder on its
/// first claim.
fn write_lease(ns: &str, owner: OwnerReference) -> coordv1::Lease {
    coordv1::Lease {
        metadata: ObjectMeta {
            name: Some(LEASE_NAME.to_string()),
            namespace: Some(ns.to_string()),
            // Create only if absent.
            resource_version: Some("0".to_string()),
            owner_references: Some(vec![owner]),
            labels: Some(
                [(
                    "app.kubernetes.io/component".to_string(),
                    CONTROLLER_NAME.to_string(),
                )]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        },
        spec: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_lease_is_owned_and_create_only() {
        let owner = OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "kube-ovn-controller".to_string(),
            uid: "f3b1".to_string(),
            controller: Some(true),
            ..Default::default()
        };
        let lease = write_lease("kube-system", owner.clone());

        assert_eq!(lease.metadata.name.as_deref(), Some(LEASE_NAME));
        assert_eq!(lease.metadata.namespace.as_deref(), Some("kube-system"));
        assert_eq!(lease.metadata.resource_version.as_deref(), Some("0"));
        assert_eq!(lease.metadata.owner_references, Some(vec![owner]));
        assert_eq!(
            lease
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get("app.kubernetes.io/component"))
                .map(String::as_str),
            Some(CONTROLLER_NAME)
        );
        assert!(lease.spec.is_none());
    }
}
