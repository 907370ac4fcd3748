use crate::{
    core::{PolicyKey, CONTROLLER_NAME},
    k8s::{Client, NetworkPolicy, ObjectReference, Resource},
    reconcile::EventRecorder,
};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// Publishes Kubernetes events on NetworkPolicies.
#[derive(Clone)]
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    pub fn new(client: Client, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

impl EventRecorder for KubeEventRecorder {
    fn warn(&self, policy: &PolicyKey, reason: &'static str, note: String) {
        let reference = policy_reference(policy);
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(note),
            action: "Reconcile".to_string(),
            secondary: None,
        };

        let recorder = self.recorder.clone();
        let policy = policy.clone();
        tokio::spawn(async move {
            if let Err(error) = recorder.publish(&event, &reference).await {
                warn!(%policy, reason, %error, "Failed to publish event");
            }
        });
    }
}

fn policy_reference(policy: &PolicyKey) -> ObjectReference {
    ObjectReference {
        api_version: Some(NetworkPolicy::api_version(&()).to_string()),
        kind: Some(NetworkPolicy::kind(&()).to_string()),
        namespace: Some(policy.namespace.clone()),
        name: Some(policy.name.clone()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_network_policies() {
        let reference = policy_reference(&PolicyKey::new("shop", "allow-frontend"));
        assert_eq!(reference.api_version.as_deref(), Some("networking.k8s.io/v1"));
        assert_eq!(reference.kind.as_deref(), Some("NetworkPolicy"));
        assert_eq!(reference.namespace.as_deref(), Some("shop"));
        assert_eq!(reference.name.as_deref(), Some("allow-frontend"));
    }
}
