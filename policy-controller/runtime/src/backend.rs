use crate::core::{AclPort, Backend, BackendError, Direction};
use tracing::info;

/// A backend that records each operation in the log without programming a network.
///
/// Used to observe the controller's decisions when no SDN client is wired in.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogBackend(());

#[async_trait::async_trait]
impl Backend for LogBackend {
    async fn create_port_group(&self, name: &str) -> Result<(), BackendError> {
        info!(port_group = %name, "Creating port group");
        Ok(())
    }

    async fn set_port_group_members(&self, name: &str, ports: &[String]) -> Result<(), BackendError> {
        info!(port_group = %name, ?ports, "Setting port group members");
        Ok(())
    }

    async fn delete_port_group(&self, name: &str) -> Result<(), BackendError> {
        info!(port_group = %name, "Deleting port group");
        Ok(())
    }

    async fn create_address_set(&self, name: &str) -> Result<(), BackendError> {
        info!(address_set = %name, "Creating address set");
        Ok(())
    }

    async fn set_address_set_members(
        &self,
        name: &str,
        addresses: &[String],
    ) -> Result<(), BackendError> {
        info!(address_set = %name, ?addresses, "Setting address set members");
        Ok(())
    }

    async fn delete_address_set(&self, name: &str) -> Result<(), BackendError> {
        info!(address_set = %name, "Deleting address set");
        Ok(())
    }

    async fn create_ingress_acl(
        &self,
        port_group: &str,
        allow: &str,
        except: &str,
        ports: &[AclPort],
    ) -> Result<(), BackendError> {
        info!(
            %port_group,
            direction = Direction::Ingress.acl_direction(),
            %allow,
            %except,
            ?ports,
            "Creating ACL"
        );
        Ok(())
    }

    async fn create_egress_acl(
        &self,
        port_group: &str,
        allow: &str,
        except: &str,
        ports: &[AclPort],
    ) -> Result<(), BackendError> {
        info!(
            %port_group,
            direction = Direction::Egress.acl_direction(),
            %allow,
            %except,
            ?ports,
            "Creating ACL"
        );
        Ok(())
    }

    async fn delete_acl(&self, port_group: &str, direction: Direction) -> Result<(), BackendError> {
        info!(%port_group, direction = direction.acl_direction(), "Deleting ACL");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_fails() {
        let backend = LogBackend::default();
        backend.create_port_group("np.ns").await.unwrap();
        backend
            .create_ingress_acl("np.ns", "np.ns.ingress.allow", "np.ns.ingress.except", &[])
            .await
            .unwrap();
        backend.delete_acl("np.ns", Direction::Egress).await.unwrap();
    }
}
