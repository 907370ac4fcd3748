use crate::AclPort;
use std::fmt;

/// Programs port groups, address sets and ACLs on the network backend.
///
/// Every operation must be idempotent: creating an object that exists, or
/// deleting one that does not, succeeds.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn create_port_group(&self, name: &str) -> Result<(), BackendError>;

    /// Replaces the port group's membership with `ports`.
    async fn set_port_group_members(&self, name: &str, ports: &[String])
        -> Result<(), BackendError>;

    async fn delete_port_group(&self, name: &str) -> Result<(), BackendError>;

    async fn create_address_set(&self, name: &str) -> Result<(), BackendError>;

    /// Replaces the address set's membership with `addresses`.
    async fn set_address_set_members(
        &self,
        name: &str,
        addresses: &[String],
    ) -> Result<(), BackendError>;

    async fn delete_address_set(&self, name: &str) -> Result<(), BackendError>;

    async fn create_ingress_acl(
        &self,
        port_group: &str,
        allow: &str,
        except: &str,
        ports: &[AclPort],
    ) -> Result<(), BackendError>;

    async fn create_egress_acl(
        &self,
        port_group: &str,
        allow: &str,
        except: &str,
        ports: &[AclPort],
    ) -> Result<(), BackendError>;

    async fn delete_acl(&self, port_group: &str, direction: Direction) -> Result<(), BackendError>;
}

/// A traffic direction, relative to the workloads a policy targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Ingress,
    Egress,
}

/// Reported by a backend when an operation fails.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{operation} {name}: {message}")]
pub struct BackendError {
    pub operation: &'static str,
    pub name: String,
    pub message: String,
}

// === impl Direction ===

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Ingress, Direction::Egress];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
            Self::Egress => "egress",
        }
    }

    /// The ACL direction in the backend's vocabulary.
    pub fn acl_direction(&self) -> &'static str {
        match self {
            Self::Ingress => "to-lport",
            Self::Egress => "from-lport",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl BackendError ===

impl BackendError {
    pub fn new(operation: &'static str, name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            operation,
            name: name.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acl_directions() {
        assert_eq!(Direction::Ingress.acl_direction(), "to-lport");
        assert_eq!(Direction::Egress.acl_direction(), "from-lport");
    }

    #[test]
    fn error_display() {
        let error = BackendError::new("create-address-set", "np.ns.ingress.allow", "timed out");
        assert_eq!(
            error.to_string(),
            "create-address-set np.ns.ingress.allow: timed out"
        );
    }
}
