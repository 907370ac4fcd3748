//! Derives the names of the backend objects owned by a policy.
//!
//! The port group is named `<policy>.<namespace>`. Address sets are named
//! `<policy>.<namespace>.<ingress|egress>.<allow|except>` with every `-`
//! replaced by `.`, since the backend does not accept hyphens in address-set
//! names. Policies whose names differ only by `-` versus `.` (e.g. `test-np`
//! and `test.np`) therefore share address sets. Existing deployments depend on
//! these names, so the aliasing is kept.

use crate::{Direction, PolicyKey};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendNames {
    pub port_group: String,
    pub ingress: AddressSetNames,
    pub egress: AddressSetNames,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressSetNames {
    pub allow: String,
    pub except: String,
}

// === impl BackendNames ===

impl BackendNames {
    pub fn new(key: &PolicyKey) -> Self {
        let PolicyKey { namespace, name } = key;
        Self {
            port_group: format!("{name}.{namespace}"),
            ingress: AddressSetNames::new(name, namespace, Direction::Ingress),
            egress: AddressSetNames::new(name, namespace, Direction::Egress),
        }
    }

    pub fn address_sets(&self, direction: Direction) -> &AddressSetNames {
        match direction {
            Direction::Ingress => &self.ingress,
            Direction::Egress => &self.egress,
        }
    }
}

impl AddressSetNames {
    fn new(name: &str, namespace: &str, direction: Direction) -> Self {
        let mk = |kind: &str| format!("{name}.{namespace}.{direction}.{kind}").replace('-', ".");
        Self {
            allow: mk("allow"),
            except: mk("except"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_names() {
        let names = BackendNames::new(&PolicyKey::new("shop", "allow-frontend"));
        assert_eq!(names.port_group, "allow-frontend.shop");
        assert_eq!(names.ingress.allow, "allow.frontend.shop.ingress.allow");
        assert_eq!(names.ingress.except, "allow.frontend.shop.ingress.except");
        assert_eq!(names.egress.allow, "allow.frontend.shop.egress.allow");
        assert_eq!(names.egress.except, "allow.frontend.shop.egress.except");
    }

    #[test]
    fn namespace_hyphens_are_replaced() {
        let names = BackendNames::new(&PolicyKey::new("kube-system", "np"));
        assert_eq!(names.port_group, "np.kube-system");
        assert_eq!(names.egress.allow, "np.kube.system.egress.allow");
    }

    /// `test-np` and `test.np` in the same namespace alias onto the same
    /// address sets. This is a known, accepted collision.
    #[test]
    fn hyphen_and_dot_names_alias() {
        let hyphen = BackendNames::new(&PolicyKey::new("default", "test-np"));
        let dot = BackendNames::new(&PolicyKey::new("default", "test.np"));
        assert_eq!(hyphen.ingress, dot.ingress);
        assert_eq!(hyphen.egress, dot.egress);
        assert_eq!(hyphen.ingress.allow, "test.np.default.ingress.allow");
        assert_eq!(dot.port_group, "test.np.default");
        assert_eq!(hyphen.port_group, "test-np.default");
    }
}
