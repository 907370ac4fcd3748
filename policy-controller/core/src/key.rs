use std::{fmt, str::FromStr};

/// Identifies a NetworkPolicy by namespace and name.
///
/// Renders as `namespace/name`, the form used for work-queue keys and logs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyKey {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid resource key: {0:?}")]
pub struct InvalidKey(String);

// === impl PolicyKey ===

impl PolicyKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for PolicyKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(ns, name))
            }
            _ => Err(InvalidKey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_keys() {
        let key = "shop/allow-frontend".parse::<PolicyKey>().unwrap();
        assert_eq!(key, PolicyKey::new("shop", "allow-frontend"));
        assert_eq!(key.to_string(), "shop/allow-frontend");
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in ["", "shop", "/np", "shop/", "a/b/c"] {
            assert!(key.parse::<PolicyKey>().is_err(), "{key:?} must not parse");
        }
    }
}
