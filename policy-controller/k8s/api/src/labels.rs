use crate::LabelSelector;
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, LazyLock},
};

#[derive(Clone, Debug, Eq, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

pub type Expressions = Vec<Expression>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expression {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A validated label selector.
///
/// An empty selector matches all labels.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector {
    match_labels: Map,
    match_expressions: Expressions,
}

/// Describes why a `LabelSelector` could not be converted to a `Selector`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid label key {0:?}")]
    InvalidKey(String),

    #[error("invalid label value {value:?} for key {key:?}")]
    InvalidValue { key: String, value: String },

    #[error("{0:?} is not a valid label selector operator")]
    InvalidOperator(String),

    #[error("operator {operator:?} on key {key:?} requires at least one value")]
    MissingValues { key: String, operator: String },

    #[error("operator {operator:?} on key {key:?} must not have values")]
    UnexpectedValues { key: String, operator: String },
}

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").unwrap());

static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

// === Selector ===

impl Selector {
    pub fn from_expressions(exprs: Expressions) -> Self {
        Self {
            match_labels: Map::default(),
            match_expressions: exprs,
        }
    }

    pub fn from_map(map: Map) -> Self {
        Self {
            match_labels: map,
            match_expressions: Expressions::default(),
        }
    }

    /// Returns true if the selector has no constraints, i.e. it selects everything.
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        for expr in self.match_expressions.iter() {
            if !expr.matches(labels.as_ref()) {
                return false;
            }
        }

        for (k, v) in self.match_labels.iter() {
            if labels.0.get(k) != Some(v) {
                return false;
            }
        }

        true
    }
}

impl TryFrom<&LabelSelector> for Selector {
    type Error = Error;

    fn try_from(selector: &LabelSelector) -> Result<Self, Error> {
        let mut match_labels = Map::default();
        for (key, value) in selector.match_labels.iter().flatten() {
            validate_key(key)?;
            validate_value(key, value)?;
            match_labels.insert(key.clone(), value.clone());
        }

        let match_expressions = selector
            .match_expressions
            .iter()
            .flatten()
            .map(|req| Expression::new(&req.key, &req.operator, req.values.as_deref()))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            match_labels,
            match_expressions,
        })
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl std::iter::FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self::from_expressions(iter.into_iter().collect())
    }
}

// === Labels ===

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        labels.unwrap_or_default().into()
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

// === Expression ===

impl Expression {
    pub fn new(key: &str, operator: &str, values: Option<&[String]>) -> Result<Self, Error> {
        validate_key(key)?;

        let operator = match operator {
            "In" => Operator::In,
            "NotIn" => Operator::NotIn,
            "Exists" => Operator::Exists,
            "DoesNotExist" => Operator::DoesNotExist,
            op => return Err(Error::InvalidOperator(op.to_string())),
        };

        let values = values.unwrap_or_default();
        match operator {
            Operator::In | Operator::NotIn if values.is_empty() => {
                return Err(Error::MissingValues {
                    key: key.to_string(),
                    operator: format!("{operator:?}"),
                });
            }
            Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
                return Err(Error::UnexpectedValues {
                    key: key.to_string(),
                    operator: format!("{operator:?}"),
                });
            }
            _ => {}
        }
        for v in values {
            validate_value(key, v)?;
        }

        Ok(Self {
            key: key.to_string(),
            operator,
            values: values.iter().cloned().collect(),
        })
    }

    fn matches(&self, labels: &Map) -> bool {
        match self.operator {
            Operator::In => labels
                .get(&self.key)
                .is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => labels
                .get(&self.key)
                .is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

/// Keys are qualified names: an optional DNS subdomain prefix and a `/`,
/// followed by a name of at most 63 characters.
fn validate_key(key: &str) -> Result<(), Error> {
    let invalid = || Error::InvalidKey(key.to_string());
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > 253 || !DNS_SUBDOMAIN.is_match(prefix) {
                return Err(invalid());
            }
            name
        }
        None => key,
    };
    if name.is_empty() || name.len() > 63 || !NAME.is_match(name) {
        return Err(invalid());
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > 63 || !NAME.is_match(value) {
        return Err(Error::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LabelSelectorRequirement;
    use maplit::btreemap;
    use std::iter::FromIterator;

    fn expr(key: &str, operator: &str, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: if values.is_empty() {
                None
            } else {
                Some(values.iter().map(|v| v.to_string()).collect())
            },
        }
    }

    #[test]
    fn test_matches() {
        for (selector, labels, matches, msg) in &[
            (Selector::default(), Labels::default(), true, "empty match"),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(Some(("foo", "bar"))),
                true,
                "exact label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                true,
                "sufficient label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(vec![("bah", "baz")]),
                false,
                "missing label",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", "In", Some(&["bar".to_string()])).unwrap())),
                Labels::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                true,
                "expression match",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", "NotIn", Some(&["bar".to_string()])).unwrap())),
                Labels::from_iter(vec![("foo", "bar")]),
                false,
                "not-in excludes value",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", "NotIn", Some(&["bar".to_string()])).unwrap())),
                Labels::default(),
                true,
                "not-in matches missing label",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", "Exists", None).unwrap())),
                Labels::from_iter(vec![("foo", "")]),
                true,
                "exists",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", "DoesNotExist", None).unwrap())),
                Labels::from_iter(vec![("foo", "bar")]),
                false,
                "does not exist",
            ),
        ] {
            assert_eq!(selector.matches(labels), *matches, "{}", msg);
        }
    }

    #[test]
    fn converts_label_selectors() {
        let selector = Selector::try_from(&LabelSelector {
            match_labels: Some(btreemap! { "app".to_string() => "web".to_string() }),
            match_expressions: Some(vec![expr("tier", "In", &["frontend", "edge"])]),
        })
        .unwrap();

        assert!(selector.matches(&Labels::from_iter(vec![("app", "web"), ("tier", "edge")])));
        assert!(!selector.matches(&Labels::from_iter(vec![("app", "web"), ("tier", "db")])));
        assert!(!selector.matches(&Labels::from_iter(vec![("tier", "edge")])));

        let empty = Selector::try_from(&LabelSelector::default()).unwrap();
        assert!(empty.is_empty());
        assert!(empty.matches(&Labels::from_iter(vec![("any", "thing")])));
    }

    #[test]
    fn rejects_malformed_selectors() {
        for (selector, msg) in [
            (
                LabelSelector {
                    match_expressions: Some(vec![expr("app", "Equals", &["web"])]),
                    ..Default::default()
                },
                "unknown operator",
            ),
            (
                LabelSelector {
                    match_expressions: Some(vec![expr("app", "In", &[])]),
                    ..Default::default()
                },
                "in without values",
            ),
            (
                LabelSelector {
                    match_expressions: Some(vec![expr("app", "Exists", &["web"])]),
                    ..Default::default()
                },
                "exists with values",
            ),
            (
                LabelSelector {
                    match_labels: Some(btreemap! { "-app".to_string() => "web".to_string() }),
                    ..Default::default()
                },
                "invalid key",
            ),
            (
                LabelSelector {
                    match_labels: Some(btreemap! { "app".to_string() => "web server".to_string() }),
                    ..Default::default()
                },
                "invalid value",
            ),
        ] {
            assert!(Selector::try_from(&selector).is_err(), "{}", msg);
        }
    }

    #[test]
    fn accepts_prefixed_keys() {
        assert!(validate_key("kubernetes.io/metadata.name").is_ok());
        assert!(validate_key("app").is_ok());
        assert!(validate_key("Example.com/app").is_err());
        assert!(validate_key("example.com/").is_err());
    }
}
