//! Parameter values and the per-domain parameter store.
//!
//! A [`ParameterContainer`] holds the parameters computed for one domain as a
//! tree of [`ParameterNode`]s addressed by dotted names such as
//! `row_count.value` or `amount_range.details.min`. Intermediate segments form
//! nested scopes, so every builder can keep its outputs under its own
//! namespace.
//!
//! Containers own all of their data. Cloning a container (or a
//! [`ParameterMap`]) is a total deep copy that shares nothing with the
//! original.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::domain::DomainId;
use crate::error::{ProfilerError, Result};

/// A single parameter value.
///
/// Serialized untagged so that expectation kwargs render as plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Absence of a value.
    Null,
    /// A boolean flag.
    Boolean(bool),
    /// An integer value (e.g., a count).
    Integer(i64),
    /// A floating-point value (e.g., a mean or a ratio).
    Float(f64),
    /// A string value (e.g., a column name).
    String(String),
    /// An ordered list of values (e.g., a value set or a `[min, max]` range).
    List(Vec<ParameterValue>),
    /// A map of values with sorted keys.
    Map(BTreeMap<String, ParameterValue>),
}

impl ParameterValue {
    /// Checks if the value is numeric (Integer or Float).
    pub fn is_numeric(&self) -> bool {
        matches!(self, ParameterValue::Integer(_) | ParameterValue::Float(_))
    }

    /// Checks if the value is [`ParameterValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, ParameterValue::Null)
    }

    /// Attempts to get the numeric value as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Attempts to get the value as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Integer(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get the value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the value as a list.
    pub fn as_list(&self) -> Option<&[ParameterValue]> {
        match self {
            ParameterValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Converts the value into a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Null => write!(f, "null"),
            ParameterValue::Boolean(b) => write!(f, "{b}"),
            ParameterValue::Integer(v) => write!(f, "{v}"),
            ParameterValue::Float(v) => write!(f, "{v}"),
            ParameterValue::String(s) => write!(f, "{s}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Boolean(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        ParameterValue::Integer(i64::from(value))
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        ParameterValue::Integer(i64::from(value))
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl<T: Into<ParameterValue>> From<Vec<T>> for ParameterValue {
    fn from(values: Vec<T>) -> Self {
        ParameterValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParameterValue>> From<Option<T>> for ParameterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParameterValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for ParameterValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParameterValue::Null,
            serde_json::Value::Bool(b) => ParameterValue::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ParameterValue::Integer(i),
                None => ParameterValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ParameterValue::String(s),
            serde_json::Value::Array(items) => {
                ParameterValue::List(items.into_iter().map(ParameterValue::from).collect())
            }
            serde_json::Value::Object(map) => ParameterValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ParameterValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// A node in the parameter tree: either a leaf value or a nested scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterNode {
    /// A leaf holding a value.
    Value(ParameterValue),
    /// A named scope holding child nodes.
    Scope(BTreeMap<String, ParameterNode>),
}

impl ParameterNode {
    /// Returns the leaf value, if this node is a leaf.
    pub fn value(&self) -> Option<&ParameterValue> {
        match self {
            ParameterNode::Value(v) => Some(v),
            ParameterNode::Scope(_) => None,
        }
    }

    /// Returns the child nodes, if this node is a scope.
    pub fn children(&self) -> Option<&BTreeMap<String, ParameterNode>> {
        match self {
            ParameterNode::Value(_) => None,
            ParameterNode::Scope(children) => Some(children),
        }
    }
}

/// Splits and validates a dotted parameter name.
///
/// Segments must be non-empty and may not start with `$`, which is reserved
/// for fully-qualified references.
pub(crate) fn parse_name(name: &str) -> Result<Vec<&str>> {
    if name.is_empty() {
        return Err(ProfilerError::InvalidParameterName(name.to_string()));
    }
    let segments: Vec<&str> = name.split('.').collect();
    if segments
        .iter()
        .any(|segment| segment.trim().is_empty() || segment.starts_with('$'))
    {
        return Err(ProfilerError::InvalidParameterName(name.to_string()));
    }
    Ok(segments)
}

/// Tree of named parameter values computed for a single domain.
///
/// # Example
///
/// ```rust
/// use term_profiler::profiler::{ParameterContainer, ParameterValue};
///
/// let mut container = ParameterContainer::new();
/// container.set("row_count.value", 100_i64).unwrap();
/// container.set("row_count.details.metric", "row_count").unwrap();
///
/// assert_eq!(container.get("row_count.value"), Some(&ParameterValue::Integer(100)));
/// assert_eq!(container.names(), vec!["row_count.details.metric", "row_count.value"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterContainer {
    root: BTreeMap<String, ParameterNode>,
}

impl ParameterContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a container from a JSON value.
    ///
    /// JSON objects become scopes and everything else becomes a leaf, so
    /// `{"thresholds": {"mostly": 0.95}}` is addressable as `thresholds.mostly`.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(ProfilerError::Configuration(
                "parameters must be a JSON object".to_string(),
            ));
        };
        let mut container = Self::new();
        for (key, value) in map {
            container.insert_json(&key, value)?;
        }
        Ok(container)
    }

    fn insert_json(&mut self, name: &str, value: serde_json::Value) -> Result<()> {
        match value {
            serde_json::Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    self.insert_json(&format!("{name}.{key}"), child)?;
                }
                Ok(())
            }
            other => self.set(name, ParameterValue::from(other)).map(|_| ()),
        }
    }

    /// Stores `value` under the dotted `name`, creating intermediate scopes.
    ///
    /// An existing leaf or scope at `name` is replaced (last writer wins), as is
    /// a leaf found where an intermediate scope is needed. Returns the
    /// previous leaf value, if there was one.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<ParameterValue>,
    ) -> Result<Option<ParameterValue>> {
        let segments = parse_name(name)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| ProfilerError::InvalidParameterName(name.to_string()))?;

        let mut scope = &mut self.root;
        for segment in parents {
            let node = scope
                .entry((*segment).to_string())
                .or_insert_with(|| ParameterNode::Scope(BTreeMap::new()));
            if !matches!(node, ParameterNode::Scope(_)) {
                *node = ParameterNode::Scope(BTreeMap::new());
            }
            let ParameterNode::Scope(children) = node else {
                return Err(ProfilerError::Internal(format!(
                    "scope '{segment}' of '{name}' is not a scope"
                )));
            };
            scope = children;
        }

        let previous = scope.insert((*last).to_string(), ParameterNode::Value(value.into()));
        Ok(match previous {
            Some(ParameterNode::Value(v)) => Some(v),
            _ => None,
        })
    }

    /// Returns the node stored under `name`, leaf or scope.
    pub fn node(&self, name: &str) -> Option<&ParameterNode> {
        let segments = parse_name(name).ok()?;
        let (first, rest) = segments.split_first()?;
        let mut node = self.root.get(*first)?;
        for segment in rest {
            node = node.children()?.get(*segment)?;
        }
        Some(node)
    }

    /// Returns the leaf value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.node(name)?.value()
    }

    /// Checks whether a leaf value exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns all leaves as `(fully-qualified name, value)` pairs in name order.
    pub fn leaves(&self) -> Vec<(String, &ParameterValue)> {
        fn walk<'a>(
            prefix: &str,
            nodes: &'a BTreeMap<String, ParameterNode>,
            out: &mut Vec<(String, &'a ParameterValue)>,
        ) {
            for (key, node) in nodes {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match node {
                    ParameterNode::Value(v) => out.push((name, v)),
                    ParameterNode::Scope(children) => walk(&name, children, out),
                }
            }
        }

        let mut out = Vec::new();
        walk("", &self.root, &mut out);
        out
    }

    /// Returns the fully-qualified names of all leaves in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.leaves().into_iter().map(|(name, _)| name).collect()
    }

    /// Returns the number of leaf values.
    pub fn len(&self) -> usize {
        self.leaves().len()
    }

    /// Checks whether the container holds no values.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Copies every leaf of `other` into this container, overwriting on conflict.
    pub fn merge(&mut self, other: &ParameterContainer) -> Result<()> {
        for (name, value) in other.leaves() {
            self.set(&name, value.clone())?;
        }
        Ok(())
    }

    /// Converts the container into a nested JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Parameters of every processed domain, keyed by domain id.
pub type ParameterMap = BTreeMap<DomainId, ParameterContainer>;

/// Read-only view over the parameters visible to a builder.
///
/// Lookups consult, in order:
///
/// 1. the running call's own map, which already holds the domain being
///    processed as of the last completed builder;
/// 2. the parameters the rule retained from earlier calls;
/// 3. an upstream map with the parameters of rules that ran earlier in the
///    same profiling run.
#[derive(Debug, Clone, Copy)]
pub struct ParametersView<'a> {
    local: &'a ParameterMap,
    retained: Option<&'a ParameterMap>,
    upstream: Option<&'a ParameterMap>,
}

impl<'a> ParametersView<'a> {
    /// Creates a view over a single map.
    pub fn new(local: &'a ParameterMap) -> Self {
        Self {
            local,
            retained: None,
            upstream: None,
        }
    }

    /// Creates a view over `local` with `upstream` as fallback.
    pub fn with_upstream(local: &'a ParameterMap, upstream: &'a ParameterMap) -> Self {
        Self {
            local,
            retained: None,
            upstream: Some(upstream),
        }
    }

    /// Adds the parameters retained from earlier calls, consulted after
    /// `local` and before `upstream`.
    pub fn with_retained(mut self, retained: &'a ParameterMap) -> Self {
        self.retained = Some(retained);
        self
    }

    fn layers(&self) -> impl Iterator<Item = &'a ParameterMap> {
        std::iter::once(self.local).chain(self.retained).chain(self.upstream)
    }

    /// Returns the container registered for `domain_id`.
    pub fn container(&self, domain_id: &DomainId) -> Option<&'a ParameterContainer> {
        self.layers().find_map(|map| map.get(domain_id))
    }

    /// Returns the value of parameter `name` on domain `domain_id`.
    pub fn get(&self, domain_id: &DomainId, name: &str) -> Option<&'a ParameterValue> {
        self.container(domain_id)?.get(name)
    }

    /// Returns every visible domain id in sorted order.
    pub fn domain_ids(&self) -> Vec<&'a DomainId> {
        let ids: BTreeSet<&'a DomainId> = self.layers().flat_map(|map| map.keys()).collect();
        ids.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::Domain;

    #[test]
    fn test_set_and_get_nested() {
        let mut container = ParameterContainer::new();
        container.set("my_parameter.value", 42_i64).unwrap();
        container.set("my_parameter.details.count", 7_i64).unwrap();

        assert_eq!(
            container.get("my_parameter.value"),
            Some(&ParameterValue::Integer(42))
        );
        assert_eq!(
            container.get("my_parameter.details.count"),
            Some(&ParameterValue::Integer(7))
        );
        assert!(container.get("my_parameter").is_none());
        assert!(container.node("my_parameter.details").is_some());
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_overwrite_returns_previous() {
        let mut container = ParameterContainer::new();
        assert_eq!(container.set("p.value", 1_i64).unwrap(), None);
        assert_eq!(
            container.set("p.value", 2_i64).unwrap(),
            Some(ParameterValue::Integer(1))
        );
        assert_eq!(container.get("p.value"), Some(&ParameterValue::Integer(2)));
    }

    #[test]
    fn test_leaf_replaced_by_scope() {
        let mut container = ParameterContainer::new();
        container.set("p", 1_i64).unwrap();
        container.set("p.value", 2_i64).unwrap();

        assert!(container.get("p").is_none());
        assert_eq!(container.get("p.value"), Some(&ParameterValue::Integer(2)));
        assert_eq!(container.names(), vec!["p.value"]);
    }

    #[test]
    fn test_invalid_names() {
        let mut container = ParameterContainer::new();
        for name in ["", "a..b", ".a", "a.", "$parameter.a", "a.$b"] {
            assert!(
                matches!(
                    container.set(name, 1_i64),
                    Err(ProfilerError::InvalidParameterName(_))
                ),
                "{name} should be rejected"
            );
        }
        assert!(container.is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = ParameterContainer::new();
        original.set("p.values", vec![1_i64, 2, 3]).unwrap();

        let mut copy = original.clone();
        copy.set("p.values", vec![9_i64]).unwrap();
        copy.set("q.value", true).unwrap();

        assert_eq!(
            original.get("p.values"),
            Some(&ParameterValue::from(vec![1_i64, 2, 3]))
        );
        assert!(!original.contains("q.value"));
    }

    #[test]
    fn test_from_json_value() {
        let container = ParameterContainer::from_json_value(serde_json::json!({
            "mostly": 0.95,
            "thresholds": {"max_nulls": 3, "empty": {}},
            "columns": ["a", "b"]
        }))
        .unwrap();

        assert_eq!(container.get("mostly"), Some(&ParameterValue::Float(0.95)));
        assert_eq!(
            container.get("thresholds.max_nulls"),
            Some(&ParameterValue::Integer(3))
        );
        assert_eq!(
            container.get("thresholds.empty"),
            Some(&ParameterValue::Map(BTreeMap::new()))
        );
        assert_eq!(
            container.get("columns"),
            Some(&ParameterValue::from(vec!["a", "b"]))
        );
        assert!(ParameterContainer::from_json_value(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_to_json_round_trips_shape() {
        let mut container = ParameterContainer::new();
        container.set("row_count.value", 100_i64).unwrap();
        container.set("row_count.details.metric", "row_count").unwrap();

        assert_eq!(
            container.to_json(),
            serde_json::json!({"row_count": {"details": {"metric": "row_count"}, "value": 100}})
        );
    }

    #[test]
    fn test_view_prefers_local() {
        let domain = Domain::table("orders");
        let mut local = ParameterMap::new();
        let mut upstream = ParameterMap::new();

        let mut mine = ParameterContainer::new();
        mine.set("row_count.value", 10_i64).unwrap();
        local.insert(domain.id().clone(), mine);

        let mut theirs = ParameterContainer::new();
        theirs.set("row_count.value", 99_i64).unwrap();
        upstream.insert(domain.id().clone(), theirs);

        let other = Domain::column("orders", "amount");
        let mut other_container = ParameterContainer::new();
        other_container.set("mean.value", 3.5).unwrap();
        upstream.insert(other.id().clone(), other_container);

        let view = ParametersView::with_upstream(&local, &upstream);
        assert_eq!(
            view.get(domain.id(), "row_count.value"),
            Some(&ParameterValue::Integer(10))
        );
        assert_eq!(
            view.get(other.id(), "mean.value"),
            Some(&ParameterValue::Float(3.5))
        );
        assert_eq!(view.domain_ids().len(), 2);
    }

    #[test]
    fn test_view_consults_retained_before_upstream() {
        let current = Domain::column("orders", "status");
        let earlier = Domain::column("orders", "amount");

        let mut local = ParameterMap::new();
        local.insert(current.id().clone(), ParameterContainer::new());

        let mut retained = ParameterMap::new();
        let mut kept = ParameterContainer::new();
        kept.set("mean.value", 1.0).unwrap();
        retained.insert(earlier.id().clone(), kept);

        let mut upstream = ParameterMap::new();
        let mut theirs = ParameterContainer::new();
        theirs.set("mean.value", 2.0).unwrap();
        theirs.set("max.value", 9.0).unwrap();
        upstream.insert(earlier.id().clone(), theirs);

        let view = ParametersView::with_upstream(&local, &upstream).with_retained(&retained);
        assert_eq!(
            view.get(earlier.id(), "mean.value"),
            Some(&ParameterValue::Float(1.0))
        );
        // Containers are not merged across layers.
        assert_eq!(view.get(earlier.id(), "max.value"), None);
        assert!(view.container(current.id()).unwrap().is_empty());
        assert_eq!(view.domain_ids().len(), 2);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ParameterValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(ParameterValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(ParameterValue::Float(3.5).as_i64(), None);
        assert_eq!(ParameterValue::from(None::<i64>), ParameterValue::Null);
        assert_eq!(
            ParameterValue::from(serde_json::json!({"a": [1, 2.5, null]})),
            ParameterValue::Map(BTreeMap::from([(
                "a".to_string(),
                ParameterValue::List(vec![
                    ParameterValue::Integer(1),
                    ParameterValue::Float(2.5),
                    ParameterValue::Null
                ])
            )]))
        );
        assert_eq!(ParameterValue::from("x").to_string(), "x");
    }
}
