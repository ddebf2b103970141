//! Domains: the addressable units a rule evaluates.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::parameter::ParameterValue;
use crate::error::{ProfilerError, Result};

/// Kind of thing a domain identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    /// A whole table.
    Table,
    /// A single column of a table.
    Column,
    /// An ordered pair of columns of the same table.
    ColumnPair,
    /// A group of columns of the same table.
    MultiColumn,
}

impl DomainType {
    /// Returns the snake_case name of the domain type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainType::Table => "table",
            DomainType::Column => "column",
            DomainType::ColumnPair => "column_pair",
            DomainType::MultiColumn => "multi_column",
        }
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a domain.
///
/// Hex-encoded SHA-256 over the canonical JSON of the domain type and its
/// kwargs. Used as the key partitioning parameter state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    fn fingerprint(domain_type: DomainType, domain_kwargs: &DomainKwargs) -> Self {
        // BTreeMap serializes with sorted keys, so insertion order never leaks in.
        let canonical = serde_json::to_string(&(domain_type, domain_kwargs))
            .unwrap_or_else(|_| format!("{domain_type}:{domain_kwargs:?}"));
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Parses a full hex id, as produced by [`DomainId::as_str`].
    pub fn parse(value: &str) -> Result<Self> {
        let well_formed = value.len() == 64
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if well_formed {
            Ok(Self(value.to_string()))
        } else {
            Err(ProfilerError::Configuration(format!(
                "'{value}' is not a domain id"
            )))
        }
    }

    /// Returns the full hex id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns an abbreviated id for log output.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifying keys of a domain, sorted by key.
pub type DomainKwargs = BTreeMap<String, ParameterValue>;

/// An immutable, identifiable unit of profiling.
///
/// Two domains with the same type and kwargs are equal and share an id.
/// `details` carries descriptive metadata (such as a column's semantic type)
/// that does not take part in identity.
///
/// # Example
///
/// ```rust
/// use term_profiler::profiler::{Domain, DomainType};
///
/// let amount = Domain::column("orders", "amount");
/// assert_eq!(amount.domain_type(), DomainType::Column);
/// assert_eq!(amount.name(), "amount");
/// assert_eq!(amount, Domain::column("orders", "amount"));
/// assert_ne!(amount.id(), Domain::column("orders", "status").id());
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Domain {
    domain_type: DomainType,
    domain_kwargs: DomainKwargs,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    details: BTreeMap<String, ParameterValue>,
    id: DomainId,
}

impl Domain {
    /// Creates a domain from a type and its identifying kwargs.
    pub fn new(domain_type: DomainType, domain_kwargs: DomainKwargs) -> Self {
        let id = DomainId::fingerprint(domain_type, &domain_kwargs);
        Self {
            domain_type,
            domain_kwargs,
            details: BTreeMap::new(),
            id,
        }
    }

    /// Creates a table domain.
    pub fn table(table: impl Into<String>) -> Self {
        Self::new(
            DomainType::Table,
            BTreeMap::from([("table".to_string(), ParameterValue::String(table.into()))]),
        )
    }

    /// Creates a column domain.
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(
            DomainType::Column,
            BTreeMap::from([
                ("table".to_string(), ParameterValue::String(table.into())),
                ("column".to_string(), ParameterValue::String(column.into())),
            ]),
        )
    }

    /// Creates a column pair domain. The order of the columns is significant.
    pub fn column_pair(
        table: impl Into<String>,
        column_a: impl Into<String>,
        column_b: impl Into<String>,
    ) -> Self {
        Self::new(
            DomainType::ColumnPair,
            BTreeMap::from([
                ("table".to_string(), ParameterValue::String(table.into())),
                ("column_a".to_string(), ParameterValue::String(column_a.into())),
                ("column_b".to_string(), ParameterValue::String(column_b.into())),
            ]),
        )
    }

    /// Creates a multi-column domain. The order of the columns is significant.
    pub fn multi_column<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<ParameterValue> = columns
            .into_iter()
            .map(|c| ParameterValue::String(c.into()))
            .collect();
        Self::new(
            DomainType::MultiColumn,
            BTreeMap::from([
                ("table".to_string(), ParameterValue::String(table.into())),
                ("column_list".to_string(), ParameterValue::List(columns)),
            ]),
        )
    }

    /// Attaches descriptive metadata that does not affect identity.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Returns the domain type.
    pub fn domain_type(&self) -> DomainType {
        self.domain_type
    }

    /// Returns the identifying kwargs.
    pub fn domain_kwargs(&self) -> &DomainKwargs {
        &self.domain_kwargs
    }

    /// Returns a single identifying kwarg.
    pub fn kwarg(&self, key: &str) -> Option<&ParameterValue> {
        self.domain_kwargs.get(key)
    }

    /// Returns the descriptive metadata.
    pub fn details(&self) -> &BTreeMap<String, ParameterValue> {
        &self.details
    }

    /// Returns the stable id.
    pub fn id(&self) -> &DomainId {
        &self.id
    }

    /// Returns the table this domain belongs to, if any.
    pub fn table_name(&self) -> Option<&str> {
        self.kwarg("table").and_then(ParameterValue::as_str)
    }

    /// Returns the column of a column domain.
    pub fn column_name(&self) -> Option<&str> {
        self.kwarg("column").and_then(ParameterValue::as_str)
    }

    /// Returns the columns the domain spans, in declaration order.
    pub fn columns(&self) -> Vec<&str> {
        match self.domain_type {
            DomainType::Table => Vec::new(),
            DomainType::Column => self.column_name().into_iter().collect(),
            DomainType::ColumnPair => ["column_a", "column_b"]
                .iter()
                .filter_map(|key| self.kwarg(key).and_then(ParameterValue::as_str))
                .collect(),
            DomainType::MultiColumn => self
                .kwarg("column_list")
                .and_then(ParameterValue::as_list)
                .map(|items| items.iter().filter_map(ParameterValue::as_str).collect())
                .unwrap_or_default(),
        }
    }

    /// Returns a human-readable name: the column for column domains, the
    /// table for table domains, and the joined columns otherwise.
    pub fn name(&self) -> String {
        match self.domain_type {
            DomainType::Table => self.table_name().unwrap_or_default().to_string(),
            DomainType::Column => self.column_name().unwrap_or_default().to_string(),
            DomainType::ColumnPair | DomainType::MultiColumn => self.columns().join(","),
        }
    }
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Domain {}

impl Hash for Domain {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.domain_type, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_domains_share_id() {
        let a = Domain::column("orders", "amount");
        let b = Domain::column("orders", "amount");
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().as_str().len(), 64);
    }

    #[test]
    fn test_id_ignores_kwarg_insertion_order() {
        let mut first = DomainKwargs::new();
        first.insert("table".to_string(), "orders".into());
        first.insert("column".to_string(), "amount".into());

        let mut second = DomainKwargs::new();
        second.insert("column".to_string(), "amount".into());
        second.insert("table".to_string(), "orders".into());

        assert_eq!(
            Domain::new(DomainType::Column, first).id(),
            Domain::new(DomainType::Column, second).id()
        );
    }

    #[test]
    fn test_distinct_domains_have_distinct_ids() {
        let ids = [
            Domain::table("orders"),
            Domain::table("customers"),
            Domain::column("orders", "amount"),
            Domain::column("customers", "amount"),
            Domain::column_pair("orders", "a", "b"),
            Domain::column_pair("orders", "b", "a"),
            Domain::multi_column("orders", ["a", "b"]),
            Domain::new(
                DomainType::Table,
                DomainKwargs::from([("table".to_string(), "orders,amount".into())]),
            ),
        ]
        .iter()
        .map(|d| d.id().clone())
        .collect::<std::collections::HashSet<_>>();

        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_parse_domain_id() {
        let domain = Domain::table("orders");
        assert_eq!(&DomainId::parse(domain.id().as_str()).unwrap(), domain.id());
        assert!(DomainId::parse("orders").is_err());
        assert!(DomainId::parse(&domain.id().as_str().to_uppercase()).is_err());
    }

    #[test]
    fn test_type_participates_in_id() {
        let kwargs = DomainKwargs::from([("table".to_string(), "orders".into())]);
        assert_ne!(
            Domain::new(DomainType::Table, kwargs.clone()).id(),
            Domain::new(DomainType::MultiColumn, kwargs).id()
        );
    }

    #[test]
    fn test_details_do_not_affect_identity() {
        let plain = Domain::column("orders", "amount");
        let described = Domain::column("orders", "amount").with_detail("semantic_type", "numeric");
        assert_eq!(plain, described);
        assert_eq!(
            described.details().get("semantic_type"),
            Some(&ParameterValue::from("numeric"))
        );
    }

    #[test]
    fn test_names_and_columns() {
        assert_eq!(Domain::table("orders").name(), "orders");
        assert_eq!(Domain::column("orders", "amount").name(), "amount");
        assert_eq!(Domain::column_pair("orders", "a", "b").columns(), vec!["a", "b"]);
        assert_eq!(
            Domain::multi_column("orders", ["x", "y", "z"]).name(),
            "x,y,z"
        );
        assert_eq!(Domain::column("orders", "amount").table_name(), Some("orders"));
        assert_eq!(
            Domain::column("orders", "amount").to_string(),
            "column(amount)"
        );
    }
}
