//! Domain builders that introspect tables registered with DataFusion.

use arrow::datatypes::{DataType, Schema};
use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::sql::{self, SharedContext};
use crate::error::{ProfilerError, Result};
use crate::profiler::{Domain, DomainBuilder, Variables};

/// Detail key under which column domains record their semantic type.
pub const SEMANTIC_TYPE_DETAIL: &str = "semantic_type";

/// Coarse classification of a column's arrow type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// Integers, floats and decimals
    Numeric,
    /// Strings
    Text,
    /// Dates, times, timestamps, durations and intervals
    Temporal,
    /// Booleans
    Boolean,
    /// Everything else (binary, nested, ...)
    Other,
}

impl SemanticType {
    /// Classifies an arrow data type.
    pub fn from_data_type(data_type: &DataType) -> Self {
        match data_type {
            t if sql::is_numeric(t) => Self::Numeric,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Self::Text,
            DataType::Date32
            | DataType::Date64
            | DataType::Timestamp(_, _)
            | DataType::Time32(_)
            | DataType::Time64(_)
            | DataType::Duration(_)
            | DataType::Interval(_) => Self::Temporal,
            DataType::Boolean => Self::Boolean,
            DataType::Dictionary(_, value) => Self::from_data_type(value),
            _ => Self::Other,
        }
    }

    /// Returns the snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Temporal => "temporal",
            Self::Boolean => "boolean",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn require_columns(builder: &str, table: &str, schema: &Schema, columns: &[String]) -> Result<()> {
    for column in columns {
        if schema.field_with_name(column).is_err() {
            return Err(ProfilerError::domain_discovery(
                builder,
                format!("column '{column}' not found in table '{table}'"),
            ));
        }
    }
    Ok(())
}

fn require_distinct(builder: &str, columns: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column) {
            return Err(ProfilerError::domain_discovery(
                builder,
                format!("column '{column}' listed more than once"),
            ));
        }
    }
    Ok(())
}

/// Produces a single domain for a whole table.
#[derive(Debug, Clone)]
pub struct TableDomainBuilder {
    ctx: SharedContext,
    table: String,
}

impl TableDomainBuilder {
    /// Creates a builder for `table`.
    pub fn new(ctx: Arc<SessionContext>, table: impl Into<String>) -> Self {
        Self {
            ctx: SharedContext::new(ctx),
            table: table.into(),
        }
    }
}

#[async_trait]
impl DomainBuilder for TableDomainBuilder {
    #[instrument(skip(self, _variables), fields(builder = "table", table = %self.table))]
    async fn get_domains(&self, _variables: &Variables) -> Result<Vec<Domain>> {
        sql::table_schema(&self.ctx, &self.table).await?;
        Ok(vec![Domain::table(&self.table)])
    }

    fn name(&self) -> &str {
        "table_domain_builder"
    }
}

/// Produces one domain per column of a table, in schema order.
///
/// # Example
///
/// ```rust,ignore
/// use term_profiler::builders::{ColumnDomainBuilder, SemanticType};
///
/// let builder = ColumnDomainBuilder::new(ctx, "orders")
///     .exclude_columns(["order_id"])
///     .semantic_types(&[SemanticType::Numeric]);
/// ```
#[derive(Debug, Clone)]
pub struct ColumnDomainBuilder {
    ctx: SharedContext,
    table: String,
    include_columns: Option<Vec<String>>,
    exclude_columns: Vec<String>,
    semantic_types: Vec<SemanticType>,
}

impl ColumnDomainBuilder {
    /// Creates a builder over every column of `table`.
    pub fn new(ctx: Arc<SessionContext>, table: impl Into<String>) -> Self {
        Self {
            ctx: SharedContext::new(ctx),
            table: table.into(),
            include_columns: None,
            exclude_columns: Vec::new(),
            semantic_types: Vec::new(),
        }
    }

    /// Restricts the domains to these columns. Unknown columns fail discovery.
    pub fn include_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Skips these columns.
    pub fn exclude_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Keeps only columns of these semantic types. Empty keeps all.
    pub fn semantic_types(mut self, types: &[SemanticType]) -> Self {
        self.semantic_types = types.to_vec();
        self
    }
}

#[async_trait]
impl DomainBuilder for ColumnDomainBuilder {
    #[instrument(skip(self, _variables), fields(builder = "column", table = %self.table))]
    async fn get_domains(&self, _variables: &Variables) -> Result<Vec<Domain>> {
        let schema = sql::table_schema(&self.ctx, &self.table).await?;
        if let Some(include) = &self.include_columns {
            require_columns(self.name(), &self.table, &schema, include)?;
        }

        let domains: Vec<Domain> = schema
            .fields()
            .iter()
            .filter(|field| {
                self.include_columns
                    .as_ref()
                    .map_or(true, |include| include.iter().any(|c| c == field.name()))
            })
            .filter(|field| !self.exclude_columns.iter().any(|c| c == field.name()))
            .filter_map(|field| {
                let semantic_type = SemanticType::from_data_type(field.data_type());
                if !self.semantic_types.is_empty() && !self.semantic_types.contains(&semantic_type)
                {
                    return None;
                }
                Some(
                    Domain::column(&self.table, field.name())
                        .with_detail(SEMANTIC_TYPE_DETAIL, semantic_type.as_str()),
                )
            })
            .collect();

        debug!(columns = domains.len(), "Selected column domains");
        Ok(domains)
    }

    fn name(&self) -> &str {
        "column_domain_builder"
    }
}

/// Produces a single domain for an ordered pair of columns.
#[derive(Debug, Clone)]
pub struct ColumnPairDomainBuilder {
    ctx: SharedContext,
    table: String,
    columns: [String; 2],
}

impl ColumnPairDomainBuilder {
    /// Creates a builder for `column_a` and `column_b` of `table`.
    pub fn new(
        ctx: Arc<SessionContext>,
        table: impl Into<String>,
        column_a: impl Into<String>,
        column_b: impl Into<String>,
    ) -> Self {
        Self {
            ctx: SharedContext::new(ctx),
            table: table.into(),
            columns: [column_a.into(), column_b.into()],
        }
    }
}

#[async_trait]
impl DomainBuilder for ColumnPairDomainBuilder {
    #[instrument(skip(self, _variables), fields(builder = "column_pair", table = %self.table))]
    async fn get_domains(&self, _variables: &Variables) -> Result<Vec<Domain>> {
        let schema = sql::table_schema(&self.ctx, &self.table).await?;
        require_columns(self.name(), &self.table, &schema, &self.columns)?;
        require_distinct(self.name(), &self.columns)?;

        let [column_a, column_b] = &self.columns;
        Ok(vec![Domain::column_pair(&self.table, column_a, column_b)])
    }

    fn name(&self) -> &str {
        "column_pair_domain_builder"
    }
}

/// Produces a single domain for a group of columns.
#[derive(Debug, Clone)]
pub struct MultiColumnDomainBuilder {
    ctx: SharedContext,
    table: String,
    columns: Vec<String>,
}

impl MultiColumnDomainBuilder {
    /// Creates a builder for `columns` of `table`.
    pub fn new<I, S>(ctx: Arc<SessionContext>, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ctx: SharedContext::new(ctx),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl DomainBuilder for MultiColumnDomainBuilder {
    #[instrument(skip(self, _variables), fields(builder = "multi_column", table = %self.table))]
    async fn get_domains(&self, _variables: &Variables) -> Result<Vec<Domain>> {
        if self.columns.len() < 2 {
            return Err(ProfilerError::domain_discovery(
                self.name(),
                "a multi-column domain needs at least two columns",
            ));
        }
        let schema = sql::table_schema(&self.ctx, &self.table).await?;
        require_columns(self.name(), &self.table, &schema, &self.columns)?;
        require_distinct(self.name(), &self.columns)?;

        Ok(vec![Domain::multi_column(&self.table, &self.columns)])
    }

    fn name(&self) -> &str {
        "multi_column_domain_builder"
    }
}
