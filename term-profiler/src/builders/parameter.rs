//! Parameter builders computing statistics with DataFusion SQL.
//!
//! Every builder writes its result under its own name:
//!
//! - `<name>.value` holds the parameter itself;
//! - `<name>.details.*` holds supporting values (observed extremes, counts,
//!   the metric that produced the value, ...).

use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::sql::{self, SharedContext};
use crate::error::{ProfilerError, Result};
use crate::profiler::{
    Domain, DomainType, ParameterBuilder, ParameterContainer, ParameterReference, ParameterValue,
    ParametersView, ReferenceScope, Variables,
};
use crate::security::{InputValidator, SqlSecurity};

fn value_key(name: &str) -> String {
    format!("{name}.value")
}

fn detail_key(name: &str, detail: &str) -> String {
    format!("{name}.details.{detail}")
}

/// Resolves the quoted table and, for column domains, the quoted column and its type.
async fn resolve_target(
    ctx: &SessionContext,
    domain: &Domain,
) -> Result<(String, Option<(String, DataType)>)> {
    let table = domain
        .table_name()
        .ok_or_else(|| ProfilerError::Internal(format!("domain {domain} has no table")))?;
    let quoted_table = SqlSecurity::escape_identifier(table)?;

    let column = match domain.column_name() {
        Some(column) if domain.domain_type() == DomainType::Column => {
            let schema = sql::table_schema(ctx, table).await?;
            let data_type = schema
                .field_with_name(column)
                .map_err(|_| {
                    ProfilerError::Internal(format!("column '{column}' not found in '{table}'"))
                })?
                .data_type()
                .clone();
            Some((SqlSecurity::quote_column(column)?, data_type))
        }
        _ => None,
    };

    Ok((quoted_table, column))
}

/// A single-valued statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Number of rows in the table
    RowCount,
    /// Number of null values in the column
    NullCount,
    /// Number of non-null values in the column
    NonNullCount,
    /// Fraction of non-null values in the column
    Completeness,
    /// Number of distinct non-null values in the column
    DistinctCount,
    /// Smallest value of a numeric column
    Min,
    /// Largest value of a numeric column
    Max,
    /// Arithmetic mean of a numeric column
    Mean,
    /// Population standard deviation of a numeric column
    StandardDeviation,
    /// Sum of a numeric column
    Sum,
}

impl Metric {
    /// Returns the snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RowCount => "row_count",
            Self::NullCount => "null_count",
            Self::NonNullCount => "non_null_count",
            Self::Completeness => "completeness",
            Self::DistinctCount => "distinct_count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::StandardDeviation => "standard_deviation",
            Self::Sum => "sum",
        }
    }

    /// Checks whether the metric only applies to numeric columns.
    pub fn requires_numeric(&self) -> bool {
        matches!(
            self,
            Self::Min | Self::Max | Self::Mean | Self::StandardDeviation | Self::Sum
        )
    }

    /// Checks whether the metric needs a column domain.
    pub fn requires_column(&self) -> bool {
        !matches!(self, Self::RowCount)
    }

    fn aggregate(&self, column: &str) -> String {
        match self {
            Self::RowCount => "COUNT(*)".to_string(),
            Self::NullCount => format!("COUNT(*) - COUNT({column})"),
            Self::NonNullCount => format!("COUNT({column})"),
            Self::Completeness => format!("COUNT({column})"),
            Self::DistinctCount => format!("COUNT(DISTINCT {column})"),
            Self::Min => format!("MIN({column})"),
            Self::Max => format!("MAX({column})"),
            Self::Mean => format!("AVG({column})"),
            Self::StandardDeviation => format!("STDDEV_POP({column})"),
            Self::Sum => format!("SUM({column})"),
        }
    }

    /// Whether the metric keeps the column's integer type.
    fn preserves_integers(&self) -> bool {
        matches!(self, Self::Min | Self::Max | Self::Sum)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes one [`Metric`] for the domain.
///
/// Table domains support [`Metric::RowCount`] only. Numeric metrics fail on
/// non-numeric columns, and every metric except the counts fails when the
/// column holds no non-null value.
///
/// # Example
///
/// ```rust,ignore
/// use term_profiler::builders::{Metric, MetricParameterBuilder};
///
/// // Writes `amount_mean.value` and `amount_mean.details.metric`.
/// let builder = MetricParameterBuilder::new("amount_mean", ctx, Metric::Mean);
/// ```
#[derive(Debug, Clone)]
pub struct MetricParameterBuilder {
    name: String,
    ctx: SharedContext,
    metric: Metric,
}

impl MetricParameterBuilder {
    /// Creates a builder writing `metric` under `name`.
    pub fn new(name: impl Into<String>, ctx: Arc<SessionContext>, metric: Metric) -> Self {
        Self {
            name: name.into(),
            ctx: SharedContext::new(ctx),
            metric,
        }
    }

    /// Returns the computed metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn error(&self, domain: &Domain, message: impl Into<String>) -> ProfilerError {
        ProfilerError::parameter_computation(
            domain.id(),
            &self.name,
            value_key(&self.name),
            message,
        )
    }
}

#[async_trait]
impl ParameterBuilder for MetricParameterBuilder {
    #[instrument(skip_all, fields(builder = %self.name, metric = %self.metric, domain = %domain))]
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        _variables: &Variables,
        _parameters: &ParametersView<'_>,
    ) -> Result<()> {
        let (table, column) = resolve_target(&self.ctx, domain).await?;

        let (column, data_type) = match column {
            Some((column, data_type)) => (column, Some(data_type)),
            None if self.metric.requires_column() => {
                return Err(self.error(
                    domain,
                    format!("metric '{}' requires a column domain", self.metric),
                ));
            }
            None => (String::new(), None),
        };

        if self.metric.requires_numeric() && !data_type.as_ref().is_some_and(sql::is_numeric) {
            return Err(self.error(
                domain,
                format!("metric '{}' requires a numeric column", self.metric),
            ));
        }

        let query = format!(
            "SELECT {}, COUNT(*) FROM {table}",
            self.metric.aggregate(&column)
        );
        let batch = sql::single_row(&self.ctx, &query).await?;

        let value = match self.metric {
            Metric::RowCount | Metric::NullCount | Metric::NonNullCount | Metric::DistinctCount => {
                sql::i64_at(&batch, 0, 0)?.map(ParameterValue::Integer)
            }
            Metric::Completeness => {
                let non_null = sql::i64_at(&batch, 0, 0)?.unwrap_or(0);
                let total = sql::i64_at(&batch, 1, 0)?.unwrap_or(0);
                parameter_container.set(&detail_key(&self.name, "non_null_count"), non_null)?;
                parameter_container.set(&detail_key(&self.name, "row_count"), total)?;
                (total > 0).then(|| ParameterValue::Float(non_null as f64 / total as f64))
            }
            metric if metric.preserves_integers()
                && data_type.as_ref().is_some_and(sql::is_integer) =>
            {
                sql::i64_at(&batch, 0, 0)?.map(ParameterValue::Integer)
            }
            _ => sql::f64_at(&batch, 0, 0)?.map(ParameterValue::Float),
        };

        let value = value.ok_or_else(|| {
            self.error(
                domain,
                format!("insufficient data to compute '{}'", self.metric),
            )
        })?;

        debug!(value = %value, "Computed metric");
        parameter_container.set(&value_key(&self.name), value)?;
        parameter_container.set(&detail_key(&self.name, "metric"), self.metric.as_str())?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Computes the observed `[min, max]` range of a numeric column, optionally
/// widened on both sides by `relative_margin * (max - min)`.
///
/// Writes `<name>.value` as a two-element list and the observed extremes as
/// `<name>.details.min` / `<name>.details.max`. Integer columns produce an
/// integer range, rounded outwards.
#[derive(Debug, Clone)]
pub struct NumericRangeParameterBuilder {
    name: String,
    ctx: SharedContext,
    relative_margin: f64,
}

impl NumericRangeParameterBuilder {
    /// Creates a builder writing the exact observed range under `name`.
    pub fn new(name: impl Into<String>, ctx: Arc<SessionContext>) -> Self {
        Self {
            name: name.into(),
            ctx: SharedContext::new(ctx),
            relative_margin: 0.0,
        }
    }

    /// Widens the range by this fraction of its width on each side.
    pub fn relative_margin(mut self, relative_margin: f64) -> Self {
        self.relative_margin = relative_margin;
        self
    }

    fn error(&self, domain: &Domain, message: impl Into<String>) -> ProfilerError {
        ProfilerError::parameter_computation(
            domain.id(),
            &self.name,
            value_key(&self.name),
            message,
        )
    }
}

#[async_trait]
impl ParameterBuilder for NumericRangeParameterBuilder {
    #[instrument(skip_all, fields(builder = %self.name, domain = %domain))]
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        _variables: &Variables,
        _parameters: &ParametersView<'_>,
    ) -> Result<()> {
        InputValidator::validate_non_negative(self.relative_margin, "relative_margin")?;

        let (table, column) = resolve_target(&self.ctx, domain).await?;
        let (column, data_type) = column
            .filter(|(_, data_type)| sql::is_numeric(data_type))
            .ok_or_else(|| self.error(domain, "a numeric range requires a numeric column"))?;

        let query = format!("SELECT MIN({column}), MAX({column}) FROM {table}");
        let batch = sql::single_row(&self.ctx, &query).await?;
        let (min, max) = match (sql::f64_at(&batch, 0, 0)?, sql::f64_at(&batch, 1, 0)?) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(self.error(domain, "insufficient data to compute a range")),
        };

        let margin = self.relative_margin * (max - min);
        let (lower, upper) = (min - margin, max + margin);

        if sql::is_integer(&data_type) {
            parameter_container.set(
                &value_key(&self.name),
                vec![lower.floor() as i64, upper.ceil() as i64],
            )?;
            parameter_container.set(&detail_key(&self.name, "min"), min as i64)?;
            parameter_container.set(&detail_key(&self.name, "max"), max as i64)?;
        } else {
            parameter_container.set(&value_key(&self.name), vec![lower, upper])?;
            parameter_container.set(&detail_key(&self.name, "min"), min)?;
            parameter_container.set(&detail_key(&self.name, "max"), max)?;
        }
        parameter_container.set(
            &detail_key(&self.name, "relative_margin"),
            self.relative_margin,
        )?;

        debug!(min, max, lower, upper, "Computed numeric range");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Divides two previously computed parameters.
///
/// Both operands are [`ParameterReference`]s and may point at the current
/// domain, another domain of the same rule, a domain of an earlier rule, or a
/// variable.
///
/// # Example
///
/// ```rust
/// use term_profiler::builders::RatioParameterBuilder;
///
/// let builder = RatioParameterBuilder::try_new(
///     "null_ratio",
///     "$parameter.null_count.value",
///     "$parameter.row_count.value",
/// )
/// .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RatioParameterBuilder {
    name: String,
    numerator: ParameterReference,
    denominator: ParameterReference,
}

impl RatioParameterBuilder {
    /// Creates a builder from parsed references.
    pub fn new(
        name: impl Into<String>,
        numerator: ParameterReference,
        denominator: ParameterReference,
    ) -> Self {
        Self {
            name: name.into(),
            numerator,
            denominator,
        }
    }

    /// Creates a builder from reference strings such as `$parameter.row_count.value`.
    pub fn try_new(name: impl Into<String>, numerator: &str, denominator: &str) -> Result<Self> {
        Ok(Self::new(
            name,
            ParameterReference::parse(numerator)?,
            ParameterReference::parse(denominator)?,
        ))
    }

    fn operand(&self, scope: &ReferenceScope<'_>, reference: &ParameterReference) -> Result<f64> {
        let value = reference.resolve(scope).ok_or_else(|| {
            ProfilerError::parameter_computation(
                scope.domain().id(),
                &self.name,
                reference.name(),
                "referenced parameter not found",
            )
        })?;
        value.as_f64().ok_or_else(|| {
            ProfilerError::parameter_computation(
                scope.domain().id(),
                &self.name,
                reference.name(),
                format!("referenced value {value} is not numeric"),
            )
        })
    }
}

#[async_trait]
impl ParameterBuilder for RatioParameterBuilder {
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        variables: &Variables,
        parameters: &ParametersView<'_>,
    ) -> Result<()> {
        let (numerator, denominator) = {
            let scope = ReferenceScope::new(domain, variables, *parameters)
                .with_current(parameter_container);
            (
                self.operand(&scope, &self.numerator)?,
                self.operand(&scope, &self.denominator)?,
            )
        };

        if denominator == 0.0 {
            return Err(ProfilerError::parameter_computation(
                domain.id(),
                &self.name,
                self.denominator.name(),
                "division by zero",
            ));
        }

        parameter_container.set(&value_key(&self.name), numerator / denominator)?;
        parameter_container.set(&detail_key(&self.name, "numerator"), numerator)?;
        parameter_container.set(&detail_key(&self.name, "denominator"), denominator)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Collects the distinct non-null values of a column as sorted strings.
///
/// When the column has more than `max_cardinality` distinct values,
/// `<name>.value` is null and `<name>.details.truncated` is true.
#[derive(Debug, Clone)]
pub struct ValueSetParameterBuilder {
    name: String,
    ctx: SharedContext,
    max_cardinality: usize,
}

impl ValueSetParameterBuilder {
    /// Default limit on the number of distinct values.
    pub const DEFAULT_MAX_CARDINALITY: usize = 20;

    /// Creates a builder writing the value set under `name`.
    pub fn new(name: impl Into<String>, ctx: Arc<SessionContext>) -> Self {
        Self {
            name: name.into(),
            ctx: SharedContext::new(ctx),
            max_cardinality: Self::DEFAULT_MAX_CARDINALITY,
        }
    }

    /// Sets the largest value set that is still recorded.
    pub fn max_cardinality(mut self, max_cardinality: usize) -> Self {
        self.max_cardinality = max_cardinality;
        self
    }
}

#[async_trait]
impl ParameterBuilder for ValueSetParameterBuilder {
    #[instrument(skip_all, fields(builder = %self.name, domain = %domain))]
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        _variables: &Variables,
        _parameters: &ParametersView<'_>,
    ) -> Result<()> {
        let (table, column) = resolve_target(&self.ctx, domain).await?;
        let (column, _) = column.ok_or_else(|| {
            ProfilerError::parameter_computation(
                domain.id(),
                &self.name,
                value_key(&self.name),
                "a value set requires a column domain",
            )
        })?;

        // One extra row tells a full set from a truncated one.
        let limit = self.max_cardinality.saturating_add(1).min(i64::MAX as usize);
        let query = format!(
            "SELECT DISTINCT {column} FROM {table} WHERE {column} IS NOT NULL LIMIT {limit}"
        );
        let mut values = Vec::new();
        for batch in sql::collect(&self.ctx, &query).await? {
            values.extend(sql::strings(&batch, 0)?.into_iter().flatten());
        }
        values.sort();

        let truncated = values.len() > self.max_cardinality;
        if truncated {
            parameter_container.set(&value_key(&self.name), ParameterValue::Null)?;
        } else {
            parameter_container.set(&detail_key(&self.name, "cardinality"), values.len() as i64)?;
            parameter_container.set(&value_key(&self.name), values)?;
        }
        parameter_container.set(&detail_key(&self.name, "truncated"), truncated)?;
        parameter_container.set(
            &detail_key(&self.name, "max_cardinality"),
            i64::try_from(self.max_cardinality).unwrap_or(i64::MAX),
        )?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
