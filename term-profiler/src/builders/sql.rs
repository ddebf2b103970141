//! Query helpers shared by the DataFusion-backed builders.

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ProfilerError, Result};
use crate::security::SqlSecurity;

/// A shared DataFusion session held by builders.
#[derive(Clone)]
pub(crate) struct SharedContext(Arc<SessionContext>);

impl SharedContext {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self(ctx)
    }
}

impl Deref for SharedContext {
    type Target = SessionContext;

    fn deref(&self) -> &SessionContext {
        &self.0
    }
}

impl fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionContext")
            .field(&self.0.session_id())
            .finish()
    }
}

/// Returns the arrow schema of a registered table.
pub(crate) async fn table_schema(ctx: &SessionContext, table: &str) -> Result<Schema> {
    SqlSecurity::validate_identifier(table)?;
    let df = ctx.table(table).await?;
    Ok(df.schema().as_arrow().clone())
}

/// Runs `sql` and returns every non-empty result batch.
pub(crate) async fn collect(ctx: &SessionContext, sql: &str) -> Result<Vec<RecordBatch>> {
    debug!(sql, "Executing profiling query");
    let batches = ctx.sql(sql).await?.collect().await?;
    Ok(batches.into_iter().filter(|b| b.num_rows() > 0).collect())
}

/// Runs an aggregate query and returns its single result row.
pub(crate) async fn single_row(ctx: &SessionContext, sql: &str) -> Result<RecordBatch> {
    collect(ctx, sql)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ProfilerError::Internal(format!("query returned no rows: {sql}")))
}

/// Reads row `row` of column `index` as a float, `None` when null.
pub(crate) fn f64_at(batch: &RecordBatch, index: usize, row: usize) -> Result<Option<f64>> {
    let column = cast(batch.column(index), &DataType::Float64)?;
    let values = column.as_primitive::<Float64Type>();
    Ok((!values.is_null(row)).then(|| values.value(row)))
}

/// Reads row `row` of column `index` as an integer, `None` when null.
pub(crate) fn i64_at(batch: &RecordBatch, index: usize, row: usize) -> Result<Option<i64>> {
    let column = cast(batch.column(index), &DataType::Int64)?;
    let values = column.as_primitive::<Int64Type>();
    Ok((!values.is_null(row)).then(|| values.value(row)))
}

/// Reads every row of column `index` as a string, `None` for nulls.
pub(crate) fn strings(batch: &RecordBatch, index: usize) -> Result<Vec<Option<String>>> {
    let column = cast(batch.column(index), &DataType::Utf8)?;
    let values = column.as_string::<i32>();
    Ok(values.iter().map(|v| v.map(str::to_string)).collect())
}

/// Returns true for integer arrow types.
pub(crate) fn is_integer(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Returns true for integer, float and decimal arrow types.
pub(crate) fn is_numeric(data_type: &DataType) -> bool {
    is_integer(data_type)
        || matches!(
            data_type,
            DataType::Float16
                | DataType::Float32
                | DataType::Float64
                | DataType::Decimal128(_, _)
                | DataType::Decimal256(_, _)
        )
}
