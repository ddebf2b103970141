//! In-memory tables for exercising the DataFusion-backed builders.
//!
//! [`create_orders_context`] registers four tables:
//!
//! | table | rows | notes |
//! |---|---|---|
//! | `orders` | 8 | `amount` has 2 nulls (count 6, sum 216, mean 36, min 15.5, max 60); `status` has 4 distinct values |
//! | `customers` | 5 | one null `email` |
//! | `empty_orders` | 0 | same schema as `orders` |
//! | `events` | 4 | column names that need quoting; `Amount-USD` has 1 null (min 10, max 30, mean 20.5) |

use crate::error::Result;
use arrow::array::{BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use std::sync::Arc;

/// Days since the epoch of 2024-01-01.
const JAN_1_2024: i32 = 19_723;

/// Schema of the `orders` and `empty_orders` tables.
pub fn orders_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, false),
        Field::new("customer_id", DataType::Int64, false),
        Field::new("amount", DataType::Float64, true),
        Field::new("status", DataType::Utf8, false),
        Field::new("placed_on", DataType::Date32, false),
    ]))
}

/// Creates the `orders` batch.
pub fn orders_batch() -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        orders_schema(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6, 7, 8])),
            Arc::new(Int64Array::from(vec![10, 11, 10, 12, 13, 11, 10, 14])),
            Arc::new(Float64Array::from(vec![
                Some(25.0),
                Some(40.0),
                None,
                Some(15.5),
                Some(60.0),
                None,
                Some(30.0),
                Some(45.5),
            ])),
            Arc::new(StringArray::from(vec![
                "shipped",
                "shipped",
                "pending",
                "cancelled",
                "shipped",
                "pending",
                "shipped",
                "returned",
            ])),
            Arc::new(Date32Array::from(
                (0..8).map(|day| JAN_1_2024 + day).collect::<Vec<_>>(),
            )),
        ],
    )?)
}

/// Creates the `customers` batch.
pub fn customers_batch() -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("customer_id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("email", DataType::Utf8, true),
        Field::new("is_active", DataType::Boolean, false),
    ]));

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![10, 11, 12, 13, 14])),
            Arc::new(StringArray::from(vec!["Alice", "Bob", "Carol", "Dan", "Eve"])),
            Arc::new(StringArray::from(vec![
                Some("alice@example.com"),
                Some("bob@example.com"),
                None,
                Some("dan@example.com"),
                Some("eve@example.com"),
            ])),
            Arc::new(BooleanArray::from(vec![true, true, false, true, false])),
        ],
    )?)
}

/// Creates the `events` batch, whose column names hold a space, a hyphen and a dot.
pub fn events_batch() -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_id", DataType::Int64, false),
        Field::new("order date", DataType::Date32, false),
        Field::new("Amount-USD", DataType::Float64, true),
        Field::new("a.b", DataType::Utf8, false),
    ]));

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
            Arc::new(Date32Array::from(vec![
                JAN_1_2024,
                JAN_1_2024,
                JAN_1_2024 + 1,
                JAN_1_2024 + 2,
            ])),
            Arc::new(Float64Array::from(vec![Some(10.0), Some(21.5), None, Some(30.0)])),
            Arc::new(StringArray::from(vec!["x", "y", "x", "z"])),
        ],
    )?)
}

/// Creates a context with the `orders`, `customers`, `empty_orders` and `events` tables.
pub async fn create_orders_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();
    ctx.register_batch("orders", orders_batch()?)?;
    ctx.register_batch("customers", customers_batch()?)?;
    ctx.register_batch("empty_orders", RecordBatch::new_empty(orders_schema()))?;
    ctx.register_batch("events", events_batch()?)?;
    Ok(ctx)
}

/// Creates a context with one table of `columns` Float64 columns named
/// `c0`, `c1`, ... and `rows` deterministic rows; every seventh value is null.
pub async fn create_numeric_context(
    table: &str,
    columns: usize,
    rows: usize,
) -> Result<SessionContext> {
    let schema = Arc::new(Schema::new(
        (0..columns)
            .map(|c| Field::new(format!("c{c}"), DataType::Float64, true))
            .collect::<Vec<_>>(),
    ));

    let arrays = (0..columns)
        .map(|c| {
            let values: Float64Array = (0..rows)
                .map(|r| ((r + c) % 7 != 0).then(|| ((r * 31 + c * 17) % 1000) as f64 / 10.0))
                .collect();
            Arc::new(values) as arrow::array::ArrayRef
        })
        .collect::<Vec<_>>();

    let ctx = SessionContext::new();
    ctx.register_batch(table, RecordBatch::try_new(schema, arrays)?)?;
    Ok(ctx)
}
