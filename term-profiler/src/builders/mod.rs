//! Ready-made builders backed by Apache DataFusion.
//!
//! Domain and parameter builders hold an `Arc<SessionContext>` and query the
//! tables registered with it. Identifiers are validated and quoted through
//! [`SqlSecurity`](crate::security::SqlSecurity) before they reach SQL.
//!
//! | Stage | Builders |
//! |---|---|
//! | domains | [`TableDomainBuilder`], [`ColumnDomainBuilder`], [`ColumnPairDomainBuilder`], [`MultiColumnDomainBuilder`] |
//! | parameters | [`MetricParameterBuilder`], [`NumericRangeParameterBuilder`], [`RatioParameterBuilder`], [`ValueSetParameterBuilder`] |
//! | expectations | [`DefaultExpectationConfigurationBuilder`] |

mod domain;
mod expectation;
mod parameter;
mod sql;

pub use domain::{
    ColumnDomainBuilder, ColumnPairDomainBuilder, MultiColumnDomainBuilder, SemanticType,
    TableDomainBuilder, SEMANTIC_TYPE_DETAIL,
};
pub use expectation::{DefaultExpectationConfigurationBuilder, KwargSource};
pub use parameter::{
    Metric, MetricParameterBuilder, NumericRangeParameterBuilder, RatioParameterBuilder,
    ValueSetParameterBuilder,
};
