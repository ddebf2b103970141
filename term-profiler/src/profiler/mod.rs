//! Rule evaluation engine.
//!
//! A rule runs a three-stage pipeline over the domains it targets:
//!
//! 1. a [`DomainBuilder`] enumerates domains (tables, columns, column pairs,
//!    column groups);
//! 2. [`ParameterBuilder`]s compute named parameters into a per-domain
//!    [`ParameterContainer`], in declared order, each seeing what earlier
//!    builders wrote;
//! 3. [`ExpectationConfigurationBuilder`]s turn the finished parameters into
//!    [`ExpectationConfiguration`]s.
//!
//! The output is ordered by domain, then by expectation builder, and is
//! deterministic for a given backend state. A [`RuleBasedProfiler`] runs
//! several rules with shared [`Variables`], making each rule's parameters
//! available to the rules after it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use term_profiler::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(ctx: Arc<datafusion::prelude::SessionContext>) -> Result<()> {
//! let rule = Rule::builder("amount_ranges")
//!     .domain_builder(ColumnDomainBuilder::new(ctx.clone(), "orders").semantic_types(&[SemanticType::Numeric]))
//!     .parameter_builder(NumericRangeParameterBuilder::new("range", ctx.clone()))
//!     .expectation_configuration_builder(
//!         DefaultExpectationConfigurationBuilder::new("expect_column_values_to_be_between")
//!             .kwarg("min_value", KwargSource::reference("$parameter.range.details.min")?)
//!             .kwarg("max_value", KwargSource::reference("$parameter.range.details.max")?),
//!     )
//!     .build()?;
//!
//! let mut profiler = RuleBasedProfiler::builder("orders").rule(rule).build()?;
//! let configs = profiler.profile(None).await?.into_expectation_configurations();
//! # Ok(())
//! # }
//! ```

mod domain;
mod expectation;
mod parameter;
mod reference;
mod rule;
mod rule_based_profiler;
mod traits;
mod variables;

pub use domain::{Domain, DomainId, DomainKwargs, DomainType};
pub use expectation::ExpectationConfiguration;
pub use parameter::{
    ParameterContainer, ParameterMap, ParameterNode, ParameterValue, ParametersView,
};
pub use reference::{ParameterReference, ReferenceScope};
pub use rule::{
    DomainFailure, ErrorMode, OverwritePolicy, Rule, RuleBuilder, RuleConfig, RuleReport,
};
pub use rule_based_profiler::{
    ProfilingResult, ProfilingSummary, RuleBasedProfiler, RuleBasedProfilerBuilder,
};
pub use traits::{DomainBuilder, ExpectationConfigurationBuilder, ParameterBuilder};
pub use variables::{Variables, VariablesBuilder};
