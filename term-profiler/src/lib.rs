//! # Term Profiler - Rule-Based Expectation Generation for Rust
//!
//! Term Profiler inspects datasets and proposes data quality assertions
//! ("expectations") for them. It is the profiling companion of Term: where
//! Term validates data against checks you write, the profiler derives those
//! checks from the data itself. Queries run on Apache DataFusion.
//!
//! ## Overview
//!
//! Profiling is organised in rules. Each rule runs a three-stage pipeline:
//!
//! 1. **Domain discovery** decides *what* to profile: a table, every numeric
//!    column, a pair of columns, ...
//! 2. **Parameter computation** measures each domain: row counts,
//!    completeness, observed ranges, value sets. Later parameters can build on
//!    earlier ones, including parameters of other domains and other rules.
//! 3. **Expectation synthesis** turns the measurements into
//!    [`ExpectationConfiguration`](profiler::ExpectationConfiguration)s.
//!
//! ## Quick Start
//!
//! ```rust
//! use term_profiler::prelude::*;
//! use datafusion::prelude::SessionContext;
//! use std::sync::Arc;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let ctx = Arc::new(SessionContext::new());
//! // ... register your tables ...
//!
//! let completeness = Rule::builder("completeness")
//!     .domain_builder(ColumnDomainBuilder::new(ctx.clone(), "orders"))
//!     .parameter_builder(MetricParameterBuilder::new(
//!         "completeness",
//!         ctx.clone(),
//!         Metric::Completeness,
//!     ))
//!     .expectation_configuration_builder(
//!         DefaultExpectationConfigurationBuilder::new("expect_column_values_to_not_be_null")
//!             .kwarg("mostly", KwargSource::reference("$parameter.completeness.value")?),
//!     )
//!     .build()?;
//!
//! let ranges = Rule::builder("ranges")
//!     .domain_builder(
//!         ColumnDomainBuilder::new(ctx.clone(), "orders").semantic_types(&[SemanticType::Numeric]),
//!     )
//!     .parameter_builder(NumericRangeParameterBuilder::new("range", ctx.clone()).relative_margin(0.1))
//!     .expectation_configuration_builder(
//!         DefaultExpectationConfigurationBuilder::new("expect_column_values_to_be_between")
//!             .kwarg("min_value", KwargSource::reference("$parameter.range.value")?),
//!     )
//!     .build()?;
//!
//! let mut profiler = RuleBasedProfiler::builder("orders_profiler")
//!     .rule(completeness)
//!     .rule(ranges)
//!     .build()?;
//!
//! let result = profiler.profile(None).await?;
//! for config in result.expectation_configurations() {
//!     println!("{}", config.to_json_string()?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Guarantees
//!
//! - **Deterministic output**: for the same data and variables, a rule emits
//!   the same configurations in the same order (domain order, then builder
//!   order), with kwargs serialized in sorted key order.
//! - **Ordered computation**: parameter builders for a domain run strictly in
//!   declaration order, and all of them finish before the first expectation
//!   builder runs.
//! - **Isolated state**: every domain gets a fresh parameter container per run,
//!   and [`Rule::parameters`](profiler::Rule::parameters) hands out deep copies.
//! - **Attributed failures**: errors name the stage, domain and builder they
//!   come from; see [`error::ProfilerError`].
//!
//! ## Architecture
//!
//! - **`profiler`**: the rule engine (domains, parameter containers,
//!   variables, references, the builder traits, `Rule` and
//!   `RuleBasedProfiler`)
//! - **`builders`**: DataFusion-backed domain, parameter and expectation builders
//! - **`error`**: the `ProfilerError` taxonomy
//! - **`logging`**: log detail configuration and `tracing-subscriber` setup
//! - **`security`**: SQL identifier validation

pub mod builders;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod profiler;
pub mod security;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
