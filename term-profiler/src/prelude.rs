//! Prelude for commonly used types and traits in term-profiler.

pub use crate::builders::{
    ColumnDomainBuilder, ColumnPairDomainBuilder, DefaultExpectationConfigurationBuilder,
    KwargSource, Metric, MetricParameterBuilder, MultiColumnDomainBuilder,
    NumericRangeParameterBuilder, RatioParameterBuilder, SemanticType, TableDomainBuilder,
    ValueSetParameterBuilder,
};
pub use crate::error::{ProfilerError, Result};
pub use crate::logging::LogConfig;
pub use crate::profiler::{
    Domain, DomainBuilder, DomainId, DomainType, ErrorMode, ExpectationConfiguration,
    ExpectationConfigurationBuilder, OverwritePolicy, ParameterBuilder, ParameterContainer,
    ParameterMap, ParameterReference, ParameterValue, ParametersView, Rule, RuleBasedProfiler,
    RuleConfig, Variables,
};
