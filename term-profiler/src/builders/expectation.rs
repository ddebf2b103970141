//! Template-driven expectation configuration builder.

use crate::error::{ProfilerError, Result};
use crate::profiler::{
    Domain, ExpectationConfiguration, ExpectationConfigurationBuilder, ParameterReference,
    ParameterValue, ParametersView, ReferenceScope, Variables,
};

/// Where a kwarg or meta entry takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum KwargSource {
    /// A fixed value.
    Literal(ParameterValue),
    /// A parameter, variable or domain kwarg resolved per domain.
    Reference(ParameterReference),
}

impl KwargSource {
    /// Creates a literal source.
    pub fn literal(value: impl Into<ParameterValue>) -> Self {
        Self::Literal(value.into())
    }

    /// Parses a reference source such as `$parameter.amount_range.value`.
    pub fn reference(reference: &str) -> Result<Self> {
        Ok(Self::Reference(ParameterReference::parse(reference)?))
    }
}

impl From<ParameterReference> for KwargSource {
    fn from(reference: ParameterReference) -> Self {
        Self::Reference(reference)
    }
}

/// Emits one configuration of a fixed expectation type per domain.
///
/// Kwargs start from the domain's identifying kwargs (`column`, `table`, ...),
/// then the configured kwargs are applied in order, so an explicit kwarg
/// replaces a domain kwarg of the same name. A reference that cannot be
/// resolved fails with
/// [`ProfilerError::ExpectationConfigurationBuild`].
///
/// # Example
///
/// ```rust
/// use term_profiler::builders::{DefaultExpectationConfigurationBuilder, KwargSource};
/// use term_profiler::profiler::{
///     Domain, ExpectationConfigurationBuilder, ParameterContainer, ParameterMap,
///     ParametersView, Variables,
/// };
///
/// let domain = Domain::column("orders", "amount");
/// let mut container = ParameterContainer::new();
/// container.set("completeness.value", 0.75).unwrap();
/// let mut map = ParameterMap::new();
/// map.insert(domain.id().clone(), container);
///
/// let builder = DefaultExpectationConfigurationBuilder::new("expect_column_values_to_not_be_null")
///     .kwarg("mostly", KwargSource::reference("$parameter.completeness.value").unwrap());
///
/// let config = builder
///     .build_expectation_configuration(&domain, &Variables::new(), &ParametersView::new(&map))
///     .unwrap();
/// assert_eq!(config.kwarg("column").unwrap().as_str(), Some("amount"));
/// assert_eq!(config.kwarg("mostly").unwrap().as_f64(), Some(0.75));
/// ```
#[derive(Debug, Clone)]
pub struct DefaultExpectationConfigurationBuilder {
    expectation_type: String,
    kwargs: Vec<(String, KwargSource)>,
    meta: Vec<(String, KwargSource)>,
    include_domain_kwargs: bool,
}

impl DefaultExpectationConfigurationBuilder {
    /// Creates a builder for `expectation_type`.
    pub fn new(expectation_type: impl Into<String>) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs: Vec::new(),
            meta: Vec::new(),
            include_domain_kwargs: true,
        }
    }

    /// Adds a kwarg.
    pub fn kwarg(mut self, name: impl Into<String>, source: KwargSource) -> Self {
        self.kwargs.push((name.into(), source));
        self
    }

    /// Adds a meta entry.
    pub fn meta(mut self, name: impl Into<String>, source: KwargSource) -> Self {
        self.meta.push((name.into(), source));
        self
    }

    /// Controls whether the domain's identifying kwargs are copied into the
    /// configuration. Enabled by default.
    pub fn include_domain_kwargs(mut self, include: bool) -> Self {
        self.include_domain_kwargs = include;
        self
    }

    fn resolve(&self, scope: &ReferenceScope<'_>, source: &KwargSource) -> Result<ParameterValue> {
        match source {
            KwargSource::Literal(value) => Ok(value.clone()),
            KwargSource::Reference(reference) => {
                reference.resolve(scope).cloned().ok_or_else(|| {
                    ProfilerError::expectation_configuration_build(
                        scope.domain().id(),
                        &self.expectation_type,
                        reference.name(),
                        format!("{reference} could not be resolved"),
                    )
                })
            }
        }
    }
}

impl ExpectationConfigurationBuilder for DefaultExpectationConfigurationBuilder {
    fn build_expectation_configuration(
        &self,
        domain: &Domain,
        variables: &Variables,
        parameters: &ParametersView<'_>,
    ) -> Result<ExpectationConfiguration> {
        let scope = ReferenceScope::new(domain, variables, *parameters);
        let mut config = ExpectationConfiguration::new(&self.expectation_type);

        if self.include_domain_kwargs {
            config.kwargs.extend(
                domain
                    .domain_kwargs()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        for (name, source) in &self.kwargs {
            config.kwargs.insert(name.clone(), self.resolve(&scope, source)?);
        }
        for (name, source) in &self.meta {
            config.meta.insert(name.clone(), self.resolve(&scope, source)?);
        }

        Ok(config)
    }

    fn expectation_type(&self) -> &str {
        &self.expectation_type
    }
}
