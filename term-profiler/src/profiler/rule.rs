//! The rule orchestrator: domains, then parameters, then expectations.
//!
//! A [`Rule`] binds one [`DomainBuilder`], an ordered list of
//! [`ParameterBuilder`]s and an ordered list of
//! [`ExpectationConfigurationBuilder`]s. Every call to [`Rule::generate`]
//! walks the same state machine:
//!
//! ```text
//! Init ─► DomainsDiscovered ─► for each domain (in order):
//!                                 ParametersBuilding ─► ParametersComplete ─► ConfigsBuilding
//!                              ─► Aggregated ─► Done
//! ```
//!
//! All parameter builders of a domain finish before its first expectation
//! builder runs, so expectation builders always see the complete parameter
//! set of their domain.
//!
//! ## Failure semantics
//!
//! With [`ErrorMode::FailFast`] (the default) any error aborts the call. No
//! partial list is returned and the parameters retained on the rule are left
//! exactly as they were before the call. [`ErrorMode::BestEffort`] instead
//! skips failing domains and reports them in a [`RuleReport`]; domain
//! discovery failures remain fatal in both modes.

use std::fmt;
use tracing::{debug, info, instrument, warn};

use super::domain::{Domain, DomainId};
use super::expectation::ExpectationConfiguration;
use super::parameter::{ParameterContainer, ParameterMap, ParametersView};
use super::traits::{DomainBuilder, ExpectationConfigurationBuilder, ParameterBuilder};
use super::variables::Variables;
use crate::error::{ProfilerError, Result};
use crate::logging::{truncate_field, LogConfig};
use crate::{log_domain, log_parameter, perf_debug};

/// How a rule reacts to a failing domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Abort the whole call on the first error.
    #[default]
    FailFast,
    /// Skip failing domains and report them alongside the successful output.
    BestEffort,
}

/// What happens when a parameter builder overwrites a value written by an
/// earlier builder for the same domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// The later builder's value replaces the earlier one.
    #[default]
    LastWriterWins,
    /// Overwrites fail with [`ProfilerError::DuplicateParameter`].
    Reject,
}

/// Configuration for a [`Rule`].
#[derive(Debug, Clone, Default)]
pub struct RuleConfig {
    /// Reaction to failing domains
    pub error_mode: ErrorMode,
    /// Handling of overwritten parameters
    pub overwrite_policy: OverwritePolicy,
    /// Logging detail
    pub log_config: LogConfig,
}

impl RuleConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the error mode.
    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// Sets the overwrite policy.
    pub fn with_overwrite_policy(mut self, overwrite_policy: OverwritePolicy) -> Self {
        self.overwrite_policy = overwrite_policy;
        self
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }
}

/// A domain skipped in [`ErrorMode::BestEffort`].
#[derive(Debug)]
pub struct DomainFailure {
    /// The domain that failed
    pub domain: Domain,
    /// Why it failed
    pub error: ProfilerError,
}

/// Outcome of one rule execution.
#[derive(Debug)]
pub struct RuleReport {
    /// Name of the rule
    pub rule_name: String,
    /// Configurations in domain order, builder order within a domain
    pub expectation_configurations: Vec<ExpectationConfiguration>,
    /// Domains skipped in best-effort mode
    pub failures: Vec<DomainFailure>,
}

impl RuleReport {
    fn new(rule_name: &str) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            expectation_configurations: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Checks whether every domain succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Orchestrates domain discovery, parameter computation and expectation
/// synthesis for one kind of domain.
///
/// # Example
///
/// ```rust,ignore
/// use term_profiler::builders::{ColumnDomainBuilder, DefaultExpectationConfigurationBuilder,
///     Metric, MetricParameterBuilder};
/// use term_profiler::profiler::{Rule, Variables};
///
/// # async fn example(ctx: std::sync::Arc<datafusion::prelude::SessionContext>) -> term_profiler::error::Result<()> {
/// let mut rule = Rule::builder("not_null")
///     .domain_builder(ColumnDomainBuilder::new(ctx.clone(), "orders"))
///     .parameter_builder(MetricParameterBuilder::new("null_count", ctx.clone(), Metric::NullCount))
///     .expectation_configuration_builder(
///         DefaultExpectationConfigurationBuilder::new("expect_column_values_to_not_be_null"),
///     )
///     .build()?;
///
/// let configs = rule.generate(&Variables::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct Rule {
    name: String,
    domain_builder: Box<dyn DomainBuilder>,
    parameter_builders: Vec<Box<dyn ParameterBuilder>>,
    expectation_configuration_builders: Vec<Box<dyn ExpectationConfigurationBuilder>>,
    config: RuleConfig,
    parameters: ParameterMap,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("domain_builder", &self.domain_builder.name())
            .field(
                "parameter_builders",
                &self
                    .parameter_builders
                    .iter()
                    .map(|b| b.name())
                    .collect::<Vec<_>>(),
            )
            .field(
                "expectation_configuration_builders",
                &self
                    .expectation_configuration_builders
                    .iter()
                    .map(|b| b.expectation_type())
                    .collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .field("domains_with_parameters", &self.parameters.len())
            .finish()
    }
}

impl Rule {
    /// Creates a builder for a rule named `name`.
    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(name)
    }

    /// Returns the rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the rule configuration.
    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Returns the domain builder.
    pub fn domain_builder(&self) -> &dyn DomainBuilder {
        self.domain_builder.as_ref()
    }

    /// Returns the parameter builders with their names, in execution order.
    pub fn parameter_builders(&self) -> Vec<(&str, &dyn ParameterBuilder)> {
        self.parameter_builders
            .iter()
            .map(|b| (b.name(), b.as_ref()))
            .collect()
    }

    /// Returns the last parameter builder registered under `name`.
    pub fn parameter_builder(&self, name: &str) -> Option<&dyn ParameterBuilder> {
        self.parameter_builders
            .iter()
            .rev()
            .find(|b| b.name() == name)
            .map(|b| b.as_ref())
    }

    /// Returns the expectation configuration builders with their expectation
    /// types, in execution order.
    pub fn expectation_configuration_builders(
        &self,
    ) -> Vec<(&str, &dyn ExpectationConfigurationBuilder)> {
        self.expectation_configuration_builders
            .iter()
            .map(|b| (b.expectation_type(), b.as_ref()))
            .collect()
    }

    /// Returns a deep copy of the parameters accumulated across calls.
    ///
    /// Every successful call adds or replaces the containers of the domains
    /// it processed; domains it did not discover keep their earlier
    /// containers. The copy shares nothing with the rule: mutating it never
    /// affects the rule or later calls to this method.
    pub fn parameters(&self) -> ParameterMap {
        self.parameters.clone()
    }

    /// Generates expectation configurations for every domain.
    ///
    /// In [`ErrorMode::FailFast`] the first error is returned and nothing is
    /// retained from the call. In [`ErrorMode::BestEffort`] failing domains
    /// are logged and skipped; use [`Rule::generate_report`] to inspect them.
    pub async fn generate(
        &mut self,
        variables: &Variables,
    ) -> Result<Vec<ExpectationConfiguration>> {
        self.generate_with_upstream(variables, &ParameterMap::new()).await
    }

    /// Like [`Rule::generate`], with `upstream` parameters (typically from
    /// rules that ran earlier) visible to this rule's builders.
    pub async fn generate_with_upstream(
        &mut self,
        variables: &Variables,
        upstream: &ParameterMap,
    ) -> Result<Vec<ExpectationConfiguration>> {
        Ok(self
            .execute(variables, upstream)
            .await?
            .expectation_configurations)
    }

    /// Generates expectation configurations and reports skipped domains.
    pub async fn generate_report(&mut self, variables: &Variables) -> Result<RuleReport> {
        self.execute(variables, &ParameterMap::new()).await
    }

    #[instrument(skip(self, variables, upstream), fields(rule = %self.name))]
    pub(crate) async fn execute(
        &mut self,
        variables: &Variables,
        upstream: &ParameterMap,
    ) -> Result<RuleReport> {
        let domains = self.discover_domains(variables).await?;
        debug!(domains = domains.len(), "Discovered domains");

        // Domains of this call start from empty containers. Results are merged
        // into the retained map only once the call succeeds.
        let mut working = ParameterMap::new();
        let mut report = RuleReport::new(&self.name);

        for domain in &domains {
            log_domain!(
                self.config.log_config,
                domain = %domain,
                domain_id = domain.id().short(),
                "Processing domain"
            );

            match self
                .process_domain(domain, variables, upstream, &mut working)
                .await
            {
                Ok(configs) => report.expectation_configurations.extend(configs),
                Err(error) if self.config.error_mode == ErrorMode::BestEffort => {
                    warn!(domain = %domain, error = %error, "Skipping failed domain");
                    working.remove(domain.id());
                    report.failures.push(DomainFailure {
                        domain: domain.clone(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        self.parameters.extend(working);

        info!(
            domains = domains.len(),
            expectations = report.expectation_configurations.len(),
            failures = report.failures.len(),
            "Rule generated expectations"
        );

        Ok(report)
    }

    async fn discover_domains(&self, variables: &Variables) -> Result<Vec<Domain>> {
        let builder_name = self.domain_builder.name();
        let domains = self
            .domain_builder
            .get_domains(variables)
            .await
            .map_err(|e| e.into_domain_discovery(builder_name))?;

        let mut seen = std::collections::HashSet::with_capacity(domains.len());
        for domain in &domains {
            if !seen.insert(domain.id()) {
                return Err(ProfilerError::domain_discovery(
                    builder_name,
                    format!("domain {domain} returned more than once"),
                ));
            }
        }

        Ok(domains)
    }

    async fn process_domain(
        &self,
        domain: &Domain,
        variables: &Variables,
        upstream: &ParameterMap,
        working: &mut ParameterMap,
    ) -> Result<Vec<ExpectationConfiguration>> {
        let domain_id = domain.id().clone();

        // Register before any builder runs so later domains can look it up.
        working.insert(domain_id.clone(), ParameterContainer::new());

        for builder in &self.parameter_builders {
            // The builder writes into a copy; the registered container stays
            // visible through the view as of the previous builder.
            let mut container = working.get(&domain_id).cloned().unwrap_or_default();

            let view = ParametersView::with_upstream(working, upstream)
                .with_retained(&self.parameters);
            builder
                .build_parameters(&mut container, domain, variables, &view)
                .await
                .map_err(|e| e.into_parameter_computation(&domain_id, builder.name()))?;

            if self.tracks_overwrites() {
                if let Some(before) = working.get(&domain_id) {
                    self.check_overwrites(before, &container, &domain_id, builder.name())?;
                }
            }

            log_parameter!(
                self.config.log_config,
                builder = builder.name(),
                domain_id = domain_id.short(),
                parameters = %truncate_field(
                    &container.to_json().to_string(),
                    self.config.log_config.max_field_length
                ),
                "Built parameters"
            );

            working.insert(domain_id.clone(), container);
        }

        let view = ParametersView::with_upstream(working, upstream)
            .with_retained(&self.parameters);
        let mut configs = Vec::with_capacity(self.expectation_configuration_builders.len());
        for builder in &self.expectation_configuration_builders {
            let config = builder
                .build_expectation_configuration(domain, variables, &view)
                .map_err(|e| {
                    e.into_expectation_configuration_build(&domain_id, builder.expectation_type())
                })?;
            perf_debug!(
                self.config.log_config,
                expectation_type = builder.expectation_type(),
                domain_id = domain_id.short(),
                kwargs = config.kwargs.len(),
                "Built expectation configuration"
            );
            configs.push(config);
        }

        Ok(configs)
    }

    fn tracks_overwrites(&self) -> bool {
        self.config.overwrite_policy == OverwritePolicy::Reject
            || self.config.log_config.log_parameter_overwrites
    }

    fn check_overwrites(
        &self,
        before: &ParameterContainer,
        after: &ParameterContainer,
        domain_id: &DomainId,
        builder: &str,
    ) -> Result<()> {
        for (name, previous) in before.leaves() {
            if after.get(&name) == Some(previous) {
                continue;
            }
            match self.config.overwrite_policy {
                OverwritePolicy::Reject => {
                    return Err(ProfilerError::DuplicateParameter {
                        domain_id: domain_id.clone(),
                        builder: builder.to_string(),
                        parameter: name,
                    });
                }
                OverwritePolicy::LastWriterWins => {
                    warn!(
                        builder,
                        parameter = %name,
                        domain_id = domain_id.short(),
                        "Parameter overwritten by later builder"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`Rule`].
pub struct RuleBuilder {
    name: String,
    domain_builder: Option<Box<dyn DomainBuilder>>,
    parameter_builders: Vec<Box<dyn ParameterBuilder>>,
    expectation_configuration_builders: Vec<Box<dyn ExpectationConfigurationBuilder>>,
    config: RuleConfig,
}

impl RuleBuilder {
    /// Creates a builder for a rule named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain_builder: None,
            parameter_builders: Vec::new(),
            expectation_configuration_builders: Vec::new(),
            config: RuleConfig::default(),
        }
    }

    /// Sets the domain builder.
    pub fn domain_builder(mut self, builder: impl DomainBuilder + 'static) -> Self {
        self.domain_builder = Some(Box::new(builder));
        self
    }

    /// Appends a parameter builder; builders run in the order they are added.
    pub fn parameter_builder(mut self, builder: impl ParameterBuilder + 'static) -> Self {
        self.parameter_builders.push(Box::new(builder));
        self
    }

    /// Appends an already boxed parameter builder.
    pub fn boxed_parameter_builder(mut self, builder: Box<dyn ParameterBuilder>) -> Self {
        self.parameter_builders.push(builder);
        self
    }

    /// Appends an expectation configuration builder; builders run in the order
    /// they are added.
    pub fn expectation_configuration_builder(
        mut self,
        builder: impl ExpectationConfigurationBuilder + 'static,
    ) -> Self {
        self.expectation_configuration_builders.push(Box::new(builder));
        self
    }

    /// Appends an already boxed expectation configuration builder.
    pub fn boxed_expectation_configuration_builder(
        mut self,
        builder: Box<dyn ExpectationConfigurationBuilder>,
    ) -> Self {
        self.expectation_configuration_builders.push(builder);
        self
    }

    /// Replaces the rule configuration.
    pub fn config(mut self, config: RuleConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the error mode.
    pub fn error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.config.error_mode = error_mode;
        self
    }

    /// Sets the overwrite policy.
    pub fn overwrite_policy(mut self, overwrite_policy: OverwritePolicy) -> Self {
        self.config.overwrite_policy = overwrite_policy;
        self
    }

    /// Builds the rule.
    ///
    /// Fails when the name is empty or no domain builder was set.
    pub fn build(self) -> Result<Rule> {
        if self.name.trim().is_empty() {
            return Err(ProfilerError::Configuration(
                "rule name cannot be empty".to_string(),
            ));
        }
        let domain_builder = self.domain_builder.ok_or_else(|| {
            ProfilerError::Configuration(format!("rule '{}' has no domain builder", self.name))
        })?;

        Ok(Rule {
            name: self.name,
            domain_builder,
            parameter_builders: self.parameter_builders,
            expectation_configuration_builders: self.expectation_configuration_builders,
            config: self.config,
            parameters: ParameterMap::new(),
        })
    }
}
