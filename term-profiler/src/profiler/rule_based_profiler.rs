//! A named, ordered collection of rules sharing one set of variables.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, instrument};

use super::expectation::ExpectationConfiguration;
use super::parameter::ParameterMap;
use super::rule::{Rule, RuleReport};
use super::variables::Variables;
use crate::error::{ProfilerError, Result};

/// Runs its rules in order and collects their expectation configurations.
///
/// Parameters computed by a rule are visible to every rule that runs after it
/// in the same [`RuleBasedProfiler::profile`] call, through
/// `$parameter@<domain id>.<name>` references or
/// [`ParametersView::get`](super::ParametersView::get).
///
/// # Example
///
/// ```rust,ignore
/// use term_profiler::profiler::{RuleBasedProfiler, Variables};
///
/// # async fn example(rule: term_profiler::profiler::Rule) -> term_profiler::error::Result<()> {
/// let mut profiler = RuleBasedProfiler::builder("orders_profiler")
///     .variables(Variables::from_json(r#"{"mostly": 0.95}"#)?)
///     .rule(rule)
///     .build()?;
///
/// let result = profiler.profile(None).await?;
/// for config in result.expectation_configurations() {
///     println!("{}", config.to_json_string()?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RuleBasedProfiler {
    name: String,
    variables: Variables,
    rules: Vec<Rule>,
}

impl RuleBasedProfiler {
    /// Creates a builder for a profiler named `name`.
    pub fn builder(name: impl Into<String>) -> RuleBasedProfilerBuilder {
        RuleBasedProfilerBuilder::new(name)
    }

    /// Returns the profiler name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stored variables.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Returns the rules in execution order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns a rule by name.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    /// Returns a deep copy of every rule's retained parameters, keyed by rule name.
    pub fn parameters(&self) -> Vec<(String, ParameterMap)> {
        self.rules
            .iter()
            .map(|r| (r.name().to_string(), r.parameters()))
            .collect()
    }

    /// Runs every rule in order.
    ///
    /// `variables` overrides the stored variables for this call only. The
    /// first rule error aborts the run; rules that already completed keep the
    /// parameters they computed.
    #[instrument(skip(self, variables), fields(profiler = %self.name, rules = self.rules.len()))]
    pub async fn profile(&mut self, variables: Option<&Variables>) -> Result<ProfilingResult> {
        let started_at = Utc::now();
        let variables = variables.unwrap_or(&self.variables).clone();

        let mut upstream = ParameterMap::new();
        let mut rule_reports = Vec::with_capacity(self.rules.len());

        for rule in &mut self.rules {
            let report = rule.execute(&variables, &upstream).await?;
            for (domain_id, container) in rule.parameters() {
                match upstream.get_mut(&domain_id) {
                    Some(existing) => existing.merge(&container)?,
                    None => {
                        upstream.insert(domain_id, container);
                    }
                }
            }
            rule_reports.push(report);
        }

        let result = ProfilingResult {
            profiler_name: self.name.clone(),
            rule_reports,
            started_at,
            completed_at: Utc::now(),
        };

        info!(
            expectations = result.expectation_configurations().count(),
            failures = result.failure_count(),
            "Profiling completed"
        );

        Ok(result)
    }
}

/// Builder for [`RuleBasedProfiler`].
#[derive(Debug)]
pub struct RuleBasedProfilerBuilder {
    name: String,
    variables: Variables,
    rules: Vec<Rule>,
}

impl RuleBasedProfilerBuilder {
    /// Creates a builder for a profiler named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Variables::default(),
            rules: Vec::new(),
        }
    }

    /// Sets the variables used when `profile` is called without an override.
    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Appends a rule.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends several rules.
    pub fn rules<I>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.rules.extend(rules);
        self
    }

    /// Builds the profiler, rejecting duplicate rule names.
    pub fn build(self) -> Result<RuleBasedProfiler> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name()) {
                return Err(ProfilerError::Configuration(format!(
                    "duplicate rule name '{}' in profiler '{}'",
                    rule.name(),
                    self.name
                )));
            }
        }

        Ok(RuleBasedProfiler {
            name: self.name,
            variables: self.variables,
            rules: self.rules,
        })
    }
}

/// Output of one profiler run.
#[derive(Debug)]
pub struct ProfilingResult {
    /// Name of the profiler
    pub profiler_name: String,
    /// One report per rule, in rule order
    pub rule_reports: Vec<RuleReport>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run completed
    pub completed_at: DateTime<Utc>,
}

impl ProfilingResult {
    /// Iterates over all configurations in rule order.
    pub fn expectation_configurations(&self) -> impl Iterator<Item = &ExpectationConfiguration> {
        self.rule_reports
            .iter()
            .flat_map(|r| r.expectation_configurations.iter())
    }

    /// Consumes the result, returning all configurations in rule order.
    pub fn into_expectation_configurations(self) -> Vec<ExpectationConfiguration> {
        self.rule_reports
            .into_iter()
            .flat_map(|r| r.expectation_configurations)
            .collect()
    }

    /// Returns the number of domains skipped across all rules.
    pub fn failure_count(&self) -> usize {
        self.rule_reports.iter().map(|r| r.failures.len()).sum()
    }

    /// Returns the wall-clock duration of the run in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    /// Builds a serializable summary of the run.
    pub fn summary(&self) -> ProfilingSummary {
        ProfilingSummary {
            profiler_name: self.profiler_name.clone(),
            rules: self.rule_reports.len(),
            expectations: self.expectation_configurations().count(),
            failures: self.failure_count(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Counts and timing of a profiler run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilingSummary {
    pub profiler_name: String,
    pub rules: usize,
    pub expectations: usize,
    pub failures: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::{
        Domain, DomainBuilder, ExpectationConfigurationBuilder, ParameterBuilder,
        ParameterContainer, ParameterValue, ParametersView,
    };
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Tables(Vec<&'static str>);

    #[async_trait]
    impl DomainBuilder for Tables {
        async fn get_domains(&self, _variables: &Variables) -> Result<Vec<Domain>> {
            Ok(self.0.iter().map(|t| Domain::table(*t)).collect())
        }

        fn name(&self) -> &str {
            "tables"
        }
    }

    /// Writes `size.value` from the `size` variable.
    #[derive(Debug)]
    struct SizeFromVariables;

    #[async_trait]
    impl ParameterBuilder for SizeFromVariables {
        async fn build_parameters(
            &self,
            parameter_container: &mut ParameterContainer,
            _domain: &Domain,
            variables: &Variables,
            _parameters: &ParametersView<'_>,
        ) -> Result<()> {
            let size = variables.get("size").cloned().unwrap_or(ParameterValue::Null);
            parameter_container.set("size.value", size)?;
            Ok(())
        }

        fn name(&self) -> &str {
            "size"
        }
    }

    /// Copies `size.value` of `orders` computed by an earlier rule.
    #[derive(Debug)]
    struct CopyUpstream;

    #[async_trait]
    impl ParameterBuilder for CopyUpstream {
        async fn build_parameters(
            &self,
            parameter_container: &mut ParameterContainer,
            domain: &Domain,
            _variables: &Variables,
            parameters: &ParametersView<'_>,
        ) -> Result<()> {
            let value = parameters
                .get(Domain::table("orders").id(), "size.value")
                .cloned()
                .ok_or_else(|| {
                    ProfilerError::parameter_computation(
                        domain.id(),
                        "copy",
                        "size.value",
                        "upstream parameter missing",
                    )
                })?;
            parameter_container.set("copy.value", value)?;
            Ok(())
        }

        fn name(&self) -> &str {
            "copy"
        }
    }

    #[derive(Debug)]
    struct Emit(&'static str);

    impl ExpectationConfigurationBuilder for Emit {
        fn build_expectation_configuration(
            &self,
            domain: &Domain,
            _variables: &Variables,
            _parameters: &ParametersView<'_>,
        ) -> Result<ExpectationConfiguration> {
            Ok(ExpectationConfiguration::new(self.0).with_kwarg("table", domain.name()))
        }

        fn expectation_type(&self) -> &str {
            self.0
        }
    }

    fn sizing_rule(name: &str) -> Rule {
        Rule::builder(name)
            .domain_builder(Tables(vec!["orders"]))
            .parameter_builder(SizeFromVariables)
            .expectation_configuration_builder(Emit("expect_table_row_count_to_equal"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_rule_names_rejected() {
        let err = RuleBasedProfiler::builder("p")
            .rule(sizing_rule("same"))
            .rule(sizing_rule("same"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ProfilerError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_profile_uses_stored_or_override_variables() {
        let stored = Variables::builder().set("size", 8_i64).unwrap().build();
        let mut profiler = RuleBasedProfiler::builder("p")
            .variables(stored)
            .rule(sizing_rule("sizing"))
            .build()
            .unwrap();

        profiler.profile(None).await.unwrap();
        let orders = Domain::table("orders");
        let params = profiler.rule("sizing").unwrap().parameters();
        assert_eq!(
            params[orders.id()].get("size.value"),
            Some(&ParameterValue::Integer(8))
        );

        let override_vars = Variables::builder().set("size", 3_i64).unwrap().build();
        profiler.profile(Some(&override_vars)).await.unwrap();
        let params = profiler.rule("sizing").unwrap().parameters();
        assert_eq!(
            params[orders.id()].get("size.value"),
            Some(&ParameterValue::Integer(3))
        );
        assert_eq!(profiler.variables().get("size"), Some(&ParameterValue::Integer(8)));
    }

    #[tokio::test]
    async fn test_later_rules_see_earlier_parameters() {
        let copying = Rule::builder("copying")
            .domain_builder(Tables(vec!["customers"]))
            .parameter_builder(CopyUpstream)
            .expectation_configuration_builder(Emit("expect_table_columns_to_exist"))
            .build()
            .unwrap();

        let mut profiler = RuleBasedProfiler::builder("p")
            .variables(Variables::builder().set("size", 5_i64).unwrap().build())
            .rule(sizing_rule("sizing"))
            .rule(copying)
            .build()
            .unwrap();

        let result = profiler.profile(None).await.unwrap();
        assert_eq!(result.rule_reports.len(), 2);
        assert_eq!(result.failure_count(), 0);

        let types: Vec<&str> = result
            .expectation_configurations()
            .map(|c| c.expectation_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec!["expect_table_row_count_to_equal", "expect_table_columns_to_exist"]
        );

        let customers = Domain::table("customers");
        let params = profiler.rule("copying").unwrap().parameters();
        assert_eq!(
            params[customers.id()].get("copy.value"),
            Some(&ParameterValue::Integer(5))
        );

        let summary = result.summary();
        assert_eq!(summary.rules, 2);
        assert_eq!(summary.expectations, 2);
        assert!(result.duration_ms() >= 0);
    }

    #[tokio::test]
    async fn test_order_reversed_fails_lookup() {
        let copying = Rule::builder("copying")
            .domain_builder(Tables(vec!["customers"]))
            .parameter_builder(CopyUpstream)
            .build()
            .unwrap();

        let mut profiler = RuleBasedProfiler::builder("p")
            .rule(copying)
            .rule(sizing_rule("sizing"))
            .build()
            .unwrap();

        let err = profiler.profile(None).await.unwrap_err();
        assert!(err.is_parameter_computation());
    }
}
