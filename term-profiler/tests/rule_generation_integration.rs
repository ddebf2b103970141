//! Integration tests for rule orchestration with hand-written builders.
//!
//! These tests pin down the ordering and isolation guarantees of `Rule`
//! without touching a real backend.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use term_profiler::prelude::*;

/// Returns one column domain per name, in the given order.
#[derive(Debug)]
struct FixedColumns(Vec<&'static str>);

#[async_trait]
impl DomainBuilder for FixedColumns {
    async fn get_domains(&self, _variables: &Variables) -> Result<Vec<Domain>> {
        Ok(self.0.iter().map(|c| Domain::column("t", *c)).collect())
    }

    fn name(&self) -> &str {
        "fixed_columns"
    }
}

#[derive(Debug)]
struct UnreachableBackend;

#[async_trait]
impl DomainBuilder for UnreachableBackend {
    async fn get_domains(&self, _variables: &Variables) -> Result<Vec<Domain>> {
        Err(ProfilerError::domain_discovery(
            "unreachable_backend",
            "connection refused",
        ))
    }

    fn name(&self) -> &str {
        "unreachable_backend"
    }
}

/// Writes a fixed `<name>.value`, counting calls and recording the order of
/// (builder, domain) invocations.
#[derive(Debug)]
struct Recording {
    name: &'static str,
    value: ParameterValue,
    calls: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    fn new(
        name: &'static str,
        value: impl Into<ParameterValue>,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            name,
            value: value.into(),
            calls: Arc::new(AtomicUsize::new(0)),
            log: log.clone(),
        }
    }
}

#[async_trait]
impl ParameterBuilder for Recording {
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        _variables: &Variables,
        _parameters: &ParametersView<'_>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, domain.name()));
        parameter_container.set(&format!("{}.value", self.name), self.value.clone())?;
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Reads `first.value` from the container, proving earlier writes are visible.
#[derive(Debug)]
struct Doubling;

#[async_trait]
impl ParameterBuilder for Doubling {
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        _variables: &Variables,
        _parameters: &ParametersView<'_>,
    ) -> Result<()> {
        let first = parameter_container
            .get("first.value")
            .and_then(ParameterValue::as_i64)
            .ok_or_else(|| {
                ProfilerError::parameter_computation(
                    domain.id(),
                    "doubled",
                    "first.value",
                    "missing",
                )
            })?;
        parameter_container.set("doubled.value", first * 2)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "doubled"
    }
}

/// Records how many domains were visible through the view when it ran.
#[derive(Debug)]
struct VisibleDomains;

#[async_trait]
impl ParameterBuilder for VisibleDomains {
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        _domain: &Domain,
        _variables: &Variables,
        parameters: &ParametersView<'_>,
    ) -> Result<()> {
        parameter_container.set("visible.value", parameters.domain_ids().len() as i64)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "visible"
    }
}

/// Reads the parameter of `colA` while processing any other domain.
#[derive(Debug)]
struct ReadsColumnA;

#[async_trait]
impl ParameterBuilder for ReadsColumnA {
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        _variables: &Variables,
        parameters: &ParametersView<'_>,
    ) -> Result<()> {
        let column_a = Domain::column("t", "colA");
        if domain == &column_a {
            return Ok(());
        }
        let value = parameters
            .get(column_a.id(), "row_count.value")
            .cloned()
            .unwrap_or(ParameterValue::Null);
        parameter_container.set("from_a.value", value)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "from_a"
    }
}

/// Copies the current domain's `row_count.value`, read through the view, to
/// `seen.value`.
#[derive(Debug)]
struct OwnRowCount;

#[async_trait]
impl ParameterBuilder for OwnRowCount {
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        _variables: &Variables,
        parameters: &ParametersView<'_>,
    ) -> Result<()> {
        let value = parameters
            .get(domain.id(), "row_count.value")
            .cloned()
            .unwrap_or(ParameterValue::Null);
        parameter_container.set("seen.value", value)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "seen"
    }
}

/// Builds `expect_column_values_to_not_be_null` with a `row_count` kwarg.
#[derive(Debug)]
struct NotNull;

impl ExpectationConfigurationBuilder for NotNull {
    fn build_expectation_configuration(
        &self,
        domain: &Domain,
        _variables: &Variables,
        parameters: &ParametersView<'_>,
    ) -> Result<ExpectationConfiguration> {
        let row_count = parameters
            .get(domain.id(), "row_count.value")
            .cloned()
            .ok_or_else(|| {
                ProfilerError::expectation_configuration_build(
                    domain.id(),
                    self.expectation_type(),
                    "row_count.value",
                    "parameter not found",
                )
            })?;
        Ok(ExpectationConfiguration::new(self.expectation_type())
            .with_kwarg("column", domain.name())
            .with_kwarg("row_count", row_count))
    }

    fn expectation_type(&self) -> &str {
        "expect_column_values_to_not_be_null"
    }
}

fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn test_two_columns_produce_ordered_configurations() {
    let log = new_log();
    let mut rule = Rule::builder("not_null")
        .domain_builder(FixedColumns(vec!["colA", "colB"]))
        .parameter_builder(Recording::new("row_count", 100_i64, &log))
        .expectation_configuration_builder(NotNull)
        .build()
        .unwrap();

    let configs = rule.generate(&Variables::new()).await.unwrap();

    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0].kwarg("column"), Some(&ParameterValue::from("colA")));
    assert_eq!(configs[1].kwarg("column"), Some(&ParameterValue::from("colB")));
    for config in &configs {
        assert_eq!(config.expectation_type, "expect_column_values_to_not_be_null");
        assert_eq!(config.kwarg("row_count"), Some(&ParameterValue::Integer(100)));
    }

    let column_a = Domain::column("t", "colA");
    assert_eq!(
        rule.parameters()[column_a.id()].get("row_count.value"),
        Some(&ParameterValue::Integer(100))
    );
}

#[tokio::test]
async fn test_builders_run_in_declared_order_per_domain() {
    let log = new_log();
    let mut rule = Rule::builder("ordered")
        .domain_builder(FixedColumns(vec!["colA", "colB"]))
        .parameter_builder(Recording::new("first", 1_i64, &log))
        .parameter_builder(Recording::new("second", 2_i64, &log))
        .build()
        .unwrap();

    rule.generate(&Variables::new()).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["first:colA", "second:colA", "first:colB", "second:colB"]
    );
}

#[tokio::test]
async fn test_later_builders_see_earlier_writes() {
    let log = new_log();
    let mut rule = Rule::builder("chained")
        .domain_builder(FixedColumns(vec!["colA"]))
        .parameter_builder(Recording::new("first", 21_i64, &log))
        .parameter_builder(Doubling)
        .build()
        .unwrap();

    rule.generate(&Variables::new()).await.unwrap();
    let column_a = Domain::column("t", "colA");
    assert_eq!(
        rule.parameters()[column_a.id()].get("doubled.value"),
        Some(&ParameterValue::Integer(42))
    );
}

#[tokio::test]
async fn test_later_domains_see_earlier_domains() {
    let log = new_log();
    let mut rule = Rule::builder("cross_domain")
        .domain_builder(FixedColumns(vec!["colA", "colB"]))
        .parameter_builder(Recording::new("row_count", 100_i64, &log))
        .parameter_builder(ReadsColumnA)
        .parameter_builder(VisibleDomains)
        .build()
        .unwrap();

    rule.generate(&Variables::new()).await.unwrap();

    let params = rule.parameters();
    let column_a = Domain::column("t", "colA");
    let column_b = Domain::column("t", "colB");
    assert_eq!(
        params[column_b.id()].get("from_a.value"),
        Some(&ParameterValue::Integer(100))
    );
    // The view also exposes the domain being processed.
    assert_eq!(
        params[column_a.id()].get("visible.value"),
        Some(&ParameterValue::Integer(1))
    );
    assert_eq!(
        params[column_b.id()].get("visible.value"),
        Some(&ParameterValue::Integer(2))
    );
}

#[tokio::test]
async fn test_own_domain_reads_this_rule_over_earlier_rules() {
    let log = new_log();
    let first = Rule::builder("r1")
        .domain_builder(FixedColumns(vec!["colA"]))
        .parameter_builder(Recording::new("row_count", 1_i64, &log))
        .build()
        .unwrap();
    let second = Rule::builder("r2")
        .domain_builder(FixedColumns(vec!["colA"]))
        .parameter_builder(Recording::new("row_count", 2_i64, &log))
        .parameter_builder(OwnRowCount)
        .build()
        .unwrap();

    let mut profiler = RuleBasedProfiler::builder("layered")
        .rule(first)
        .rule(second)
        .build()
        .unwrap();
    profiler.profile(None).await.unwrap();

    let column_a = Domain::column("t", "colA");
    let params = profiler.rule("r2").unwrap().parameters();
    assert_eq!(
        params[column_a.id()].get("seen.value"),
        Some(&ParameterValue::Integer(2))
    );
}

#[tokio::test]
async fn test_last_writer_wins_hides_intermediate_value() {
    let log = new_log();
    let mut rule = Rule::builder("overwrite")
        .domain_builder(FixedColumns(vec!["colA"]))
        .parameter_builder(Recording::new("row_count", 1_i64, &log))
        .parameter_builder(Recording::new("row_count", 2_i64, &log))
        .expectation_configuration_builder(NotNull)
        .build()
        .unwrap();

    let configs = rule.generate(&Variables::new()).await.unwrap();
    assert_eq!(configs[0].kwarg("row_count"), Some(&ParameterValue::Integer(2)));
}

#[tokio::test]
async fn test_repeated_generation_is_byte_identical() {
    let log = new_log();
    let mut rule = Rule::builder("deterministic")
        .domain_builder(FixedColumns(vec!["colC", "colA", "colB"]))
        .parameter_builder(Recording::new("row_count", 100_i64, &log))
        .expectation_configuration_builder(NotNull)
        .build()
        .unwrap();

    let first = serde_json::to_string(&rule.generate(&Variables::new()).await.unwrap()).unwrap();
    let second = serde_json::to_string(&rule.generate(&Variables::new()).await.unwrap()).unwrap();
    assert_eq!(first, second);

    // Domain order, not alphabetical order.
    let configs = rule.generate(&Variables::new()).await.unwrap();
    let columns: Vec<String> = configs
        .iter()
        .map(|c| c.kwarg("column").unwrap().to_string())
        .collect();
    assert_eq!(columns, vec!["colC", "colA", "colB"]);
}

#[tokio::test]
async fn test_parameters_returns_isolated_copy() {
    let log = new_log();
    let mut rule = Rule::builder("isolated")
        .domain_builder(FixedColumns(vec!["colA"]))
        .parameter_builder(Recording::new("row_count", 100_i64, &log))
        .build()
        .unwrap();
    rule.generate(&Variables::new()).await.unwrap();

    let column_a = Domain::column("t", "colA");
    let mut copy = rule.parameters();
    copy.get_mut(column_a.id())
        .unwrap()
        .set("row_count.value", -1_i64)
        .unwrap();
    copy.clear();

    assert_eq!(
        rule.parameters()[column_a.id()].get("row_count.value"),
        Some(&ParameterValue::Integer(100))
    );
}

#[tokio::test]
async fn test_missing_parameter_fails_whole_call() {
    #[derive(Debug)]
    struct NeedsMissing;

    impl ExpectationConfigurationBuilder for NeedsMissing {
        fn build_expectation_configuration(
            &self,
            domain: &Domain,
            _variables: &Variables,
            parameters: &ParametersView<'_>,
        ) -> Result<ExpectationConfiguration> {
            parameters.get(domain.id(), "p.missing").ok_or_else(|| {
                ProfilerError::expectation_configuration_build(
                    domain.id(),
                    self.expectation_type(),
                    "p.missing",
                    "parameter not found",
                )
            })?;
            Ok(ExpectationConfiguration::new(self.expectation_type()))
        }

        fn expectation_type(&self) -> &str {
            "expect_something"
        }
    }

    let log = new_log();
    let mut rule = Rule::builder("missing")
        .domain_builder(FixedColumns(vec!["colA", "colB"]))
        .parameter_builder(Recording::new("p", 1_i64, &log))
        .expectation_configuration_builder(NeedsMissing)
        .build()
        .unwrap();

    let err = rule.generate(&Variables::new()).await.unwrap_err();
    assert!(err.is_expectation_configuration_build());
    assert_eq!(err.domain_id(), Some(Domain::column("t", "colA").id()));
    assert!(err.to_string().contains("p.missing"));
    assert!(rule.parameters().is_empty());
}

#[tokio::test]
async fn test_discovery_failure_runs_no_parameter_builder() {
    let log = new_log();
    let counting = Recording::new("row_count", 1_i64, &log);
    let calls = counting.calls.clone();

    let mut rule = Rule::builder("unreachable")
        .domain_builder(UnreachableBackend)
        .parameter_builder(counting)
        .expectation_configuration_builder(NotNull)
        .build()
        .unwrap();

    let err = rule.generate(&Variables::new()).await.unwrap_err();
    assert!(err.is_domain_discovery());
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_variables_reach_builders_unchanged() {
    #[derive(Debug)]
    struct FromVariables;

    #[async_trait]
    impl ParameterBuilder for FromVariables {
        async fn build_parameters(
            &self,
            parameter_container: &mut ParameterContainer,
            _domain: &Domain,
            variables: &Variables,
            _parameters: &ParametersView<'_>,
        ) -> Result<()> {
            let mostly = variables
                .get("thresholds.mostly")
                .cloned()
                .unwrap_or(ParameterValue::Null);
            parameter_container.set("mostly.value", mostly)?;
            Ok(())
        }

        fn name(&self) -> &str {
            "mostly"
        }
    }

    let variables = Variables::from_json(r#"{"thresholds": {"mostly": 0.9}}"#).unwrap();
    let mut rule = Rule::builder("variables")
        .domain_builder(FixedColumns(vec!["colA"]))
        .parameter_builder(FromVariables)
        .build()
        .unwrap();

    rule.generate(&variables).await.unwrap();
    let column_a = Domain::column("t", "colA");
    assert_eq!(
        rule.parameters()[column_a.id()].get("mostly.value"),
        Some(&ParameterValue::Float(0.9))
    );
    assert_eq!(variables.get("thresholds.mostly"), Some(&ParameterValue::Float(0.9)));
}
