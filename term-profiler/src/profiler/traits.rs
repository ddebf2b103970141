//! Capability traits plugged into a [`Rule`](super::Rule).

use async_trait::async_trait;
use std::fmt::Debug;

use super::domain::Domain;
use super::expectation::ExpectationConfiguration;
use super::parameter::{ParameterContainer, ParametersView};
use super::variables::Variables;
use crate::error::Result;

/// Produces the ordered domains a rule targets.
///
/// Implementations must be deterministic: the same variables and backend
/// state yield an equivalent sequence, and the order of that sequence decides
/// the order of the generated expectations.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use term_profiler::profiler::{Domain, DomainBuilder, Variables};
/// use term_profiler::error::Result;
///
/// #[derive(Debug)]
/// struct FixedColumns(Vec<&'static str>);
///
/// #[async_trait]
/// impl DomainBuilder for FixedColumns {
///     async fn get_domains(&self, _variables: &Variables) -> Result<Vec<Domain>> {
///         Ok(self.0.iter().map(|c| Domain::column("orders", *c)).collect())
///     }
///
///     fn name(&self) -> &str {
///         "fixed_columns"
///     }
/// }
/// ```
#[async_trait]
pub trait DomainBuilder: Send + Sync + Debug {
    /// Enumerates the domains, in the order expectations should be produced.
    ///
    /// Fails with [`ProfilerError::DomainDiscovery`](crate::error::ProfilerError::DomainDiscovery)
    /// when the source cannot be introspected.
    async fn get_domains(&self, variables: &Variables) -> Result<Vec<Domain>>;

    /// Returns the name of this builder, used in errors and logs.
    fn name(&self) -> &str;
}

/// Computes one named parameter into the current domain's container.
#[async_trait]
pub trait ParameterBuilder: Send + Sync + Debug {
    /// Writes the parameter into `parameter_container`.
    ///
    /// `parameter_container` belongs to `domain` and already holds whatever
    /// earlier builders wrote for it. `parameters` exposes every other domain
    /// registered so far, including domains of rules that ran earlier.
    /// Writing an existing name overwrites it.
    async fn build_parameters(
        &self,
        parameter_container: &mut ParameterContainer,
        domain: &Domain,
        variables: &Variables,
        parameters: &ParametersView<'_>,
    ) -> Result<()>;

    /// Returns the parameter name; builders write beneath this namespace.
    fn name(&self) -> &str;
}

/// Turns accumulated parameters into one expectation configuration.
///
/// Must be a pure function of its inputs.
pub trait ExpectationConfigurationBuilder: Send + Sync + Debug {
    /// Builds the configuration for `domain`.
    ///
    /// Fails with
    /// [`ProfilerError::ExpectationConfigurationBuild`](crate::error::ProfilerError::ExpectationConfigurationBuild)
    /// when a required parameter is missing.
    fn build_expectation_configuration(
        &self,
        domain: &Domain,
        variables: &Variables,
        parameters: &ParametersView<'_>,
    ) -> Result<ExpectationConfiguration>;

    /// Returns the expectation type this builder emits.
    fn expectation_type(&self) -> &str;
}
