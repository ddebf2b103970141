//! Fully-qualified references to parameters, variables and domain kwargs.
//!
//! Builders are wired together through references rather than direct calls:
//!
//! | Syntax | Resolves to |
//! |---|---|
//! | `$parameter.<name>` | parameter `<name>` of the domain being processed |
//! | `$parameter@<domain id>.<name>` | parameter `<name>` of another domain |
//! | `$variables.<name>` | a run variable |
//! | `$domain.domain_kwargs.<key>` | an identifying kwarg of the current domain |

use std::fmt;
use std::str::FromStr;

use super::domain::{Domain, DomainId};
use super::parameter::{parse_name, ParameterContainer, ParameterValue, ParametersView};
use super::variables::Variables;
use crate::error::{ProfilerError, Result};

const PARAMETER_PREFIX: &str = "$parameter";
const VARIABLES_PREFIX: &str = "$variables.";
const DOMAIN_KWARGS_PREFIX: &str = "$domain.domain_kwargs.";

/// A parsed fully-qualified reference.
///
/// # Example
///
/// ```rust
/// use term_profiler::profiler::ParameterReference;
///
/// let reference: ParameterReference = "$parameter.row_count.value".parse().unwrap();
/// assert_eq!(reference, ParameterReference::parameter("row_count.value"));
/// assert_eq!(reference.to_string(), "$parameter.row_count.value");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterReference {
    /// A parameter of the domain being processed.
    Parameter(String),
    /// A parameter of an explicitly identified domain.
    DomainParameter {
        /// Domain owning the parameter
        domain_id: DomainId,
        /// Dotted parameter name
        name: String,
    },
    /// A run variable.
    Variable(String),
    /// An identifying kwarg of the domain being processed.
    DomainKwarg(String),
}

impl ParameterReference {
    /// Parses a reference, validating the dotted name it carries.
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = || {
            ProfilerError::Configuration(format!(
                "'{reference}' is not a valid reference; expected $parameter.<name>, \
                 $parameter@<domain id>.<name>, $variables.<name> or $domain.domain_kwargs.<key>"
            ))
        };

        let parsed = if let Some(rest) = reference.strip_prefix(VARIABLES_PREFIX) {
            Self::Variable(rest.to_string())
        } else if let Some(rest) = reference.strip_prefix(DOMAIN_KWARGS_PREFIX) {
            Self::DomainKwarg(rest.to_string())
        } else if let Some(rest) = reference.strip_prefix(PARAMETER_PREFIX) {
            if let Some(name) = rest.strip_prefix('.') {
                Self::Parameter(name.to_string())
            } else if let Some(qualified) = rest.strip_prefix('@') {
                let (id, name) = qualified.split_once('.').ok_or_else(invalid)?;
                Self::DomainParameter {
                    domain_id: DomainId::parse(id).map_err(|_| invalid())?,
                    name: name.to_string(),
                }
            } else {
                return Err(invalid());
            }
        } else {
            return Err(invalid());
        };

        parse_name(parsed.name()).map_err(|_| invalid())?;
        Ok(parsed)
    }

    /// References a parameter of the domain being processed.
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter(name.into())
    }

    /// References a parameter of `domain`, which may belong to another rule.
    pub fn domain_parameter(domain: &Domain, name: impl Into<String>) -> Self {
        Self::DomainParameter {
            domain_id: domain.id().clone(),
            name: name.into(),
        }
    }

    /// References a run variable.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// References an identifying kwarg of the domain being processed.
    pub fn domain_kwarg(key: impl Into<String>) -> Self {
        Self::DomainKwarg(key.into())
    }

    /// Returns the dotted name or key the reference points at.
    pub fn name(&self) -> &str {
        match self {
            Self::Parameter(name)
            | Self::DomainParameter { name, .. }
            | Self::Variable(name)
            | Self::DomainKwarg(name) => name,
        }
    }

    /// Resolves the reference within `scope`.
    pub fn resolve<'a>(&self, scope: &ReferenceScope<'a>) -> Option<&'a ParameterValue> {
        match self {
            Self::Parameter(name) => scope.domain_parameter(scope.domain.id(), name),
            Self::DomainParameter { domain_id, name } => scope.domain_parameter(domain_id, name),
            Self::Variable(name) => scope.variables.get(name),
            Self::DomainKwarg(key) => scope.domain.kwarg(key),
        }
    }
}

impl FromStr for ParameterReference {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ParameterReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter(name) => write!(f, "{PARAMETER_PREFIX}.{name}"),
            Self::DomainParameter { domain_id, name } => {
                write!(f, "{PARAMETER_PREFIX}@{domain_id}.{name}")
            }
            Self::Variable(name) => write!(f, "{VARIABLES_PREFIX}{name}"),
            Self::DomainKwarg(key) => write!(f, "{DOMAIN_KWARGS_PREFIX}{key}"),
        }
    }
}

/// Everything a reference can be resolved against.
///
/// Parameter builders add the in-progress container of the current domain
/// with [`ReferenceScope::with_current`]; it then takes precedence over the
/// view for the current domain.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceScope<'a> {
    domain: &'a Domain,
    variables: &'a Variables,
    parameters: ParametersView<'a>,
    current: Option<&'a ParameterContainer>,
}

impl<'a> ReferenceScope<'a> {
    /// Creates a scope for `domain`.
    pub fn new(
        domain: &'a Domain,
        variables: &'a Variables,
        parameters: ParametersView<'a>,
    ) -> Self {
        Self {
            domain,
            variables,
            parameters,
            current: None,
        }
    }

    /// Uses `container` as the current domain's parameters.
    pub fn with_current(mut self, container: &'a ParameterContainer) -> Self {
        self.current = Some(container);
        self
    }

    /// Returns the domain of the scope.
    pub fn domain(&self) -> &'a Domain {
        self.domain
    }

    fn domain_parameter(&self, domain_id: &DomainId, name: &str) -> Option<&'a ParameterValue> {
        match self.current {
            Some(current) if domain_id == self.domain.id() => current.get(name),
            _ => self.parameters.get(domain_id, name),
        }
    }
}
