//! Error types for the Term profiler.
//!
//! All fallible operations in this crate return [`ProfilerError`]. The three
//! pipeline stages of a [`Rule`](crate::profiler::Rule) each have a dedicated
//! variant that records the offending domain and builder, so that a failure
//! inside an opaque builder can still be traced back to its origin.

use thiserror::Error;

use crate::profiler::DomainId;

/// The main error type for the Term profiler.
#[derive(Error, Debug)]
pub enum ProfilerError {
    /// The domain builder could not enumerate domains (e.g. the table is not
    /// registered or the backend cannot be introspected).
    #[error("Domain discovery failed in '{builder}': {message}")]
    DomainDiscovery {
        /// Name of the domain builder that failed
        builder: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A parameter builder could not compute its parameter.
    #[error(
        "Parameter computation failed for '{parameter}' (builder '{builder}', domain {domain_id}): {message}"
    )]
    ParameterComputation {
        /// Domain being processed
        domain_id: DomainId,
        /// Name of the parameter builder
        builder: String,
        /// Fully-qualified name of the parameter involved
        parameter: String,
        /// Detailed error message
        message: String,
    },

    /// An expectation configuration builder referenced missing or unusable parameters.
    #[error(
        "Failed to build '{expectation_type}' for domain {domain_id} (parameter '{parameter}'): {message}"
    )]
    ExpectationConfigurationBuild {
        /// Domain being processed
        domain_id: DomainId,
        /// Expectation type of the failing builder
        expectation_type: String,
        /// Fully-qualified name of the parameter involved
        parameter: String,
        /// Detailed error message
        message: String,
    },

    /// A parameter builder overwrote a parameter written by an earlier builder
    /// while the rule rejects overwrites.
    #[error("Parameter '{parameter}' on domain {domain_id} already written before builder '{builder}'")]
    DuplicateParameter {
        /// Domain being processed
        domain_id: DomainId,
        /// Name of the builder that attempted the overwrite
        builder: String,
        /// Fully-qualified name of the overwritten parameter
        parameter: String,
    },

    /// A parameter name is not a valid dotted path.
    #[error("Invalid parameter name '{0}'")]
    InvalidParameterName(String),

    /// Error related to rule or profiler configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Security-related error (e.g. an unsafe SQL identifier).
    #[error("Security error: {0}")]
    Security(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, ProfilerError>`.
pub type Result<T> = std::result::Result<T, ProfilerError>;

impl ProfilerError {
    /// Creates a new domain discovery error.
    pub fn domain_discovery(builder: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DomainDiscovery {
            builder: builder.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new domain discovery error with a source error.
    pub fn domain_discovery_with_source(
        builder: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DomainDiscovery {
            builder: builder.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new parameter computation error.
    pub fn parameter_computation(
        domain_id: &DomainId,
        builder: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ParameterComputation {
            domain_id: domain_id.clone(),
            builder: builder.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates a new expectation configuration build error.
    pub fn expectation_configuration_build(
        domain_id: &DomainId,
        expectation_type: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ExpectationConfigurationBuild {
            domain_id: domain_id.clone(),
            expectation_type: expectation_type.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Returns true for [`ProfilerError::DomainDiscovery`].
    pub fn is_domain_discovery(&self) -> bool {
        matches!(self, Self::DomainDiscovery { .. })
    }

    /// Returns true for [`ProfilerError::ParameterComputation`].
    pub fn is_parameter_computation(&self) -> bool {
        matches!(self, Self::ParameterComputation { .. })
    }

    /// Returns true for [`ProfilerError::ExpectationConfigurationBuild`].
    pub fn is_expectation_configuration_build(&self) -> bool {
        matches!(self, Self::ExpectationConfigurationBuild { .. })
    }

    /// Returns the domain id carried by the error, if any.
    pub fn domain_id(&self) -> Option<&DomainId> {
        match self {
            Self::ParameterComputation { domain_id, .. }
            | Self::ExpectationConfigurationBuild { domain_id, .. }
            | Self::DuplicateParameter { domain_id, .. } => Some(domain_id),
            _ => None,
        }
    }

    /// Attributes an error raised during domain discovery to `builder`.
    ///
    /// Errors that already are discovery errors pass through unchanged.
    pub(crate) fn into_domain_discovery(self, builder: &str) -> Self {
        match self {
            err @ Self::DomainDiscovery { .. } => err,
            other => {
                Self::domain_discovery_with_source(builder, other.to_string(), Box::new(other))
            }
        }
    }

    /// Attributes an error raised by a parameter builder to the domain and builder.
    ///
    /// Stage errors that already carry a domain pass through unchanged.
    pub(crate) fn into_parameter_computation(self, domain_id: &DomainId, builder: &str) -> Self {
        match self {
            err @ (Self::ParameterComputation { .. } | Self::DuplicateParameter { .. }) => err,
            other => Self::parameter_computation(domain_id, builder, builder, other.to_string()),
        }
    }

    /// Attributes an error raised by an expectation configuration builder.
    pub(crate) fn into_expectation_configuration_build(
        self,
        domain_id: &DomainId,
        expectation_type: &str,
    ) -> Self {
        match self {
            err @ Self::ExpectationConfigurationBuild { .. } => err,
            Self::ParameterComputation {
                parameter, message, ..
            } => Self::expectation_configuration_build(
                domain_id,
                expectation_type,
                parameter,
                message,
            ),
            other => Self::expectation_configuration_build(
                domain_id,
                expectation_type,
                "",
                other.to_string(),
            ),
        }
    }
}

/// Converts serde_json errors to ProfilerError.
impl From<serde_json::Error> for ProfilerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
