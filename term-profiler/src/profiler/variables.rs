//! Run-scoped, read-only configuration shared by every rule of a profiler.

use serde::Serialize;

use super::parameter::{ParameterContainer, ParameterValue};
use crate::error::Result;

/// Read-only named values supplied to every builder of a profiling run.
///
/// Variables use the same dotted naming as parameters, so nested settings
/// such as `thresholds.mostly` can be grouped.
///
/// # Example
///
/// ```rust
/// use term_profiler::profiler::{ParameterValue, Variables};
///
/// let variables = Variables::from_json(r#"{"mostly": 0.95, "limits": {"max_cardinality": 10}}"#).unwrap();
/// assert_eq!(variables.get("mostly"), Some(&ParameterValue::Float(0.95)));
/// assert_eq!(variables.get("limits.max_cardinality"), Some(&ParameterValue::Integer(10)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Variables {
    values: ParameterContainer,
}

impl Variables {
    /// Creates an empty set of variables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for variables.
    pub fn builder() -> VariablesBuilder {
        VariablesBuilder::default()
    }

    /// Parses variables from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json_value(value)
    }

    /// Builds variables from an already parsed JSON object.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        Ok(Self {
            values: ParameterContainer::from_json_value(value)?,
        })
    }

    /// Returns the value stored under the dotted `name`.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Checks whether a variable exists.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains(name)
    }

    /// Returns the names of all variables in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.values.names()
    }

    /// Checks whether no variables are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the underlying container.
    pub fn as_container(&self) -> &ParameterContainer {
        &self.values
    }
}

/// Builder for [`Variables`].
#[derive(Debug, Default)]
pub struct VariablesBuilder {
    values: ParameterContainer,
}

impl VariablesBuilder {
    /// Sets a variable.
    ///
    /// Fails when `name` is not a valid dotted name.
    pub fn set(mut self, name: &str, value: impl Into<ParameterValue>) -> Result<Self> {
        self.values.set(name, value)?;
        Ok(self)
    }

    /// Finishes the builder.
    pub fn build(self) -> Variables {
        Variables {
            values: self.values,
        }
    }
}
