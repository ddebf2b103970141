//! Structured expectation configurations produced by rules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::parameter::ParameterValue;

/// A serializable description of one data quality assertion.
///
/// Kwargs and meta are kept in sorted maps so that serialized output is
/// byte-for-byte stable across runs.
///
/// # Example
///
/// ```rust
/// use term_profiler::profiler::ExpectationConfiguration;
///
/// let config = ExpectationConfiguration::new("expect_column_values_to_not_be_null")
///     .with_kwarg("column", "order_id")
///     .with_kwarg("mostly", 0.95);
///
/// assert_eq!(
///     config.to_json_string().unwrap(),
///     r#"{"expectation_type":"expect_column_values_to_not_be_null","kwargs":{"column":"order_id","mostly":0.95}}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationConfiguration {
    /// Identifier of the assertion (e.g., "expect_column_values_to_be_between")
    pub expectation_type: String,
    /// Arguments of the assertion
    pub kwargs: BTreeMap<String, ParameterValue>,
    /// Free-form metadata (e.g., profiler provenance)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, ParameterValue>,
}

impl ExpectationConfiguration {
    /// Creates a configuration without kwargs.
    pub fn new(expectation_type: impl Into<String>) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Adds or replaces a kwarg.
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Adds or replaces a meta entry.
    pub fn with_meta(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.meta.insert(name.into(), value.into());
        self
    }

    /// Returns a kwarg by name.
    pub fn kwarg(&self, name: &str) -> Option<&ParameterValue> {
        self.kwargs.get(name)
    }

    /// Serializes the configuration to a compact JSON string.
    pub fn to_json_string(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_round_trip_preserves_value_kinds() {
        let config = ExpectationConfiguration::new("expect_column_values_to_be_between")
            .with_kwarg("column", "amount")
            .with_kwarg("min_value", 15.5)
            .with_kwarg("max_value", 60_i64)
            .with_kwarg("strict", false)
            .with_meta("rule", "numeric_ranges");

        let json = config.to_json_string().unwrap();
        let parsed: ExpectationConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_meta_omitted_when_empty() {
        let json = ExpectationConfiguration::new("expect_table_row_count_to_equal")
            .with_kwarg("value", 8_i64)
            .to_json_string()
            .unwrap();
        assert!(!json.contains("meta"));
    }
}
