//! Input hardening for SQL issued by the DataFusion-backed builders.
//!
//! Table names come from callers and must be plain, optionally qualified
//! identifiers. Column names come from table schemas and are quoted verbatim.
//! Both are quoted before being interpolated into SQL.

use crate::error::{ProfilerError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of one identifier segment.
const MAX_IDENTIFIER_LENGTH: usize = 128;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Letters, digits and underscores, starting with a letter or underscore,
    // optionally qualified with dots.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
        .expect("Hard-coded regex pattern should be valid")
});

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes a SQL identifier.
    ///
    /// Qualified names are quoted segment by segment, so `sales.orders`
    /// becomes `"sales"."orders"`.
    ///
    /// # Examples
    /// ```rust
    /// use term_profiler::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("order_id").unwrap(), "\"order_id\"");
    /// assert_eq!(
    ///     SqlSecurity::escape_identifier("sales.orders").unwrap(),
    ///     "\"sales\".\"orders\""
    /// );
    /// assert!(SqlSecurity::escape_identifier("id; DROP TABLE users--").is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;

        Ok(identifier
            .split('.')
            .map(|segment| format!("\"{segment}\""))
            .collect::<Vec<_>>()
            .join("."))
    }

    /// Quotes a column name read from a table schema.
    ///
    /// Schema column names are taken verbatim: the whole name is one quoted
    /// segment, so spaces, hyphens and dots are kept and embedded quotes are
    /// doubled.
    ///
    /// # Examples
    /// ```rust
    /// use term_profiler::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_column("order date").unwrap(), "\"order date\"");
    /// assert_eq!(SqlSecurity::quote_column("a.b").unwrap(), "\"a.b\"");
    /// assert_eq!(SqlSecurity::quote_column("say \"hi\"").unwrap(), "\"say \"\"hi\"\"\"");
    /// ```
    pub fn quote_column(column: &str) -> Result<String> {
        if column.is_empty() {
            return Err(ProfilerError::Security(
                "Column name cannot be empty".to_string(),
            ));
        }

        if column.chars().count() > MAX_IDENTIFIER_LENGTH {
            return Err(ProfilerError::Security(format!(
                "Column name too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if column.contains('\0') {
            return Err(ProfilerError::Security(
                "Column name cannot contain null bytes".to_string(),
            ));
        }

        Ok(format!("\"{}\"", column.replace('"', "\"\"")))
    }

    /// Validates a SQL identifier without quoting it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(ProfilerError::Security(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier
            .split('.')
            .any(|segment| segment.len() > MAX_IDENTIFIER_LENGTH)
        {
            return Err(ProfilerError::Security(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters per segment)"
            )));
        }

        if identifier.contains('\0') {
            return Err(ProfilerError::Security(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(ProfilerError::Security(format!(
                "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a letter or underscore and contain only letters, numbers, underscores, and dots"
            )));
        }

        Ok(())
    }
}

/// Validation of numeric builder settings.
pub struct InputValidator;

impl InputValidator {
    /// Validates that a value is finite.
    pub fn validate_finite(value: f64, name: &str) -> Result<()> {
        if !value.is_finite() {
            return Err(ProfilerError::Configuration(format!(
                "Invalid {name} value: must be finite (not NaN or infinite)"
            )));
        }
        Ok(())
    }

    /// Validates that a value is finite and not negative.
    pub fn validate_non_negative(value: f64, name: &str) -> Result<()> {
        Self::validate_finite(value, name)?;

        if value < 0.0 {
            return Err(ProfilerError::Configuration(format!(
                "Invalid {name} value: must not be negative, got {value}"
            )));
        }
        Ok(())
    }
}
