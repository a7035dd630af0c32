//! # Validation
//!
//! Field-level validation errors and the [`Validate`] trait request
//! schemas implement. A failed validation is answered with 422 and a body
//! of the form `{"errors": [{"field", "message", "code"}]}`.

use serde::Serialize;
use std::collections::HashMap;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Value is of the wrong type
    InvalidType,
    /// Value is too short
    TooShort,
    /// Value is too long
    TooLong,
    /// Value is below minimum
    TooSmall,
    /// Value is above maximum
    TooLarge,
    /// Value doesn't match the expected format
    InvalidFormat,
    /// Custom validation failed
    Custom,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name (e.g. "email")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// "field is required"
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{field} is required");
        Self::new(field, message, ValidationCode::Required)
    }

    /// "field must be <expected>"
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        let field = field.into();
        let message = format!("{field} must be {expected}");
        Self::new(field, message, ValidationCode::InvalidType)
    }

    /// "field must be at least N characters"
    pub fn too_short(field: impl Into<String>, min: usize) -> Self {
        let field = field.into();
        let message = format!("{field} must be at least {min} characters");
        Self::new(field, message, ValidationCode::TooShort)
    }

    /// "field must be at most N characters"
    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        let field = field.into();
        let message = format!("{field} must be at most {max} characters");
        Self::new(field, message, ValidationCode::TooLong)
    }

    /// "field must be a valid <what>"
    pub fn invalid_format(field: impl Into<String>, what: &str) -> Self {
        let field = field.into();
        let message = format!("{field} must be a valid {what}");
        Self::new(field, message, ValidationCode::InvalidFormat)
    }

    /// "field must be greater than or equal to N"
    pub fn too_small(field: impl Into<String>, min: i64) -> Self {
        let field = field.into();
        let message = format!("{field} must be greater than or equal to {min}");
        Self::new(field, message, ValidationCode::TooSmall)
    }

    /// "field must be less than or equal to N"
    pub fn too_large(field: impl Into<String>, max: i64) -> Self {
        let field = field.into();
        let message = format!("{field} must be less than or equal to {max}");
        Self::new(field, message, ValidationCode::TooLarge)
    }
}

/// Collection of validation errors for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// Field-level errors in discovery order
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection holding a single error
    #[must_use]
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Add a required field error
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(FieldError::required(field));
    }

    /// Add the error from a check, if any
    pub fn check(&mut self, result: Result<(), FieldError>) {
        if let Err(error) = result {
            self.add(error);
        }
    }

    /// True when nothing failed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    ///
    /// # Errors
    ///
    /// Returns the collection itself when it holds at least one error.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Response body
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"errors":[]}"#.to_string())
    }

    /// Group errors by field
    #[must_use]
    pub fn by_field(&self) -> HashMap<String, Vec<&FieldError>> {
        let mut map: HashMap<String, Vec<&FieldError>> = HashMap::new();
        for error in &self.errors {
            map.entry(error.field.clone()).or_default().push(error);
        }
        map
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

/// Implemented by request schemas
pub trait Validate {
    /// Check every field and report all failures at once
    ///
    /// # Errors
    ///
    /// Returns the collected field errors.
    fn validate(&self) -> ValidationResult<()>;
}

/// Character-count bounds, inclusive
///
/// # Errors
///
/// `TooShort` / `TooLong` for the offending bound.
pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), FieldError> {
    let len = value.chars().count();
    if len < min {
        Err(FieldError::too_short(field, min))
    } else if len > max {
        Err(FieldError::too_long(field, max))
    } else {
        Ok(())
    }
}

/// Pragmatic email shape check
///
/// One `@`, non-empty local part, a dotted domain with no empty labels,
/// no whitespace.
///
/// # Errors
///
/// `InvalidFormat` when the shape is wrong.
pub fn check_email(field: &str, value: &str) -> Result<(), FieldError> {
    let invalid = || FieldError::invalid_format(field, "email address");

    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }
    if domain.split('.').any(str::is_empty) {
        return Err(invalid());
    }
    Ok(())
}
