//! Core error types for audience-rs.
//!
//! This module provides the [`AudienceError`] enum shared by every crate in
//! the workspace. It separates configuration problems (the audience itself is
//! unusable), validation problems (the caller's filters are unusable), and
//! execution problems (the warehouse rejected or never answered a query).

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Represents a validation error with optional field-level errors.
///
/// Validation errors can be either simple (a single message) or compound
/// (containing per-field error lists keyed by a path such as
/// `companyFilters[2]`).
///
/// # Examples
///
/// ```
/// use audience_rs_core::error::ValidationError;
///
/// // Simple validation error
/// let err = ValidationError::new("Unsupported operator 'between'.", "invalid_operator");
///
/// // Field-level validation errors
/// let mut field_errors = std::collections::HashMap::new();
/// field_errors.insert(
///     "companyFilters".to_string(),
///     vec![ValidationError::new("Expected an array.", "invalid_type")],
/// );
/// let err = ValidationError::with_field_errors(field_errors);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of validation failure (e.g. "invalid_type").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: HashMap<String, String>,
    /// Per-field validation errors, keyed by field path.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Files `error` under a single field path.
    pub fn for_field(path: impl Into<String>, error: Self) -> Self {
        Self::with_field_errors(HashMap::from([(path.into(), vec![error])]))
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
        } else if !self.field_errors.is_empty() {
            let mut paths: Vec<&String> = self.field_errors.keys().collect();
            paths.sort();
            let mut first = true;
            for path in paths {
                for error in &self.field_errors[path] {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{path}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for audience-rs.
///
/// Nothing is retried internally; every variant surfaces to the caller, and
/// the surrounding service maps it to a response via
/// [`AudienceError::status_code`].
#[derive(Error, Debug)]
pub enum AudienceError {
    // ── Audience configuration ───────────────────────────────────────

    /// The audience configuration cannot be compiled (missing parent/child
    /// objects, unknown fields, duplicate aliases, unreachable joins).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A referenced audience or connection does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    // ── Validation ───────────────────────────────────────────────────

    /// The filter specification failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Execution ────────────────────────────────────────────────────

    /// The warehouse rejected a compiled query.
    #[error("Execution error in {mode} query: {reason}")]
    ExecutionError {
        /// The query mode (listing, count, company preview, contact preview).
        mode: String,
        /// The SQL text that was sent to the warehouse.
        sql: String,
        /// The underlying failure.
        reason: String,
    },

    /// A warehouse call exceeded its deadline.
    #[error("{mode} query timed out after {after:?}")]
    QueryTimeout {
        /// The query mode.
        mode: String,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// A warehouse call was cancelled by the caller.
    #[error("{mode} query was cancelled")]
    Cancelled {
        /// The query mode.
        mode: String,
    },

    /// A raw failure reported by a warehouse driver.
    #[error("Warehouse error: {0}")]
    WarehouseError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AudienceError {
    /// Shorthand for a simple, non-field validation error.
    pub fn validation(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::ValidationError(ValidationError::new(message, code))
    }

    /// Returns the HTTP status code a service layer should use for this error.
    ///
    /// - `ValidationError` -> 400
    /// - `NotFound` -> 404
    /// - `QueryTimeout` -> 504
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::ValidationError(_) => 400,
            Self::NotFound(_) => 404,
            Self::QueryTimeout { .. } => 504,
            Self::ConfigurationError(_)
            | Self::ExecutionError { .. }
            | Self::Cancelled { .. }
            | Self::WarehouseError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns `true` for timeouts and cancellations.
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::QueryTimeout { .. } | Self::Cancelled { .. })
    }
}

impl From<ValidationError> for AudienceError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

impl From<serde_json::Error> for AudienceError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, AudienceError>`.
pub type AudienceResult<T> = Result<T, AudienceError>;
