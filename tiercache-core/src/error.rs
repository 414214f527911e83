//! Error types for tiercache operations

use thiserror::Error;

/// Coercion errors.
///
/// Raised whenever the engine cannot classify a value or has no rule mapping
/// the source category onto the requested shape. The `At*` variants wrap an
/// inner error with the position (index, field, key) where it happened.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoerceError {
    #[error("cannot convert {from} to {to}")]
    Unsupported { from: String, to: String },

    #[error("cannot convert nil to {to}")]
    NilSource { to: String },

    #[error("cannot parse {input:?} as {target}: {reason}")]
    Parse {
        input: String,
        target: String,
        reason: String,
    },

    #[error("at index {index}: {source}")]
    AtIndex {
        index: usize,
        source: Box<CoerceError>,
    },

    #[error("field '{field}': {source}")]
    AtField {
        field: String,
        source: Box<CoerceError>,
    },

    #[error("key '{key}': {source}")]
    AtKey {
        key: String,
        source: Box<CoerceError>,
    },
}

impl CoerceError {
    pub(crate) fn unsupported(from: impl Into<String>, to: impl ToString) -> Self {
        Self::Unsupported {
            from: from.into(),
            to: to.to_string(),
        }
    }

    pub(crate) fn parse(input: &str, target: impl ToString, reason: impl ToString) -> Self {
        Self::Parse {
            input: input.to_string(),
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wrap this error with the sequence index it occurred at.
    pub fn at_index(self, index: usize) -> Self {
        Self::AtIndex {
            index,
            source: Box::new(self),
        }
    }

    /// Wrap this error with the record field it occurred in.
    pub fn at_field(self, field: impl Into<String>) -> Self {
        Self::AtField {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Wrap this error with the mapping key it occurred under.
    pub fn at_key(self, key: impl Into<String>) -> Self {
        Self::AtKey {
            key: key.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all positional context stripped.
    pub fn root(&self) -> &CoerceError {
        match self {
            Self::AtIndex { source, .. }
            | Self::AtField { source, .. }
            | Self::AtKey { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Validation errors for constructor arguments.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all tiercache errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Key arity mismatch: expected {expected} components, got {got}")]
    KeyArity { expected: usize, got: usize },

    #[error("Coercion error: {0}")]
    Coerce(#[from] CoerceError),

    #[error("Cache key not found: {key}")]
    NotFound { key: String },

    #[error("Operation '{operation}' is not supported by {store}")]
    UnsupportedOperation {
        store: &'static str,
        operation: &'static str,
    },

    #[error("Too many conflicts on {key}: gave up after {attempts} attempts")]
    ConflictExhausted { key: String, attempts: u32 },

    #[error("Backing store {store} failed: {reason}")]
    Backend { store: String, reason: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CacheError {
    /// Shorthand for an opaque collaborator failure.
    pub fn backend(store: impl Into<String>, reason: impl ToString) -> Self {
        Self::Backend {
            store: store.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for an invalid constructor argument.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unsupported_operation(&self) -> bool {
        matches!(self, Self::UnsupportedOperation { .. })
    }

    pub fn is_conflict_exhausted(&self) -> bool {
        matches!(self, Self::ConflictExhausted { .. })
    }
}

/// Result type alias for tiercache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
