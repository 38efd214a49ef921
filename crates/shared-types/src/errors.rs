//! # Error Types
//!
//! Validation errors shared by every entry point that accepts identifiers
//! from the outside (session creation, backend request payloads).

use thiserror::Error;

/// Maximum accepted identifier length.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Input rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was empty or whitespace.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// A field exceeded [`MAX_IDENTIFIER_LEN`].
    #[error("{field} is too long: {len} > {MAX_IDENTIFIER_LEN}")]
    TooLong { field: &'static str, len: usize },

    /// A field contained characters outside `[A-Za-z0-9_-]`.
    #[error("{field} contains invalid characters: {value:?}")]
    InvalidCharacters { field: &'static str, value: String },
}

impl ValidationError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty { .. } => "RL_FIELD_EMPTY",
            Self::TooLong { .. } => "RL_FIELD_TOO_LONG",
            Self::InvalidCharacters { .. } => "RL_FIELD_INVALID",
        }
    }
}

/// Validate an opaque identifier such as a store or terminal code.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field,
            len: value.len(),
        });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidCharacters {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
