//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is absent or blank
    Missing { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// A reference that cannot name any record (e.g. a non-UUID id).
    /// Displays the same as `Missing`; `reason` keeps the detail.
    Malformed { field: &'static str, reason: &'static str },

    /// Email doesn't match local-part@domain
    InvalidEmail,
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field }
            | Self::TooLong { field, .. }
            | Self::Malformed { field, .. } => *field,
            Self::InvalidEmail => "email",
        }
    }

    /// Extra detail for malformed references.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Malformed { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field } | Self::Malformed { field, .. } => {
                write!(f, "missing {}", field)
            }
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidEmail => write!(f, "invalid email"),
        }
    }
}

impl std::error::Error for ValidationError {}
