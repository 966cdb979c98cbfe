//! Email address validation
//!
//! Addresses are stored normalized: surrounding whitespace trimmed, lower case.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Maximum length of an address (RFC 5321 path limit)
const MAX_EMAIL_LEN: usize = 254;

/// local-part@domain.tld with no whitespace and a single @
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email regex"));

/// Validated, normalized email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Normalize and validate an email address.
    ///
    /// # Rules
    /// - Surrounding whitespace is trimmed, then the address is lower-cased
    /// - Non-empty, max 254 characters
    /// - `local@domain.tld`, no internal whitespace
    ///
    /// # Example
    /// ```
    /// use evently_db::models::EmailAddress;
    ///
    /// let email = EmailAddress::parse("  USER@Example.COM ").unwrap();
    /// assert_eq!(email.as_str(), "user@example.com");
    /// assert!(EmailAddress::parse("not-an-email").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let normalized = s.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(ValidationError::Missing { field: "email" });
        }

        if normalized.chars().count() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }

        if !EMAIL_RE.is_match(&normalized) {
            return Err(ValidationError::InvalidEmail);
        }

        Ok(Self(normalized))
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
