//! Product identifier type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ProductId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductIdError {
    /// The input string is empty or only whitespace.
    #[error("product id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("product id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace or control characters.
    #[error("product id must not contain whitespace or control characters")]
    InvalidCharacter,
}

/// An opaque product identifier.
///
/// The remote API owns product identity; the client only compares these
/// values for equality when building line identities.
///
/// ## Constraints
///
/// - Length: 1-64 characters after trimming
/// - No interior whitespace or control characters
///
/// ## Examples
///
/// ```
/// use cartwheel_core::ProductId;
///
/// assert!(ProductId::parse("tee-classic").is_ok());
/// assert!(ProductId::parse("  42 ").is_ok());
///
/// assert!(ProductId::parse("").is_err());
/// assert!(ProductId::parse("two words").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Maximum allowed length.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a product identifier, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty, too long, or contains
    /// whitespace.
    pub fn parse(s: &str) -> Result<Self, ProductIdError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(ProductIdError::Empty);
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(ProductIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ProductIdError::InvalidCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProductId {
    type Error = ProductIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl core::str::FromStr for ProductId {
    type Err = ProductIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
