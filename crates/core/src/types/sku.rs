//! Stock-keeping unit and promotion code identifiers.
//!
//! Both are user-typed values (admin forms, cart forms, CLI arguments), so
//! they are validated on the way in rather than trusted.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Sku`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SkuError {
    /// The input string is empty.
    #[error("SKU cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("SKU must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[A-Za-z0-9_-]`.
    #[error("SKU contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A stock-keeping unit identifier for a product variant.
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - Characters: ASCII letters, digits, `-` and `_`
///
/// ## Examples
///
/// ```
/// use harbor_core::Sku;
///
/// assert!(Sku::parse("TEE-BLK-M").is_ok());
/// assert!(Sku::parse("").is_err());
/// assert!(Sku::parse("has space").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Maximum length of a SKU.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `Sku` from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than 64
    /// characters, or contains characters other than letters, digits,
    /// `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, SkuError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SkuError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SkuError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(SkuError::InvalidCharacter(c));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the SKU as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Sku {
    type Err = SkuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors that can occur when parsing a [`PromotionCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PromotionCodeError {
    /// Shorter than the minimum length.
    #[error("promotion code must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// Longer than the maximum length.
    #[error("promotion code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Contains a character outside `[A-Z0-9_-]`.
    #[error("promotion code contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A promotion (discount) code, normalized to upper case.
///
/// ```
/// use harbor_core::PromotionCode;
///
/// let code = PromotionCode::parse(" summer-10 ").unwrap();
/// assert_eq!(code.as_str(), "SUMMER-10");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PromotionCode(String);

impl PromotionCode {
    /// Minimum length of a code.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum length of a code.
    pub const MAX_LENGTH: usize = 32;

    /// Parse and normalize a promotion code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is outside 3-32 characters after trimming
    /// or contains characters other than letters, digits, `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, PromotionCodeError> {
        let normalized = s.trim().to_ascii_uppercase();
        if normalized.len() < Self::MIN_LENGTH {
            return Err(PromotionCodeError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if normalized.len() > Self::MAX_LENGTH {
            return Err(PromotionCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = normalized
            .chars()
            .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
        {
            return Err(PromotionCodeError::InvalidCharacter(c));
        }
        Ok(Self(normalized))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromotionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_trims_and_accepts_valid() {
        let sku = Sku::parse("  MUG_01-blue ").expect("valid sku");
        assert_eq!(sku.as_str(), "MUG_01-blue");
    }

    #[test]
    fn test_sku_rejects_invalid() {
        assert_eq!(Sku::parse("   "), Err(SkuError::Empty));
        assert_eq!(Sku::parse("a/b"), Err(SkuError::InvalidCharacter('/')));
        assert_eq!(
            Sku::parse(&"x".repeat(65)),
            Err(SkuError::TooLong { max: 64 })
        );
    }

    #[test]
    fn test_promotion_code_normalizes_case() {
        let code = PromotionCode::parse("welcome_5").expect("valid code");
        assert_eq!(code.to_string(), "WELCOME_5");
    }

    #[test]
    fn test_promotion_code_bounds() {
        assert_eq!(
            PromotionCode::parse("ab"),
            Err(PromotionCodeError::TooShort { min: 3 })
        );
        assert_eq!(
            PromotionCode::parse(&"A".repeat(33)),
            Err(PromotionCodeError::TooLong { max: 32 })
        );
        assert_eq!(
            PromotionCode::parse("TEN%OFF"),
            Err(PromotionCodeError::InvalidCharacter('%'))
        );
    }
}
