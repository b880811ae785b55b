//! Shared validation rules for string identifiers.
//!
//! Every identifier newtype in this crate (tool names, session ids,
//! conversation ids) funnels through the same charset and length checks so
//! that validation behavior stays consistent across the codebase.

/// Validation rules for string identifiers.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierRules {
    /// Maximum allowed length in characters.
    pub max_length: usize,
    /// Whether to allow dots (`.`) in the identifier.
    pub allow_dots: bool,
    /// Whether to allow colons (`:`) in the identifier.
    pub allow_colons: bool,
}

impl IdentifierRules {
    /// Rules for tool names: max 64 chars, alphanumeric plus `_` and `-`.
    pub const TOOL_NAME: Self = Self {
        max_length: 64,
        allow_dots: false,
        allow_colons: false,
    };

    /// Rules for session, user, and conversation identifiers: max 128
    /// chars, alphanumeric plus `_`, `-`, and `.` (UUID strings pass).
    pub const IDENTIFIER: Self = Self {
        max_length: 128,
        allow_dots: true,
        allow_colons: false,
    };

    /// Validate `input` against these rules.
    ///
    /// Returns the input as an owned `String` on success so callers can
    /// move it straight into a newtype.
    pub fn validate(&self, input: &str) -> Result<String, ValidationError> {
        if input.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        if input.len() > self.max_length {
            return Err(ValidationError::TooLong {
                length: input.len(),
                max: self.max_length,
            });
        }

        // Path traversal sequences are never valid in an identifier,
        // regardless of which punctuation the rules allow.
        if input.contains("..") || input.starts_with("./") {
            return Err(ValidationError::InvalidChar {
                input: input.to_string(),
            });
        }

        let valid = input.chars().all(|c| {
            c.is_alphanumeric()
                || c == '_'
                || c == '-'
                || (self.allow_dots && c == '.')
                || (self.allow_colons && c == ':')
        });

        if !valid {
            return Err(ValidationError::InvalidChar {
                input: input.to_string(),
            });
        }

        Ok(input.to_string())
    }
}

/// Errors produced by [`IdentifierRules::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("identifier cannot be empty")]
    Empty,
    #[error("identifier too long: {length} characters (max {max})")]
    TooLong { length: usize, max: usize },
    #[error("identifier contains invalid characters: '{input}'")]
    InvalidChar { input: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_rules_accept_snake_case() {
        assert!(IdentifierRules::TOOL_NAME.validate("get_events").is_ok());
        assert!(IdentifierRules::TOOL_NAME.validate("knowledge-search").is_ok());
    }

    #[test]
    fn tool_name_rules_reject_punctuation() {
        assert!(IdentifierRules::TOOL_NAME.validate("get.events").is_err());
        assert!(IdentifierRules::TOOL_NAME.validate("get events").is_err());
        assert!(IdentifierRules::TOOL_NAME.validate("").is_err());
    }

    #[test]
    fn identifier_rules_accept_uuid_strings() {
        let id = "2c6e9f4a-11dd-4b9e-9c1e-3fd63a1f0a11";
        assert!(IdentifierRules::IDENTIFIER.validate(id).is_ok());
    }

    #[test]
    fn path_traversal_is_rejected() {
        assert!(IdentifierRules::IDENTIFIER.validate("../etc/passwd").is_err());
        assert!(IdentifierRules::IDENTIFIER.validate("./secret").is_err());
    }

    #[test]
    fn length_limit_is_enforced() {
        let long = "a".repeat(129);
        assert!(matches!(
            IdentifierRules::IDENTIFIER.validate(&long),
            Err(ValidationError::TooLong { length: 129, max: 128 })
        ));
    }
}
