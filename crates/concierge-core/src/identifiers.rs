//! Validated identifier newtypes.
//!
//! Sessions, users, conversations, and tools are all addressed by string
//! identifiers that cross process boundaries (cache keys, SQL rows, planner
//! output). Wrapping them in newtypes keeps a raw untrusted string from
//! being used as a key without passing validation first.

use serde::{Deserialize, Serialize};

use crate::validation::{IdentifierRules, ValidationError};

macro_rules! identifier_newtype {
    ($(#[$doc:meta])* $name:ident, $rules:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate a raw string into this identifier type.
            pub fn parse(raw: &str) -> Result<Self, ValidationError> {
                $rules.validate(raw).map(Self)
            }

            /// View the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier, returning the inner string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::parse(&raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

identifier_newtype!(
    /// Identifier of an authenticated session.
    ///
    /// Issued by the surrounding request layer; the engine treats it as
    /// opaque but validated.
    SessionId,
    IdentifierRules::IDENTIFIER
);

identifier_newtype!(
    /// Identifier of the user owning a session.
    UserId,
    IdentifierRules::IDENTIFIER
);

identifier_newtype!(
    /// Identifier of a conversation, keying its ordered sequence of turns.
    ConversationId,
    IdentifierRules::IDENTIFIER
);

identifier_newtype!(
    /// Unique name of a tool in the catalog.
    ToolName,
    IdentifierRules::TOOL_NAME
);

impl SessionId {
    /// Generate a fresh random session identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ConversationId {
    /// Generate a fresh random conversation identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_session_ids_validate() {
        let id = SessionId::generate();
        assert!(SessionId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn tool_name_rejects_invented_punctuation() {
        assert!(ToolName::parse("calendar.delete!").is_err());
        assert!(ToolName::parse("delete_event").is_ok());
    }

    #[test]
    fn serde_round_trip_validates() {
        let id: SessionId = serde_json::from_str("\"abc-123\"").unwrap();
        assert_eq!(id.as_str(), "abc-123");

        let bad: Result<SessionId, _> = serde_json::from_str("\"has space\"");
        assert!(bad.is_err());
    }
}
