//! Caller identity value objects.
//!
//! Hosts are identified by the user id handed to us by the upstream session
//! gateway; participants by an opaque bearer token minted at join time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

const MAX_USER_ID_LENGTH: usize = 200;
const MAX_TOKEN_LENGTH: usize = 256;

/// Identity-provider user id of a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("User id cannot be empty"));
        }
        if trimmed.len() > MAX_USER_ID_LENGTH {
            return Err(DomainError::validation(format!(
                "User id cannot exceed {} characters",
                MAX_USER_ID_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> String {
        id.0
    }
}

/// Opaque participant bearer token.
///
/// `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantToken(String);

impl ParticipantToken {
    pub fn new(token: impl Into<String>) -> Result<Self, DomainError> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Participant token cannot be empty"));
        }
        if trimmed.len() > MAX_TOKEN_LENGTH {
            return Err(DomainError::validation("Participant token is too long"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw secret, for handing back to the participant exactly once.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ParticipantToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParticipantToken(***)")
    }
}

impl fmt::Display for ParticipantToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl TryFrom<String> for ParticipantToken {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ParticipantToken> for String {
    fn from(token: ParticipantToken) -> String {
        token.0
    }
}
