//! Validated text newtypes for runtime entities
//!
//! These newtypes ensure that text fields are valid by construction:
//! - Non-empty
//! - Within length limits
//! - Trimmed of leading/trailing whitespace

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Maximum length for titles (sessions, decisions, artifacts, outcomes)
const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length for a participant's display name
const MAX_DISPLAY_NAME_LENGTH: usize = 50;

/// Maximum length for a time bank ledger reason
const MAX_REASON_LENGTH: usize = 200;

/// Maximum length for a session role name
const MAX_ROLE_NAME_LENGTH: usize = 50;

fn validated(
    value: impl Into<String>,
    what: &str,
    max: usize,
) -> Result<String, DomainError> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{} cannot be empty", what)));
    }
    if trimmed.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{} cannot exceed {} characters",
            what, max
        )));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Title
// ============================================================================

/// A validated title (non-empty, <=200 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Title(String);

impl Title {
    /// Create a new validated title.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the title is empty after trimming
    /// or exceeds 200 characters.
    pub fn new(title: impl Into<String>) -> Result<Self, DomainError> {
        validated(title, "Title", MAX_TITLE_LENGTH).map(Self)
    }

    /// Returns the title as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Title {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Title> for String {
    fn from(title: Title) -> String {
        title.0
    }
}

// ============================================================================
// DisplayName
// ============================================================================

/// A participant's display name (non-empty, <=50 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        validated(name, "Display name", MAX_DISPLAY_NAME_LENGTH).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DisplayName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> String {
        name.0
    }
}

// ============================================================================
// LedgerReason
// ============================================================================

/// Mandatory audit reason attached to every time bank adjustment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerReason(String);

impl LedgerReason {
    pub fn new(reason: impl Into<String>) -> Result<Self, DomainError> {
        validated(reason, "Reason", MAX_REASON_LENGTH).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for LedgerReason {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<LedgerReason> for String {
    fn from(reason: LedgerReason) -> String {
        reason.0
    }
}

// ============================================================================
// RoleName
// ============================================================================

/// A session role handed to participants by the host ("detective",
/// "team-red"). Compared exactly after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        validated(name, "Role name", MAX_ROLE_NAME_LENGTH).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RoleName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RoleName> for String {
    fn from(name: RoleName) -> String {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed() {
        let title = Title::new("  Escape Room  ").unwrap();
        assert_eq!(title.as_str(), "Escape Room");
    }

    #[test]
    fn empty_title_rejected() {
        assert!(matches!(Title::new("   "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn long_display_name_rejected() {
        let name = "x".repeat(51);
        assert!(DisplayName::new(name).is_err());
        assert!(DisplayName::new("x".repeat(50)).is_ok());
    }

    #[test]
    fn role_name_is_trimmed_and_bounded() {
        assert_eq!(RoleName::new(" detective ").unwrap().as_str(), "detective");
        assert!(RoleName::new("").is_err());
        assert!(RoleName::new("r".repeat(51)).is_err());
    }

    #[test]
    fn reason_deserializes_through_validation() {
        let ok: LedgerReason = serde_json::from_str("\"bonus\"").unwrap();
        assert_eq!(ok.as_str(), "bonus");
        assert!(serde_json::from_str::<LedgerReason>("\"\"").is_err());
    }
}
