//! Short human-typable join codes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Uppercase alphabet without look-alike glyphs (no I, O, 0, 1).
pub const SESSION_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of freshly generated codes.
pub const SESSION_CODE_LENGTH: usize = 6;

const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 12;

/// A session join code, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Parse user input. Lookup is case-insensitive, so input is normalised
    /// to uppercase.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let code = raw.as_ref().trim().to_ascii_uppercase();
        if code.len() < MIN_CODE_LENGTH || code.len() > MAX_CODE_LENGTH {
            return Err(DomainError::validation(format!(
                "Session code must be {}-{} characters",
                MIN_CODE_LENGTH, MAX_CODE_LENGTH
            )));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::validation(
                "Session code may only contain letters and digits",
            ));
        }
        Ok(Self(code))
    }

    /// Generate a new code. `pick(n)` must return an index in `0..n`.
    pub fn generate(mut pick: impl FnMut(usize) -> usize) -> Self {
        let code = (0..SESSION_CODE_LENGTH)
            .map(|_| {
                let idx = pick(SESSION_CODE_ALPHABET.len()) % SESSION_CODE_ALPHABET.len();
                SESSION_CODE_ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionCode {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> String {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_case() {
        let code = SessionCode::parse(" abc123 ").unwrap();
        assert_eq!(code.as_str(), "ABC123");
    }

    #[test]
    fn parse_rejects_symbols_and_bad_length() {
        assert!(SessionCode::parse("AB-123").is_err());
        assert!(SessionCode::parse("ABC").is_err());
        assert!(SessionCode::parse("A".repeat(13)).is_err());
    }

    #[test]
    fn generate_uses_alphabet() {
        let mut n = 0;
        let code = SessionCode::generate(|len| {
            n += 1;
            n % len
        });
        assert_eq!(code.as_str().len(), SESSION_CODE_LENGTH);
        assert!(code
            .as_str()
            .bytes()
            .all(|b| SESSION_CODE_ALPHABET.contains(&b)));
        assert_eq!(code.as_str(), "BCDEFG");
    }
}
