//! Testability ports for injecting time and randomness.

use chrono::{DateTime, Utc};

#[cfg_attr(test, mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait RandomPort: Send + Sync {
    /// Uniform index in `0..upper`.
    fn gen_index(&self, upper: usize) -> usize;
    /// Opaque bearer secret for participant tokens.
    fn gen_token(&self) -> String;
}
