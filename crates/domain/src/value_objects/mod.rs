//! Value objects - validated by construction, compared by value.

mod identity;
mod names;
mod session_code;

pub use identity::{ParticipantToken, UserId};
pub use names::{DisplayName, LedgerReason, RoleName, Title};
pub use session_code::{SessionCode, SESSION_CODE_ALPHABET, SESSION_CODE_LENGTH};
