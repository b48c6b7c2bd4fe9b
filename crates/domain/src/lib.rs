//! LivePlay domain - the session runtime's aggregates, value objects and
//! invariants. No I/O lives here.

pub mod actor;
pub mod aggregates;
pub mod error;
pub mod events;
pub mod ids;
pub mod value_objects;

pub use actor::Actor;
pub use aggregates::*;
pub use error::DomainError;
pub use events::{ParticipantSummary, PlayEvent};
pub use ids::{
    ActivityId, ActivityLogId, ArtifactVariantId, DecisionId, LedgerEntryId, OutcomeId,
    ParticipantId, SessionId,
};
pub use value_objects::{
    DisplayName, LedgerReason, ParticipantToken, RoleName, SessionCode, Title, UserId,
    SESSION_CODE_ALPHABET, SESSION_CODE_LENGTH,
};
