//! Aggregate roots of the live session runtime
//!
//! Each aggregate owns its invariants: fields are private, state changes go
//! through methods that return `DomainError` on illegal input, and the
//! engine persists the result through its repository ports.

pub mod activity;
pub mod artifact;
pub mod decision;
pub mod outcome;
pub mod participant;
pub mod session;
pub mod time_bank;

pub use activity::{ActivityKind, ActivityLogEntry};
pub use artifact::{ArtifactVariant, VariantVisibility};
pub use decision::{
    validate_options, Ballot, Decision, DecisionAction, DecisionOption, DecisionPatch,
    DecisionStatus, OptionTally, Tally, Vote,
};
pub use outcome::Outcome;
pub use participant::{
    AccessDenial, Participant, ParticipantProgress, ParticipantRole, ParticipantStatus,
};
pub use session::{
    BoardState, PlaySession, SessionAction, SessionSettings, SessionStatus, TimerCommand,
    TimerState,
};
pub use time_bank::{
    AppliedDelta, BalanceBounds, DeltaStatus, LedgerEntry, TimeBankBalance, TimeBankDelta,
    DEFAULT_MAX_DELTA_SECONDS, MAX_BALANCE_BOUND,
};
