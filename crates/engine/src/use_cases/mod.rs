//! Use cases - session runtime operations.
//!
//! Each module owns one area of the runtime. Every operation takes a
//! resolved caller ([`auth::Viewer`], [`auth::HostViewer`] or
//! [`auth::ParticipantViewer`]), validates before writing, then records
//! activity and broadcasts on a best-effort basis.

pub mod activity;
pub mod auth;
pub mod board;
pub mod broadcast;
pub mod decisions;
pub mod error;
pub mod participants;
pub mod reveals;
pub mod session;
pub mod time_bank;

pub use activity::ActivityLog;
pub use auth::{AuthResolver, Credentials, HostViewer, ParticipantViewer, Viewer};
pub use board::{BoardAggregator, BoardSnapshot};
pub use broadcast::EventBroadcaster;
pub use decisions::{DecisionEngine, NewDecision, VoteReceipt};
pub use error::{ErrorKind, PlayError};
pub use participants::{ParticipantRegistry, RoleAssignment};
pub use reveals::{NewOutcome, NewVariant, Reveals};
pub use session::SessionStore;
pub use time_bank::{DeltaInput, TimeBankLedger, TimeBankView};
