//! In-process store. State lives for the lifetime of the engine process.

mod activity;
mod decisions;
mod participants;
mod reveals;
mod sessions;
mod time_bank;

use std::sync::Arc;

pub use activity::MemoryActivityLogRepo;
pub use decisions::MemoryDecisionRepo;
pub use participants::MemoryParticipantRepo;
pub use reveals::{MemoryArtifactRepo, MemoryOutcomeRepo};
pub use sessions::MemorySessionRepo;
pub use time_bank::MemoryTimeBankRepo;

use crate::infrastructure::ports::Repositories;

/// A fresh, empty set of in-memory repositories.
pub fn repositories() -> Repositories {
    Repositories {
        sessions: Arc::new(MemorySessionRepo::new()),
        participants: Arc::new(MemoryParticipantRepo::new()),
        time_bank: Arc::new(MemoryTimeBankRepo::new()),
        decisions: Arc::new(MemoryDecisionRepo::new()),
        artifacts: Arc::new(MemoryArtifactRepo::new()),
        outcomes: Arc::new(MemoryOutcomeRepo::new()),
        activity: Arc::new(MemoryActivityLogRepo::new()),
    }
}
