use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::Mutex;

use liveplay_domain::{
    Participant, ParticipantId, ParticipantStatus, ParticipantToken, SessionId,
};

use crate::infrastructure::ports::{ParticipantRepo, RepoError};

/// Participants of one session, in join order.
type Roster = Arc<Mutex<Vec<Participant>>>;

/// Participants grouped per session so seat checks and next-starter updates
/// lock one roster and never contend across sessions.
#[derive(Default)]
pub struct MemoryParticipantRepo {
    rosters: DashMap<SessionId, Roster>,
    by_id: DashMap<ParticipantId, SessionId>,
    by_token: DashMap<ParticipantToken, ParticipantId>,
}

impl MemoryParticipantRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn roster(&self, session_id: SessionId) -> Roster {
        self.rosters.entry(session_id).or_default().clone()
    }

    fn existing_roster(&self, session_id: SessionId) -> Option<Roster> {
        self.rosters.get(&session_id).map(|r| r.clone())
    }
}

#[async_trait]
impl ParticipantRepo for MemoryParticipantRepo {
    async fn get(&self, id: ParticipantId) -> Result<Option<Participant>, RepoError> {
        let Some(session_id) = self.by_id.get(&id).map(|s| *s) else {
            return Ok(None);
        };
        let Some(roster) = self.existing_roster(session_id) else {
            return Ok(None);
        };
        let roster = roster.lock().await;
        Ok(roster.iter().find(|p| p.id() == id).cloned())
    }

    async fn get_by_token(
        &self,
        session_id: SessionId,
        token: &ParticipantToken,
    ) -> Result<Option<Participant>, RepoError> {
        let Some(id) = self.by_token.get(token).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self
            .get(id)
            .await?
            .filter(|p| p.session_id() == session_id))
    }

    async fn insert_seated(
        &self,
        participant: &Participant,
        max_seats: u32,
    ) -> Result<bool, RepoError> {
        let roster = self.roster(participant.session_id());
        let mut roster = roster.lock().await;

        let seated = roster.iter().filter(|p| p.occupies_seat()).count();
        if seated >= max_seats as usize {
            return Ok(false);
        }

        match self.by_token.entry(participant.token().clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::constraint("participant token already issued"))
            }
            Entry::Vacant(slot) => {
                slot.insert(participant.id());
            }
        }
        self.by_id
            .insert(participant.id(), participant.session_id());
        roster.push(participant.clone());
        Ok(true)
    }

    async fn save_if_unchanged(
        &self,
        current: &Participant,
        updated: &Participant,
    ) -> Result<bool, RepoError> {
        let roster = self
            .existing_roster(current.session_id())
            .ok_or_else(|| RepoError::not_found("Participant", current.id()))?;
        let mut roster = roster.lock().await;
        let slot = roster
            .iter_mut()
            .find(|p| p.id() == current.id())
            .ok_or_else(|| RepoError::not_found("Participant", current.id()))?;
        if slot != current {
            return Ok(false);
        }
        *slot = updated.clone();
        Ok(true)
    }

    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Participant>, RepoError> {
        match self.existing_roster(session_id) {
            Some(roster) => Ok(roster.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn assign_next_starter(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Result<Option<Participant>, RepoError> {
        let Some(roster) = self.existing_roster(session_id) else {
            return Ok(None);
        };
        let mut roster = roster.lock().await;
        if !roster.iter().any(|p| p.id() == participant_id) {
            return Ok(None);
        }
        let mut target = None;
        for p in roster.iter_mut() {
            let is_target = p.id() == participant_id;
            p.set_next_starter(is_target);
            if is_target {
                target = Some(p.clone());
            }
        }
        Ok(target)
    }

    async fn list_active_seen_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Participant>, RepoError> {
        // Collect the rosters first so no map guard is held across an await.
        let rosters: Vec<Roster> = self.rosters.iter().map(|r| r.value().clone()).collect();
        let mut stale = Vec::new();
        for roster in rosters {
            let roster = roster.lock().await;
            stale.extend(
                roster
                    .iter()
                    .filter(|p| {
                        p.status() == ParticipantStatus::Active && p.last_seen_at() < cutoff
                    })
                    .cloned(),
            );
        }
        Ok(stale)
    }
}
