use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use liveplay_domain::{Ballot, Decision, DecisionId, SessionId, Vote};

use crate::infrastructure::ports::{DecisionRepo, RepoError};

#[derive(Default)]
pub struct MemoryDecisionRepo {
    decisions: DashMap<DecisionId, Decision>,
    votes: DashMap<DecisionId, Arc<Mutex<Vec<Vote>>>>,
}

impl MemoryDecisionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn votes_for(&self, decision_id: DecisionId) -> Option<Arc<Mutex<Vec<Vote>>>> {
        self.votes.get(&decision_id).map(|v| v.clone())
    }
}

#[async_trait]
impl DecisionRepo for MemoryDecisionRepo {
    async fn get(&self, id: DecisionId) -> Result<Option<Decision>, RepoError> {
        Ok(self.decisions.get(&id).map(|d| d.clone()))
    }

    async fn save(&self, decision: &Decision) -> Result<(), RepoError> {
        self.decisions.insert(decision.id(), decision.clone());
        Ok(())
    }

    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Decision>, RepoError> {
        let mut decisions: Vec<Decision> = self
            .decisions
            .iter()
            .filter(|d| d.session_id() == session_id)
            .map(|d| d.clone())
            .collect();
        decisions.sort_by_key(|d| d.created_at());
        Ok(decisions)
    }

    async fn cast_ballot(&self, ballot: &Ballot, replace: bool) -> Result<bool, RepoError> {
        let votes = self
            .votes
            .entry(ballot.decision_id)
            .or_default()
            .clone();
        let mut votes = votes.lock().await;

        let existing = votes.iter().any(|v| v.voter_id == ballot.voter_id);
        if existing && !replace {
            return Err(RepoError::constraint(format!(
                "participant {} already voted on decision {}",
                ballot.voter_id, ballot.decision_id
            )));
        }
        if existing {
            votes.retain(|v| v.voter_id != ballot.voter_id);
        }
        votes.extend(ballot.votes());
        Ok(existing)
    }

    async fn list_votes(&self, decision_id: DecisionId) -> Result<Vec<Vote>, RepoError> {
        match self.votes_for(decision_id) {
            Some(votes) => Ok(votes.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn has_votes(&self, decision_id: DecisionId) -> Result<bool, RepoError> {
        match self.votes_for(decision_id) {
            Some(votes) => Ok(!votes.lock().await.is_empty()),
            None => Ok(false),
        }
    }
}
