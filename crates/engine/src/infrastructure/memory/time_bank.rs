use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use liveplay_domain::{
    AppliedDelta, LedgerEntry, LedgerEntryId, SessionId, TimeBankBalance, TimeBankDelta,
};

use crate::infrastructure::ports::{RepoError, TimeBankRepo};

struct Account {
    balance: TimeBankBalance,
    /// Append-only, oldest first.
    entries: Vec<LedgerEntry>,
}

/// One lock per session account: deltas on the same session serialize,
/// different sessions never contend.
#[derive(Default)]
pub struct MemoryTimeBankRepo {
    accounts: DashMap<SessionId, Arc<Mutex<Account>>>,
}

impl MemoryTimeBankRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn account(&self, session_id: SessionId) -> Arc<Mutex<Account>> {
        self.accounts
            .entry(session_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(Account {
                    balance: TimeBankBalance::empty(session_id),
                    entries: Vec::new(),
                }))
            })
            .clone()
    }
}

#[async_trait]
impl TimeBankRepo for MemoryTimeBankRepo {
    async fn apply_delta(
        &self,
        session_id: SessionId,
        delta: &TimeBankDelta,
        entry_id: LedgerEntryId,
        now: DateTime<Utc>,
    ) -> Result<AppliedDelta, RepoError> {
        let account = self.account(session_id);
        let mut account = account.lock().await;

        if let Some(event_id) = delta.event_id() {
            if let Some(original) = account
                .entries
                .iter()
                .find(|e| e.event_id.as_deref() == Some(event_id))
            {
                return Ok(AppliedDelta::duplicate(
                    account.balance.balance_seconds,
                    original,
                ));
            }
        }

        let (result, entry) = account.balance.apply(delta, entry_id, now);
        account.entries.push(entry);
        Ok(result)
    }

    async fn get_balance(&self, session_id: SessionId) -> Result<TimeBankBalance, RepoError> {
        let Some(account) = self.accounts.get(&session_id).map(|a| a.clone()) else {
            return Ok(TimeBankBalance::empty(session_id));
        };
        let account = account.lock().await;
        Ok(account.balance.clone())
    }

    async fn recent_entries(
        &self,
        session_id: SessionId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, RepoError> {
        let Some(account) = self.accounts.get(&session_id).map(|a| a.clone()) else {
            return Ok(Vec::new());
        };
        let account = account.lock().await;
        Ok(account
            .entries
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
