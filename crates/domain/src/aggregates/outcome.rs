//! Session outcomes - results the host reveals at the end of a phase or run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::normalize_body;
use crate::error::DomainError;
use crate::ids::{OutcomeId, SessionId};
use crate::value_objects::Title;

const MAX_OUTCOME_TYPE_LENGTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    id: OutcomeId,
    session_id: SessionId,
    title: Title,
    body: Option<String>,
    outcome_type: Option<String>,
    revealed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl Outcome {
    pub fn new(
        session_id: SessionId,
        title: Title,
        body: Option<String>,
        outcome_type: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let outcome_type = outcome_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if outcome_type
            .as_ref()
            .is_some_and(|t| t.len() > MAX_OUTCOME_TYPE_LENGTH)
        {
            return Err(DomainError::validation(format!(
                "Outcome type cannot exceed {} characters",
                MAX_OUTCOME_TYPE_LENGTH
            )));
        }
        Ok(Self {
            id: OutcomeId::new(),
            session_id,
            title,
            body: normalize_body(body)?,
            outcome_type,
            revealed_at: None,
            created_at: now,
        })
    }

    pub fn id(&self) -> OutcomeId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn outcome_type(&self) -> Option<&str> {
        self.outcome_type.as_deref()
    }

    pub fn revealed_at(&self) -> Option<DateTime<Utc>> {
        self.revealed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed_at.is_some()
    }

    /// Outcomes stay revealed once shown. Returns `false` on repeat.
    pub fn reveal(&mut self, now: DateTime<Utc>) -> bool {
        if self.revealed_at.is_some() {
            return false;
        }
        self.revealed_at = Some(now);
        true
    }
}
