//! Decision aggregate - a host-run vote inside a session.
//!
//! # Transition table
//!
//! | action | from          | to       |
//! |--------|---------------|----------|
//! | open   | draft, closed | open     |
//! | close  | open          | closed   |
//! | reveal | open, closed  | revealed |
//!
//! Results are hidden until `revealed`.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{DecisionId, ParticipantId, SessionId};
use crate::value_objects::Title;

const MAX_PROMPT_LENGTH: usize = 2000;
const MAX_OPTION_KEY_LENGTH: usize = 64;
const MAX_OPTION_LABEL_LENGTH: usize = 200;
const MAX_OPTIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Draft,
    Open,
    Closed,
    Revealed,
}

impl DecisionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Revealed => "revealed",
        }
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Open,
    Close,
    Reveal,
}

impl DecisionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Reveal => "reveal",
        }
    }

    pub fn target(self, from: DecisionStatus) -> Option<DecisionStatus> {
        use DecisionStatus as S;
        match (self, from) {
            (Self::Open, S::Draft | S::Closed) => Some(S::Open),
            (Self::Close, S::Open) => Some(S::Closed),
            (Self::Reveal, S::Open | S::Closed) => Some(S::Revealed),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub key: String,
    pub label: String,
}

impl DecisionOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Trim and check options: non-empty unique keys, non-empty labels.
pub fn validate_options(options: Vec<DecisionOption>) -> Result<Vec<DecisionOption>, DomainError> {
    if options.len() > MAX_OPTIONS {
        return Err(DomainError::validation(format!(
            "A decision cannot have more than {} options",
            MAX_OPTIONS
        )));
    }
    let mut seen = HashSet::new();
    options
        .into_iter()
        .map(|option| {
            let key = option.key.trim().to_string();
            let label = option.label.trim().to_string();
            if key.is_empty() || key.len() > MAX_OPTION_KEY_LENGTH {
                return Err(DomainError::validation(format!(
                    "Option keys must be 1-{} characters",
                    MAX_OPTION_KEY_LENGTH
                )));
            }
            if label.is_empty() || label.chars().count() > MAX_OPTION_LABEL_LENGTH {
                return Err(DomainError::validation(format!(
                    "Option '{}' needs a label of 1-{} characters",
                    key, MAX_OPTION_LABEL_LENGTH
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(DomainError::validation(format!(
                    "Duplicate option key '{}'",
                    key
                )));
            }
            Ok(DecisionOption { key, label })
        })
        .collect()
}

fn normalize_prompt(prompt: Option<String>) -> Result<Option<String>, DomainError> {
    let prompt = prompt.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    if prompt
        .as_ref()
        .is_some_and(|p| p.chars().count() > MAX_PROMPT_LENGTH)
    {
        return Err(DomainError::validation(format!(
            "Prompt cannot exceed {} characters",
            MAX_PROMPT_LENGTH
        )));
    }
    Ok(prompt)
}

/// Partial edit. `prompt: Some(None)` clears the prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionPatch {
    pub title: Option<Title>,
    pub prompt: Option<Option<String>>,
    pub options: Option<Vec<DecisionOption>>,
    pub allow_anonymous: Option<bool>,
    pub max_choices: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    id: DecisionId,
    session_id: SessionId,
    title: Title,
    prompt: Option<String>,
    options: Vec<DecisionOption>,
    status: DecisionStatus,
    allow_anonymous: bool,
    max_choices: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    opened_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    revealed_at: Option<DateTime<Utc>>,
}

impl Decision {
    pub fn new(
        session_id: SessionId,
        title: Title,
        prompt: Option<String>,
        options: Vec<DecisionOption>,
        allow_anonymous: bool,
        max_choices: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if max_choices == 0 {
            return Err(DomainError::validation("maxChoices must be at least 1"));
        }
        Ok(Self {
            id: DecisionId::new(),
            session_id,
            title,
            prompt: normalize_prompt(prompt)?,
            options: validate_options(options)?,
            status: DecisionStatus::Draft,
            allow_anonymous,
            max_choices,
            created_at: now,
            updated_at: now,
            opened_at: None,
            closed_at: None,
            revealed_at: None,
        })
    }

    pub fn id(&self) -> DecisionId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn options(&self) -> &[DecisionOption] {
        &self.options
    }

    pub fn status(&self) -> DecisionStatus {
        self.status
    }

    pub fn is_revealed(&self) -> bool {
        self.status == DecisionStatus::Revealed
    }

    pub fn allow_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    pub fn max_choices(&self) -> u32 {
        self.max_choices
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn revealed_at(&self) -> Option<DateTime<Utc>> {
        self.revealed_at
    }

    fn ensure_openable(options: &[DecisionOption], max_choices: u32) -> Result<(), DomainError> {
        if options.len() < 2 {
            return Err(DomainError::validation(
                "A decision needs at least two options before it can be opened",
            ));
        }
        if max_choices as usize > options.len() {
            return Err(DomainError::validation(
                "maxChoices cannot exceed the number of options",
            ));
        }
        Ok(())
    }

    /// Apply a host action. Returns the previous status.
    pub fn apply(
        &mut self,
        action: DecisionAction,
        now: DateTime<Utc>,
    ) -> Result<DecisionStatus, DomainError> {
        let previous = self.status;
        let next = action
            .target(previous)
            .ok_or_else(|| DomainError::invalid_transition(previous, action))?;

        match action {
            DecisionAction::Open => {
                Self::ensure_openable(&self.options, self.max_choices)?;
                self.opened_at = Some(now);
                // Reopening starts a fresh voting window.
                self.closed_at = None;
            }
            DecisionAction::Close => self.closed_at = Some(now),
            DecisionAction::Reveal => {
                self.closed_at.get_or_insert(now);
                self.revealed_at = Some(now);
            }
        }
        self.status = next;
        self.updated_at = now;
        Ok(previous)
    }

    /// Edit fields while not revealed. Options cannot change once any vote has
    /// been cast.
    pub fn update(
        &mut self,
        patch: DecisionPatch,
        has_votes: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.is_revealed() {
            return Err(DomainError::invalid_transition(self.status, "update"));
        }

        let options = match patch.options {
            Some(_) if has_votes => {
                return Err(DomainError::constraint(
                    "Options are frozen once votes have been cast",
                ))
            }
            Some(options) => validate_options(options)?,
            None => self.options.clone(),
        };
        let max_choices = patch.max_choices.unwrap_or(self.max_choices);
        if max_choices == 0 {
            return Err(DomainError::validation("maxChoices must be at least 1"));
        }
        if self.status == DecisionStatus::Open {
            Self::ensure_openable(&options, max_choices)?;
        }
        let prompt = match patch.prompt {
            Some(prompt) => normalize_prompt(prompt)?,
            None => self.prompt.clone(),
        };

        if let Some(title) = patch.title {
            self.title = title;
        }
        self.prompt = prompt;
        self.options = options;
        self.max_choices = max_choices;
        if let Some(allow_anonymous) = patch.allow_anonymous {
            self.allow_anonymous = allow_anonymous;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Check a ballot against the current state. Returns the trimmed keys.
    pub fn validate_ballot(&self, option_keys: &[String]) -> Result<Vec<String>, DomainError> {
        if self.status != DecisionStatus::Open {
            return Err(DomainError::invalid_transition(self.status, "vote"));
        }
        if option_keys.is_empty() {
            return Err(DomainError::validation("A vote must select at least one option"));
        }
        if option_keys.len() > self.max_choices as usize {
            return Err(DomainError::validation(format!(
                "At most {} option(s) may be selected",
                self.max_choices
            )));
        }
        let mut seen = HashSet::new();
        option_keys
            .iter()
            .map(|key| {
                let key = key.trim().to_string();
                if !self.options.iter().any(|o| o.key == key) {
                    return Err(DomainError::validation(format!("Unknown option key '{}'", key)));
                }
                if !seen.insert(key.clone()) {
                    return Err(DomainError::validation(format!(
                        "Option '{}' selected more than once",
                        key
                    )));
                }
                Ok(key)
            })
            .collect()
    }

    /// Counts per option, in option order. `None` until revealed.
    pub fn tally(&self, votes: &[Vote]) -> Option<Tally> {
        if !self.is_revealed() {
            return None;
        }
        let counts = self
            .options
            .iter()
            .map(|option| OptionTally {
                key: option.key.clone(),
                label: option.label.clone(),
                count: votes
                    .iter()
                    .filter(|v| v.decision_id == self.id && v.option_key == option.key)
                    .count() as u32,
            })
            .collect::<Vec<_>>();
        let voters: BTreeSet<ParticipantId> = votes
            .iter()
            .filter(|v| v.decision_id == self.id)
            .map(|v| v.voter_id)
            .collect();
        Some(Tally {
            decision_id: self.id,
            total_votes: counts.iter().map(|c| c.count).sum(),
            total_voters: voters.len() as u32,
            counts,
        })
    }
}

/// One stored vote row. A multi-choice ballot produces one row per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub decision_id: DecisionId,
    pub voter_id: ParticipantId,
    /// Hides the voter in host listings when the decision allows it.
    pub anonymous: bool,
    pub option_key: String,
    pub created_at: DateTime<Utc>,
}

/// A voter's full selection for one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub decision_id: DecisionId,
    pub voter_id: ParticipantId,
    pub anonymous: bool,
    pub option_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Ballot {
    pub fn votes(&self) -> Vec<Vote> {
        self.option_keys
            .iter()
            .map(|key| Vote {
                decision_id: self.decision_id,
                voter_id: self.voter_id,
                anonymous: self.anonymous,
                option_key: key.clone(),
                created_at: self.created_at,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub key: String,
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub decision_id: DecisionId,
    pub counts: Vec<OptionTally>,
    pub total_votes: u32,
    pub total_voters: u32,
}

impl Tally {
    pub fn count_for(&self, key: &str) -> Option<u32> {
        self.counts.iter().find(|c| c.key == key).map(|c| c.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn decision(options: &[&str], max_choices: u32) -> Decision {
        Decision::new(
            SessionId::new(),
            Title::new("Which door?").unwrap(),
            None,
            options
                .iter()
                .map(|k| DecisionOption::new(*k, k.to_uppercase()))
                .collect(),
            false,
            max_choices,
            now(),
        )
        .unwrap()
    }

    fn vote(d: &Decision, voter: ParticipantId, key: &str) -> Vote {
        Vote {
            decision_id: d.id(),
            voter_id: voter,
            anonymous: false,
            option_key: key.to_string(),
            created_at: now(),
        }
    }

    #[test]
    fn tally_counts_every_option_after_reveal() {
        let mut d = decision(&["a", "b"], 1);
        d.apply(DecisionAction::Open, now()).unwrap();
        let votes = vec![
            vote(&d, ParticipantId::new(), "a"),
            vote(&d, ParticipantId::new(), "a"),
            vote(&d, ParticipantId::new(), "b"),
        ];
        assert!(d.tally(&votes).is_none());

        d.apply(DecisionAction::Reveal, now()).unwrap();
        let tally = d.tally(&votes).unwrap();
        assert_eq!(tally.count_for("a"), Some(2));
        assert_eq!(tally.count_for("b"), Some(1));
        assert_eq!(tally.total_voters, 3);
        assert!(d.closed_at().is_some());
    }

    #[test]
    fn tally_includes_zero_counts() {
        let mut d = decision(&["a", "b", "c"], 1);
        d.apply(DecisionAction::Open, now()).unwrap();
        d.apply(DecisionAction::Reveal, now()).unwrap();
        let tally = d.tally(&[]).unwrap();
        assert_eq!(tally.counts.len(), 3);
        assert!(tally.counts.iter().all(|c| c.count == 0));
    }

    #[test]
    fn transitions_are_strict() {
        let mut d = decision(&["a", "b"], 1);
        assert!(d.apply(DecisionAction::Close, now()).is_err());
        assert!(d.apply(DecisionAction::Reveal, now()).is_err());
        d.apply(DecisionAction::Open, now()).unwrap();
        d.apply(DecisionAction::Close, now()).unwrap();
        d.apply(DecisionAction::Open, now()).unwrap();
        d.apply(DecisionAction::Reveal, now()).unwrap();
        for action in [DecisionAction::Open, DecisionAction::Close, DecisionAction::Reveal] {
            assert!(matches!(
                d.apply(action, now()),
                Err(DomainError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn open_requires_two_options() {
        let mut d = decision(&["only"], 1);
        assert!(matches!(
            d.apply(DecisionAction::Open, now()),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(d.status(), DecisionStatus::Draft);
    }

    #[test]
    fn options_validated() {
        let dup = vec![DecisionOption::new("a", "A"), DecisionOption::new(" a ", "Again")];
        assert!(validate_options(dup).is_err());
        assert!(validate_options(vec![DecisionOption::new("", "Empty")]).is_err());
        assert!(validate_options(vec![DecisionOption::new("k", "  ")]).is_err());
    }

    #[test]
    fn ballot_validation() {
        let mut d = decision(&["a", "b", "c"], 2);
        assert!(d.validate_ballot(&["a".into()]).is_err());
        d.apply(DecisionAction::Open, now()).unwrap();
        assert!(d.validate_ballot(&[]).is_err());
        assert!(d.validate_ballot(&["z".into()]).is_err());
        assert!(d.validate_ballot(&["a".into(), "a".into()]).is_err());
        assert!(d
            .validate_ballot(&["a".into(), "b".into(), "c".into()])
            .is_err());
        assert_eq!(
            d.validate_ballot(&["a".into(), "c".into()]).unwrap(),
            vec!["a".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn options_frozen_once_voted() {
        let mut d = decision(&["a", "b"], 1);
        let patch = DecisionPatch {
            options: Some(vec![DecisionOption::new("x", "X"), DecisionOption::new("y", "Y")]),
            ..Default::default()
        };
        assert!(matches!(
            d.update(patch.clone(), true, now()),
            Err(DomainError::Constraint(_))
        ));
        d.update(patch, false, now()).unwrap();
        assert_eq!(d.options()[0].key, "x");
    }

    #[test]
    fn update_rejected_after_reveal() {
        let mut d = decision(&["a", "b"], 1);
        d.apply(DecisionAction::Open, now()).unwrap();
        d.apply(DecisionAction::Reveal, now()).unwrap();
        let patch = DecisionPatch {
            title: Some(Title::new("Renamed").unwrap()),
            ..Default::default()
        };
        assert!(d.update(patch, false, now()).is_err());
    }
}
