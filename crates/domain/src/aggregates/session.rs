//! PlaySession aggregate - one live run of an activity.
//!
//! The session owns the host-controlled state machine and the free-form
//! runtime fields (step, phase, timer, board) that participants observe.
//!
//! # Transition table
//!
//! | action    | from                | to      |
//! |-----------|---------------------|---------|
//! | publish   | draft               | lobby   |
//! | unpublish | lobby               | draft   |
//! | start     | lobby, paused       | active  |
//! | resume    | paused              | active  |
//! | pause     | active              | paused  |
//! | lock      | active              | locked  |
//! | unlock    | locked              | active  |
//! | end       | any non-terminal    | ended   |
//!
//! `archived` and `cancelled` are only reached by administrative tooling and
//! are terminal here.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{ActivityId, SessionId};
use crate::value_objects::{SessionCode, Title, UserId};

/// Maximum length of the board message shown to participants.
const MAX_BOARD_MESSAGE_LENGTH: usize = 500;

/// Upper bound for a single timer run.
const MAX_TIMER_SECONDS: u32 = 24 * 60 * 60;

// =============================================================================
// Status & actions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    Lobby,
    Active,
    Paused,
    Locked,
    Ended,
    Archived,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Lobby => "lobby",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Locked => "locked",
            Self::Ended => "ended",
            Self::Archived => "archived",
            Self::Cancelled => "cancelled",
        }
    }

    /// Ended, archived and cancelled sessions never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Archived | Self::Cancelled)
    }

    pub fn accepts_joins(self) -> bool {
        matches!(self, Self::Lobby | Self::Active | Self::Paused)
    }

    /// Whether step/phase/timer/board may be edited.
    pub fn allows_runtime_edits(self) -> bool {
        matches!(
            self,
            Self::Lobby | Self::Active | Self::Paused | Self::Locked
        )
    }

    /// Whether the participant board is served.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "lobby" => Ok(Self::Lobby),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "locked" => Ok(Self::Locked),
            "ended" => Ok(Self::Ended),
            "archived" => Ok(Self::Archived),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::parse(format!("Unknown session status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Publish,
    Unpublish,
    Start,
    Resume,
    Pause,
    Lock,
    Unlock,
    End,
}

impl SessionAction {
    pub const ALL: [SessionAction; 8] = [
        Self::Publish,
        Self::Unpublish,
        Self::Start,
        Self::Resume,
        Self::Pause,
        Self::Lock,
        Self::Unlock,
        Self::End,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Unpublish => "unpublish",
            Self::Start => "start",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::End => "end",
        }
    }

    /// The status this action leads to from `from`, or `None` when the edge
    /// does not exist.
    pub fn target(self, from: SessionStatus) -> Option<SessionStatus> {
        use SessionStatus as S;
        match (self, from) {
            (Self::Publish, S::Draft) => Some(S::Lobby),
            (Self::Unpublish, S::Lobby) => Some(S::Draft),
            (Self::Start, S::Lobby | S::Paused) => Some(S::Active),
            (Self::Resume, S::Paused) => Some(S::Active),
            (Self::Pause, S::Active) => Some(S::Paused),
            (Self::Lock, S::Active) => Some(S::Locked),
            (Self::Unlock, S::Locked) => Some(S::Active),
            (Self::End, s) if !s.is_terminal() => Some(S::Ended),
            _ => None,
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Settings
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_max_participants() -> u32 {
    100
}

fn default_token_expiry_hours() -> Option<u32> {
    Some(24)
}

/// Host-chosen join and participation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// New participants start `idle` until the host approves them.
    #[serde(default)]
    pub require_approval: bool,
    #[serde(default = "default_true")]
    pub allow_rejoin: bool,
    #[serde(default = "default_max_participants")]
    pub max_participants: u32,
    /// `None` means tokens never expire.
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: Option<u32>,
    #[serde(default = "default_true")]
    pub allow_anonymous: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            require_approval: false,
            allow_rejoin: true,
            max_participants: default_max_participants(),
            token_expiry_hours: default_token_expiry_hours(),
            allow_anonymous: true,
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_participants == 0 {
            return Err(DomainError::validation(
                "max_participants must be at least 1",
            ));
        }
        if self.token_expiry_hours == Some(0) {
            return Err(DomainError::validation(
                "token_expiry_hours must be positive or null",
            ));
        }
        Ok(())
    }

    /// Absolute expiry for a token minted at `now`.
    pub fn token_expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.token_expiry_hours
            .map(|hours| now + Duration::hours(i64::from(hours)))
    }
}

// =============================================================================
// Timer & board
// =============================================================================

/// Advisory countdown shown to participants. Nothing server-side enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub paused_at: Option<DateTime<Utc>>,
}

impl TimerState {
    pub fn started(now: DateTime<Utc>, duration_seconds: u32) -> Self {
        Self {
            started_at: now,
            duration_seconds,
            paused_at: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Seconds left at `now`, frozen while paused, never negative.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let reference = self.paused_at.unwrap_or(now);
        let elapsed = (reference - self.started_at).num_seconds().max(0);
        (i64::from(self.duration_seconds) - elapsed).max(0)
    }
}

/// Host message and per-element visibility overrides for the board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    pub message: Option<String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, bool>,
}

impl BoardState {
    pub fn new(
        message: Option<String>,
        overrides: BTreeMap<String, bool>,
    ) -> Result<Self, DomainError> {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if let Some(m) = &message {
            if m.chars().count() > MAX_BOARD_MESSAGE_LENGTH {
                return Err(DomainError::validation(format!(
                    "Board message cannot exceed {} characters",
                    MAX_BOARD_MESSAGE_LENGTH
                )));
            }
        }
        if overrides.keys().any(|k| k.trim().is_empty()) {
            return Err(DomainError::validation("Board override keys cannot be empty"));
        }
        Ok(Self { message, overrides })
    }
}

/// Timer commands issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TimerCommand {
    Start { duration_seconds: u32 },
    Pause,
    Resume,
    Reset,
}

// =============================================================================
// Aggregate
// =============================================================================

/// A live, multi-participant run of an activity.
///
/// # Invariants
///
/// - `status` only changes through [`PlaySession::apply`]
/// - `started_at` is set by the first `start` and never overwritten
/// - once `status` is terminal, no field changes again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaySession {
    id: SessionId,
    code: SessionCode,
    status: SessionStatus,
    host_id: UserId,
    activity_id: Option<ActivityId>,
    name: Title,
    settings: SessionSettings,

    // Runtime position
    current_step_index: u32,
    current_phase_index: u32,
    timer: Option<TimerState>,
    board: BoardState,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl PlaySession {
    /// Create a new session in `draft`.
    pub fn new(
        code: SessionCode,
        host_id: UserId,
        name: Title,
        activity_id: Option<ActivityId>,
        settings: SessionSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            code,
            status: SessionStatus::Draft,
            host_id,
            activity_id,
            name,
            settings,
            current_step_index: 0,
            current_phase_index: 0,
            timer: None,
            board: BoardState::default(),
            created_at: now,
            updated_at: now,
            started_at: None,
            paused_at: None,
            ended_at: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn host_id(&self) -> &UserId {
        &self.host_id
    }

    pub fn is_hosted_by(&self, user_id: &UserId) -> bool {
        &self.host_id == user_id
    }

    pub fn activity_id(&self) -> Option<ActivityId> {
        self.activity_id
    }

    pub fn name(&self) -> &Title {
        &self.name
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn current_step_index(&self) -> u32 {
        self.current_step_index
    }

    pub fn current_phase_index(&self) -> u32 {
        self.current_phase_index
    }

    pub fn timer(&self) -> Option<&TimerState> {
        self.timer.as_ref()
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Apply a host action. Returns the previous status.
    pub fn apply(
        &mut self,
        action: SessionAction,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, DomainError> {
        let previous = self.status;
        let next = action
            .target(previous)
            .ok_or_else(|| DomainError::invalid_transition(previous, action))?;

        match action {
            SessionAction::Start if self.started_at.is_none() => self.started_at = Some(now),
            SessionAction::Pause => self.paused_at = Some(now),
            SessionAction::End => self.ended_at = Some(now),
            _ => {}
        }

        self.status = next;
        self.updated_at = now;
        Ok(previous)
    }

    // =========================================================================
    // Runtime fields
    // =========================================================================

    fn ensure_runtime_editable(&self, action: &str) -> Result<(), DomainError> {
        if self.status.allows_runtime_edits() {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(self.status, action))
        }
    }

    pub fn set_step(&mut self, step_index: u32, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_runtime_editable("set_step")?;
        self.current_step_index = step_index;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_phase(&mut self, phase_index: u32, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_runtime_editable("set_phase")?;
        self.current_phase_index = phase_index;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_board(&mut self, board: BoardState, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_runtime_editable("set_board")?;
        self.board = board;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a timer command. Returns `false` when the command was a no-op
    /// (pausing a paused timer, resuming a running one).
    pub fn apply_timer(
        &mut self,
        command: TimerCommand,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        self.ensure_runtime_editable("timer")?;
        let changed = match command {
            TimerCommand::Start { duration_seconds } => {
                if duration_seconds == 0 || duration_seconds > MAX_TIMER_SECONDS {
                    return Err(DomainError::validation(format!(
                        "Timer duration must be between 1 and {} seconds",
                        MAX_TIMER_SECONDS
                    )));
                }
                self.timer = Some(TimerState::started(now, duration_seconds));
                true
            }
            TimerCommand::Pause => {
                let timer = self
                    .timer
                    .as_mut()
                    .ok_or_else(|| DomainError::constraint("No active timer to pause"))?;
                if timer.paused_at.is_some() {
                    false
                } else {
                    timer.paused_at = Some(now);
                    true
                }
            }
            TimerCommand::Resume => {
                let timer = self
                    .timer
                    .as_mut()
                    .ok_or_else(|| DomainError::constraint("No timer to resume"))?;
                match timer.paused_at.take() {
                    Some(paused_at) => {
                        // Shift the start forward so the paused span does not count.
                        timer.started_at += now - paused_at;
                        true
                    }
                    None => false,
                }
            }
            TimerCommand::Reset => self.timer.take().is_some(),
        };
        if changed {
            self.updated_at = now;
        }
        Ok(changed)
    }

    /// Force a status without walking the table (fixtures and admin imports).
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn session() -> PlaySession {
        PlaySession::new(
            SessionCode::parse("ABCDEF").unwrap(),
            UserId::new("host-1").unwrap(),
            Title::new("Friday game").unwrap(),
            None,
            SessionSettings::default(),
            now(),
        )
    }

    const ALL_STATUSES: [SessionStatus; 8] = [
        SessionStatus::Draft,
        SessionStatus::Lobby,
        SessionStatus::Active,
        SessionStatus::Paused,
        SessionStatus::Locked,
        SessionStatus::Ended,
        SessionStatus::Archived,
        SessionStatus::Cancelled,
    ];

    fn expected(action: SessionAction, from: SessionStatus) -> Option<SessionStatus> {
        use SessionStatus as S;
        let table: &[(SessionAction, &[S], S)] = &[
            (SessionAction::Publish, &[S::Draft], S::Lobby),
            (SessionAction::Unpublish, &[S::Lobby], S::Draft),
            (SessionAction::Start, &[S::Lobby, S::Paused], S::Active),
            (SessionAction::Resume, &[S::Paused], S::Active),
            (SessionAction::Pause, &[S::Active], S::Paused),
            (SessionAction::Lock, &[S::Active], S::Locked),
            (SessionAction::Unlock, &[S::Locked], S::Active),
            (
                SessionAction::End,
                &[S::Draft, S::Lobby, S::Active, S::Paused, S::Locked],
                S::Ended,
            ),
        ];
        table
            .iter()
            .find(|(a, froms, _)| *a == action && froms.contains(&from))
            .map(|(_, _, to)| *to)
    }

    #[test]
    fn every_action_status_pair_follows_the_table() {
        for status in ALL_STATUSES {
            for action in SessionAction::ALL {
                let mut s = session().with_status(status);
                let result = s.apply(action, now());
                match expected(action, status) {
                    Some(to) => {
                        assert_eq!(result, Ok(status), "{action} from {status}");
                        assert_eq!(s.status(), to);
                    }
                    None => {
                        assert!(
                            matches!(result, Err(DomainError::InvalidTransition { .. })),
                            "{action} from {status} should be rejected"
                        );
                        assert_eq!(s.status(), status);
                    }
                }
            }
        }
    }

    #[test]
    fn started_at_is_set_once() {
        let mut s = session();
        s.apply(SessionAction::Publish, now()).unwrap();
        s.apply(SessionAction::Start, now()).unwrap();
        s.apply(SessionAction::Pause, now() + Duration::seconds(10))
            .unwrap();
        s.apply(SessionAction::Start, now() + Duration::seconds(20))
            .unwrap();
        assert_eq!(s.started_at(), Some(now()));
        assert_eq!(s.paused_at(), Some(now() + Duration::seconds(10)));
    }

    #[test]
    fn end_sets_ended_at() {
        let mut s = session().with_status(SessionStatus::Locked);
        s.apply(SessionAction::End, now()).unwrap();
        assert_eq!(s.status(), SessionStatus::Ended);
        assert_eq!(s.ended_at(), Some(now()));
    }

    #[test]
    fn runtime_edits_rejected_after_end() {
        let mut s = session().with_status(SessionStatus::Ended);
        assert!(s.set_step(2, now()).is_err());
        assert!(s.apply_timer(TimerCommand::Reset, now()).is_err());
    }

    #[test]
    fn timer_resume_shifts_start_by_paused_span() {
        let mut s = session().with_status(SessionStatus::Active);
        s.apply_timer(TimerCommand::Start { duration_seconds: 60 }, now())
            .unwrap();
        s.apply_timer(TimerCommand::Pause, now() + Duration::seconds(10))
            .unwrap();
        // Pausing twice is a no-op
        assert!(!s
            .apply_timer(TimerCommand::Pause, now() + Duration::seconds(15))
            .unwrap());
        s.apply_timer(TimerCommand::Resume, now() + Duration::seconds(40))
            .unwrap();

        let timer = s.timer().unwrap();
        assert_eq!(timer.started_at, now() + Duration::seconds(30));
        assert_eq!(timer.remaining_seconds(now() + Duration::seconds(40)), 50);
    }

    #[test]
    fn timer_pause_without_timer_is_rejected() {
        let mut s = session().with_status(SessionStatus::Active);
        assert!(matches!(
            s.apply_timer(TimerCommand::Pause, now()),
            Err(DomainError::Constraint(_))
        ));
    }

    #[test]
    fn board_message_is_trimmed_and_bounded() {
        let board = BoardState::new(Some("  hello ".into()), BTreeMap::new()).unwrap();
        assert_eq!(board.message.as_deref(), Some("hello"));
        assert!(BoardState::new(Some("x".repeat(501)), BTreeMap::new()).is_err());
    }

    #[test]
    fn status_parses_from_wire_name() {
        for status in ALL_STATUSES {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
    }
}
