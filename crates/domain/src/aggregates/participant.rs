//! Participant aggregate - one person's membership in a session.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{ParticipantId, SessionId};
use crate::value_objects::{DisplayName, ParticipantToken, RoleName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Active,
    /// Waiting for host approval.
    Idle,
    Disconnected,
    Kicked,
    Blocked,
}

impl ParticipantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Disconnected => "disconnected",
            Self::Kicked => "kicked",
            Self::Blocked => "blocked",
        }
    }

    /// Kicked and blocked participants lose all access and their seat.
    pub fn is_revoked(self) -> bool {
        matches!(self, Self::Kicked | Self::Blocked)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "idle" => Ok(Self::Idle),
            "disconnected" => Ok(Self::Disconnected),
            "kicked" => Ok(Self::Kicked),
            "blocked" => Ok(Self::Blocked),
            other => Err(DomainError::parse(format!(
                "Unknown participant status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Reserved for the host; never granted through join.
    Host,
    #[default]
    Player,
    Observer,
}

impl ParticipantRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Player => "player",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-assigned progress markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProgress {
    #[serde(default)]
    pub next_starter: bool,
    #[serde(default)]
    pub final_position: Option<u32>,
}

/// Why a participant credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenial {
    Revoked(ParticipantStatus),
    TokenExpired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    id: ParticipantId,
    session_id: SessionId,
    display_name: DisplayName,
    role: ParticipantRole,
    status: ParticipantStatus,
    token: ParticipantToken,
    token_expires_at: Option<DateTime<Utc>>,
    joined_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    disconnected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    progress: ParticipantProgress,
    /// At most one host-assigned session role.
    #[serde(default)]
    session_role: Option<RoleName>,
}

impl Participant {
    /// A freshly joined participant. Starts `idle` when the session requires
    /// approval, `active` otherwise.
    pub fn join(
        session_id: SessionId,
        display_name: DisplayName,
        role: ParticipantRole,
        token: ParticipantToken,
        token_expires_at: Option<DateTime<Utc>>,
        require_approval: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if role == ParticipantRole::Host {
            return Err(DomainError::validation(
                "The host role cannot be taken by joining",
            ));
        }
        Ok(Self {
            id: ParticipantId::new(),
            session_id,
            display_name,
            role,
            status: if require_approval {
                ParticipantStatus::Idle
            } else {
                ParticipantStatus::Active
            },
            token,
            token_expires_at,
            joined_at: now,
            last_seen_at: now,
            disconnected_at: None,
            progress: ParticipantProgress::default(),
            session_role: None,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    pub fn status(&self) -> ParticipantStatus {
        self.status
    }

    pub fn token(&self) -> &ParticipantToken {
        &self.token
    }

    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.token_expires_at
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn last_seen_at(&self) -> DateTime<Utc> {
        self.last_seen_at
    }

    pub fn disconnected_at(&self) -> Option<DateTime<Utc>> {
        self.disconnected_at
    }

    pub fn progress(&self) -> &ParticipantProgress {
        &self.progress
    }

    pub fn session_role(&self) -> Option<&RoleName> {
        self.session_role.as_ref()
    }

    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|exp| exp <= now)
    }

    /// Whether this participant's token may be used at `now`.
    ///
    /// Revocation is checked before expiry so a kicked participant is always
    /// told they were removed.
    pub fn check_access(&self, now: DateTime<Utc>) -> Result<(), AccessDenial> {
        if self.status.is_revoked() {
            return Err(AccessDenial::Revoked(self.status));
        }
        if self.is_token_expired(now) {
            return Err(AccessDenial::TokenExpired);
        }
        Ok(())
    }

    /// Counts toward `max_participants`.
    pub fn occupies_seat(&self) -> bool {
        !self.status.is_revoked()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn ensure_not_revoked(&self, action: &str) -> Result<(), DomainError> {
        if self.status.is_revoked() {
            Err(DomainError::invalid_transition(self.status, action))
        } else {
            Ok(())
        }
    }

    /// Token-based return after a disconnect. Only sessions without approval
    /// reactivate the participant; otherwise the status is left as is and a
    /// heartbeat or host approval moves it on.
    pub fn mark_rejoined(
        &mut self,
        require_approval: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_not_revoked("rejoin")?;
        if !require_approval && self.status != ParticipantStatus::Idle {
            self.status = ParticipantStatus::Active;
            self.disconnected_at = None;
        }
        self.last_seen_at = now;
        Ok(())
    }

    /// Heartbeat. Revives a disconnected participant.
    pub fn touch(&mut self, now: DateTime<Utc>) -> Result<bool, DomainError> {
        self.ensure_not_revoked("heartbeat")?;
        self.last_seen_at = now;
        if self.status == ParticipantStatus::Disconnected {
            self.status = ParticipantStatus::Active;
            self.disconnected_at = None;
            return Ok(true);
        }
        Ok(false)
    }

    /// Leave or presence timeout. Returns `true` when the status changed.
    pub fn disconnect(&mut self, now: DateTime<Utc>) -> Result<bool, DomainError> {
        self.ensure_not_revoked("disconnect")?;
        match self.status {
            ParticipantStatus::Active => {
                self.status = ParticipantStatus::Disconnected;
                self.disconnected_at = Some(now);
                Ok(true)
            }
            ParticipantStatus::Idle => {
                // Still pending approval; only record when they left.
                self.disconnected_at = Some(now);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != ParticipantStatus::Idle {
            return Err(DomainError::invalid_transition(self.status, "approve"));
        }
        self.status = if self.disconnected_at.is_some() {
            ParticipantStatus::Disconnected
        } else {
            ParticipantStatus::Active
        };
        self.last_seen_at = self.last_seen_at.max(now);
        Ok(())
    }

    /// Returns `false` when already kicked.
    pub fn kick(&mut self, now: DateTime<Utc>) -> Result<bool, DomainError> {
        match self.status {
            ParticipantStatus::Kicked => Ok(false),
            ParticipantStatus::Blocked => {
                Err(DomainError::invalid_transition(self.status, "kick"))
            }
            _ => {
                self.status = ParticipantStatus::Kicked;
                self.disconnected_at.get_or_insert(now);
                Ok(true)
            }
        }
    }

    /// Blocking may escalate a kick. Returns `false` when already blocked.
    pub fn block(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == ParticipantStatus::Blocked {
            return false;
        }
        self.status = ParticipantStatus::Blocked;
        self.disconnected_at.get_or_insert(now);
        true
    }

    pub fn set_next_starter(&mut self, next_starter: bool) {
        self.progress.next_starter = next_starter;
    }

    pub fn set_final_position(&mut self, position: Option<u32>) -> Result<(), DomainError> {
        if position == Some(0) {
            return Err(DomainError::validation("Final position starts at 1"));
        }
        self.progress.final_position = position;
        Ok(())
    }

    /// Hand out a session role, replacing any previous one. Returns `false`
    /// when the participant already holds `role`.
    pub fn assign_role(&mut self, role: RoleName) -> Result<bool, DomainError> {
        self.ensure_not_revoked("assign_role")?;
        if self.session_role.as_ref() == Some(&role) {
            return Ok(false);
        }
        self.session_role = Some(role);
        Ok(true)
    }

    /// Take `role` away. Returns `false` when it was not the one held.
    pub fn unassign_role(&mut self, role: &RoleName) -> bool {
        if self.session_role.as_ref() != Some(role) {
            return false;
        }
        self.session_role = None;
        true
    }

    /// Force a status (fixtures).
    pub fn with_status(mut self, status: ParticipantStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn participant(require_approval: bool, expires: Option<DateTime<Utc>>) -> Participant {
        Participant::join(
            SessionId::new(),
            DisplayName::new("Ada").unwrap(),
            ParticipantRole::Player,
            ParticipantToken::new("tok-1").unwrap(),
            expires,
            require_approval,
            now(),
        )
        .unwrap()
    }

    #[test]
    fn join_respects_approval_setting() {
        assert_eq!(participant(false, None).status(), ParticipantStatus::Active);
        assert_eq!(participant(true, None).status(), ParticipantStatus::Idle);
    }

    #[test]
    fn host_role_cannot_be_joined() {
        let result = Participant::join(
            SessionId::new(),
            DisplayName::new("Eve").unwrap(),
            ParticipantRole::Host,
            ParticipantToken::new("tok").unwrap(),
            None,
            false,
            now(),
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn revocation_reported_before_expiry() {
        let p = participant(false, Some(now() - Duration::hours(1)))
            .with_status(ParticipantStatus::Kicked);
        assert_eq!(
            p.check_access(now()),
            Err(AccessDenial::Revoked(ParticipantStatus::Kicked))
        );
    }

    #[test]
    fn expiry_is_inclusive() {
        let p = participant(false, Some(now()));
        assert_eq!(p.check_access(now()), Err(AccessDenial::TokenExpired));
        assert!(p.check_access(now() - Duration::seconds(1)).is_ok());
    }

    #[test]
    fn no_expiry_means_forever() {
        let p = participant(false, None);
        assert!(p.check_access(now() + Duration::days(3650)).is_ok());
    }

    #[test]
    fn heartbeat_revives_disconnected() {
        let mut p = participant(false, None);
        assert!(p.disconnect(now()).unwrap());
        assert_eq!(p.status(), ParticipantStatus::Disconnected);
        assert!(p.touch(now() + Duration::seconds(5)).unwrap());
        assert_eq!(p.status(), ParticipantStatus::Active);
        assert_eq!(p.disconnected_at(), None);
    }

    #[test]
    fn rejoin_keeps_pending_participant_idle() {
        let mut p = participant(true, None);
        p.disconnect(now()).unwrap();
        p.mark_rejoined(true, now()).unwrap();
        assert_eq!(p.status(), ParticipantStatus::Idle);
    }

    #[test]
    fn rejoin_reactivates_only_without_approval() {
        let mut open = participant(false, None);
        open.disconnect(now()).unwrap();
        open.mark_rejoined(false, now()).unwrap();
        assert_eq!(open.status(), ParticipantStatus::Active);
        assert_eq!(open.disconnected_at(), None);

        let mut gated = participant(true, None);
        gated.approve(now()).unwrap();
        gated.disconnect(now()).unwrap();
        gated.mark_rejoined(true, now()).unwrap();
        assert_eq!(gated.status(), ParticipantStatus::Disconnected);
    }

    #[test]
    fn kick_then_block_escalates_but_not_back() {
        let mut p = participant(false, None);
        assert!(p.kick(now()).unwrap());
        assert!(!p.kick(now()).unwrap());
        assert!(p.block(now()));
        assert!(matches!(
            p.kick(now()),
            Err(DomainError::InvalidTransition { .. })
        ));
        assert!(!p.occupies_seat());
    }

    #[test]
    fn revoked_participant_cannot_heartbeat() {
        let mut p = participant(false, None).with_status(ParticipantStatus::Blocked);
        assert!(p.touch(now()).is_err());
        assert!(p.mark_rejoined(false, now()).is_err());
    }

    #[test]
    fn approve_only_from_idle() {
        let mut p = participant(true, None);
        p.approve(now()).unwrap();
        assert_eq!(p.status(), ParticipantStatus::Active);
        assert!(p.approve(now()).is_err());
    }

    #[test]
    fn one_role_at_a_time() {
        let mut p = participant(false, None);
        let detective = RoleName::new("detective").unwrap();
        let butler = RoleName::new("butler").unwrap();

        assert!(p.assign_role(detective.clone()).unwrap());
        assert!(!p.assign_role(detective.clone()).unwrap());
        assert!(p.assign_role(butler.clone()).unwrap());
        assert_eq!(p.session_role(), Some(&butler));

        assert!(!p.unassign_role(&detective));
        assert!(p.unassign_role(&butler));
        assert_eq!(p.session_role(), None);

        let mut kicked = p.with_status(ParticipantStatus::Kicked);
        assert!(kicked.assign_role(detective).is_err());
    }

    #[test]
    fn final_position_is_one_based() {
        let mut p = participant(false, None);
        assert!(p.set_final_position(Some(0)).is_err());
        p.set_final_position(Some(1)).unwrap();
        assert_eq!(p.progress().final_position, Some(1));
    }
}
