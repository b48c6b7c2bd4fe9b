//! Caller resolution.
//!
//! Every inbound operation starts here: a participant bearer token or the
//! gateway-provided host user id becomes a [`Viewer`]. Host-only operations
//! take a [`HostViewer`], which only [`AuthResolver`] can construct.

use std::sync::Arc;

use liveplay_domain::{
    AccessDenial, Actor, Participant, ParticipantToken, PlaySession, SessionId, UserId,
};

use crate::infrastructure::ports::{ClockPort, ParticipantRepo, SessionRepo};

use super::error::PlayError;

/// Raw credentials as presented by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub participant_token: Option<String>,
    pub host_user_id: Option<String>,
}

impl Credentials {
    pub fn host(user_id: impl Into<String>) -> Self {
        Self {
            host_user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn participant(token: impl Into<String>) -> Self {
        Self {
            participant_token: Some(token.into()),
            ..Self::default()
        }
    }

    fn token(&self) -> Option<&str> {
        non_blank(self.participant_token.as_deref())
    }

    fn user_id(&self) -> Option<&str> {
        non_blank(self.host_user_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The session host, verified against the session's `host_id`.
#[derive(Debug, Clone)]
pub struct HostViewer {
    user_id: UserId,
    session: PlaySession,
}

impl HostViewer {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn session(&self) -> &PlaySession {
        &self.session
    }

    pub fn actor(&self) -> Actor {
        Actor::host(self.user_id.clone())
    }

    #[cfg(test)]
    pub(crate) fn for_tests(session: PlaySession) -> Self {
        Self {
            user_id: session.host_id().clone(),
            session,
        }
    }
}

/// A participant whose token is known, unrevoked and unexpired.
#[derive(Debug, Clone)]
pub struct ParticipantViewer {
    pub participant: Participant,
    pub session: PlaySession,
}

impl ParticipantViewer {
    pub fn actor(&self) -> Actor {
        Actor::participant(self.participant.id())
    }
}

#[derive(Debug, Clone)]
pub enum Viewer {
    Host(HostViewer),
    Participant(ParticipantViewer),
}

impl Viewer {
    pub fn session(&self) -> &PlaySession {
        match self {
            Self::Host(host) => host.session(),
            Self::Participant(p) => &p.session,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host(_))
    }

    pub fn actor(&self) -> Actor {
        match self {
            Self::Host(host) => host.actor(),
            Self::Participant(p) => p.actor(),
        }
    }
}

pub struct AuthResolver {
    sessions: Arc<dyn SessionRepo>,
    participants: Arc<dyn ParticipantRepo>,
    clock: Arc<dyn ClockPort>,
}

impl AuthResolver {
    pub fn new(
        sessions: Arc<dyn SessionRepo>,
        participants: Arc<dyn ParticipantRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            sessions,
            participants,
            clock,
        }
    }

    /// Resolve the caller for `session_id`. A participant token wins over a
    /// host id when both are present.
    pub async fn resolve(
        &self,
        session_id: SessionId,
        credentials: &Credentials,
    ) -> Result<Viewer, PlayError> {
        let token = credentials.token();
        let user_id = credentials.user_id();
        if token.is_none() && user_id.is_none() {
            return Err(PlayError::MissingCredentials);
        }

        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| PlayError::not_found("Session", session_id))?;

        if let Some(token) = token {
            let participant = self.participant_for_token(session_id, token).await?;
            return Ok(Viewer::Participant(ParticipantViewer {
                participant,
                session,
            }));
        }

        let user_id = user_id
            .and_then(|id| UserId::new(id).ok())
            .ok_or(PlayError::MissingCredentials)?;
        if !session.is_hosted_by(&user_id) {
            return Err(PlayError::HostOnly);
        }
        Ok(Viewer::Host(HostViewer { user_id, session }))
    }

    pub async fn resolve_host(
        &self,
        session_id: SessionId,
        credentials: &Credentials,
    ) -> Result<HostViewer, PlayError> {
        match self.resolve(session_id, credentials).await? {
            Viewer::Host(host) => Ok(host),
            Viewer::Participant(_) => Err(PlayError::HostOnly),
        }
    }

    pub async fn resolve_participant(
        &self,
        session_id: SessionId,
        credentials: &Credentials,
    ) -> Result<ParticipantViewer, PlayError> {
        match self.resolve(session_id, credentials).await? {
            Viewer::Participant(p) => Ok(p),
            Viewer::Host(_) => Err(PlayError::ParticipantOnly),
        }
    }

    /// Host identity for operations not bound to one session (create, list).
    pub fn authenticate_host(&self, credentials: &Credentials) -> Result<UserId, PlayError> {
        match credentials.user_id() {
            Some(id) => UserId::new(id).map_err(|_| PlayError::MissingCredentials),
            None if credentials.token().is_some() => Err(PlayError::HostOnly),
            None => Err(PlayError::MissingCredentials),
        }
    }

    /// Token lookup scoped to the session, then revocation, then expiry.
    async fn participant_for_token(
        &self,
        session_id: SessionId,
        token: &str,
    ) -> Result<Participant, PlayError> {
        let token = ParticipantToken::new(token).map_err(|_| PlayError::InvalidToken)?;
        let participant = self
            .participants
            .get_by_token(session_id, &token)
            .await?
            .ok_or(PlayError::InvalidToken)?;

        match participant.check_access(self.clock.now()) {
            Ok(()) => Ok(participant),
            Err(AccessDenial::Revoked(status)) => Err(PlayError::ParticipantRevoked(status)),
            Err(AccessDenial::TokenExpired) => Err(PlayError::TokenExpired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{MockParticipantRepo, MockSessionRepo};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use liveplay_domain::{
        DisplayName, ParticipantRole, ParticipantStatus, SessionCode, SessionSettings, Title,
    };
    use mockall::predicate::eq;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn session() -> PlaySession {
        PlaySession::new(
            SessionCode::parse("QWERTY").unwrap(),
            UserId::new("host-1").unwrap(),
            Title::new("Quiz night").unwrap(),
            None,
            SessionSettings::default(),
            now(),
        )
    }

    fn participant(session_id: SessionId, expires: Option<DateTime<Utc>>) -> Participant {
        Participant::join(
            session_id,
            DisplayName::new("Ada").unwrap(),
            ParticipantRole::Player,
            ParticipantToken::new("tok").unwrap(),
            expires,
            false,
            now() - Duration::hours(1),
        )
        .unwrap()
    }

    fn resolver(session: PlaySession, participant: Option<Participant>) -> AuthResolver {
        let session_id = session.id();
        let mut sessions = MockSessionRepo::new();
        sessions
            .expect_get()
            .with(eq(session_id))
            .returning(move |_| Ok(Some(session.clone())));

        let mut participants = MockParticipantRepo::new();
        participants
            .expect_get_by_token()
            .returning(move |_, _| Ok(participant.clone()));

        AuthResolver::new(
            Arc::new(sessions),
            Arc::new(participants),
            Arc::new(FixedClock(now())),
        )
    }

    #[tokio::test]
    async fn no_credentials_is_unauthorized() {
        let s = session();
        let id = s.id();
        let result = resolver(s, None).resolve(id, &Credentials::default()).await;
        assert!(matches!(result, Err(PlayError::MissingCredentials)));
    }

    #[tokio::test]
    async fn host_must_own_the_session() {
        let s = session();
        let id = s.id();
        let auth = resolver(s, None);

        let viewer = auth.resolve(id, &Credentials::host("host-1")).await.unwrap();
        assert!(viewer.is_host());

        let result = auth.resolve(id, &Credentials::host("someone-else")).await;
        assert!(matches!(result, Err(PlayError::HostOnly)));
    }

    #[tokio::test]
    async fn participant_token_wins_over_host_id() {
        let s = session();
        let id = s.id();
        let p = participant(id, None);
        let auth = resolver(s, Some(p));

        let credentials = Credentials {
            participant_token: Some("tok".into()),
            host_user_id: Some("host-1".into()),
        };
        let viewer = auth.resolve(id, &credentials).await.unwrap();
        assert!(!viewer.is_host());
        assert!(matches!(
            auth.resolve_host(id, &credentials).await,
            Err(PlayError::HostOnly)
        ));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let s = session();
        let id = s.id();
        let result = resolver(s, None)
            .resolve(id, &Credentials::participant("nope"))
            .await;
        assert!(matches!(result, Err(PlayError::InvalidToken)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let s = session();
        let id = s.id();
        let p = participant(id, Some(now() - Duration::minutes(1)));
        let err = resolver(s, Some(p))
            .resolve(id, &Credentials::participant("tok"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::TokenExpired));
        assert_eq!(err.to_string(), "token expired");
    }

    #[tokio::test]
    async fn revocation_beats_a_valid_token() {
        let s = session();
        let id = s.id();
        let p = participant(id, Some(now() + Duration::hours(1)))
            .with_status(ParticipantStatus::Kicked);
        let result = resolver(s, Some(p))
            .resolve(id, &Credentials::participant("tok"))
            .await;
        assert!(matches!(
            result,
            Err(PlayError::ParticipantRevoked(ParticipantStatus::Kicked))
        ));
    }

    #[test]
    fn authenticate_host_requires_user_id() {
        let auth = resolver(session(), None);
        assert!(auth.authenticate_host(&Credentials::host("h")).is_ok());
        assert!(matches!(
            auth.authenticate_host(&Credentials::participant("tok")),
            Err(PlayError::HostOnly)
        ));
        assert!(matches!(
            auth.authenticate_host(&Credentials::default()),
            Err(PlayError::MissingCredentials)
        ));
    }
}
