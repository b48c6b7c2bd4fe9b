//! Use-case error taxonomy.

use liveplay_domain::{DomainError, ParticipantStatus, SessionStatus};

use crate::infrastructure::ports::RepoError;

/// Coarse class of a [`PlayError`], one per HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidTransition,
    Gone,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InvalidTransition => 409,
            Self::Gone => 410,
            Self::Validation => 422,
            Self::Internal => 500,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("only the session host may do this")]
    HostOnly,
    #[error("only participants may do this")]
    ParticipantOnly,
    #[error("participant is {0}")]
    ParticipantRevoked(ParticipantStatus),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("no session with this code")]
    InvalidCode,
    #[error("session is full")]
    SessionFull,
    #[error("session is locked")]
    SessionLocked,
    #[error("session is not published yet")]
    SessionNotPublished,
    #[error("session ended")]
    SessionEnded,
    #[error("rejoining is disabled for this session")]
    RejoinDisabled,
    #[error("participant is awaiting host approval")]
    AwaitingApproval,
    #[error("session is {0}")]
    SessionNotActive(SessionStatus),
    #[error("results are not revealed yet")]
    NotRevealed,
    #[error("participant already voted")]
    AlreadyVoted,
    #[error("cannot {action} from {from}")]
    InvalidTransition { from: String, action: String },
    #[error("{0} was changed concurrently, retry")]
    WriteConflict(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl PlayError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredentials | Self::InvalidToken | Self::TokenExpired => {
                ErrorKind::Unauthorized
            }
            Self::HostOnly
            | Self::ParticipantOnly
            | Self::ParticipantRevoked(_)
            | Self::SessionFull
            | Self::SessionLocked
            | Self::SessionNotPublished
            | Self::RejoinDisabled
            | Self::AwaitingApproval
            | Self::SessionNotActive(_)
            | Self::NotRevealed => ErrorKind::Forbidden,
            Self::NotFound { .. } | Self::InvalidCode => ErrorKind::NotFound,
            Self::InvalidTransition { .. } | Self::WriteConflict(_) => {
                ErrorKind::InvalidTransition
            }
            Self::SessionEnded => ErrorKind::Gone,
            Self::Validation(_) | Self::AlreadyVoted => ErrorKind::Validation,
            Self::Repo(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Repo(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::HostOnly => "HOST_ONLY",
            Self::ParticipantOnly => "PARTICIPANT_ONLY",
            Self::ParticipantRevoked(_) => "PARTICIPANT_REVOKED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidCode => "INVALID_CODE",
            Self::SessionFull => "SESSION_FULL",
            Self::SessionLocked => "SESSION_LOCKED",
            Self::SessionNotPublished => "SESSION_NOT_PUBLISHED",
            Self::SessionEnded => "SESSION_ENDED",
            Self::RejoinDisabled => "REJOIN_DISABLED",
            Self::AwaitingApproval => "AWAITING_APPROVAL",
            Self::SessionNotActive(_) => "SESSION_NOT_ACTIVE",
            Self::NotRevealed => "NOT_REVEALED",
            Self::AlreadyVoted => "ALREADY_VOTED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::WriteConflict(_) => "WRITE_CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Repo(e) if e.is_not_found() => "NOT_FOUND",
            Self::Repo(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DomainError> for PlayError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { from, action } => {
                Self::InvalidTransition { from, action }
            }
            DomainError::Validation(msg) | DomainError::Constraint(msg) | DomainError::Parse(msg) => {
                Self::Validation(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_http_statuses() {
        assert_eq!(PlayError::TokenExpired.kind().status_code(), 401);
        assert_eq!(PlayError::TokenExpired.to_string(), "token expired");
        assert_eq!(PlayError::SessionFull.kind(), ErrorKind::Forbidden);
        assert_eq!(PlayError::InvalidCode.kind().status_code(), 404);
        assert_eq!(PlayError::SessionEnded.kind().status_code(), 410);
        assert_eq!(PlayError::AlreadyVoted.kind().status_code(), 422);
        assert_eq!(PlayError::WriteConflict("Session").kind().status_code(), 409);
        assert_eq!(
            PlayError::from(RepoError::database("get", "disk full")).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            PlayError::from(RepoError::not_found("Session", "x")).code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn domain_errors_convert() {
        let err: PlayError = DomainError::invalid_transition("draft", "pause").into();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(err.to_string(), "cannot pause from draft");

        let err: PlayError = DomainError::constraint("options are frozen").into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
