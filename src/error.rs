//! Error kinds returned by every portal operation.
//!
//! Errors are values: callers match on the kind and decide how to present
//! it. Nothing here is retried internally.

use sea_orm::{DbErr, SqlErr};

pub type PortalResult<T> = Result<T, PortalError>;

#[derive(Debug)]
pub enum PortalError {
    /// No valid session.
    Unauthenticated,
    /// Rank or ownership insufficient.
    Forbidden(String),
    /// Referenced entity does not exist.
    NotFound(&'static str),
    /// Malformed or missing required field.
    InvalidInput(String),
    AlreadyMember,
    TeamFull,
    DuplicateRequest,
    DuplicateInvite,
    /// Permanently barred from creating forum content.
    Banned,
    /// Temporarily or permanently barred from creating forum content.
    /// Carries the expiry, None when permanent.
    Silenced(Option<chrono::NaiveDateTime>),
    PostLocked,
    AlreadyRegistered,
    /// Persistence failure.
    Database(DbErr),
}

impl PortalError {
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        PortalError::Forbidden(msg.into())
    }

    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        PortalError::InvalidInput(msg.into())
    }

    /// True when the store rejected a write because of a unique index.
    pub fn is_unique_violation(err: &DbErr) -> bool {
        matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
    }
}

impl std::fmt::Display for PortalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortalError::Unauthenticated => write!(f, "Please login to access this feature."),
            PortalError::Forbidden(msg) => write!(f, "Access denied: {}", msg),
            PortalError::NotFound(what) => write!(f, "{} not found", what),
            PortalError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            PortalError::AlreadyMember => write!(f, "User is already in the team"),
            PortalError::TeamFull => write!(f, "Team is full"),
            PortalError::DuplicateRequest => write!(f, "Join request already sent"),
            PortalError::DuplicateInvite => write!(f, "User already invited"),
            PortalError::Banned => write!(f, "You are banned from the forum"),
            PortalError::Silenced(Some(until)) => write!(
                f,
                "You are silenced from posting until {}",
                until.format("%Y-%m-%d %H:%M")
            ),
            PortalError::Silenced(None) => write!(f, "You are permanently silenced from posting"),
            PortalError::PostLocked => write!(f, "This post is locked"),
            PortalError::AlreadyRegistered => {
                write!(f, "You have already registered for this event")
            }
            PortalError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PortalError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbErr> for PortalError {
    fn from(e: DbErr) -> Self {
        PortalError::Database(e)
    }
}
