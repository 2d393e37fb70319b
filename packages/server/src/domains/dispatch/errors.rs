use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use super::machines::IllegalTransition;
use super::models::RequestStatus;
use crate::common::{AuthError, HospitalId, InvalidCoordinate, RequestId, ResponderId};
use crate::domains::presence::PresenceError;

/// Every failure the dispatch engine reports to a caller.
///
/// Degraded dependencies never show up here; they are absorbed by the
/// fallbacks. Storage failures only appear when a write could not commit,
/// in which case the session was rolled back first.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("request {0} not found")]
    RequestNotFound(RequestId),

    #[error("responder {0} not found")]
    ResponderNotFound(ResponderId),

    #[error("hospital {0} not found")]
    HospitalNotFound(HospitalId),

    #[error("request {0} was already taken")]
    AlreadyTaken(RequestId),

    #[error("request {0} was already rated")]
    AlreadyRated(RequestId),

    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("{0}")]
    NotAuthorized(String),

    #[error("responder {0} is not available")]
    ResponderUnavailable(ResponderId),

    #[error("responder {0} is on duty")]
    ResponderBusy(ResponderId),

    #[error("storage failure: {0}")]
    Storage(#[source] anyhow::Error),
}

/// Coarse grouping used by the HTTP edge and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation_error"),
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::Conflict => write!(f, "conflict"),
            ErrorCategory::Unauthorized => write!(f, "unauthorized"),
            ErrorCategory::Internal => write!(f, "internal_error"),
        }
    }
}

impl DispatchError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_authorized(msg: impl Into<String>) -> Self {
        Self::NotAuthorized(msg.into())
    }

    /// Stable machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RequestNotFound(_) => "request_not_found",
            Self::ResponderNotFound(_) => "responder_not_found",
            Self::HospitalNotFound(_) => "hospital_not_found",
            Self::AlreadyTaken(_) => "already_taken",
            Self::AlreadyRated(_) => "already_rated",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotAuthorized(_) => "not_authorized",
            Self::ResponderUnavailable(_) => "responder_unavailable",
            Self::ResponderBusy(_) => "responder_busy",
            Self::Storage(_) => "storage",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::RequestNotFound(_) | Self::ResponderNotFound(_) | Self::HospitalNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::AlreadyTaken(_)
            | Self::AlreadyRated(_)
            | Self::InvalidTransition { .. }
            | Self::ResponderUnavailable(_)
            | Self::ResponderBusy(_) => ErrorCategory::Conflict,
            Self::NotAuthorized(_) => ErrorCategory::Unauthorized,
            Self::Storage(_) => ErrorCategory::Internal,
        }
    }

    /// Message safe to hand to clients. Internal failures stay generic.
    pub fn safe_message(&self) -> Cow<'static, str> {
        match self.category() {
            ErrorCategory::Internal => "A storage error occurred; nothing was changed".into(),
            _ => self.to_string().into(),
        }
    }
}

impl From<AuthError> for DispatchError {
    fn from(e: AuthError) -> Self {
        Self::NotAuthorized(e.to_string())
    }
}

impl From<IllegalTransition> for DispatchError {
    fn from(e: IllegalTransition) -> Self {
        Self::InvalidTransition {
            from: e.from,
            to: e.to,
        }
    }
}

impl From<InvalidCoordinate> for DispatchError {
    fn from(e: InvalidCoordinate) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<PresenceError> for DispatchError {
    fn from(e: PresenceError) -> Self {
        match e {
            PresenceError::NotFound(id) => Self::ResponderNotFound(id),
            PresenceError::Busy(id) => Self::ResponderBusy(id),
            PresenceError::AlreadyRegistered(id) => {
                Self::Validation(format!("responder {} is already registered", id))
            }
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
