use thiserror::Error;

use super::DispatchCapability;

/// Authorization errors for dispatch sessions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("not authorized to {capability}: {reason}")]
    NotAuthorized {
        capability: &'static str,
        reason: &'static str,
    },
}

impl AuthError {
    pub(super) fn denied(capability: DispatchCapability, reason: &'static str) -> Self {
        Self::NotAuthorized {
            capability: capability.as_str(),
            reason,
        }
    }
}
