//! Maps dispatch errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domains::dispatch::{DispatchError, ErrorCategory};

/// Handler error; wraps the engine's error so handlers can use `?`.
#[derive(Debug)]
pub struct ApiError(pub DispatchError);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable reason code
    pub code: &'static str,
    pub category: String,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Unauthorized => StatusCode::FORBIDDEN,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Internal => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        } else {
            tracing::debug!(code = self.0.code(), "request rejected");
        }

        let body = ErrorResponse {
            code: self.0.code(),
            category: self.0.category().to_string(),
            message: self.0.safe_message().into_owned(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{RequestId, ResponderId};
    use crate::domains::dispatch::models::RequestStatus;

    #[test]
    fn test_status_mapping() {
        let id = RequestId::new();
        let cases = [
            (DispatchError::validation("bad"), StatusCode::BAD_REQUEST),
            (DispatchError::RequestNotFound(id), StatusCode::NOT_FOUND),
            (DispatchError::not_authorized("no"), StatusCode::FORBIDDEN),
            (DispatchError::AlreadyTaken(id), StatusCode::CONFLICT),
            (
                DispatchError::InvalidTransition {
                    from: RequestStatus::Accepted,
                    to: RequestStatus::PatientPicked,
                },
                StatusCode::CONFLICT,
            ),
            (
                DispatchError::ResponderBusy(ResponderId::new()),
                StatusCode::CONFLICT,
            ),
            (
                DispatchError::Storage(anyhow::anyhow!("down")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError(err).status_code(), expected);
        }
    }
}
