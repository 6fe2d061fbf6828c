//! API error type and its HTTP mapping.
//!
//! Every error leaves the service as the same JSON envelope the tool
//! expects: `{"success": false, "error": "..."}` with a matching status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors a handler can return.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Missing or invalid credentials
    #[error("Authentication required")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("Admin access required")]
    Forbidden,

    /// Malformed request payload
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Entity missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflicting state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Anything that is the panel's fault
    #[error("Internal error")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience `Result` type alias for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {self:?}");
        }
        let message = match &self {
            // Internal details stay in the log.
            ApiError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({"success": false, "error": message}))).into_response()
    }
}

impl From<panel_store::Error> for ApiError {
    fn from(err: panel_store::Error) -> Self {
        use panel_store::Error as E;
        match err {
            E::NotFound { what, key } => ApiError::NotFound(format!("{what} '{key}'")),
            E::Conflict(message) => ApiError::Conflict(message),
            E::InvalidInvite(_) => ApiError::BadRequest(err.to_string()),
            E::BadLog { .. } => ApiError::BadRequest(err.to_string()),
            E::Core(core) => core.into(),
            other => ApiError::Internal(Box::new(other)),
        }
    }
}

impl From<panel_core::Error> for ApiError {
    fn from(err: panel_core::Error) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<panel_github::Error> for ApiError {
    fn from(err: panel_github::Error) -> Self {
        ApiError::Internal(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_404() {
        let err: ApiError = panel_store::Error::not_found("report", "42").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_400() {
        let err: ApiError = panel_core::Error::validation("results must not be empty").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_hides_details() {
        let err = ApiError::Internal("secret db path".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
