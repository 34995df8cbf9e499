use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use botscope::data::ErrorBody;
use botscope::errors::SessionError;
use botscope::log;
use botscope::serde_json;

/// Errors a handler reports back to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid payload: {0}")]
    Session(#[from] SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::warn!("Rejected request: {}", self);
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_errors_become_bad_requests() {
        let error = ApiError::from(SessionError::ScoreOutOfRange(120));
        assert_eq!(
            error.to_string(),
            "Invalid payload: score must be between 0 and 100, got 120"
        );
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_json_becomes_a_bad_request() {
        let error = ApiError::from(serde_json::from_str::<u8>("{").unwrap_err());
        assert!(error.to_string().starts_with("Invalid payload: "));
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
