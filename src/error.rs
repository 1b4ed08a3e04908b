use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

use crate::routes::callback::error_page;

/// Failures of the track relay flows.
///
/// User-facing handlers translate these into chat-safe text through
/// [`crate::presentation::error_message`]; the reason strings are for logs only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("user has not authorized")]
    NotAuthorized,
    #[error("nothing is playing")]
    NotPlaying,
    #[error("upstream rejected credentials: {0}")]
    UpstreamAuthExpired(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::UpstreamUnavailable(err.to_string())
    }
}

#[derive(Debug)]
pub enum AppError {
    Config(config::ConfigError),
    BadRequest(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "Configuration error: {}", err),
            AppError::BadRequest(msg) => write!(f, "{}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Persistence(msg) => AppError::Internal(msg),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, reason) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Html(error_page(reason))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let config_err = AppError::Config(config::ConfigError::NotFound("test".to_string()));
        assert!(config_err.to_string().contains("Configuration error"));

        let bad_request = AppError::BadRequest("Missing required parameters".to_string());
        assert_eq!(bad_request.to_string(), "Missing required parameters");

        let internal_err = AppError::Internal("test message".to_string());
        assert_eq!(internal_err.to_string(), "Internal error: test message");
    }

    #[test]
    fn test_app_error_from_relay_error() {
        let app_err: AppError = RelayError::UpstreamUnavailable("timeout".to_string()).into();
        assert!(matches!(app_err, AppError::BadRequest(_)));

        let app_err: AppError = RelayError::Persistence("disk full".to_string()).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }

    #[test]
    fn test_app_error_into_response() {
        let response = AppError::BadRequest("access_denied".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let config_err = AppError::Config(config::ConfigError::NotFound("test".to_string()));
        assert_eq!(
            config_err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_relay_error_display() {
        assert_eq!(RelayError::NotPlaying.to_string(), "nothing is playing");
        assert_eq!(
            RelayError::UpstreamAuthExpired("invalid_grant".to_string()).to_string(),
            "upstream rejected credentials: invalid_grant"
        );
    }
}
