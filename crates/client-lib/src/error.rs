// crates/client-lib/src/error.rs

//! Central error type for the client core.
use thiserror::Error;

/// Application error types surfaced by the session, realtime, and location
/// components.
#[derive(Error, Debug)]
pub enum AppError {
    /// The API rejected the bearer token (HTTP 401). This is the only
    /// variant that triggers the refresh-and-retry path.
    #[error("Authentication required")]
    Unauthorized,

    /// An operation that needs a signed-in session was called without one
    #[error("Not signed in")]
    NotAuthenticated,

    /// Non-2xx API response other than 401
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Connectivity failure before an HTTP status was obtained
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential store failure (key material, cipher, corrupt record)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The platform position provider refused location access
    #[error("Location permission denied")]
    PermissionDenied,

    /// Realtime connection failure
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Whether this error is the bearer-rejection signal that a token
    /// refresh may resolve
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Unauthorized)
    }

    /// Whether this error is a connectivity problem rather than a server
    /// verdict
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Http(_) | AppError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_app_error_display() {
        assert_eq!(AppError::Unauthorized.to_string(), "Authentication required");
        assert_eq!(
            AppError::Api {
                status: 422,
                message: "email taken".to_string(),
            }
            .to_string(),
            "API error 422: email taken"
        );
        assert_eq!(
            AppError::Timeout("position fix").to_string(),
            "Timed out waiting for position fix"
        );

        let io_error = AppError::Io(IoError::new(ErrorKind::NotFound, "missing"));
        assert!(io_error.to_string().contains("IO error"));
    }

    #[test]
    fn test_unauthorized_predicate() {
        assert!(AppError::Unauthorized.is_unauthorized());
        assert!(!AppError::NotAuthenticated.is_unauthorized());
        assert!(!AppError::Api {
            status: 403,
            message: "forbidden".to_string(),
        }
        .is_unauthorized());
    }

    #[test]
    fn test_network_predicate() {
        assert!(AppError::Timeout("anything").is_network());
        assert!(!AppError::Unauthorized.is_network());
        assert!(!AppError::Storage("bad key".to_string()).is_network());
    }

    #[test]
    fn test_error_from_impls() {
        let io_err = IoError::new(ErrorKind::PermissionDenied, "denied");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));

        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Json(_)));
    }
}
