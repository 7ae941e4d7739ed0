//! Error types for Airflow directory operations.
//!
//! Errors are categorized by HTTP status so callers can tell a missing user
//! from a rejected request or a transient outage without matching on codes.

use std::fmt;

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of directory errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection failures and timeouts (transient, retryable).
    Network,
    /// The addressed user does not exist (HTTP 404).
    NotFound,
    /// Credentials rejected or insufficient (HTTP 401/403).
    Auth,
    /// The user already exists (HTTP 409).
    Conflict,
    /// Request rejected as malformed (HTTP 400 and other 4xx).
    BadRequest,
    /// The server failed (HTTP 5xx, retryable).
    Server,
    /// Response body could not be decoded.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Server)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "User not found",
            Self::Auth => "Authentication failed",
            Self::Conflict => "User already exists",
            Self::BadRequest => "Request rejected by Airflow",
            Self::Server => "Airflow server error",
            Self::Format => "Invalid response format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the Airflow webserver is reachable and try again",
            Self::NotFound => "Verify the username; it may have been changed by an SSO layer",
            Self::Auth => "Check the configured credentials and the API auth backend",
            Self::Conflict => "Import the existing user instead of creating it",
            Self::BadRequest => "Check the user fields and role names",
            Self::Server => "Check the Airflow webserver logs and try again",
            Self::Format => "The API version may not be supported",
            Self::Other => "Check the error details for more information",
        }
    }

    fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            404 => Self::NotFound,
            409 => Self::Conflict,
            400..=499 => Self::BadRequest,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the Airflow user directory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed, either in transport or with a non-2xx status.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message (the API's problem detail when available).
        message: String,
        /// HTTP status code if a response was received.
        status: Option<u16>,
    },

    /// Response body could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The configured base URL cannot address the users collection.
    #[error("invalid Airflow API URL `{url}`: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// HTTP status of the failed request, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http {
                status: Some(status),
                ..
            } => ErrorCategory::from_status(*status),
            Error::Http { status: None, .. } => ErrorCategory::Network,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::InvalidUrl { .. } => ErrorCategory::Other,
        }
    }

    /// Whether the addressed user does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Conflict.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
        assert!(!ErrorCategory::Format.is_retryable());
        assert!(!ErrorCategory::Other.is_retryable());
    }

    #[test]
    fn test_error_category_from_status() {
        assert_eq!(Error::http("gone", Some(404)).category(), ErrorCategory::NotFound);
        assert_eq!(Error::http("denied", Some(401)).category(), ErrorCategory::Auth);
        assert_eq!(Error::http("denied", Some(403)).category(), ErrorCategory::Auth);
        assert_eq!(Error::http("exists", Some(409)).category(), ErrorCategory::Conflict);
        assert_eq!(Error::http("bad", Some(422)).category(), ErrorCategory::BadRequest);
        assert_eq!(Error::http("boom", Some(503)).category(), ErrorCategory::Server);
    }

    #[test]
    fn test_error_without_status_is_network() {
        let err = Error::http("connection refused", None);
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_is_not_found() {
        assert!(Error::http("User not found", Some(404)).is_not_found());
        assert!(!Error::http("boom", Some(500)).is_not_found());
        assert!(!Error::InvalidResponse("eof".to_string()).is_not_found());
    }

    #[test]
    fn test_error_status() {
        assert_eq!(Error::http("boom", Some(500)).status(), Some(500));
        assert_eq!(Error::InvalidResponse("eof".to_string()).status(), None);
    }

    #[test]
    fn test_error_category_description_and_advice() {
        assert!(!ErrorCategory::NotFound.description().is_empty());
        assert!(!ErrorCategory::Conflict.advice().is_empty());
        let display = format!("{}", ErrorCategory::Auth);
        assert!(display.contains("Authentication"));
    }

    #[test]
    fn test_error_from_status_code() {
        let err: Error = ureq::Error::StatusCode(409).into();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidUrl {
            url: "mailto:x".to_string(),
            reason: "cannot be a base".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("mailto:x"));
        assert!(display.contains("cannot be a base"));
    }
}
