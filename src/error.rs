//! Error taxonomy for portal operations.

use std::fmt;

/// Reasons the portal can reject a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The username/password pair was rejected.
    InvalidCredentials,
    /// The account is temporarily locked after repeated attempts.
    TooManyAttempts,
    /// The portal refused the login without a recognisable reason.
    Unknown,
}

impl AuthFailure {
    /// One-line message matching the portal's observable behaviour.
    pub fn message(self) -> &'static str {
        match self {
            AuthFailure::InvalidCredentials => "Invalid credentials",
            AuthFailure::TooManyAttempts => "Too many login attempts",
            AuthFailure::Unknown => "An unknown error occurred",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Errors surfaced by session and client operations.
///
/// Callers that need differentiated handling branch on the variant:
/// `Auth` means re-prompting for credentials can help, `Transport` is a
/// network-level condition, `RequestFailed` carries the offending status.
#[derive(Debug)]
pub enum Error {
    /// Bad constructor or method arguments.
    Configuration(String),
    /// The portal rejected a login attempt.
    Auth(AuthFailure),
    /// A request completed with a status outside the accepted range.
    RequestFailed { status: u16 },
    /// No valid authorisation header could be obtained for an
    /// authenticated call.
    Unauthorised,
    /// Transport-level failure (DNS, connection, body read).
    Transport(reqwest::Error),
    /// The response body or headers did not match the expected shape.
    InvalidResponse(String),
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub(crate) fn request_failed(status: reqwest::StatusCode) -> Self {
        Error::RequestFailed {
            status: status.as_u16(),
        }
    }

    pub(crate) fn invalid_response(message: impl Into<String>) -> Self {
        Error::InvalidResponse(message.into())
    }

    /// Returns the login failure kind, if this is an authentication error.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            Error::Auth(failure) => Some(*failure),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(message) | Error::InvalidResponse(message) => {
                write!(f, "{message}")
            }
            Error::Auth(failure) => write!(f, "{failure}"),
            Error::RequestFailed { status } => {
                write!(f, "Request failed with status code {status}")
            }
            Error::Unauthorised => write!(f, "Unable to obtain valid authorisation header"),
            Error::Transport(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err)
    }
}

/// Result type for portal operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: auth failure messages match the portal's observable strings.
    #[test]
    fn test_auth_failure_messages() {
        assert_eq!(
            AuthFailure::InvalidCredentials.to_string(),
            "Invalid credentials"
        );
        assert_eq!(
            AuthFailure::TooManyAttempts.to_string(),
            "Too many login attempts"
        );
        assert_eq!(
            AuthFailure::Unknown.to_string(),
            "An unknown error occurred"
        );
    }

    /// Test: request failures carry the status in the message.
    #[test]
    fn test_request_failed_display() {
        let err = Error::request_failed(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Request failed with status code 404");
    }

    /// Test: the unauthorised condition has a fixed message.
    #[test]
    fn test_unauthorised_display() {
        assert_eq!(
            Error::Unauthorised.to_string(),
            "Unable to obtain valid authorisation header"
        );
    }

    /// Test: `auth_failure` extracts the kind only from auth errors.
    #[test]
    fn test_auth_failure_accessor() {
        let err = Error::Auth(AuthFailure::TooManyAttempts);
        assert_eq!(err.auth_failure(), Some(AuthFailure::TooManyAttempts));
        assert_eq!(Error::Unauthorised.auth_failure(), None);
    }
}
