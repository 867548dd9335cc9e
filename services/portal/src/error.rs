//! services/portal/src/error.rs
//!
//! Defines the primary error type for the portal client.

use crate::config::ConfigError;
use portal_core::ports::PortError;

/// Generic text for failures the learner cannot act on.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";
/// Generic text for requests that never got an answer.
pub const NETWORK_FAILURE_MESSAGE: &str =
    "Unable to reach the portal. Please check your connection and try again.";

/// The primary error type for the `portal` client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from building the HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., writing a download).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A command that needs a session was run without one.
    #[error("Not logged in")]
    NotLoggedIn,

    /// The backend refused the credentials; carries the text to show.
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ClientError {
    /// The text shown to the learner. Details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::NotLoggedIn | ClientError::Port(PortError::Unauthorized(_)) => {
                "Your session has ended. Run `portal login` to sign in again.".to_string()
            }
            ClientError::Port(PortError::Network(_)) => NETWORK_FAILURE_MESSAGE.to_string(),
            ClientError::Port(PortError::Validation(message)) | ClientError::LoginFailed(message) => {
                message.clone()
            }
            ClientError::Port(PortError::NotFound(_)) => "Resource not found.".to_string(),
            ClientError::Port(PortError::Forbidden(_)) => "Access forbidden.".to_string(),
            ClientError::Config(e) => e.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}
