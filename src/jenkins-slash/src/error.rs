//! Error types for the slash command.
//!
//! Handler failures never reach the user as errors: the router turns them
//! into a short chat message and logs the detail. These types surface at
//! the edges instead (configuration, the HTTP server, collaborators).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jenkins_client::JenkinsError;
use thiserror::Error;

/// Errors produced by the slash-command service.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Jenkins call failed.
    #[error(transparent)]
    Jenkins(#[from] JenkinsError),

    /// Mattermost API call failed.
    #[error("Mattermost API error: {0}")]
    Chat(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Credential storage error.
    #[error("Credential storage error: {0}")]
    CredentialStorage(String),

    /// The incoming command did not carry the expected token.
    #[error("Invalid command token")]
    InvalidCommandToken,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for PluginError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            PluginError::Network(format!("Connection failed: {}", err))
        } else {
            PluginError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        PluginError::Json(err.to_string())
    }
}

impl From<keyring::Error> for PluginError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoStorageAccess(_) => {
                PluginError::CredentialStorage("Cannot access keyring storage".to_string())
            }
            keyring::Error::PlatformFailure(_) => {
                PluginError::CredentialStorage("Platform-specific keyring failure".to_string())
            }
            _ => PluginError::CredentialStorage(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for PluginError {
    fn from(err: toml::de::Error) -> Self {
        PluginError::Config(format!("Invalid config file: {}", err))
    }
}

impl From<tokio::task::JoinError> for PluginError {
    fn from(err: tokio::task::JoinError) -> Self {
        PluginError::Internal(format!("Background task failed: {}", err))
    }
}

impl PluginError {
    /// HTTP status used when the error escapes a request handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCommandToken => StatusCode::UNAUTHORIZED,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Result type for slash-command operations.
pub type PluginResult<T> = std::result::Result<T, PluginError>;
