//! Error types for Jenkins operations.

use thiserror::Error;

/// Errors that can occur while talking to Jenkins.
#[derive(Error, Debug)]
pub enum JenkinsError {
    /// The base URL could not be used to build request URLs.
    #[error("Invalid Jenkins URL: {0}")]
    InvalidUrl(String),

    /// Jenkins rejected the credentials.
    #[error("Authentication rejected by Jenkins (HTTP {status})")]
    Unauthorized {
        /// HTTP status returned by Jenkins.
        status: u16,
    },

    /// The job does not exist or is not visible to the user.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The job has never been built.
    #[error("Job '{0}' has no builds")]
    NoBuilds(String),

    /// Jenkins answered with an unexpected status.
    #[error("Jenkins API error: HTTP {status}: {message}")]
    Api {
        /// HTTP status returned by Jenkins.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Jenkins answered with a body we could not use.
    #[error("Invalid response from Jenkins: {0}")]
    InvalidResponse(String),

    /// The queued build was cancelled before it started.
    #[error("Queued build of '{0}' was cancelled")]
    QueueCancelled(String),

    /// The queued build did not start within the polling budget.
    #[error("Build of '{job}' did not leave the queue after {attempts} polls")]
    QueueTimeout {
        /// Job that was triggered.
        job: String,
        /// Number of polls performed.
        attempts: u32,
    },

    /// Request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for JenkinsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            JenkinsError::Timeout(err.to_string())
        } else if err.is_connect() {
            JenkinsError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            JenkinsError::InvalidResponse(err.to_string())
        } else {
            JenkinsError::Network(err.to_string())
        }
    }
}

/// Result type for Jenkins operations.
pub type Result<T> = std::result::Result<T, JenkinsError>;
