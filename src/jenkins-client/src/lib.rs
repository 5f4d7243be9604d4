//! Jenkins REST client.
//!
//! Covers the handful of Jenkins endpoints the slash-command integration
//! needs: credential verification, triggering a job, and reading the last
//! build of a job (artifacts and test report).
//!
//! Every request authenticates with HTTP basic auth using a Jenkins
//! username and API token, so no CSRF crumb is required.

mod client;
mod error;
mod job;
mod models;

pub use client::{ClientOptions, Credentials, JenkinsClient};
pub use error::{JenkinsError, Result};
pub use job::JobPath;
pub use models::{ArtifactFile, BuildArtifacts, BuildInfo, TestReportSummary};

/// Default timeout for a single Jenkins request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of queue polls before giving up on a triggered build.
pub const DEFAULT_QUEUE_POLL_ATTEMPTS: u32 = 10;

/// Default delay between two queue polls, in milliseconds.
pub const DEFAULT_QUEUE_POLL_INTERVAL_MS: u64 = 1000;

/// Default artifact size limit, matching Mattermost's default maximum
/// file size (100 MiB).
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 100 * 1024 * 1024;
