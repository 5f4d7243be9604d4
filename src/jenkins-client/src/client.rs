//! Jenkins client implementation.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::LOCATION;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::error::{JenkinsError, Result};
use crate::job::JobPath;
use crate::models::{
    ArtifactEntry, ArtifactFile, BuildArtifacts, BuildInfo, LastBuild, QueueItem,
    TestReportSummary,
};
use crate::{
    DEFAULT_MAX_ARTIFACT_BYTES, DEFAULT_QUEUE_POLL_ATTEMPTS, DEFAULT_QUEUE_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Fields requested from `lastBuild/api/json`.
const LAST_BUILD_TREE: &str = "number,url,artifacts[fileName,relativePath]";

/// Fields requested from `testReport/api/json`.
const TEST_REPORT_TREE: &str = "failCount,skipCount,passCount,totalCount";

/// Jenkins username and API token.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    token: SecretString,
}

impl Credentials {
    /// Create credentials from a username and API token.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: SecretString::new(token.into().into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Tuning knobs for the client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout for each HTTP request.
    pub request_timeout: Duration,
    /// Maximum number of queue polls after triggering a build.
    pub queue_poll_attempts: u32,
    /// Delay between two queue polls.
    pub queue_poll_interval: Duration,
    /// Artifacts larger than this many bytes are not downloaded.
    pub max_artifact_bytes: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            queue_poll_attempts: DEFAULT_QUEUE_POLL_ATTEMPTS,
            queue_poll_interval: Duration::from_millis(DEFAULT_QUEUE_POLL_INTERVAL_MS),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }
}

/// Client for a single Jenkins server.
#[derive(Clone)]
pub struct JenkinsClient {
    client: reqwest::Client,
    base_url: String,
    options: ClientOptions,
}

impl JenkinsClient {
    /// Create a client for the Jenkins server at `base_url`.
    pub fn with_options(base_url: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(JenkinsError::InvalidUrl(base_url));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| JenkinsError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
        })
    }

    fn job_url(&self, job: &str) -> Result<String> {
        let path = JobPath::parse(job).ok_or_else(|| JenkinsError::JobNotFound(job.to_string()))?;
        Ok(format!("{}{}", self.base_url, path.url_path()))
    }

    fn get(&self, url: &str, credentials: &Credentials) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&credentials.username, Some(credentials.token.expose_secret()))
    }

    /// Check whether Jenkins accepts the username and API token.
    ///
    /// Returns `Ok(false)` when Jenkins answers 401 or 403, and an error for
    /// anything else that is not a success.
    pub async fn verify_credentials(&self, credentials: &Credentials) -> Result<bool> {
        let url = format!("{}/me/api/json", self.base_url);
        debug!(username = %credentials.username, "Verifying Jenkins credentials");

        let response = self.get(&url, credentials).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => Err(api_error(status, response).await),
        }
    }

    /// Trigger a build of `job` and wait for it to leave the queue.
    pub async fn trigger_build(&self, credentials: &Credentials, job: &str) -> Result<BuildInfo> {
        let url = format!("{}/build", self.job_url(job)?);
        debug!(job, "Triggering Jenkins build");

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.username, Some(credentials.token.expose_secret()))
            .send()
            .await?;
        let response = check_job_response(response, job).await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                JenkinsError::InvalidResponse(
                    "build trigger returned no queue location".to_string(),
                )
            })?;
        let queue_url = self.absolute(location);

        let build = self.wait_for_build(credentials, job, &queue_url).await?;
        info!(job, number = build.number, url = %build.url, "Jenkins build started");
        Ok(build)
    }

    async fn wait_for_build(
        &self,
        credentials: &Credentials,
        job: &str,
        queue_url: &str,
    ) -> Result<BuildInfo> {
        let url = format!("{}/api/json", queue_url.trim_end_matches('/'));

        for attempt in 1..=self.options.queue_poll_attempts {
            let response = self.get(&url, credentials).send().await?;
            if !response.status().is_success() {
                return Err(api_error(response.status(), response).await);
            }
            let item: QueueItem = response.json().await?;

            if let Some(build) = item.executable {
                return Ok(build);
            }
            if item.cancelled {
                return Err(JenkinsError::QueueCancelled(job.to_string()));
            }

            debug!(
                job,
                attempt,
                why = item.why.as_deref().unwrap_or("unknown"),
                "Build still queued"
            );
            tokio::time::sleep(self.options.queue_poll_interval).await;
        }

        warn!(job, "Build did not leave the queue in time");
        Err(JenkinsError::QueueTimeout {
            job: job.to_string(),
            attempts: self.options.queue_poll_attempts,
        })
    }

    /// Fetch the last build of `job`, including its artifact list.
    async fn last_build(&self, credentials: &Credentials, job: &str) -> Result<LastBuild> {
        let url = format!("{}/lastBuild/api/json", self.job_url(job)?);

        let response = self
            .get(&url, credentials)
            .query(&[("tree", LAST_BUILD_TREE)])
            .send()
            .await?;

        // A job that exists but never ran also answers 404 on lastBuild.
        if response.status() == StatusCode::NOT_FOUND {
            return Err(JenkinsError::NoBuilds(job.to_string()));
        }
        let response = check_job_response(response, job).await?;
        Ok(response.json().await?)
    }

    /// Download every artifact of the last build of `job`.
    ///
    /// Artifacts over [`ClientOptions::max_artifact_bytes`] are skipped and
    /// listed in [`BuildArtifacts::oversized`].
    pub async fn fetch_artifacts(
        &self,
        credentials: &Credentials,
        job: &str,
    ) -> Result<BuildArtifacts> {
        let build = self.last_build(credentials, job).await?;
        let mut artifacts = BuildArtifacts {
            files: Vec::with_capacity(build.artifacts.len()),
            oversized: Vec::new(),
            size_limit: self.options.max_artifact_bytes,
        };

        for artifact in &build.artifacts {
            match self.download_artifact(credentials, &build, artifact).await? {
                Some(content) => artifacts.files.push(ArtifactFile {
                    file_name: artifact.file_name.clone(),
                    content,
                }),
                None => {
                    warn!(
                        job,
                        artifact = %artifact.relative_path,
                        limit = artifacts.size_limit,
                        "Artifact too large, skipped"
                    );
                    artifacts.oversized.push(artifact.file_name.clone());
                }
            }
        }

        info!(
            job,
            number = build.number,
            count = artifacts.files.len(),
            oversized = artifacts.oversized.len(),
            "Fetched artifacts"
        );
        Ok(artifacts)
    }

    /// Download one artifact. `None` when it exceeds the size limit.
    async fn download_artifact(
        &self,
        credentials: &Credentials,
        build: &LastBuild,
        artifact: &ArtifactEntry,
    ) -> Result<Option<Vec<u8>>> {
        let path: Vec<String> = artifact
            .relative_path
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        let url = format!(
            "{}/artifact/{}",
            build.url.trim_end_matches('/'),
            path.join("/")
        );
        debug!(artifact = %artifact.relative_path, "Downloading artifact");

        let mut response = self.get(&url, credentials).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response.status(), response).await);
        }

        let limit = self.options.max_artifact_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Ok(None);
        }

        // Content-Length is missing on chunked responses.
        let mut content = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (content.len() + chunk.len()) as u64 > limit {
                return Ok(None);
            }
            content.extend_from_slice(&chunk);
        }
        Ok(Some(content))
    }

    /// Build a message linking to the test report of the last build of `job`.
    pub async fn test_report_link(&self, credentials: &Credentials, job: &str) -> Result<String> {
        let build = self.last_build(credentials, job).await?;
        let report_url = format!("{}/testReport", build.url.trim_end_matches('/'));

        let response = self
            .get(&format!("{}/api/json", report_url), credentials)
            .query(&[("tree", TEST_REPORT_TREE)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(format!(
                "Build #{} of '{}' has no test results.",
                build.number, job
            ));
        }
        if !response.status().is_success() {
            return Err(api_error(response.status(), response).await);
        }
        let summary: TestReportSummary = response.json().await?;

        Ok(format!(
            "Test results of build #{} of '{}': {} passed, {} failed, {} skipped.\nHere's the test report : {}",
            build.number,
            job,
            summary.passed(),
            summary.fail_count,
            summary.skip_count,
            report_url
        ))
    }

    fn absolute(&self, location: &str) -> String {
        if location.starts_with('/') {
            format!("{}{}", self.base_url, location)
        } else {
            location.to_string()
        }
    }

    /// Create a client pointed at a mock server, with a fast queue poll.
    #[cfg(test)]
    pub(crate) fn for_test(base_url: impl Into<String>, queue_poll_attempts: u32) -> Self {
        Self::with_options(
            base_url,
            ClientOptions {
                request_timeout: Duration::from_secs(5),
                queue_poll_attempts,
                queue_poll_interval: Duration::from_millis(1),
                ..ClientOptions::default()
            },
        )
        .unwrap()
    }
}

/// Map the status of a job-scoped response to an error, passing successes through.
async fn check_job_response(response: reqwest::Response, job: &str) -> Result<reqwest::Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(JenkinsError::JobNotFound(job.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(JenkinsError::Unauthorized {
            status: response.status().as_u16(),
        }),
        status => Err(api_error(status, response).await),
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> JenkinsError {
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown").to_string()
    } else {
        body.chars().take(200).collect()
    };
    JenkinsError::Api {
        status: status.as_u16(),
        message,
    }
}
