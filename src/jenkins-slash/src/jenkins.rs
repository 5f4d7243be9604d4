//! The Jenkins operations the router depends on.

use async_trait::async_trait;
use jenkins_client::{BuildArtifacts, BuildInfo, Credentials, JenkinsClient, JenkinsError};

use crate::store::JenkinsUserInfo;

/// Jenkins operations used by the command handlers.
#[async_trait]
pub trait JenkinsApi: Send + Sync {
    /// Check a username and API token. `Ok(false)` means Jenkins rejected them.
    async fn verify_credentials(&self, username: &str, token: &str) -> Result<bool, JenkinsError>;

    /// Trigger a build of `job` on behalf of `user`.
    async fn trigger_build(
        &self,
        user: &JenkinsUserInfo,
        job: &str,
    ) -> Result<BuildInfo, JenkinsError>;

    /// Download the artifacts of the last build of `job`, skipping any
    /// over the upload size limit.
    async fn fetch_artifacts(
        &self,
        user: &JenkinsUserInfo,
        job: &str,
    ) -> Result<BuildArtifacts, JenkinsError>;

    /// Message linking to the test report of the last build of `job`.
    async fn test_report_link(
        &self,
        user: &JenkinsUserInfo,
        job: &str,
    ) -> Result<String, JenkinsError>;
}

#[async_trait]
impl JenkinsApi for JenkinsClient {
    async fn verify_credentials(&self, username: &str, token: &str) -> Result<bool, JenkinsError> {
        JenkinsClient::verify_credentials(self, &Credentials::new(username, token)).await
    }

    async fn trigger_build(
        &self,
        user: &JenkinsUserInfo,
        job: &str,
    ) -> Result<BuildInfo, JenkinsError> {
        JenkinsClient::trigger_build(self, &user.credentials(), job).await
    }

    async fn fetch_artifacts(
        &self,
        user: &JenkinsUserInfo,
        job: &str,
    ) -> Result<BuildArtifacts, JenkinsError> {
        JenkinsClient::fetch_artifacts(self, &user.credentials(), job).await
    }

    async fn test_report_link(
        &self,
        user: &JenkinsUserInfo,
        job: &str,
    ) -> Result<String, JenkinsError> {
        JenkinsClient::test_report_link(self, &user.credentials(), job).await
    }
}
