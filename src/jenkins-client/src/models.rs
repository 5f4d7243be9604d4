//! Jenkins API payloads and the values handed back to callers.

use serde::{Deserialize, Serialize};

/// A build that has left the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Build number.
    pub number: u64,
    /// Absolute URL of the build page.
    pub url: String,
}

/// `GET <queue item>/api/json`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QueueItem {
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub why: Option<String>,
    #[serde(default)]
    pub executable: Option<BuildInfo>,
}

/// Artifact entry as listed on a build.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArtifactEntry {
    pub file_name: String,
    pub relative_path: String,
}

/// `GET <job>/lastBuild/api/json`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LastBuild {
    pub number: u64,
    /// Absolute URL of the build page, with a trailing slash.
    pub url: String,
    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,
}

/// A downloaded build artifact.
#[derive(Clone)]
pub struct ArtifactFile {
    /// File name without directories.
    pub file_name: String,
    /// Raw file content.
    pub content: Vec<u8>,
}

impl std::fmt::Debug for ArtifactFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactFile")
            .field("file_name", &self.file_name)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Artifacts of the last build of a job.
#[derive(Debug, Clone, Default)]
pub struct BuildArtifacts {
    /// Downloaded files.
    pub files: Vec<ArtifactFile>,
    /// Names of the artifacts skipped for exceeding `size_limit`.
    pub oversized: Vec<String>,
    /// Size limit in bytes the download was held to.
    pub size_limit: u64,
}

impl BuildArtifacts {
    /// Whether the build has no artifacts at all.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.oversized.is_empty()
    }
}

/// `GET <build>/testReport/api/json`
///
/// Freestyle jobs report `passCount`; aggregated reports only carry
/// `totalCount`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReportSummary {
    /// Failed tests.
    #[serde(default)]
    pub fail_count: u64,
    /// Skipped tests.
    #[serde(default)]
    pub skip_count: u64,
    /// Passed tests, when reported directly.
    #[serde(default)]
    pub pass_count: Option<u64>,
    /// Total tests, when reported directly.
    #[serde(default)]
    pub total_count: Option<u64>,
}

impl TestReportSummary {
    /// Number of passed tests, derived from the total when needed.
    pub fn passed(&self) -> u64 {
        match (self.pass_count, self.total_count) {
            (Some(passed), _) => passed,
            (None, Some(total)) => total.saturating_sub(self.fail_count + self.skip_count),
            (None, None) => 0,
        }
    }
}
