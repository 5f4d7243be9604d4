//! Mapping from user-facing job names to Jenkins URL paths.

use std::fmt;

/// A job name split into its folder segments.
///
/// `team/backend/deploy` lives at `/job/team/job/backend/job/deploy` on the
/// Jenkins server. Each segment is percent-encoded, so names containing
/// spaces are addressed correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPath {
    segments: Vec<String>,
}

impl JobPath {
    /// Split a job name on `/`, ignoring empty segments.
    ///
    /// Returns `None` when nothing is left, e.g. for `""` or `"//"`.
    pub fn parse(name: &str) -> Option<Self> {
        let segments: Vec<String> = name
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// URL path of the job, without a trailing slash.
    pub fn url_path(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("/job/{}", urlencoding::encode(s)))
            .collect()
    }
}

impl fmt::Display for JobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_job() {
        let path = JobPath::parse("deploy").unwrap();
        assert_eq!(path.url_path(), "/job/deploy");
        assert_eq!(path.to_string(), "deploy");
    }

    #[test]
    fn test_folder_job() {
        let path = JobPath::parse("team/backend/deploy").unwrap();
        assert_eq!(path.url_path(), "/job/team/job/backend/job/deploy");
    }

    #[test]
    fn test_spaces_are_encoded() {
        let path = JobPath::parse("my folder/nightly build").unwrap();
        assert_eq!(path.url_path(), "/job/my%20folder/job/nightly%20build");
    }

    #[test]
    fn test_empty_segments_dropped() {
        let path = JobPath::parse("/team//deploy/").unwrap();
        assert_eq!(path.url_path(), "/job/team/job/deploy");
        assert!(JobPath::parse("//").is_none());
        assert!(JobPath::parse("").is_none());
    }
}
