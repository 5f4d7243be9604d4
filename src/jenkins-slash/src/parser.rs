//! Command line tokenizing and job-name reconstruction.
//!
//! Mattermost hands over the command as one string. It is split on
//! whitespace, so a job name containing spaces arrives as several tokens
//! and has to be put back together from its double-quoted form.

use std::fmt;

/// Action requested by the second token of the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `connect <username> <token>`
    Connect,
    /// `build <job>`
    Build,
    /// `get-artifacts <job>`
    GetArtifacts,
    /// `test-results <job>`
    TestResults,
    /// `help`
    Help,
    /// Anything else, including a missing action (empty string).
    Unknown(String),
}

impl Action {
    /// Map an action keyword to an action. Matching is case-sensitive.
    pub fn parse(keyword: &str) -> Self {
        match keyword {
            "connect" => Self::Connect,
            "build" => Self::Build,
            "get-artifacts" => Self::GetArtifacts,
            "test-results" => Self::TestResults,
            "help" => Self::Help,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connect"),
            Self::Build => f.write_str("build"),
            Self::GetArtifacts => f.write_str("get-artifacts"),
            Self::TestResults => f.write_str("test-results"),
            Self::Help => f.write_str("help"),
            Self::Unknown(keyword) => f.write_str(keyword),
        }
    }
}

/// A tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// First token, e.g. `/jenkins`.
    pub trigger: String,
    /// Second token.
    pub action: Action,
    /// Everything after the action.
    pub parameters: Vec<String>,
}

impl CommandInvocation {
    /// Split a command line on whitespace.
    ///
    /// Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().map(str::to_string);
        let trigger = tokens.next()?;
        let action = Action::parse(tokens.next().as_deref().unwrap_or_default());

        Some(Self {
            trigger,
            action,
            parameters: tokens.collect(),
        })
    }
}

/// Rebuild a job name from two or more parameter tokens.
///
/// The tokens must form exactly one double-quoted phrase: the first token
/// opens the quote, the last one closes it, and no token in between ends
/// with a quote. The tokens are rejoined with single spaces and the outer
/// quotes are stripped, so `["\"my", "job\""]` gives `my job`.
///
/// Unquoted multi-token input is rejected rather than guessed at. There is
/// no escaping: a job name cannot itself contain a double quote, and runs
/// of whitespace inside the quotes collapse to one space. Whitespace just
/// inside the quotes is dropped (`" job"` gives `job`), and a phrase with
/// nothing but whitespace is rejected.
pub fn parse_job_name(parameters: &[String]) -> Option<String> {
    let (first, rest) = parameters.split_first()?;
    if !first.starts_with('"') {
        return None;
    }

    let closing = if first.len() > 1 && first.ends_with('"') {
        0
    } else {
        1 + rest.iter().position(|token| token.ends_with('"'))?
    };

    // Anything after the closing quote makes the input ambiguous.
    if closing + 1 != parameters.len() {
        return None;
    }

    let joined = parameters.join(" ");
    let name = joined.strip_prefix('"')?.strip_suffix('"')?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_invocation_parse() {
        let invocation = CommandInvocation::parse("/jenkins build  \"my   job\" ").unwrap();
        assert_eq!(invocation.trigger, "/jenkins");
        assert_eq!(invocation.action, Action::Build);
        assert_eq!(invocation.parameters, vec!["\"my", "job\""]);
    }

    #[test]
    fn test_invocation_without_action() {
        let invocation = CommandInvocation::parse("/jenkins").unwrap();
        assert_eq!(invocation.action, Action::Unknown(String::new()));
        assert!(invocation.parameters.is_empty());
    }

    #[test]
    fn test_invocation_blank_line() {
        assert!(CommandInvocation::parse("   ").is_none());
    }

    #[test]
    fn test_action_keywords() {
        for keyword in ["connect", "build", "get-artifacts", "test-results", "help"] {
            let action = Action::parse(keyword);
            assert!(!matches!(action, Action::Unknown(_)));
            assert_eq!(action.to_string(), keyword);
        }
        assert_eq!(Action::parse("Build"), Action::Unknown("Build".to_string()));
    }

    #[test]
    fn test_quoted_two_tokens() {
        assert_eq!(parse_job_name(&tokens("\"my job\"")), Some("my job".to_string()));
    }

    #[test]
    fn test_quoted_folder_path() {
        assert_eq!(
            parse_job_name(&tokens("\"folder name/job name with space\"")),
            Some("folder name/job name with space".to_string())
        );
    }

    #[test]
    fn test_quoted_phrases_of_any_length() {
        for words in 2..8 {
            let parts: Vec<String> = (0..words).map(|i| format!("w{}", i)).collect();
            let mut input = parts.clone();
            input[0] = format!("\"{}", input[0]);
            let last = input.len() - 1;
            input[last] = format!("{}\"", input[last]);

            assert_eq!(parse_job_name(&input), Some(parts.join(" ")));
        }
    }

    #[test]
    fn test_unquoted_tokens_rejected() {
        for line in ["my job", "folder/job extra", "a b c d", "job\" x\"", "a \"b c\""] {
            assert_eq!(parse_job_name(&tokens(line)), None, "{}", line);
        }
    }

    #[test]
    fn test_missing_closing_quote() {
        assert_eq!(parse_job_name(&tokens("\"my job")), None);
        assert_eq!(parse_job_name(&tokens("\"my long job name")), None);
    }

    #[test]
    fn test_tokens_after_closing_quote() {
        assert_eq!(parse_job_name(&tokens("\"my job\" now")), None);
        assert_eq!(parse_job_name(&tokens("\"job\" extra")), None);
        assert_eq!(parse_job_name(&tokens("\"a b\" \"c d\"")), None);
    }

    #[test]
    fn test_lone_quote_tokens() {
        assert_eq!(parse_job_name(&tokens("\" job\"")), Some("job".to_string()));
        assert_eq!(parse_job_name(&tokens("\"my job \"")), Some("my job".to_string()));
        assert_eq!(parse_job_name(&tokens("\" \"")), None);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_job_name(&[]), None);
    }
}
