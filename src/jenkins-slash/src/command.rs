//! Slash command payloads and responses.
//!
//! Mattermost posts a form-encoded payload to the command URL and expects
//! a JSON [`CommandResponse`] back. Everything after the immediate
//! response goes through [`crate::ChatHost`].

use serde::{Deserialize, Serialize};

/// Trigger word the command is registered under.
pub const DEFAULT_TRIGGER: &str = "jenkins";

/// Name shown as the author of command responses.
pub const DEFAULT_DISPLAY_NAME: &str = "Jenkins";

/// Text returned by `/jenkins help`.
pub const HELP_TEXT: &str = "* |/jenkins connect username APIToken| - Connect your Mattermost account to Jenkins
* |/jenkins build jobname| - Trigger a job build
* |/jenkins build \"jobname with space\"| - Trigger a job which has space in the job name. Note the double quotes
* |/jenkins build folder/jobname| - Trigger a job inside a folder. Note the character '/'
* |/jenkins build \"folder name/job name with space\"| - Trigger a job inside a folder with space in job name or folder name. Note double quotes and the character '/'
* |/jenkins get-artifacts jobname| - Upload the artifacts of the last build of a job
* |/jenkins test-results jobname| - Get the test results of the last build of a job
Job names cannot contain double quotes.";

/// Slash command payload sent by Mattermost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlashCommandPayload {
    /// Verification token of the command.
    #[serde(default)]
    pub token: String,
    /// Team ID.
    #[serde(default)]
    pub team_id: String,
    /// Team domain.
    #[serde(default)]
    pub team_domain: String,
    /// Channel ID where command was invoked.
    pub channel_id: String,
    /// Channel name.
    #[serde(default)]
    pub channel_name: String,
    /// User ID who invoked the command.
    pub user_id: String,
    /// Username.
    #[serde(default)]
    pub user_name: String,
    /// The command (e.g., "/jenkins").
    pub command: String,
    /// Text after the command.
    #[serde(default)]
    pub text: String,
    /// URL for delayed responses.
    #[serde(default)]
    pub response_url: String,
    /// Trigger ID for interactive dialogs.
    #[serde(default)]
    pub trigger_id: String,
}

/// What a handler needs to know about one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgs {
    /// Full command line, trigger included (e.g. `/jenkins build app`).
    pub command: String,
    /// User who invoked the command.
    pub user_id: String,
    /// Channel the command was invoked in.
    pub channel_id: String,
}

impl CommandArgs {
    /// Build args from a raw command line.
    pub fn new(
        command: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

impl From<&SlashCommandPayload> for CommandArgs {
    fn from(payload: &SlashCommandPayload) -> Self {
        let command = if payload.text.trim().is_empty() {
            payload.command.clone()
        } else {
            format!("{} {}", payload.command, payload.text)
        };
        Self::new(command, &payload.user_id, &payload.channel_id)
    }
}

/// Who can see a command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Only visible to the user who invoked the command.
    #[default]
    Ephemeral,
    /// Visible to everyone in the channel.
    InChannel,
}

/// Immediate response to a slash command.
///
/// The default value has every field unset and serializes to `{}`, which
/// Mattermost treats as "nothing to show".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Response type (ephemeral or in_channel).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    /// Display name of the post author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Avatar of the post author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Message text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Post type; empty for a regular post.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
}

impl CommandResponse {
    /// The no-op response.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this is the no-op response.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Registration details for the slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    /// Trigger word without the leading slash.
    pub trigger: String,
    /// Description shown in the command list.
    pub description: String,
    /// Display name of the integration.
    pub display_name: String,
    /// Whether Mattermost should autocomplete the command.
    pub auto_complete: bool,
    /// Autocomplete description.
    pub auto_complete_desc: String,
    /// Autocomplete hint.
    pub auto_complete_hint: String,
}

/// Describe the `/jenkins` command for registration.
pub fn command_definition(trigger: &str, display_name: &str) -> CommandDefinition {
    CommandDefinition {
        trigger: trigger.trim_start_matches('/').to_string(),
        description: "Interact with Jenkins from Mattermost".to_string(),
        display_name: display_name.to_string(),
        auto_complete: true,
        auto_complete_desc:
            "Available commands: connect, build, get-artifacts, test-results, help".to_string(),
        auto_complete_hint: "[command]".to_string(),
    }
}
