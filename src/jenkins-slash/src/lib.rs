//! Mattermost `/jenkins` slash command.
//!
//! Lets chat users drive a Jenkins server:
//! - `/jenkins connect <username> <token>` - store Jenkins credentials
//! - `/jenkins build <job>` - trigger a build
//! - `/jenkins get-artifacts <job>` - upload the last build's artifacts
//! - `/jenkins test-results <job>` - link the last build's test report
//! - `/jenkins help` - list the commands
//!
//! # Architecture
//!
//! [`CommandRouter`] parses the command line and dispatches to a handler.
//! Handlers talk to three collaborators, each behind a trait:
//! - [`JenkinsApi`] - the Jenkins server ([`jenkins_client::JenkinsClient`])
//! - [`CredentialStore`] - per-user Jenkins credentials (OS keyring or memory)
//! - [`ChatHost`] - side-channel posts to Mattermost
//!
//! The [`server`] module exposes the router over HTTP so Mattermost can
//! call it as a custom slash command.
//!
//! # Configuration
//!
//! Required environment variables (or a TOML file, see [`PluginConfig`]):
//! - `JENKINS_URL` - base URL of the Jenkins server
//! - `MATTERMOST_URL` - base URL of the Mattermost server
//! - `MATTERMOST_BOT_TOKEN` - bot access token used for side-channel posts
//!
//! With `MATTERMOST_TEAM_ID` and `JENKINS_SLASH_COMMAND_URL` set, the
//! command registers itself on that team at startup.

pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod jenkins;
pub mod parser;
pub mod router;
pub mod server;
pub mod store;

pub use command::{CommandArgs, CommandResponse, ResponseType, SlashCommandPayload};
pub use config::PluginConfig;
pub use error::{PluginError, PluginResult};
pub use host::{ChatHost, MattermostHost};
pub use jenkins::JenkinsApi;
pub use parser::{Action, CommandInvocation, parse_job_name};
pub use router::CommandRouter;
pub use store::{
    CredentialBackend, CredentialStore, JenkinsUserInfo, KeyringCredentialStore,
    MemoryCredentialStore,
};
