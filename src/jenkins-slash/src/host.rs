//! Side-channel posts to the chat host.
//!
//! The immediate command response is returned over HTTP; anything else
//! ("Fetching..." notices, test report links, uploaded artifacts) is
//! posted through the Mattermost REST API with the bot token. The same
//! client registers the slash command at startup.

use std::time::Duration;

use async_trait::async_trait;
use jenkins_client::ArtifactFile;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::command::CommandDefinition;
use crate::error::{PluginError, PluginResult};

/// Mattermost accepts at most this many files on one post.
const MAX_FILES_PER_POST: usize = 5;

/// Posting operations on the chat host.
#[async_trait]
pub trait ChatHost: Send + Sync {
    /// Post a message only `user_id` can see in `channel_id`.
    async fn post_ephemeral(
        &self,
        user_id: &str,
        channel_id: &str,
        message: &str,
    ) -> PluginResult<()>;

    /// Upload files to `channel_id` as posts carrying `message`.
    async fn upload_files(
        &self,
        channel_id: &str,
        message: &str,
        files: Vec<ArtifactFile>,
    ) -> PluginResult<()>;
}

#[derive(Debug, Deserialize)]
struct FileUploadResponse {
    #[serde(default)]
    file_infos: Vec<FileInfo>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    id: String,
}

/// `POST /api/v4/commands` body.
#[derive(Serialize)]
struct CommandRegistration<'a> {
    team_id: &'a str,
    url: &'a str,
    /// `P` for POST.
    method: &'static str,
    #[serde(flatten)]
    definition: &'a CommandDefinition,
}

/// A custom slash command as Mattermost lists it.
#[derive(Debug, Deserialize)]
struct RegisteredCommand {
    trigger: String,
    token: String,
    #[serde(default)]
    url: String,
}

/// [`ChatHost`] backed by the Mattermost REST API (v4).
#[derive(Clone)]
pub struct MattermostHost {
    client: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

impl std::fmt::Debug for MattermostHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattermostHost")
            .field("base_url", &self.base_url)
            .field("bot_token", &"[REDACTED]")
            .finish()
    }
}

impl MattermostHost {
    /// Create a host client for the server at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        bot_token: SecretString,
        timeout: Duration,
    ) -> PluginResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PluginError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4/{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response, what: &str) -> PluginResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("Mattermost {} failed: {} - {}", what, status, body);
        Err(PluginError::Chat(format!("{} failed: {} - {}", what, status, body)))
    }

    /// Register the slash command on `team_id`, pointing Mattermost at
    /// `url`, and return the token Mattermost sends with each invocation.
    ///
    /// A command already registered with the same trigger is reused.
    pub async fn register_command(
        &self,
        team_id: &str,
        url: &str,
        definition: &CommandDefinition,
    ) -> PluginResult<SecretString> {
        let response = self
            .client
            .get(self.api_url("commands"))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("team_id", team_id), ("custom_only", "true")])
            .send()
            .await?;
        let existing: Vec<RegisteredCommand> = Self::check(response, "command listing")
            .await?
            .json()
            .await?;

        if let Some(command) = existing
            .into_iter()
            .find(|command| command.trigger == definition.trigger)
        {
            if command.url != url {
                warn!(
                    trigger = %definition.trigger,
                    registered = %command.url,
                    configured = %url,
                    "Slash command is registered with another URL"
                );
            }
            info!(trigger = %definition.trigger, team_id, "Slash command already registered");
            return Ok(SecretString::new(command.token.into()));
        }

        let body = CommandRegistration {
            team_id,
            url,
            method: "P",
            definition,
        };
        let response = self
            .client
            .post(self.api_url("commands"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?;
        let created: RegisteredCommand = Self::check(response, "command registration")
            .await?
            .json()
            .await?;

        info!(trigger = %created.trigger, team_id, "Registered slash command");
        Ok(SecretString::new(created.token.into()))
    }

    async fn upload_batch(
        &self,
        channel_id: &str,
        files: Vec<ArtifactFile>,
    ) -> PluginResult<Vec<String>> {
        let mut form = Form::new().text("channel_id", channel_id.to_string());
        for file in files {
            form = form.part("files", Part::bytes(file.content).file_name(file.file_name));
        }

        let response = self
            .client
            .post(self.api_url("files"))
            .bearer_auth(self.bot_token.expose_secret())
            .multipart(form)
            .send()
            .await?;
        let uploaded: FileUploadResponse = Self::check(response, "file upload")
            .await?
            .json()
            .await?;

        Ok(uploaded.file_infos.into_iter().map(|info| info.id).collect())
    }
}

#[async_trait]
impl ChatHost for MattermostHost {
    async fn post_ephemeral(
        &self,
        user_id: &str,
        channel_id: &str,
        message: &str,
    ) -> PluginResult<()> {
        let body = serde_json::json!({
            "user_id": user_id,
            "post": {
                "channel_id": channel_id,
                "message": message,
            }
        });

        let response = self
            .client
            .post(self.api_url("posts/ephemeral"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?;
        Self::check(response, "ephemeral post").await?;

        debug!(user_id, channel_id, "Posted ephemeral message");
        Ok(())
    }

    async fn upload_files(
        &self,
        channel_id: &str,
        message: &str,
        files: Vec<ArtifactFile>,
    ) -> PluginResult<()> {
        let mut files = files.into_iter().peekable();

        while files.peek().is_some() {
            let batch: Vec<ArtifactFile> = files.by_ref().take(MAX_FILES_PER_POST).collect();
            let file_ids = self.upload_batch(channel_id, batch).await?;

            let body = serde_json::json!({
                "channel_id": channel_id,
                "message": message,
                "file_ids": file_ids,
            });
            let response = self
                .client
                .post(self.api_url("posts"))
                .bearer_auth(self.bot_token.expose_secret())
                .json(&body)
                .send()
                .await?;
            Self::check(response, "file post").await?;
        }

        debug!(channel_id, "Uploaded files");
        Ok(())
    }
}
