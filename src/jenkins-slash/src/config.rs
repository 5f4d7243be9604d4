//! Service configuration.
//!
//! Loaded from a TOML file or from environment variables:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `JENKINS_URL` | Jenkins base URL (required) |
//! | `MATTERMOST_URL` | Mattermost base URL (required) |
//! | `MATTERMOST_BOT_TOKEN` | Bot access token (required) |
//! | `MATTERMOST_COMMAND_TOKEN` | Expected slash command token |
//! | `JENKINS_PROFILE_IMAGE_URL` | Avatar of command responses |
//! | `JENKINS_SLASH_LISTEN` | Listen address |
//! | `JENKINS_SLASH_KEYRING_SERVICE` | Keyring service for credentials |
//! | `JENKINS_SLASH_CREDENTIAL_STORE` | `keyring` (default) or `memory` |
//! | `MATTERMOST_TEAM_ID` | Team to register the command on |
//! | `JENKINS_SLASH_COMMAND_URL` | Public URL of `/jenkins/command` |
//!
//! The command is registered at startup when both `MATTERMOST_TEAM_ID`
//! and `JENKINS_SLASH_COMMAND_URL` are set.

use std::path::Path;
use std::time::Duration;

use jenkins_client::{
    ClientOptions, DEFAULT_MAX_ARTIFACT_BYTES, DEFAULT_QUEUE_POLL_ATTEMPTS,
    DEFAULT_QUEUE_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::command::{
    CommandDefinition, DEFAULT_DISPLAY_NAME, DEFAULT_TRIGGER, command_definition,
};
use crate::error::{PluginError, PluginResult};
use crate::router::ResponseStyle;
use crate::store::{CredentialBackend, DEFAULT_KEYRING_SERVICE};

/// Jenkins connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JenkinsSettings {
    /// Base URL, e.g. `https://ci.example.com`.
    pub url: String,

    /// Timeout of one Jenkins request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Queue polls after triggering a build.
    #[serde(default = "default_queue_poll_attempts")]
    pub queue_poll_attempts: u32,

    /// Delay between queue polls, in milliseconds.
    #[serde(default = "default_queue_poll_interval")]
    pub queue_poll_interval_ms: u64,

    /// Largest artifact `get-artifacts` downloads, in bytes. Keep it at or
    /// below the Mattermost server's maximum file size.
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: u64,
}

impl JenkinsSettings {
    /// Client options derived from these settings.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            queue_poll_attempts: self.queue_poll_attempts,
            queue_poll_interval: Duration::from_millis(self.queue_poll_interval_ms),
            max_artifact_bytes: self.max_artifact_bytes,
        }
    }
}

/// Mattermost connection settings.
#[derive(Clone, Deserialize)]
pub struct MattermostSettings {
    /// Base URL, e.g. `https://chat.example.com`.
    pub url: String,

    /// Bot access token used for side-channel posts.
    pub bot_token: SecretString,

    /// Token Mattermost sends with every command; unchecked when unset
    /// unless the command is registered at startup.
    #[serde(default)]
    pub command_token: Option<SecretString>,

    /// Timeout of one Mattermost request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Team to register the slash command on.
    #[serde(default)]
    pub team_id: Option<String>,

    /// Public URL Mattermost should send commands to.
    #[serde(default)]
    pub command_url: Option<String>,
}

impl MattermostSettings {
    /// Team id and command URL, when startup registration is configured.
    pub fn registration(&self) -> Option<(&str, &str)> {
        Some((self.team_id.as_deref()?, self.command_url.as_deref()?))
    }
}

impl std::fmt::Debug for MattermostSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattermostSettings")
            .field("url", &self.url)
            .field("bot_token", &"[REDACTED]")
            .field(
                "command_token",
                &self.command_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("team_id", &self.team_id)
            .field("command_url", &self.command_url)
            .finish()
    }
}

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    /// Listen address of the HTTP server.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Trigger word, without the slash.
    #[serde(default = "default_trigger")]
    pub trigger: String,

    /// Display name of command responses.
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Avatar of command responses.
    #[serde(default)]
    pub profile_image_url: Option<String>,

    /// Keyring service name for stored credentials.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,

    /// Where connected accounts are kept.
    #[serde(default)]
    pub credential_store: CredentialBackend,

    /// Jenkins settings.
    pub jenkins: JenkinsSettings,

    /// Mattermost settings.
    pub mattermost: MattermostSettings,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8787".to_string()
}

fn default_trigger() -> String {
    DEFAULT_TRIGGER.to_string()
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

fn default_keyring_service() -> String {
    DEFAULT_KEYRING_SERVICE.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_queue_poll_attempts() -> u32 {
    DEFAULT_QUEUE_POLL_ATTEMPTS
}

fn default_queue_poll_interval() -> u64 {
    DEFAULT_QUEUE_POLL_INTERVAL_MS
}

fn default_max_artifact_bytes() -> u64 {
    DEFAULT_MAX_ARTIFACT_BYTES
}

impl PluginConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> PluginResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PluginError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> PluginResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> PluginResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PluginError::Config(format!("{} not set", key)))
        };

        let config = Self {
            listen_addr: lookup("JENKINS_SLASH_LISTEN").unwrap_or_else(default_listen_addr),
            trigger: default_trigger(),
            display_name: default_display_name(),
            profile_image_url: lookup("JENKINS_PROFILE_IMAGE_URL"),
            keyring_service: lookup("JENKINS_SLASH_KEYRING_SERVICE")
                .unwrap_or_else(default_keyring_service),
            credential_store: lookup("JENKINS_SLASH_CREDENTIAL_STORE")
                .map(|value| value.parse::<CredentialBackend>())
                .transpose()?
                .unwrap_or_default(),
            jenkins: JenkinsSettings {
                url: required("JENKINS_URL")?,
                request_timeout_secs: default_request_timeout(),
                queue_poll_attempts: default_queue_poll_attempts(),
                queue_poll_interval_ms: default_queue_poll_interval(),
                max_artifact_bytes: default_max_artifact_bytes(),
            },
            mattermost: MattermostSettings {
                url: required("MATTERMOST_URL")?,
                bot_token: SecretString::new(required("MATTERMOST_BOT_TOKEN")?.into()),
                command_token: lookup("MATTERMOST_COMMAND_TOKEN")
                    .map(|token| SecretString::new(token.into())),
                request_timeout_secs: default_request_timeout(),
                team_id: lookup("MATTERMOST_TEAM_ID"),
                command_url: lookup("JENKINS_SLASH_COMMAND_URL"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PluginResult<()> {
        check_url("Jenkins URL", &self.jenkins.url)?;
        check_url("Mattermost URL", &self.mattermost.url)?;

        if self.mattermost.bot_token.expose_secret().is_empty() {
            return Err(PluginError::Config("Bot token is empty".to_string()));
        }
        if self.trigger.is_empty() || self.trigger.contains(char::is_whitespace) {
            return Err(PluginError::Config(format!(
                "Invalid trigger '{}'",
                self.trigger
            )));
        }
        if self.jenkins.queue_poll_attempts == 0 {
            return Err(PluginError::Config(
                "queue_poll_attempts must be at least 1".to_string(),
            ));
        }
        match (&self.mattermost.team_id, &self.mattermost.command_url) {
            (Some(_), Some(url)) => check_url("Command URL", url)?,
            (None, None) => {}
            _ => {
                return Err(PluginError::Config(
                    "team_id and command_url must be set together".to_string(),
                ));
            }
        }
        if self.mattermost.command_token.is_none() && self.mattermost.registration().is_none() {
            warn!("No command token configured, incoming commands are not authenticated");
        }

        Ok(())
    }

    /// Presentation of command responses.
    pub fn response_style(&self) -> ResponseStyle {
        ResponseStyle {
            trigger: format!("/{}", self.trigger.trim_start_matches('/')),
            display_name: self.display_name.clone(),
            icon_url: self.profile_image_url.clone(),
        }
    }

    /// Registration details of the slash command.
    pub fn command_definition(&self) -> CommandDefinition {
        command_definition(&self.trigger, &self.display_name)
    }
}

fn check_url(name: &str, url: &str) -> PluginResult<()> {
    if url.is_empty() {
        return Err(PluginError::Config(format!("{} is empty", name)));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(PluginError::Config(format!(
            "{} must start with http:// or https://",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base_env() -> HashMap<String, String> {
        env(&[
            ("JENKINS_URL", "https://ci.example.com"),
            ("MATTERMOST_URL", "https://chat.example.com"),
            ("MATTERMOST_BOT_TOKEN", "bot-secret"),
        ])
    }

    #[test]
    fn test_from_lookup_defaults() {
        let vars = base_env();
        let config = PluginConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8787");
        assert_eq!(config.trigger, "jenkins");
        assert_eq!(config.keyring_service, "jenkins-slash");
        assert_eq!(config.jenkins.queue_poll_attempts, 10);
        assert_eq!(config.jenkins.max_artifact_bytes, 100 * 1024 * 1024);
        assert_eq!(config.mattermost.request_timeout_secs, 30);
        assert_eq!(config.credential_store, CredentialBackend::Keyring);
        assert!(config.mattermost.registration().is_none());
        assert!(config.mattermost.command_token.is_none());
        assert_eq!(config.response_style().trigger, "/jenkins");
    }

    #[test]
    fn test_from_lookup_missing_required() {
        let mut vars = base_env();
        vars.remove("MATTERMOST_BOT_TOKEN");
        let err = PluginConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: MATTERMOST_BOT_TOKEN not set"
        );
    }

    #[test]
    fn test_from_lookup_rejects_bad_url() {
        let mut vars = base_env();
        vars.insert("JENKINS_URL".to_string(), "ci.example.com".to_string());
        assert!(PluginConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
listen_addr = "127.0.0.1:9000"
profile_image_url = "https://ci.example.com/static/logo.png"

credential_store = "memory"

[jenkins]
url = "https://ci.example.com"
queue_poll_attempts = 3
max_artifact_bytes = 52428800

[mattermost]
url = "https://chat.example.com"
bot_token = "bot-secret"
command_token = "cmd-secret"
request_timeout_secs = 120
"#
        )
        .unwrap();

        let config = PluginConfig::load(file.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.jenkins.queue_poll_attempts, 3);
        assert_eq!(config.jenkins.request_timeout_secs, 30);
        assert_eq!(config.jenkins.client_options().max_artifact_bytes, 52_428_800);
        assert_eq!(config.mattermost.request_timeout_secs, 120);
        assert_eq!(config.credential_store, CredentialBackend::Memory);
        assert_eq!(
            config.mattermost.command_token.as_ref().map(|t| t.expose_secret()),
            Some("cmd-secret")
        );
        assert_eq!(
            config.response_style().icon_url.as_deref(),
            Some("https://ci.example.com/static/logo.png")
        );
    }

    #[test]
    fn test_from_lookup_registration() {
        let mut vars = base_env();
        vars.insert("MATTERMOST_TEAM_ID".to_string(), "T1".to_string());
        vars.insert(
            "JENKINS_SLASH_COMMAND_URL".to_string(),
            "https://bot.example.com/jenkins/command".to_string(),
        );
        vars.insert("JENKINS_SLASH_CREDENTIAL_STORE".to_string(), "memory".to_string());
        let config = PluginConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(
            config.mattermost.registration(),
            Some(("T1", "https://bot.example.com/jenkins/command"))
        );
        assert_eq!(config.credential_store, CredentialBackend::Memory);
        assert_eq!(config.command_definition().trigger, "jenkins");
    }

    #[test]
    fn test_registration_needs_both_settings() {
        let mut vars = base_env();
        vars.insert("MATTERMOST_TEAM_ID".to_string(), "T1".to_string());
        let err = PluginConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, PluginError::Config(msg) if msg.contains("command_url")));
    }

    #[test]
    fn test_unknown_credential_store() {
        let mut vars = base_env();
        vars.insert("JENKINS_SLASH_CREDENTIAL_STORE".to_string(), "vault".to_string());
        assert!(PluginConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = PluginConfig::load("/nonexistent/jenkins-slash.toml").unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let vars = env(&[
            ("JENKINS_URL", "https://ci.example.com"),
            ("MATTERMOST_URL", "https://chat.example.com"),
            ("MATTERMOST_BOT_TOKEN", "bot-secret"),
            ("MATTERMOST_COMMAND_TOKEN", "cmd-secret"),
        ]);
        let config = PluginConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("bot-secret"));
        assert!(!debug.contains("cmd-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
