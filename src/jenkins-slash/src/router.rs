//! Dispatch of `/jenkins` commands.
//!
//! Every invocation is handled independently: the router keeps no state
//! of its own and only reads its configuration and collaborators.
//! Collaborator failures are logged and turned into a short ephemeral
//! message; nothing is retried.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::command::{CommandArgs, CommandResponse, DEFAULT_DISPLAY_NAME, HELP_TEXT, ResponseType};
use crate::host::ChatHost;
use crate::jenkins::JenkinsApi;
use crate::parser::{Action, CommandInvocation, parse_job_name};
use crate::store::{CredentialStore, JenkinsUserInfo};

const CONNECT_USAGE: &str = "Please specify both username and API token.";
const CONNECT_HELP: &str =
    "Please check `/jenkins help` to find information on how to connect your Jenkins account.";
const CONNECTED: &str = "Jenkins has been connected.";
const VALIDATING: &str = "Validating Jenkins credentials...";
const CONNECT_ERROR: &str = "Error connecting to Jenkins.";
const INVALID_CREDENTIALS: &str = "Incorrect username or token";
const SAVE_ERROR: &str = "Error saving Jenkins credentials.";
const NOT_CONNECTED: &str =
    "Please connect your Jenkins account using `/jenkins connect` first.";
const CREDENTIALS_ERROR: &str = "Error reading your Jenkins credentials.";

const JOB_NOT_SPECIFIED: &str = "Please specify a job name to build.";
const BUILD_HELP: &str =
    "Please check `/jenkins help` to find information on how to trigger a job.";
const ARTIFACTS_HELP: &str =
    "Please check `/jenkins help` to find information on how to get build artifacts.";
const TEST_RESULTS_HELP: &str =
    "Please check `/jenkins help` to find information on how to get test results of a build.";

const ARTIFACTS_ERROR: &str = "Error fetching artifacts.";
const TEST_RESULTS_ERROR: &str = "Error fetching test results.";

/// How command responses are presented.
#[derive(Debug, Clone)]
pub struct ResponseStyle {
    /// Command trigger including the slash, e.g. `/jenkins`.
    pub trigger: String,
    /// Display name of the response author.
    pub display_name: String,
    /// Avatar of the response author.
    pub icon_url: Option<String>,
}

impl Default for ResponseStyle {
    fn default() -> Self {
        Self {
            trigger: format!("/{}", crate::command::DEFAULT_TRIGGER),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            icon_url: None,
        }
    }
}

/// Routes a command line to its handler.
#[derive(Clone)]
pub struct CommandRouter {
    style: ResponseStyle,
    jenkins: Arc<dyn JenkinsApi>,
    store: Arc<dyn CredentialStore>,
    host: Arc<dyn ChatHost>,
}

impl CommandRouter {
    /// Create a router over the given collaborators.
    pub fn new(
        style: ResponseStyle,
        jenkins: Arc<dyn JenkinsApi>,
        store: Arc<dyn CredentialStore>,
        host: Arc<dyn ChatHost>,
    ) -> Self {
        Self {
            style,
            jenkins,
            store,
            host,
        }
    }

    /// Handle one command invocation.
    ///
    /// Lines that do not start with the trigger, unknown actions and a
    /// missing action all yield the empty response without side effects.
    pub async fn execute(&self, args: &CommandArgs) -> CommandResponse {
        let Some(invocation) = CommandInvocation::parse(&args.command) else {
            return CommandResponse::empty();
        };
        if invocation.trigger != self.style.trigger {
            return CommandResponse::empty();
        }

        debug!(
            user_id = %args.user_id,
            action = %invocation.action,
            parameters = invocation.parameters.len(),
            "Dispatching command"
        );

        let parameters = invocation.parameters.as_slice();
        match invocation.action {
            Action::Connect => self.connect(args, parameters).await,
            Action::Build => self.build(args, parameters).await,
            Action::GetArtifacts => self.get_artifacts(args, parameters).await,
            Action::TestResults => self.test_results(args, parameters).await,
            Action::Help => self.respond(HELP_TEXT),
            Action::Unknown(_) => CommandResponse::empty(),
        }
    }

    fn respond(&self, text: impl Into<String>) -> CommandResponse {
        CommandResponse {
            response_type: Some(ResponseType::Ephemeral),
            username: Some(self.style.display_name.clone()),
            icon_url: self.style.icon_url.clone(),
            text: Some(text.into()),
            post_type: Some(String::new()),
        }
    }

    /// Best-effort side-channel notice; a failure only gets logged.
    async fn notify(&self, args: &CommandArgs, message: &str) {
        if let Err(e) = self
            .host
            .post_ephemeral(&args.user_id, &args.channel_id, message)
            .await
        {
            warn!(user_id = %args.user_id, "Failed to post ephemeral message: {}", e);
        }
    }

    /// Job name from the parameters, or the response to send instead.
    fn job_name(&self, parameters: &[String], help: &str) -> Result<String, CommandResponse> {
        match parameters {
            [] => Err(self.respond(JOB_NOT_SPECIFIED)),
            [job] => Ok(job.clone()),
            _ => parse_job_name(parameters).ok_or_else(|| self.respond(help)),
        }
    }

    /// Stored credentials of the invoking user, or the response to send instead.
    async fn user_info(&self, args: &CommandArgs) -> Result<JenkinsUserInfo, CommandResponse> {
        match self.store.load(&args.user_id).await {
            Ok(Some(info)) => Ok(info),
            Ok(None) => Err(self.respond(NOT_CONNECTED)),
            Err(e) => {
                error!(user_id = %args.user_id, err = %e, "Error reading Jenkins credentials");
                Err(self.respond(CREDENTIALS_ERROR))
            }
        }
    }

    async fn connect(&self, args: &CommandArgs, parameters: &[String]) -> CommandResponse {
        let (username, token) = match parameters {
            [] | [_] => return self.respond(CONNECT_USAGE),
            [username, token] => (username, token),
            _ => return self.respond(CONNECT_HELP),
        };

        self.notify(args, VALIDATING).await;

        match self.jenkins.verify_credentials(username, token).await {
            Err(e) => {
                error!(user_id = %args.user_id, err = %e, "Error verifying Jenkins credentials");
                return self.respond(CONNECT_ERROR);
            }
            Ok(false) => return self.respond(INVALID_CREDENTIALS),
            Ok(true) => {}
        }

        let info = JenkinsUserInfo::new(&args.user_id, username, token);
        if let Err(e) = self.store.store(&info).await {
            error!(user_id = %args.user_id, err = %e, "Error saving Jenkins credentials");
            return self.respond(SAVE_ERROR);
        }

        self.respond(CONNECTED)
    }

    async fn build(&self, args: &CommandArgs, parameters: &[String]) -> CommandResponse {
        let job = match self.job_name(parameters, BUILD_HELP) {
            Ok(job) => job,
            Err(response) => return response,
        };
        let info = match self.user_info(args).await {
            Ok(info) => info,
            Err(response) => return response,
        };

        match self.jenkins.trigger_build(&info, &job).await {
            Ok(build) => self.respond(format!(
                "Build for the job '{}' has been started.\nHere's the build URL : {}.",
                job, build.url
            )),
            Err(e) => {
                error!(
                    job_name = %job,
                    user_id = %args.user_id,
                    err = %e,
                    "Error triggering build"
                );
                self.respond(format!("Error triggering build for the job '{}'.", job))
            }
        }
    }

    async fn get_artifacts(&self, args: &CommandArgs, parameters: &[String]) -> CommandResponse {
        let job = match self.job_name(parameters, ARTIFACTS_HELP) {
            Ok(job) => job,
            Err(response) => return response,
        };
        let info = match self.user_info(args).await {
            Ok(info) => info,
            Err(response) => return response,
        };

        self.notify(args, &format!("Fetching build artifacts of '{}'...", job))
            .await;

        let artifacts = match self.jenkins.fetch_artifacts(&info, &job).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                error!(
                    job_name = %job,
                    user_id = %args.user_id,
                    err = %e,
                    "Error fetching artifacts"
                );
                return self.respond(ARTIFACTS_ERROR);
            }
        };
        if artifacts.is_empty() {
            return self.respond(format!("The last build of '{}' has no artifacts.", job));
        }

        if !artifacts.files.is_empty() {
            let message = format!("Artifacts of the last build of '{}'", job);
            if let Err(e) = self
                .host
                .upload_files(&args.channel_id, &message, artifacts.files)
                .await
            {
                error!(
                    job_name = %job,
                    user_id = %args.user_id,
                    err = %e,
                    "Error uploading artifacts"
                );
                return self.respond(ARTIFACTS_ERROR);
            }
        }

        if artifacts.oversized.is_empty() {
            // The uploaded files are the answer.
            return CommandResponse::empty();
        }
        self.respond(format!(
            "Artifacts of '{}' over the {} byte upload limit were not uploaded: {}.",
            job,
            artifacts.size_limit,
            artifacts.oversized.join(", ")
        ))
    }

    async fn test_results(&self, args: &CommandArgs, parameters: &[String]) -> CommandResponse {
        let job = match self.job_name(parameters, TEST_RESULTS_HELP) {
            Ok(job) => job,
            Err(response) => return response,
        };
        let info = match self.user_info(args).await {
            Ok(info) => info,
            Err(response) => return response,
        };

        self.notify(args, &format!("Fetching test results of '{}'...", job))
            .await;

        match self.jenkins.test_report_link(&info, &job).await {
            Ok(report) => {
                self.notify(args, &report).await;
                CommandResponse::empty()
            }
            Err(e) => {
                error!(
                    job_name = %job,
                    user_id = %args.user_id,
                    err = %e,
                    "Error fetching test results"
                );
                self.respond(TEST_RESULTS_ERROR)
            }
        }
    }
}
