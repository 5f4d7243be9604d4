//! HTTP endpoint Mattermost calls for the slash command.
//!
//! - `POST /jenkins/command` - form-encoded slash command payload
//! - `GET /health` - liveness probe

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::command::{CommandArgs, CommandResponse, SlashCommandPayload};
use crate::config::PluginConfig;
use crate::error::{PluginError, PluginResult};
use crate::host::MattermostHost;
use crate::router::CommandRouter;
use crate::store::{
    CredentialBackend, CredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    router: CommandRouter,
    command_token: Option<SecretString>,
}

impl AppState {
    /// Create the state from a router and the expected command token.
    pub fn new(router: CommandRouter, command_token: Option<SecretString>) -> Self {
        Self {
            router,
            command_token,
        }
    }

    /// Build the production collaborators from a configuration, and
    /// register the slash command when the configuration asks for it.
    pub async fn from_config(config: &PluginConfig) -> PluginResult<Self> {
        let jenkins = jenkins_client::JenkinsClient::with_options(
            &config.jenkins.url,
            config.jenkins.client_options(),
        )?;
        let host = MattermostHost::new(
            &config.mattermost.url,
            config.mattermost.bot_token.clone(),
            Duration::from_secs(config.mattermost.request_timeout_secs),
        )?;
        let store: Arc<dyn CredentialStore> = match config.credential_store {
            CredentialBackend::Keyring => {
                Arc::new(KeyringCredentialStore::with_service(&config.keyring_service))
            }
            CredentialBackend::Memory => {
                warn!("Jenkins credentials are kept in memory and lost on restart");
                Arc::new(MemoryCredentialStore::new())
            }
        };

        let mut command_token = config.mattermost.command_token.clone();
        if let Some((team_id, url)) = config.mattermost.registration() {
            let registered = host
                .register_command(team_id, url, &config.command_definition())
                .await?;
            if command_token.is_none() {
                command_token = Some(registered);
            }
        }

        let router = CommandRouter::new(
            config.response_style(),
            Arc::new(jenkins),
            store,
            Arc::new(host),
        );
        Ok(Self::new(router, command_token))
    }

    fn check_token(&self, token: &str) -> PluginResult<()> {
        match &self.command_token {
            Some(expected) if expected.expose_secret() != token => {
                Err(PluginError::InvalidCommandToken)
            }
            _ => Ok(()),
        }
    }
}

/// Create the HTTP routes.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/jenkins/command", post(execute_command))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn execute_command(
    State(state): State<AppState>,
    Form(payload): Form<SlashCommandPayload>,
) -> PluginResult<Json<CommandResponse>> {
    if let Err(e) = state.check_token(&payload.token) {
        warn!(user_id = %payload.user_id, "Rejected command with invalid token");
        return Err(e);
    }

    let args = CommandArgs::from(&payload);
    Ok(Json(state.router.execute(&args).await))
}

async fn health() -> &'static str {
    "ok"
}

/// Serve the routes until `shutdown` resolves.
pub async fn run_with_shutdown<F>(config: PluginConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::from_config(&config).await?;
    let addr: SocketAddr = config.listen_addr.parse()?;

    let listener = TcpListener::bind(addr).await?;
    info!("Listening for /{} commands on {}", config.trigger, addr);

    axum::serve(listener, routes(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use jenkins_client::{ArtifactFile, BuildArtifacts, BuildInfo, JenkinsError};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use tower::ServiceExt;

    use crate::host::ChatHost;
    use crate::jenkins::JenkinsApi;
    use crate::router::ResponseStyle;
    use crate::store::JenkinsUserInfo;

    struct NoJenkins;

    #[async_trait]
    impl JenkinsApi for NoJenkins {
        async fn verify_credentials(&self, _: &str, _: &str) -> Result<bool, JenkinsError> {
            Ok(false)
        }

        async fn trigger_build(
            &self,
            _: &JenkinsUserInfo,
            job: &str,
        ) -> Result<BuildInfo, JenkinsError> {
            Err(JenkinsError::JobNotFound(job.to_string()))
        }

        async fn fetch_artifacts(
            &self,
            _: &JenkinsUserInfo,
            job: &str,
        ) -> Result<BuildArtifacts, JenkinsError> {
            Err(JenkinsError::JobNotFound(job.to_string()))
        }

        async fn test_report_link(
            &self,
            _: &JenkinsUserInfo,
            job: &str,
        ) -> Result<String, JenkinsError> {
            Err(JenkinsError::JobNotFound(job.to_string()))
        }
    }

    struct SilentHost;

    #[async_trait]
    impl ChatHost for SilentHost {
        async fn post_ephemeral(&self, _: &str, _: &str, _: &str) -> PluginResult<()> {
            Ok(())
        }

        async fn upload_files(&self, _: &str, _: &str, _: Vec<ArtifactFile>) -> PluginResult<()> {
            Ok(())
        }
    }

    fn app(command_token: Option<&str>) -> Router {
        let router = CommandRouter::new(
            ResponseStyle::default(),
            Arc::new(NoJenkins),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(SilentHost),
        );
        let token = command_token.map(|t| SecretString::new(t.to_string().into()));
        routes(AppState::new(router, token))
    }

    fn command(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/jenkins/command")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(None)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_build_without_job_over_http() {
        let response = app(None)
            .oneshot(command(
                "channel_id=C1&user_id=U1&command=%2Fjenkins&text=build",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["response_type"], "ephemeral");
        assert_eq!(json["text"], "Please specify a job name to build.");
        assert_eq!(json["username"], "Jenkins");
    }

    #[tokio::test]
    async fn test_unknown_action_returns_empty_object() {
        let response = app(None)
            .oneshot(command(
                "channel_id=C1&user_id=U1&command=%2Fjenkins&text=deploy+app",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_command_token_checked() {
        let response = app(Some("expected"))
            .oneshot(command(
                "channel_id=C1&user_id=U1&command=%2Fjenkins&text=help&token=wrong",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(Some("expected"))
            .oneshot(command(
                "channel_id=C1&user_id=U1&command=%2Fjenkins&text=help&token=expected",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn registering_config(chat_url: String) -> PluginConfig {
        let vars: std::collections::HashMap<&str, String> = [
            ("JENKINS_URL", "https://ci.example.com".to_string()),
            ("MATTERMOST_URL", chat_url),
            ("MATTERMOST_BOT_TOKEN", "bot-token".to_string()),
            ("MATTERMOST_TEAM_ID", "T1".to_string()),
            (
                "JENKINS_SLASH_COMMAND_URL",
                "https://bot.example.com/jenkins/command".to_string(),
            ),
            ("JENKINS_SLASH_CREDENTIAL_STORE", "memory".to_string()),
        ]
        .into_iter()
        .collect();
        PluginConfig::from_lookup(|k| vars.get(k).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_startup_registration_sets_command_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/commands"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v4/commands"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "trigger": "jenkins",
                "token": "registered-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let state = AppState::from_config(&registering_config(server.uri()))
            .await
            .unwrap();
        assert!(state.check_token("registered-token").is_ok());
        assert!(matches!(
            state.check_token("forged"),
            Err(PluginError::InvalidCommandToken)
        ));
    }

    #[tokio::test]
    async fn test_startup_registration_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/commands"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = AppState::from_config(&registering_config(server.uri())).await;
        assert!(matches!(result, Err(PluginError::Chat(_))));
    }
}
