//! Outbound delivery of reply activities through the Bot Connector REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::activity::Activity;
use crate::config::AuthMode;

const DEFAULT_AUTH_BASE: &str = "https://login.microsoftonline.com";
const MULTI_TENANT_AUTHORITY: &str = "botframework.com";
const CONNECTOR_SCOPE: &str = "https://api.botframework.com/.default";
/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("activity has no {0}")]
    MissingRoute(&'static str),
    #[error("connector transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token request failed (status {status}): {body}")]
    Token { status: StatusCode, body: String },
    #[error("connector rejected activity (status {status}): {body}")]
    Remote { status: StatusCode, body: String },
}

/// Sink for reply activities.
#[async_trait]
pub trait ActivitySender: Send + Sync {
    async fn send(&self, activity: &Activity) -> Result<(), ConnectorError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Posts activities to `{serviceUrl}/v3/conversations/{id}/activities`.
pub struct ConnectorClient {
    http: Client,
    auth: AuthMode,
    auth_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl ConnectorClient {
    pub fn new(http: Client, auth: AuthMode) -> Self {
        Self {
            http,
            auth,
            auth_base: DEFAULT_AUTH_BASE.into(),
            token: Mutex::new(None),
        }
    }

    /// Overrides the token authority host.
    pub fn with_auth_base(mut self, auth_base: impl Into<String>) -> Self {
        self.auth_base = auth_base.into();
        self
    }

    fn token_url(&self, tenant: &str) -> String {
        let base = self.auth_base.trim_end_matches('/');
        format!("{base}/{tenant}/oauth2/v2.0/token")
    }

    /// Cached app token, or `None` in local mode.
    async fn bearer(&self) -> Result<Option<String>, ConnectorError> {
        let AuthMode::App {
            app_id,
            app_password,
            app_type,
            tenant_id,
        } = &self.auth
        else {
            return Ok(None);
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|token| Instant::now() < token.refresh_at)
        {
            return Ok(Some(token.value.clone()));
        }

        let tenant = match tenant_id {
            Some(tenant) if app_type.eq_ignore_ascii_case("SingleTenant") => tenant.as_str(),
            _ => MULTI_TENANT_AUTHORITY,
        };
        let form = [
            ("client_id", app_id.as_str()),
            ("client_secret", app_password.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", CONNECTOR_SCOPE),
        ];
        let response = self
            .http
            .post(self.token_url(tenant))
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            counter!("connector_token_errors_total").increment(1);
            return Err(ConnectorError::Token { status, body });
        }
        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        debug!(tenant, expires_in = lifetime.as_secs(), "connector token acquired");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        Ok(Some(token.access_token))
    }
}

#[async_trait]
impl ActivitySender for ConnectorClient {
    async fn send(&self, activity: &Activity) -> Result<(), ConnectorError> {
        let service_url = activity
            .service_url
            .as_deref()
            .ok_or(ConnectorError::MissingRoute("service url"))?;
        let conversation_id = activity
            .conversation_id()
            .ok_or(ConnectorError::MissingRoute("conversation id"))?;
        let url = format!(
            "{}/v3/conversations/{}/activities",
            service_url.trim_end_matches('/'),
            conversation_id
        );

        let mut request = self.http.post(url).json(activity);
        if let Some(token) = self.bearer().await? {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            counter!("connector_send_total", "outcome" => "error").increment(1);
            warn!(%status, conversation_id, "connector rejected reply");
            return Err(ConnectorError::Remote { status, body });
        }
        counter!("connector_send_total", "outcome" => "ok").increment(1);
        Ok(())
    }
}

/// Keeps every sent activity in memory.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Activity>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Activity> {
        self.sent.lock().await.clone()
    }

    pub async fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|a| a.text.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl ActivitySender for RecordingSender {
    async fn send(&self, activity: &Activity) -> Result<(), ConnectorError> {
        self.sent.lock().await.push(activity.clone());
        Ok(())
    }
}
