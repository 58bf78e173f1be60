use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use genie_client::GenieCapabilities;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3978;
pub const DEFAULT_APP_TYPE: &str = "SingleTenant";
pub const DEFAULT_SAMPLE_QUESTIONS: [&str; 3] = [
    "What data is available?",
    "Can you explain the dataset?",
    "What questions can I ask?",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PORT must be a valid port number, got {0:?}")]
    InvalidPort(String),
    #[error("BIND_ADDR must be an IP address, got {0:?}")]
    InvalidBindAddr(String),
    #[error("DATABRICKS_TOKEN environment variable is required")]
    MissingDatabricksToken,
}

/// How outbound replies authenticate against the Bot Connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// No app credentials configured; replies carry no bearer token.
    Local,
    App {
        app_id: String,
        app_password: String,
        app_type: String,
        tenant_id: Option<String>,
    },
}

impl AuthMode {
    pub fn is_local(&self) -> bool {
        matches!(self, AuthMode::Local)
    }
}

#[derive(Debug, Clone)]
pub struct GenieConfig {
    pub space_id: String,
    pub host: String,
    pub token: String,
    pub capabilities: GenieCapabilities,
}

#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    /// Send the thumbs up/down prompt after each answer.
    pub cards_enabled: bool,
    /// Forward clicks to the Genie feedback endpoint.
    pub api_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bind: SocketAddr,
    pub auth: AuthMode,
    pub genie: GenieConfig,
    pub sample_questions: Vec<String>,
    pub feedback: FeedbackConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let port = match get("PORT").as_str() {
            "" => DEFAULT_PORT,
            raw => raw
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.to_string()))?,
        };
        let ip = match get("BIND_ADDR").as_str() {
            "" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            raw => raw
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddr(raw.to_string()))?,
        };

        let app_id = get("APP_ID");
        let app_password = get("APP_PASSWORD");
        let token = get("DATABRICKS_TOKEN");
        if !app_id.is_empty() && token.is_empty() {
            return Err(ConfigError::MissingDatabricksToken);
        }

        let auth = if app_id.is_empty() || app_password.is_empty() {
            AuthMode::Local
        } else {
            let app_type = match get("APP_TYPE") {
                t if t.is_empty() => DEFAULT_APP_TYPE.to_string(),
                t => t,
            };
            let tenant_id = Some(get("APP_TENANTID")).filter(|t| !t.is_empty());
            AuthMode::App {
                app_id,
                app_password,
                app_type,
                tenant_id,
            }
        };

        let genie = GenieConfig {
            space_id: get("DATABRICKS_SPACE_ID"),
            host: get("DATABRICKS_HOST"),
            token,
            capabilities: GenieCapabilities::negotiate(
                &get("GENIE_FEEDBACK_METHOD"),
                &get("GENIE_MESSAGE_LISTING"),
            ),
        };

        let flag = |key: &str| match lookup(key) {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => true,
        };

        Ok(Self {
            bind: SocketAddr::new(ip, port),
            auth,
            genie,
            sample_questions: parse_sample_questions(lookup("SAMPLE_QUESTIONS").as_deref()),
            feedback: FeedbackConfig {
                cards_enabled: flag("ENABLE_FEEDBACK_CARDS"),
                api_enabled: flag("ENABLE_GENIE_FEEDBACK_API"),
            },
        })
    }
}

/// Splits the semicolon list, falling back to the built-in questions when nothing remains.
pub fn parse_sample_questions(raw: Option<&str>) -> Vec<String> {
    let parsed: Vec<String> = raw
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect();
    if parsed.is_empty() {
        DEFAULT_SAMPLE_QUESTIONS.iter().map(|q| q.to_string()).collect()
    } else {
        parsed
    }
}
