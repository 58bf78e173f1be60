use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::GenieError;
use crate::types::{
    FeedbackRating, GenieMessage, MessageListing, MessageStatus, QueryResultResponse,
    StartConversationResponse, StatementResponse,
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Ceiling on how long a question may stay in a non-terminal status.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(20 * 60);
const MAX_ERROR_BODY: usize = 512;

/// How feedback reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackRoute {
    /// Through [`GenieApi::send_message_feedback`].
    MessageFeedback,
    /// Through a raw authenticated POST to the feedback endpoint.
    DirectHttp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingRoute {
    ListMessages,
    Unsupported,
}

/// Operations the backend offers, fixed when the client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenieCapabilities {
    pub feedback: FeedbackRoute,
    pub listing: ListingRoute,
}

impl Default for GenieCapabilities {
    fn default() -> Self {
        Self {
            feedback: FeedbackRoute::MessageFeedback,
            listing: ListingRoute::ListMessages,
        }
    }
}

impl GenieCapabilities {
    /// Resolves the configured method names; unknown names fall back to the secondary route.
    pub fn negotiate(feedback_method: &str, listing_method: &str) -> Self {
        let feedback = match feedback_method.trim().to_ascii_lowercase().as_str() {
            "" | "api" | "send_message_feedback" => FeedbackRoute::MessageFeedback,
            other => {
                if other != "http" {
                    warn!(method = other, "unknown feedback method, using direct http");
                }
                FeedbackRoute::DirectHttp
            }
        };
        let listing = match listing_method.trim().to_ascii_lowercase().as_str() {
            "" | "list" | "list_conversation_messages" => ListingRoute::ListMessages,
            other => {
                if other != "none" {
                    warn!(method = other, "unknown listing method, disabling listing");
                }
                ListingRoute::Unsupported
            }
        };
        Self { feedback, listing }
    }
}

/// Genie conversation API.
///
/// `start_conversation` and `create_message` return once the message reaches a
/// terminal status.
#[async_trait]
pub trait GenieApi: Send + Sync {
    fn capabilities(&self) -> GenieCapabilities;

    async fn start_conversation(
        &self,
        space_id: &str,
        content: &str,
    ) -> Result<GenieMessage, GenieError>;

    async fn create_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        content: &str,
    ) -> Result<GenieMessage, GenieError>;

    async fn get_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieMessage, GenieError>;

    async fn get_attachment_query_result(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<QueryResultResponse, GenieError>;

    async fn get_statement(&self, statement_id: &str) -> Result<StatementResponse, GenieError>;

    /// Messages of a conversation, newest first.
    async fn list_messages(
        &self,
        space_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<GenieMessage>, GenieError>;

    async fn send_message_feedback(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        rating: FeedbackRating,
    ) -> Result<(), GenieError>;
}

#[derive(Debug, Clone)]
pub struct GenieSettings {
    pub host: String,
    pub token: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub capabilities: GenieCapabilities,
}

impl GenieSettings {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            capabilities: GenieCapabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: GenieCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Parses a workspace host, defaulting to https and ensuring a trailing slash.
pub(crate) fn workspace_base_url(host: &str) -> Result<Url, GenieError> {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(GenieError::Config("workspace host is empty".into()));
    }
    let with_scheme = if trimmed.contains("://") {
        format!("{trimmed}/")
    } else {
        format!("https://{trimmed}/")
    };
    Url::parse(&with_scheme).map_err(|err| GenieError::Config(err.to_string()))
}

pub(crate) fn feedback_path(space_id: &str, conversation_id: &str, message_id: &str) -> String {
    format!(
        "api/2.0/genie/spaces/{space_id}/conversations/{conversation_id}/messages/{message_id}/feedback"
    )
}

pub struct GenieClient {
    http: Client,
    base_url: Url,
    token: String,
    poll_interval: Duration,
    max_wait: Duration,
    capabilities: GenieCapabilities,
}

impl GenieClient {
    pub fn new(http: Client, settings: GenieSettings) -> Result<Self, GenieError> {
        let base_url = workspace_base_url(&settings.host)?;
        debug!(
            host = %base_url,
            token_present = !settings.token.is_empty(),
            capabilities = ?settings.capabilities,
            "genie client configured"
        );
        Ok(Self {
            http,
            base_url,
            token: settings.token,
            poll_interval: settings.poll_interval,
            max_wait: settings.max_wait,
            capabilities: settings.capabilities,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, GenieError> {
        self.base_url
            .join(path)
            .map_err(|err| GenieError::Config(err.to_string()))
    }

    async fn send<T>(&self, operation: &'static str, request: RequestBuilder) -> Result<T, GenieError>
    where
        T: DeserializeOwned,
    {
        let started = Instant::now();
        let response = request.bearer_auth(&self.token).send().await.map_err(|err| {
            counter!("genie_errors_total", "kind" => "transport", "operation" => operation)
                .increment(1);
            GenieError::Transport(err)
        })?;

        let status = response.status();
        histogram!(
            "genie_roundtrip_seconds",
            "operation" => operation,
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".into());
            counter!(
                "genie_errors_total",
                "kind" => "remote",
                "operation" => operation,
                "status" => status.as_str().to_string()
            )
            .increment(1);
            return Err(GenieError::Remote {
                status,
                message: truncate(body),
            });
        }

        let body = response.text().await.map_err(GenieError::Transport)?;
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|err| {
            counter!("genie_errors_total", "kind" => "decode", "operation" => operation)
                .increment(1);
            GenieError::Decode(format!("{operation}: {err}"))
        })
    }

    /// Polls until the message leaves its in-flight statuses.
    async fn wait_for_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        mut current: Option<GenieMessage>,
    ) -> Result<GenieMessage, GenieError> {
        let started = Instant::now();
        loop {
            if let Some(message) = current.take() {
                match message.status {
                    Some(MessageStatus::Completed) => return Ok(message),
                    Some(status) if status.is_terminal() => {
                        let reason = message
                            .error
                            .as_ref()
                            .and_then(|e| e.error.clone())
                            .unwrap_or_else(|| "no error detail".into());
                        return Err(GenieError::MessageFailed {
                            message_id: message_id.to_string(),
                            status: format!("{status:?}"),
                            reason,
                        });
                    }
                    _ => {}
                }
            }
            if started.elapsed() >= self.max_wait {
                return Err(GenieError::WaitExceeded {
                    message_id: message_id.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            current = Some(
                self.get_message(space_id, conversation_id, message_id)
                    .await?,
            );
        }
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[async_trait]
impl GenieApi for GenieClient {
    fn capabilities(&self) -> GenieCapabilities {
        self.capabilities
    }

    async fn start_conversation(
        &self,
        space_id: &str,
        content: &str,
    ) -> Result<GenieMessage, GenieError> {
        let url = self.endpoint(&format!(
            "api/2.0/genie/spaces/{space_id}/start-conversation"
        ))?;
        let started: StartConversationResponse = self
            .send(
                "start_conversation",
                self.http.post(url).json(&json!({ "content": content })),
            )
            .await?;
        let initial = started.message.map(|mut message| {
            if message.conversation_id.is_empty() {
                message.conversation_id = started.conversation_id.clone();
            }
            message
        });
        self.wait_for_message(
            space_id,
            &started.conversation_id,
            &started.message_id,
            initial,
        )
        .await
    }

    async fn create_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        content: &str,
    ) -> Result<GenieMessage, GenieError> {
        let url = self.endpoint(&format!(
            "api/2.0/genie/spaces/{space_id}/conversations/{conversation_id}/messages"
        ))?;
        let created: GenieMessage = self
            .send(
                "create_message",
                self.http.post(url).json(&json!({ "content": content })),
            )
            .await?;
        let message_id = created
            .message_id()
            .map(str::to_string)
            .ok_or_else(|| GenieError::Decode("create_message: missing message id".into()))?;
        self.wait_for_message(space_id, conversation_id, &message_id, Some(created))
            .await
    }

    async fn get_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieMessage, GenieError> {
        let url = self.endpoint(&format!(
            "api/2.0/genie/spaces/{space_id}/conversations/{conversation_id}/messages/{message_id}"
        ))?;
        self.send("get_message", self.http.get(url)).await
    }

    async fn get_attachment_query_result(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<QueryResultResponse, GenieError> {
        let url = self.endpoint(&format!(
            "api/2.0/genie/spaces/{space_id}/conversations/{conversation_id}/messages/{message_id}/attachments/{attachment_id}/query-result"
        ))?;
        self.send("get_attachment_query_result", self.http.get(url))
            .await
    }

    async fn get_statement(&self, statement_id: &str) -> Result<StatementResponse, GenieError> {
        let url = self.endpoint(&format!("api/2.0/sql/statements/{statement_id}"))?;
        self.send("get_statement", self.http.get(url)).await
    }

    async fn list_messages(
        &self,
        space_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<GenieMessage>, GenieError> {
        if self.capabilities.listing == ListingRoute::Unsupported {
            return Err(GenieError::Unsupported("list_messages"));
        }
        let url = self.endpoint(&format!(
            "api/2.0/genie/spaces/{space_id}/conversations/{conversation_id}/messages"
        ))?;
        let listing: MessageListing = self.send("list_messages", self.http.get(url)).await?;
        Ok(listing.into_newest_first())
    }

    async fn send_message_feedback(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        rating: FeedbackRating,
    ) -> Result<(), GenieError> {
        if self.capabilities.feedback != FeedbackRoute::MessageFeedback {
            return Err(GenieError::Unsupported("send_message_feedback"));
        }
        let url = self.endpoint(&feedback_path(space_id, conversation_id, message_id))?;
        let _: serde_json::Value = self
            .send(
                "send_message_feedback",
                self.http.post(url).json(&json!({ "rating": rating })),
            )
            .await?;
        Ok(())
    }
}
