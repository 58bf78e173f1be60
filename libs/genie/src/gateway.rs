use std::sync::Arc;

use genie_session::UserSession;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::client::{FeedbackRoute, GenieApi, GenieCapabilities, ListingRoute};
use crate::error::{BackendFailure, GenieError};
use crate::feedback::DirectFeedbackClient;
use crate::types::{ColumnInfo, FeedbackRating, GenieMessage};

pub type SharedGenieApi = Arc<dyn GenieApi>;

pub const ACCESS_DENIED_TEXT: &str = "⚠️ **IP Access Blocked**\n\n\
The bot's IP address is blocked by the Databricks account IP Access Control Lists (ACLs).\n\n\
**Administrator Action Required:**\n\
See TROUBLESHOOTING.md for instructions on adding the bot's IP address to your Databricks account IP allow list.";
pub const DECODE_FAILURE_TEXT: &str = "❌ Failed to decode the server response.";
pub const GENERIC_FAILURE_TEXT: &str = "An error occurred while processing your request.";

/// One Genie answer in the shape the formatter consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenieAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenieAnswer {
    pub fn table(
        query_description: Option<String>,
        columns: Vec<ColumnInfo>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        Self {
            query_description: query_description.filter(|d| !d.is_empty()),
            columns: Some(columns),
            rows: Some(rows),
            ..Self::default()
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn failure(kind: BackendFailure) -> Self {
        Self::error(failure_text(kind))
    }
}

pub fn failure_text(kind: BackendFailure) -> &'static str {
    match kind {
        BackendFailure::AccessDenied => ACCESS_DENIED_TEXT,
        BackendFailure::Decode => DECODE_FAILURE_TEXT,
        BackendFailure::Generic => GENERIC_FAILURE_TEXT,
    }
}

/// Result of [`GenieGateway::ask`]: the answer plus the handles to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct GenieReply {
    pub answer: GenieAnswer,
    pub conversation_id: Option<String>,
    /// `None` whenever the backend call failed.
    pub message_id: Option<String>,
}

/// Question/answer boundary in front of a Genie space.
#[derive(Clone)]
pub struct GenieGateway {
    api: SharedGenieApi,
    space_id: String,
    direct_feedback: Option<DirectFeedbackClient>,
}

impl GenieGateway {
    pub fn new(api: SharedGenieApi, space_id: impl Into<String>) -> Self {
        Self {
            api,
            space_id: space_id.into(),
            direct_feedback: None,
        }
    }

    /// Client used when feedback is routed over raw HTTP.
    pub fn with_direct_feedback(mut self, client: DirectFeedbackClient) -> Self {
        self.direct_feedback = Some(client);
        self
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn capabilities(&self) -> GenieCapabilities {
        self.api.capabilities()
    }

    /// Sends `question` on behalf of `session`. Never fails: backend errors are
    /// logged and turned into an error answer that keeps `conversation_id`.
    pub async fn ask(
        &self,
        question: &str,
        session: &UserSession,
        conversation_id: Option<&str>,
    ) -> GenieReply {
        match self.try_ask(question, session, conversation_id).await {
            Ok(reply) => reply,
            Err(err) => {
                let kind = err.classify();
                error!(
                    user = %session.display_label(),
                    conversation_id = conversation_id.unwrap_or_default(),
                    operation = "ask",
                    failure = ?kind,
                    error = %err,
                    "genie request failed"
                );
                GenieReply {
                    answer: GenieAnswer::failure(kind),
                    conversation_id: conversation_id.map(str::to_string),
                    message_id: None,
                }
            }
        }
    }

    async fn try_ask(
        &self,
        question: &str,
        session: &UserSession,
        conversation_id: Option<&str>,
    ) -> Result<GenieReply, GenieError> {
        let content = format!("[{}] {}", session.display_name, question);
        let message = match conversation_id {
            Some(conversation_id) => {
                debug!(conversation_id, "continuing genie conversation");
                self.api
                    .create_message(&self.space_id, conversation_id, &content)
                    .await?
            }
            None => {
                info!(user = %session.display_label(), "starting genie conversation");
                self.api.start_conversation(&self.space_id, &content).await?
            }
        };

        let conversation_id = if message.conversation_id.is_empty() {
            conversation_id
                .map(str::to_string)
                .ok_or_else(|| GenieError::Decode("message without conversation id".into()))?
        } else {
            message.conversation_id.clone()
        };
        let message_id = message
            .message_id()
            .map(str::to_string)
            .ok_or_else(|| GenieError::Decode("message without id".into()))?;

        let answer = self
            .assemble_answer(&message, &conversation_id, &message_id)
            .await?;
        Ok(GenieReply {
            answer,
            conversation_id: Some(conversation_id),
            message_id: Some(message_id),
        })
    }

    async fn assemble_answer(
        &self,
        message: &GenieMessage,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieAnswer, GenieError> {
        let mut statement_id = None;
        if let Some(attachment_id) = message
            .query_attachment()
            .and_then(|a| a.attachment_id.as_deref())
        {
            let result = self
                .api
                .get_attachment_query_result(
                    &self.space_id,
                    conversation_id,
                    message_id,
                    attachment_id,
                )
                .await?;
            statement_id = result.statement_response.map(|s| s.statement_id);
        }

        let latest = self
            .api
            .get_message(&self.space_id, conversation_id, message_id)
            .await?;

        if let Some(statement_id) = statement_id {
            let statement = self.api.get_statement(&statement_id).await?;
            let columns = statement
                .columns()
                .ok_or_else(|| GenieError::Decode("statement without schema".into()))?
                .to_vec();
            let rows = statement.rows().map(<[_]>::to_vec).unwrap_or_default();
            let description = latest.query_description().map(str::to_string);
            return Ok(GenieAnswer::table(description, columns, rows));
        }

        if let Some(text) = latest.text_content() {
            return Ok(GenieAnswer::message(text));
        }
        Ok(latest
            .content
            .map(GenieAnswer::message)
            .unwrap_or_default())
    }

    /// Newest message id of `conversation_id`, when the backend can list messages.
    pub async fn latest_message_id(&self, conversation_id: &str) -> Option<String> {
        if self.capabilities().listing == ListingRoute::Unsupported {
            return None;
        }
        match self
            .api
            .list_messages(&self.space_id, conversation_id)
            .await
        {
            Ok(messages) => messages
                .iter()
                .find_map(|m| m.message_id().map(str::to_string)),
            Err(err) => {
                warn!(conversation_id, error = %err, "listing genie messages failed");
                None
            }
        }
    }

    /// Forwards a rating over whichever feedback route was negotiated.
    pub async fn send_feedback(
        &self,
        conversation_id: &str,
        message_id: &str,
        rating: FeedbackRating,
    ) -> Result<(), GenieError> {
        match self.capabilities().feedback {
            FeedbackRoute::MessageFeedback => {
                self.api
                    .send_message_feedback(&self.space_id, conversation_id, message_id, rating)
                    .await
            }
            FeedbackRoute::DirectHttp => {
                let client = self.direct_feedback.as_ref().ok_or_else(|| {
                    GenieError::Config("direct feedback client not configured".into())
                })?;
                client
                    .submit(&self.space_id, conversation_id, message_id, rating)
                    .await
            }
        }
    }
}
