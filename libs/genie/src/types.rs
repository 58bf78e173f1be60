//! Wire types for the Genie conversation and SQL statement endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Submitted,
    FetchingMetadata,
    FilteringContext,
    AskingAi,
    PendingWarehouse,
    ExecutingQuery,
    Completed,
    Failed,
    Cancelled,
    QueryResultExpired,
    #[serde(other)]
    Unknown,
}

impl MessageStatus {
    /// Statuses after which the backend will not update the message again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::QueryResultExpired
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenieMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default)]
    pub attachments: Vec<GenieAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MessageError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_timestamp: Option<i64>,
}

impl GenieMessage {
    /// Newer payloads carry `message_id`, older ones only `id`.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref().or(self.id.as_deref())
    }

    /// First attachment that references a generated SQL query.
    pub fn query_attachment(&self) -> Option<&GenieAttachment> {
        self.attachments.iter().find(|a| a.query.is_some())
    }

    pub fn query_description(&self) -> Option<&str> {
        self.attachments
            .iter()
            .filter_map(|a| a.query.as_ref())
            .filter_map(|q| q.description.as_deref())
            .find(|d| !d.is_empty())
    }

    pub fn text_content(&self) -> Option<&str> {
        self.attachments
            .iter()
            .filter_map(|a| a.text.as_ref())
            .filter_map(|t| t.content.as_deref())
            .find(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenieAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextAttachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartConversationResponse {
    pub conversation_id: String,
    pub message_id: String,
    #[serde(default)]
    pub message: Option<GenieMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResultResponse {
    #[serde(default)]
    pub statement_response: Option<StatementResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResponse {
    pub statement_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ResultManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultData>,
}

impl StatementResponse {
    pub fn columns(&self) -> Option<&[ColumnInfo]> {
        self.manifest
            .as_ref()
            .and_then(|m| m.schema.as_ref())
            .map(|s| s.columns.as_slice())
    }

    pub fn rows(&self) -> Option<&[Vec<Value>]> {
        self.result.as_ref().map(|r| r.data_array.as_slice())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ResultSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSchema {
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default)]
    pub type_name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    #[serde(default)]
    pub data_array: Vec<Vec<Value>>,
}

/// Message listings arrive either wrapped in `{"messages": [...]}` or as a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum MessageListing {
    Bare(Vec<GenieMessage>),
    Wrapped {
        #[serde(default)]
        messages: Vec<GenieMessage>,
    },
}

impl MessageListing {
    /// Flattens either shape into messages ordered newest first.
    ///
    /// Messages without a timestamp follow the timestamped ones, latest-listed first.
    pub(crate) fn into_newest_first(self) -> Vec<GenieMessage> {
        let mut messages = match self {
            MessageListing::Bare(messages) => messages,
            MessageListing::Wrapped { messages } => messages,
        };
        messages.reverse();
        messages.sort_by(|a, b| b.created_timestamp.cmp(&a.created_timestamp));
        messages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackRating {
    Positive,
    Negative,
}

impl From<genie_session::FeedbackPolarity> for FeedbackRating {
    fn from(polarity: genie_session::FeedbackPolarity) -> Self {
        match polarity {
            genie_session::FeedbackPolarity::Positive => Self::Positive,
            genie_session::FeedbackPolarity::Negative => Self::Negative,
        }
    }
}

impl FeedbackRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "POSITIVE",
            Self::Negative => "NEGATIVE",
        }
    }
}
