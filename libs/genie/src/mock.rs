//! Scripted in-process Genie backend for tests.

use async_trait::async_trait;
use http::StatusCode;
use tokio::sync::Mutex;

use crate::client::{GenieApi, GenieCapabilities, ListingRoute};
use crate::error::GenieError;
use crate::types::{
    FeedbackRating, GenieAttachment, GenieMessage, MessageStatus, QueryAttachment,
    QueryResultResponse, StatementResponse, TextAttachment,
};

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    StartConversation {
        content: String,
    },
    CreateMessage {
        conversation_id: String,
        content: String,
    },
    GetMessage {
        conversation_id: String,
        message_id: String,
    },
    GetQueryResult {
        message_id: String,
        attachment_id: String,
    },
    GetStatement {
        statement_id: String,
    },
    ListMessages {
        conversation_id: String,
    },
    Feedback {
        conversation_id: String,
        message_id: String,
        rating: FeedbackRating,
    },
}

/// What every question is answered with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Table {
        description: Option<String>,
        statement: StatementResponse,
    },
    /// Every question fails with a remote error carrying this body.
    Fail(String),
    /// Every question fails because the answer could not be decoded.
    Undecodable(String),
}

pub struct MockGenieApi {
    calls: Mutex<Vec<MockCall>>,
    reply: Mutex<MockReply>,
    messages: Mutex<Vec<GenieMessage>>,
    listing: Mutex<Vec<GenieMessage>>,
    feedback_failure: Mutex<Option<String>>,
    capabilities: GenieCapabilities,
}

impl MockGenieApi {
    pub fn replying(reply: MockReply) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: Mutex::new(reply),
            messages: Mutex::new(Vec::new()),
            listing: Mutex::new(Vec::new()),
            feedback_failure: Mutex::new(None),
            capabilities: GenieCapabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: GenieCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub async fn set_reply(&self, reply: MockReply) {
        *self.reply.lock().await = reply;
    }

    /// Messages returned by `list_messages`, already newest first.
    pub async fn set_listing(&self, messages: Vec<GenieMessage>) {
        *self.listing.lock().await = messages;
    }

    pub async fn fail_feedback(&self, body: impl Into<String>) {
        *self.feedback_failure.lock().await = Some(body.into());
    }

    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }

    pub async fn feedback_calls(&self) -> Vec<MockCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| matches!(call, MockCall::Feedback { .. }))
            .collect()
    }

    async fn answer(&self, conversation_id: String, content: &str) -> Result<GenieMessage, GenieError> {
        let reply = self.reply.lock().await.clone();
        match &reply {
            MockReply::Fail(body) => {
                return Err(GenieError::Remote {
                    status: StatusCode::FORBIDDEN,
                    message: body.clone(),
                });
            }
            MockReply::Undecodable(detail) => return Err(GenieError::Decode(detail.clone())),
            _ => {}
        }

        let mut messages = self.messages.lock().await;
        let message_id = format!("msg-{}", messages.len() + 1);
        let attachments = match reply {
            MockReply::Text(text) => vec![GenieAttachment {
                attachment_id: Some(format!("att-{message_id}")),
                text: Some(TextAttachment {
                    content: Some(text),
                }),
                ..GenieAttachment::default()
            }],
            MockReply::Table { description, .. } => vec![GenieAttachment {
                attachment_id: Some(format!("att-{message_id}")),
                query: Some(QueryAttachment {
                    description,
                    query: Some("SELECT 1".into()),
                    ..QueryAttachment::default()
                }),
                ..GenieAttachment::default()
            }],
            MockReply::Fail(_) | MockReply::Undecodable(_) => Vec::new(),
        };
        let message = GenieMessage {
            message_id: Some(message_id),
            conversation_id,
            content: Some(content.to_string()),
            status: Some(MessageStatus::Completed),
            attachments,
            ..GenieMessage::default()
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn record(&self, call: MockCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl GenieApi for MockGenieApi {
    fn capabilities(&self) -> GenieCapabilities {
        self.capabilities
    }

    async fn start_conversation(
        &self,
        _space_id: &str,
        content: &str,
    ) -> Result<GenieMessage, GenieError> {
        self.record(MockCall::StartConversation {
            content: content.to_string(),
        })
        .await;
        let started = self
            .calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, MockCall::StartConversation { .. }))
            .count();
        self.answer(format!("conv-{started}"), content).await
    }

    async fn create_message(
        &self,
        _space_id: &str,
        conversation_id: &str,
        content: &str,
    ) -> Result<GenieMessage, GenieError> {
        self.record(MockCall::CreateMessage {
            conversation_id: conversation_id.to_string(),
            content: content.to_string(),
        })
        .await;
        self.answer(conversation_id.to_string(), content).await
    }

    async fn get_message(
        &self,
        _space_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieMessage, GenieError> {
        self.record(MockCall::GetMessage {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        })
        .await;
        self.messages
            .lock()
            .await
            .iter()
            .find(|m| m.message_id() == Some(message_id))
            .cloned()
            .ok_or_else(|| GenieError::Remote {
                status: StatusCode::NOT_FOUND,
                message: format!("message {message_id} not found"),
            })
    }

    async fn get_attachment_query_result(
        &self,
        _space_id: &str,
        _conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<QueryResultResponse, GenieError> {
        self.record(MockCall::GetQueryResult {
            message_id: message_id.to_string(),
            attachment_id: attachment_id.to_string(),
        })
        .await;
        let statement_response = match &*self.reply.lock().await {
            MockReply::Table { statement, .. } => Some(statement.clone()),
            _ => None,
        };
        Ok(QueryResultResponse { statement_response })
    }

    async fn get_statement(&self, statement_id: &str) -> Result<StatementResponse, GenieError> {
        self.record(MockCall::GetStatement {
            statement_id: statement_id.to_string(),
        })
        .await;
        match &*self.reply.lock().await {
            MockReply::Table { statement, .. } if statement.statement_id == statement_id => {
                Ok(statement.clone())
            }
            _ => Err(GenieError::Remote {
                status: StatusCode::NOT_FOUND,
                message: format!("statement {statement_id} not found"),
            }),
        }
    }

    async fn list_messages(
        &self,
        _space_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<GenieMessage>, GenieError> {
        if self.capabilities.listing == ListingRoute::Unsupported {
            return Err(GenieError::Unsupported("list_messages"));
        }
        self.record(MockCall::ListMessages {
            conversation_id: conversation_id.to_string(),
        })
        .await;
        Ok(self.listing.lock().await.clone())
    }

    async fn send_message_feedback(
        &self,
        _space_id: &str,
        conversation_id: &str,
        message_id: &str,
        rating: FeedbackRating,
    ) -> Result<(), GenieError> {
        self.record(MockCall::Feedback {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            rating,
        })
        .await;
        match self.feedback_failure.lock().await.clone() {
            Some(body) => Err(GenieError::Remote {
                status: StatusCode::BAD_REQUEST,
                message: body,
            }),
            None => Ok(()),
        }
    }
}
