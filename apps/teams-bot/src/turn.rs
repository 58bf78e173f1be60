use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use genie_translator::cards::ADAPTIVE_CARD_CONTENT_TYPE;

use crate::activity::Activity;
use crate::connector::{ActivitySender, ConnectorError};

/// One inbound activity plus the channel to reply on.
pub struct TurnContext {
    activity: Activity,
    sender: Arc<dyn ActivitySender>,
}

impl TurnContext {
    pub fn new(activity: Activity, sender: Arc<dyn ActivitySender>) -> Self {
        Self { activity, sender }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ConnectorError> {
        let reply = self.activity.reply().with_text(text);
        self.send(reply).await
    }

    /// Sends `card` as a standalone Adaptive Card attachment.
    pub async fn send_card(&self, card: Value) -> Result<(), ConnectorError> {
        let reply = self
            .activity
            .reply()
            .with_attachment(ADAPTIVE_CARD_CONTENT_TYPE, card);
        self.send(reply).await
    }

    async fn send(&self, reply: Activity) -> Result<(), ConnectorError> {
        debug!(
            conversation_id = reply.conversation_id().unwrap_or_default(),
            attachments = reply.attachments.len(),
            "sending reply"
        );
        self.sender.send(&reply).await
    }
}
