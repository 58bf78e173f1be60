//! Bot Framework activity model, limited to the fields this bot reads or writes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use genie_session::FeedbackPolarity;
use genie_translator::cards::FEEDBACK_ACTION;

pub const EMULATOR_CHANNEL: &str = "emulator";
pub const ADAPTIVE_CARD_ACTION: &str = "adaptiveCard/action";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Message,
    ConversationUpdate,
    Invoke,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    pub content: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Activity {
    pub fn activity_type(&self) -> ActivityType {
        match self.kind.as_str() {
            "message" => ActivityType::Message,
            "conversationUpdate" => ActivityType::ConversationUpdate,
            "invoke" => ActivityType::Invoke,
            _ => ActivityType::Other,
        }
    }

    pub fn is_emulator(&self) -> bool {
        self.channel_id == EMULATOR_CHANNEL
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Trimmed text, `None` when absent or blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Outbound message addressed back to the sender of `self`.
    pub fn reply(&self) -> Activity {
        Activity {
            kind: "message".into(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            reply_to_id: self.id.clone(),
            ..Activity::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attachment(mut self, content_type: &str, content: Value) -> Self {
        self.attachments.push(Attachment {
            content_type: content_type.to_string(),
            content,
        });
        self
    }
}

/// Validated feedback button click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackClick {
    pub message_id: String,
    pub user_id: String,
    pub polarity: FeedbackPolarity,
}

/// Classification of a card submit payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardSubmit {
    Feedback(FeedbackClick),
    /// `action` is `feedback` but a required field is missing or empty.
    IncompleteFeedback,
    /// Any other `action`, or none at all.
    Unknown,
}

impl CardSubmit {
    /// Reads the submit data, either at the top level or under `action.data`.
    pub fn parse(value: &Value) -> Self {
        let data = match value.get("action") {
            Some(action) if action.is_object() => action.get("data").unwrap_or(&Value::Null),
            _ => value,
        };
        if data.get("action").and_then(Value::as_str) != Some(FEEDBACK_ACTION) {
            return CardSubmit::Unknown;
        }

        let field = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        match (field("messageId"), field("userId"), field("feedback")) {
            (Some(message_id), Some(user_id), Some(feedback)) => {
                CardSubmit::Feedback(FeedbackClick {
                    message_id,
                    user_id,
                    polarity: FeedbackPolarity::from_label(&feedback),
                })
            }
            _ => CardSubmit::IncompleteFeedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_teams_message_activity() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "message",
            "id": "a-1",
            "channelId": "msteams",
            "serviceUrl": "https://smba.trafficmanager.net/amer/",
            "from": {"id": "29:user", "name": "Ana", "aadObjectId": "x"},
            "recipient": {"id": "28:bot", "name": "Genie"},
            "conversation": {"id": "19:conv", "tenantId": "t-1"},
            "text": "  hello  "
        }))
        .unwrap();
        assert_eq!(activity.activity_type(), ActivityType::Message);
        assert_eq!(activity.trimmed_text(), Some("hello"));
        assert_eq!(activity.conversation_id(), Some("19:conv"));
        assert!(!activity.is_emulator());

        let reply = activity.reply().with_text("hi");
        assert_eq!(reply.recipient.unwrap().id, "29:user");
        assert_eq!(reply.from.unwrap().id, "28:bot");
        assert_eq!(reply.reply_to_id.as_deref(), Some("a-1"));
        let wire = serde_json::to_value(activity.reply().with_text("hi")).unwrap();
        assert_eq!(wire["type"], "message");
        assert_eq!(wire["replyToId"], "a-1");
    }

    #[test]
    fn parses_feedback_submit_shapes() {
        let flat = json!({"action": "feedback", "messageId": "m", "userId": "u", "feedback": "positive"});
        assert_eq!(
            CardSubmit::parse(&flat),
            CardSubmit::Feedback(FeedbackClick {
                message_id: "m".into(),
                user_id: "u".into(),
                polarity: FeedbackPolarity::Positive,
            })
        );

        let nested = json!({"action": {"type": "Action.Submit", "data": {
            "action": "feedback", "messageId": "m", "userId": "u", "feedback": "negative"
        }}});
        assert!(matches!(
            CardSubmit::parse(&nested),
            CardSubmit::Feedback(FeedbackClick { polarity: FeedbackPolarity::Negative, .. })
        ));
    }

    #[test]
    fn flags_incomplete_and_unknown_submits() {
        let missing = json!({"action": "feedback", "messageId": "m", "feedback": "positive"});
        assert_eq!(CardSubmit::parse(&missing), CardSubmit::IncompleteFeedback);

        let empty = json!({"action": "feedback", "messageId": "", "userId": "u", "feedback": "x"});
        assert_eq!(CardSubmit::parse(&empty), CardSubmit::IncompleteFeedback);

        assert_eq!(CardSubmit::parse(&json!({"action": "vote"})), CardSubmit::Unknown);
        assert_eq!(CardSubmit::parse(&json!("text")), CardSubmit::Unknown);
    }
}
