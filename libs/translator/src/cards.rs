//! Teams Adaptive Card payloads for the feedback loop.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";
const CARD_VERSION: &str = "1.3";

pub const FEEDBACK_PROMPT_TEXT: &str = "Was this response helpful?";
pub const FEEDBACK_ACK_TEXT: &str = "✅ Thank you for your feedback!";
pub const FEEDBACK_FAILED_TEXT: &str = "Failed to send feedback. Please try again.";
pub const FEEDBACK_ACTION: &str = "feedback";

/// Data attached to each feedback button and echoed back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackData {
    pub action: String,
    pub message_id: String,
    pub user_id: String,
    pub feedback: String,
}

impl FeedbackData {
    pub fn new(message_id: &str, user_id: &str, feedback: &str) -> Self {
        Self {
            action: FEEDBACK_ACTION.to_string(),
            message_id: message_id.to_string(),
            user_id: user_id.to_string(),
            feedback: feedback.to_string(),
        }
    }
}

/// Thumbs up / thumbs down prompt for one Genie message.
pub fn build_feedback_prompt(message_id: &str, user_id: &str) -> Value {
    let button = |title: &str, feedback: &str| {
        json!({
            "type": "Action.Submit",
            "title": title,
            "data": FeedbackData::new(message_id, user_id, feedback),
        })
    };
    json!({
        "type": "AdaptiveCard",
        "version": CARD_VERSION,
        "body": [text_block(FEEDBACK_PROMPT_TEXT, "Default")],
        "actions": [button("👍", "positive"), button("👎", "negative")],
    })
}

/// Replaces the prompt once feedback was accepted.
pub fn build_ack_card() -> Value {
    single_line_card(FEEDBACK_ACK_TEXT, "Good")
}

pub fn build_error_card(text: &str) -> Value {
    single_line_card(&format!("❌ {text}"), "Attention")
}

/// Wraps a card as an `adaptiveCard/action` invoke response body.
pub fn card_invoke_response(card: Value) -> Value {
    json!({
        "statusCode": 200,
        "type": ADAPTIVE_CARD_CONTENT_TYPE,
        "value": card,
    })
}

fn single_line_card(text: &str, color: &str) -> Value {
    json!({
        "type": "AdaptiveCard",
        "version": CARD_VERSION,
        "body": [text_block(text, color)],
    })
}

fn text_block(text: &str, color: &str) -> Value {
    json!({
        "type": "TextBlock",
        "text": text,
        "size": "Small",
        "color": color,
        "wrap": true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_buttons_round_trip_feedback_data() {
        let card = build_feedback_prompt("msg-1", "29:abc");
        assert_eq!(card["type"], "AdaptiveCard");
        assert_eq!(card["version"], "1.3");
        assert_eq!(card["body"][0]["text"], FEEDBACK_PROMPT_TEXT);

        let actions = card["actions"].as_array().unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0]["title"], "👍");
        assert_eq!(actions[1]["title"], "👎");

        let data: FeedbackData = serde_json::from_value(actions[0]["data"].clone()).unwrap();
        assert_eq!(data, FeedbackData::new("msg-1", "29:abc", "positive"));
        assert_eq!(
            actions[1]["data"],
            json!({"action": "feedback", "messageId": "msg-1", "userId": "29:abc", "feedback": "negative"})
        );
    }

    #[test]
    fn ack_and_error_cards_use_status_colors() {
        let ack = build_ack_card();
        assert_eq!(ack["body"][0]["text"], FEEDBACK_ACK_TEXT);
        assert_eq!(ack["body"][0]["color"], "Good");
        assert!(ack.get("actions").is_none());

        let err = build_error_card(FEEDBACK_FAILED_TEXT);
        assert_eq!(
            err["body"][0]["text"],
            "❌ Failed to send feedback. Please try again."
        );
        assert_eq!(err["body"][0]["color"], "Attention");
    }

    #[test]
    fn invoke_response_wraps_card() {
        let body = card_invoke_response(build_ack_card());
        assert_eq!(body["statusCode"], 200);
        assert_eq!(body["type"], ADAPTIVE_CARD_CONTENT_TYPE);
        assert_eq!(body["value"]["type"], "AdaptiveCard");
    }
}
