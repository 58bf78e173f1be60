//! Activity handler: routes messages, card clicks and membership updates.

use anyhow::Result;
use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use genie_client::GenieGateway;
use genie_session::{SessionManager, UserSession};
use genie_translator::cards::FEEDBACK_FAILED_TEXT;
use genie_translator::{
    build_ack_card, build_error_card, build_feedback_prompt, card_invoke_response, render_for,
    with_user_header,
};

use crate::activity::{ADAPTIVE_CARD_ACTION, ActivityType, CardSubmit, FeedbackClick};
use crate::commands::{self, Command};
use crate::config::FeedbackConfig;
use crate::feedback::FeedbackRelay;
use crate::turn::TurnContext;

const PROCESSING_FAILURE_TEXT: &str = "❌ An error occurred while processing your request.";
const CHAT_FEEDBACK_ACK_TEXT: &str = "✅ Thanks for your feedback!";
const CHAT_FEEDBACK_FAILED_TEXT: &str = "❌ Failed to send feedback. Please try again.";

/// Status and JSON body returned synchronously for an `invoke` activity.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResponse {
    pub status: u16,
    pub body: Value,
}

impl InvokeResponse {
    pub fn new(status: u16, body: impl Into<Value>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub struct GenieBot {
    sessions: SessionManager,
    gateway: GenieGateway,
    relay: FeedbackRelay,
    feedback: FeedbackConfig,
    sample_questions: Vec<String>,
}

impl GenieBot {
    pub fn new(
        sessions: SessionManager,
        gateway: GenieGateway,
        relay: FeedbackRelay,
        feedback: FeedbackConfig,
        sample_questions: Vec<String>,
    ) -> Self {
        Self {
            sessions,
            gateway,
            relay,
            feedback,
            sample_questions,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn relay(&self) -> &FeedbackRelay {
        &self.relay
    }

    /// Handles one activity. Only `invoke` activities produce a response body.
    pub async fn on_turn(&self, ctx: &TurnContext) -> Result<Option<InvokeResponse>> {
        let activity = ctx.activity();
        counter!("bot_activities_total", "type" => activity.kind.clone()).increment(1);
        match activity.activity_type() {
            ActivityType::Message => {
                self.on_message(ctx).await?;
                Ok(None)
            }
            ActivityType::ConversationUpdate => {
                self.on_members_added(ctx).await?;
                Ok(None)
            }
            ActivityType::Invoke => Ok(Some(self.on_invoke(ctx).await)),
            ActivityType::Other => {
                debug!(activity_type = %activity.kind, "ignoring activity");
                Ok(None)
            }
        }
    }

    async fn on_message(&self, ctx: &TurnContext) -> Result<()> {
        let activity = ctx.activity();
        let Some(text) = activity.trimmed_text() else {
            return self.on_message_submit(ctx).await;
        };
        let Some(from) = activity.from.as_ref().filter(|f| !f.id.is_empty()) else {
            warn!(channel_id = %activity.channel_id, "message has no sender, skipping");
            return Ok(());
        };

        let session = self
            .sessions
            .get_or_create(&from.id, from.name.as_deref())
            .await?
            .session;
        info!(
            user = %session.display_label(),
            conversation_id = session.conversation_id.as_deref().unwrap_or_default(),
            "message received"
        );

        match commands::classify(text, activity.is_emulator()) {
            Command::SetUser(name) => {
                let session = self.sessions.set_identity(&from.id, &name).await?;
                ctx.send_text(commands::setuser_text(&session.display_name))
                    .await?;
            }
            Command::SetUserUsage => ctx.send_text(commands::setuser_usage_text()).await?,
            Command::Info => {
                ctx.send_text(commands::info_text(&session, activity.is_emulator()))
                    .await?
            }
            Command::Logout => {
                self.sessions.delete(&from.id).await?;
                ctx.send_text(commands::logout_text(&session.display_name))
                    .await?;
            }
            Command::Help => ctx.send_text(commands::help_text()).await?,
            Command::Reset => {
                self.sessions.reset_conversation(&from.id).await?;
                ctx.send_text(commands::reset_text(&session.display_name))
                    .await?;
            }
            Command::Question => self.on_question(ctx, session, text).await?,
        }
        Ok(())
    }

    async fn on_question(
        &self,
        ctx: &TurnContext,
        mut session: UserSession,
        question: &str,
    ) -> Result<()> {
        if session.restarted_by_timeout {
            ctx.send_text(commands::timeout_notice_text()).await?;
        }

        if let Err(err) = self.answer(ctx, &mut session, question).await {
            error!(
                user = %session.display_label(),
                conversation_id = session.conversation_id.as_deref().unwrap_or_default(),
                operation = "answer",
                error = %err,
                "failed to process question"
            );
            ctx.send_text(with_user_header(
                &session.display_name,
                PROCESSING_FAILURE_TEXT,
            ))
            .await?;
        }

        self.offer_feedback(ctx, &session).await;
        Ok(())
    }

    async fn answer(
        &self,
        ctx: &TurnContext,
        session: &mut UserSession,
        question: &str,
    ) -> Result<()> {
        let reply = self
            .gateway
            .ask(question, session, session.conversation_id.as_deref())
            .await;
        session.record_answer(
            question,
            reply.conversation_id,
            reply.message_id,
            OffsetDateTime::now_utc(),
        );
        self.sessions.save(session.clone()).await?;
        ctx.send_text(render_for(&session.display_name, &reply.answer))
            .await?;
        Ok(())
    }

    /// Sends the thumbs prompt; failures are logged only.
    async fn offer_feedback(&self, ctx: &TurnContext, session: &UserSession) {
        if !self.feedback.cards_enabled {
            return;
        }
        let message_id = self.feedback_message_id(session).await;
        let card = build_feedback_prompt(&message_id, &session.user_id);
        if let Err(err) = ctx.send_card(card).await {
            warn!(
                user = %session.display_label(),
                message_id = %message_id,
                error = %err,
                "failed to send feedback card"
            );
        }
    }

    async fn feedback_message_id(&self, session: &UserSession) -> String {
        if let Some(id) = session.context.last_genie_message_id.clone() {
            return id;
        }
        if let Some(conversation_id) = session.conversation_id.as_deref() {
            if let Some(id) = self.gateway.latest_message_id(conversation_id).await {
                return id;
            }
        }
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        format!("msg_{millis}")
    }

    /// Card submits that arrive as text-less messages.
    async fn on_message_submit(&self, ctx: &TurnContext) -> Result<()> {
        let Some(value) = ctx.activity().value.as_ref() else {
            debug!("ignoring message without text");
            return Ok(());
        };
        match CardSubmit::parse(value) {
            CardSubmit::Feedback(click) => {
                let text = match self.relay.handle(&click).await {
                    Ok(_) => CHAT_FEEDBACK_ACK_TEXT,
                    Err(err) => {
                        error!(
                            user_id = %click.user_id,
                            message_id = %click.message_id,
                            error = %err,
                            "feedback submission failed"
                        );
                        CHAT_FEEDBACK_FAILED_TEXT
                    }
                };
                ctx.send_text(text).await?;
            }
            CardSubmit::IncompleteFeedback => {
                warn!("feedback submit is missing required data");
            }
            CardSubmit::Unknown => debug!("ignoring unrecognised card submit"),
        }
        Ok(())
    }

    async fn on_invoke(&self, ctx: &TurnContext) -> InvokeResponse {
        let activity = ctx.activity();
        let name = activity.name.as_deref().unwrap_or_default();
        info!(invoke = name, "invoke received");
        if name != ADAPTIVE_CARD_ACTION {
            return InvokeResponse::new(200, "OK");
        }

        let value = activity.value.clone().unwrap_or(Value::Null);
        match CardSubmit::parse(&value) {
            CardSubmit::Feedback(click) => self.on_feedback_invoke(&click).await,
            CardSubmit::IncompleteFeedback => {
                InvokeResponse::new(400, "missing required feedback data")
            }
            CardSubmit::Unknown => InvokeResponse::new(400, "Unknown action"),
        }
    }

    async fn on_feedback_invoke(&self, click: &FeedbackClick) -> InvokeResponse {
        if let Err(err) = self.relay.record(click).await {
            error!(
                user_id = %click.user_id,
                message_id = %click.message_id,
                error = %err,
                "failed to store feedback"
            );
            return InvokeResponse::new(500, "Error processing feedback");
        }
        let card = match self
            .relay
            .submit(&click.user_id, &click.message_id, click.polarity)
            .await
        {
            Ok(_) => build_ack_card(),
            Err(err) => {
                error!(
                    user_id = %click.user_id,
                    message_id = %click.message_id,
                    error = %err,
                    "feedback submission failed"
                );
                build_error_card(FEEDBACK_FAILED_TEXT)
            }
        };
        InvokeResponse::new(200, card_invoke_response(card))
    }

    async fn on_members_added(&self, ctx: &TurnContext) -> Result<()> {
        let activity = ctx.activity();
        let bot_id = activity
            .recipient
            .as_ref()
            .map(|r| r.id.as_str())
            .unwrap_or_default();
        for member in activity.members_added.iter().filter(|m| m.id != bot_id) {
            let session = self
                .sessions
                .get_or_create(&member.id, member.name.as_deref())
                .await?
                .session;
            info!(user = %session.display_label(), "member added");
            ctx.send_text(commands::welcome_text(
                &session.display_name,
                &self.sample_questions,
            ))
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use genie_client::mock::{MockCall, MockGenieApi, MockReply};
    use genie_client::{DECODE_FAILURE_TEXT, GenieCapabilities, ListingRoute};
    use genie_session::{shared_feedback_store, shared_memory_store};
    use genie_translator::cards::{ADAPTIVE_CARD_CONTENT_TYPE, FEEDBACK_ACK_TEXT};
    use serde_json::json;
    use time::Duration;
    use tracing_test::traced_test;

    use crate::activity::{Activity, ChannelAccount, ConversationAccount};
    use crate::connector::RecordingSender;

    struct Harness {
        bot: GenieBot,
        api: Arc<MockGenieApi>,
        sender: Arc<RecordingSender>,
    }

    fn harness_with(api: MockGenieApi, cards_enabled: bool) -> Harness {
        let api = Arc::new(api);
        let sessions = SessionManager::new(shared_memory_store());
        let gateway = GenieGateway::new(api.clone(), "space-1");
        let relay = FeedbackRelay::new(
            sessions.clone(),
            shared_feedback_store(),
            gateway.clone(),
            true,
        );
        let bot = GenieBot::new(
            sessions,
            gateway,
            relay,
            FeedbackConfig {
                cards_enabled,
                api_enabled: true,
            },
            vec!["What data is available?".into()],
        );
        Harness {
            bot,
            api,
            sender: Arc::new(RecordingSender::new()),
        }
    }

    fn harness() -> Harness {
        harness_with(
            MockGenieApi::replying(MockReply::Text("Sales and leads tables.".into())),
            true,
        )
    }

    fn activity(kind: &str, channel: &str) -> Activity {
        Activity {
            kind: kind.into(),
            id: Some("act-1".into()),
            channel_id: channel.into(),
            service_url: Some("http://connector.test/".into()),
            from: Some(ChannelAccount {
                id: "29:ana".into(),
                name: Some("Ana".into()),
            }),
            recipient: Some(ChannelAccount {
                id: "28:bot".into(),
                name: Some("Genie".into()),
            }),
            conversation: Some(ConversationAccount {
                id: "19:conv".into(),
                tenant_id: None,
            }),
            ..Activity::default()
        }
    }

    fn message(text: &str) -> Activity {
        activity("message", "msteams").with_text(text)
    }

    impl Harness {
        async fn turn(&self, activity: Activity) -> Option<InvokeResponse> {
            let ctx = TurnContext::new(activity, self.sender.clone());
            self.bot.on_turn(&ctx).await.unwrap()
        }
    }

    #[tokio::test]
    async fn question_gets_answer_then_feedback_card() {
        let h = harness();
        assert_eq!(h.turn(message("What data is available?")).await, None);

        let sent = h.sender.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0].text.as_deref(),
            Some("**👤 Ana**\n\nSales and leads tables.")
        );
        assert_eq!(sent[0].reply_to_id.as_deref(), Some("act-1"));
        let card = &sent[1].attachments[0];
        assert_eq!(card.content_type, ADAPTIVE_CARD_CONTENT_TYPE);
        assert_eq!(card.content["actions"][0]["data"]["messageId"], "msg-1");
        assert_eq!(card.content["actions"][0]["data"]["userId"], "29:ana");

        let session = h.bot.sessions().get("29:ana").await.unwrap().unwrap();
        assert_eq!(session.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(
            session.context.last_question.as_deref(),
            Some("What data is available?")
        );
    }

    #[tokio::test]
    async fn cards_can_be_disabled() {
        let h = harness_with(MockGenieApi::replying(MockReply::Text("ok".into())), false);
        h.turn(message("hi")).await;
        assert_eq!(h.sender.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn follow_up_continues_conversation() {
        let h = harness();
        h.turn(message("first")).await;
        h.turn(message("second")).await;
        let calls = h.api.calls().await;
        assert!(calls.contains(&MockCall::CreateMessage {
            conversation_id: "conv-1".into(),
            content: "[Ana] second".into(),
        }));
    }

    #[tokio::test]
    async fn backend_failure_still_offers_feedback_with_generated_id() {
        let api = MockGenieApi::replying(MockReply::Fail("boom".into())).with_capabilities(
            GenieCapabilities {
                listing: ListingRoute::Unsupported,
                ..GenieCapabilities::default()
            },
        );
        let h = harness_with(api, true);
        h.turn(message("anything")).await;

        let sent = h.sender.sent().await;
        assert_eq!(
            sent[0].text.as_deref(),
            Some("**👤 Ana**\n\nAn error occurred while processing your request.")
        );
        let id = sent[1].attachments[0].content["actions"][0]["data"]["messageId"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(id.starts_with("msg_"), "{id}");
    }

    #[tokio::test]
    async fn idle_session_gets_restart_notice_before_answer() {
        let h = harness();
        h.turn(message("first")).await;
        expire(&h).await;
        h.sender.clear().await;

        h.turn(message("again")).await;
        let texts = h.sender.texts().await;
        assert!(texts[0].starts_with("⏰ **Conversation restarted**"));
        assert_eq!(texts[1], "**👤 Ana**\n\nSales and leads tables.");
    }

    async fn expire(h: &Harness) {
        let mut session = h.bot.sessions().get("29:ana").await.unwrap().unwrap();
        session.last_activity -= Duration::hours(5);
        h.bot.sessions().save(session).await.unwrap();
    }

    #[tokio::test]
    async fn restart_notice_waits_for_first_question_after_a_command() {
        let h = harness();
        h.turn(message("first")).await;
        expire(&h).await;
        h.turn(message("help")).await;
        h.sender.clear().await;

        h.turn(message("again")).await;
        let texts = h.sender.texts().await;
        assert!(texts[0].starts_with("⏰ **Conversation restarted**"));
        assert_eq!(texts[1], "**👤 Ana**\n\nSales and leads tables.");

        h.sender.clear().await;
        h.turn(message("and again")).await;
        let texts = h.sender.texts().await;
        assert!(!texts.iter().any(|t| t.contains("Conversation restarted")));
    }

    #[tokio::test]
    async fn manual_reset_suppresses_restart_notice() {
        let h = harness();
        h.turn(message("first")).await;
        expire(&h).await;
        h.turn(message("reset")).await;
        h.sender.clear().await;

        h.turn(message("fresh question")).await;
        let texts = h.sender.texts().await;
        assert_eq!(texts, ["**👤 Ana**\n\nSales and leads tables."]);
        assert!(h.api.calls().await.contains(&MockCall::StartConversation {
            content: "[Ana] fresh question".into(),
        }));
    }

    #[tokio::test]
    async fn decode_failure_is_reported_and_still_offers_feedback() {
        let h = harness_with(
            MockGenieApi::replying(MockReply::Undecodable("unexpected token".into())),
            true,
        );
        h.turn(message("anything")).await;

        let sent = h.sender.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0].text.as_deref(),
            Some(format!("**👤 Ana**\n\n{DECODE_FAILURE_TEXT}").as_str())
        );
        assert!(!sent[0].text.as_deref().unwrap().contains("unexpected token"));
        assert_eq!(
            sent[1].attachments[0].content["actions"][1]["data"]["feedback"],
            "negative"
        );
    }

    #[tokio::test]
    async fn message_without_sender_is_skipped() {
        let h = harness();
        let mut anonymous = message("hello");
        anonymous.from = None;
        h.turn(anonymous).await;

        assert!(h.sender.sent().await.is_empty());
        assert!(h.api.calls().await.is_empty());
        assert!(h.bot.sessions().get("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn new_user_gets_no_restart_notice() {
        let h = harness();
        h.turn(message("hello")).await;
        let texts = h.sender.texts().await;
        assert!(!texts.iter().any(|t| t.contains("Conversation restarted")));
    }

    #[tokio::test]
    async fn reset_clears_conversation() {
        let h = harness();
        h.turn(message("first")).await;
        h.sender.clear().await;
        h.turn(message("New Chat")).await;

        assert_eq!(
            h.sender.texts().await,
            [commands::reset_text("Ana")]
        );
        let session = h.bot.sessions().get("29:ana").await.unwrap().unwrap();
        assert_eq!(session.conversation_id, None);
        assert_eq!(session.context.last_genie_message_id, None);
    }

    #[tokio::test]
    async fn setuser_on_emulator_replaces_identity() {
        let h = harness();
        h.turn(activity("message", "emulator").with_text("/setuser Jane Doe"))
            .await;
        assert_eq!(h.sender.texts().await, [commands::setuser_text("Jane Doe")]);
        let session = h.bot.sessions().get("29:ana").await.unwrap().unwrap();
        assert_eq!(session.display_name, "Jane Doe");
        assert!(h.api.calls().await.is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn chat_submit_reports_feedback_outcome() {
        let h = harness();
        h.turn(message("q")).await;
        h.sender.clear().await;

        let mut submit = activity("message", "msteams");
        submit.value = Some(json!({
            "action": "feedback", "messageId": "msg-1", "userId": "29:ana", "feedback": "positive"
        }));
        h.turn(submit.clone()).await;
        assert_eq!(h.sender.texts().await, [CHAT_FEEDBACK_ACK_TEXT]);

        h.api.fail_feedback("nope").await;
        h.sender.clear().await;
        h.turn(submit).await;
        assert_eq!(h.sender.texts().await, [CHAT_FEEDBACK_FAILED_TEXT]);
        assert!(logs_contain("feedback submission failed"));
    }

    #[tokio::test]
    async fn incomplete_chat_submit_is_dropped() {
        let h = harness();
        let mut submit = activity("message", "msteams");
        submit.value = Some(json!({"action": "feedback", "messageId": "msg-1"}));
        h.turn(submit).await;
        assert!(h.sender.sent().await.is_empty());
    }

    #[tokio::test]
    async fn invoke_statuses() {
        let h = harness();
        h.turn(message("q")).await;

        let mut invoke = activity("invoke", "msteams");
        invoke.name = Some(ADAPTIVE_CARD_ACTION.into());
        invoke.value = Some(json!({"action": {"type": "Action.Submit", "data": {
            "action": "feedback", "messageId": "msg-1", "userId": "29:ana", "feedback": "negative"
        }}}));
        let response = h.turn(invoke.clone()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body["value"]["body"][0]["text"], FEEDBACK_ACK_TEXT);

        invoke.value = Some(json!({"action": "feedback", "userId": "29:ana"}));
        let response = h.turn(invoke.clone()).await.unwrap();
        assert_eq!(
            response,
            InvokeResponse::new(400, "missing required feedback data")
        );

        invoke.value = Some(json!({"action": "vote"}));
        assert_eq!(h.turn(invoke.clone()).await.unwrap().status, 400);

        invoke.name = Some("task/fetch".into());
        assert_eq!(
            h.turn(invoke).await.unwrap(),
            InvokeResponse::new(200, "OK")
        );
    }

    #[tokio::test]
    async fn welcome_skips_the_bot() {
        let h = harness();
        let mut update = activity("conversationUpdate", "msteams");
        update.members_added = vec![
            ChannelAccount {
                id: "28:bot".into(),
                name: Some("Genie".into()),
            },
            ChannelAccount {
                id: "29:bruno".into(),
                name: Some("Bruno".into()),
            },
        ];
        h.turn(update).await;

        let texts = h.sender.texts().await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Welcome to the Genie Data Bot, Bruno!"));
        assert!(texts[0].contains("- What data is available?"));
        assert!(h.bot.sessions().get("29:bruno").await.unwrap().is_some());
    }
}
