use genie_client::{FeedbackRating, GenieError, GenieGateway};
use genie_session::{FeedbackPolarity, FeedbackRecord, SessionManager, SharedFeedbackStore};
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::activity::FeedbackClick;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback storage failed: {0}")]
    Store(#[source] anyhow::Error),
    #[error("session lookup failed: {0}")]
    Session(#[source] anyhow::Error),
    #[error("genie feedback submission failed: {0}")]
    Backend(#[from] GenieError),
}

/// What happened to a submitted rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// Forwarding is switched off.
    Disabled,
    /// The user has no active Genie conversation; nothing was sent.
    NoConversation,
    Sent,
}

/// Stores feedback clicks and forwards them to Genie.
#[derive(Clone)]
pub struct FeedbackRelay {
    sessions: SessionManager,
    store: SharedFeedbackStore,
    gateway: GenieGateway,
    api_enabled: bool,
}

impl FeedbackRelay {
    pub fn new(
        sessions: SessionManager,
        store: SharedFeedbackStore,
        gateway: GenieGateway,
        api_enabled: bool,
    ) -> Self {
        Self {
            sessions,
            store,
            gateway,
            api_enabled,
        }
    }

    pub fn store(&self) -> &SharedFeedbackStore {
        &self.store
    }

    /// Saves the click under `{user_id}_{message_id}`, replacing any earlier one.
    pub async fn record(&self, click: &FeedbackClick) -> Result<FeedbackRecord, FeedbackError> {
        let session = self
            .sessions
            .get(&click.user_id)
            .await
            .map_err(FeedbackError::Session)?;
        let record = FeedbackRecord {
            user_id: click.user_id.clone(),
            message_id: click.message_id.clone(),
            polarity: click.polarity,
            conversation_id: session.as_ref().and_then(|s| s.conversation_id.clone()),
            session: session.as_ref().map(|s| s.snapshot()),
            submitted_at: OffsetDateTime::now_utc(),
        };
        self.store
            .record(record.clone())
            .await
            .map_err(FeedbackError::Store)?;
        info!(
            user_id = %record.user_id,
            message_id = %record.message_id,
            polarity = record.polarity.as_str(),
            "feedback recorded"
        );
        Ok(record)
    }

    pub async fn submit(
        &self,
        user_id: &str,
        message_id: &str,
        polarity: FeedbackPolarity,
    ) -> Result<FeedbackOutcome, FeedbackError> {
        if !self.api_enabled {
            info!(message_id, "genie feedback api disabled, skipping");
            return Ok(FeedbackOutcome::Disabled);
        }

        let conversation_id = self
            .sessions
            .get(user_id)
            .await
            .map_err(FeedbackError::Session)?
            .and_then(|s| s.conversation_id);
        let Some(conversation_id) = conversation_id else {
            warn!(user_id, message_id, "no active conversation for feedback");
            return Ok(FeedbackOutcome::NoConversation);
        };

        let rating = FeedbackRating::from(polarity);
        info!(
            message_id,
            conversation_id = %conversation_id,
            rating = rating.as_str(),
            "sending feedback to genie"
        );
        match self
            .gateway
            .send_feedback(&conversation_id, message_id, rating)
            .await
        {
            Ok(()) => {
                counter!("genie_feedback_submitted_total", "outcome" => "ok").increment(1);
                Ok(FeedbackOutcome::Sent)
            }
            Err(err) => {
                counter!("genie_feedback_submitted_total", "outcome" => "error").increment(1);
                warn!(
                    user_id,
                    message_id,
                    conversation_id = %conversation_id,
                    operation = "send_feedback",
                    error = %err,
                    "genie feedback failed"
                );
                Err(err.into())
            }
        }
    }

    /// Records then submits one click.
    pub async fn handle(&self, click: &FeedbackClick) -> Result<FeedbackOutcome, FeedbackError> {
        self.record(click).await?;
        self.submit(&click.user_id, &click.message_id, click.polarity)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie_client::mock::{MockCall, MockGenieApi, MockReply};
    use genie_session::{shared_feedback_store, shared_memory_store};
    use std::sync::Arc;

    fn relay(api: Arc<MockGenieApi>, enabled: bool) -> (FeedbackRelay, SessionManager) {
        let sessions = SessionManager::new(shared_memory_store());
        let gateway = GenieGateway::new(api, "space-1");
        (
            FeedbackRelay::new(sessions.clone(), shared_feedback_store(), gateway, enabled),
            sessions,
        )
    }

    fn click(user_id: &str, polarity: FeedbackPolarity) -> FeedbackClick {
        FeedbackClick {
            message_id: "msg-1".into(),
            user_id: user_id.into(),
            polarity,
        }
    }

    #[tokio::test]
    async fn unknown_user_is_recorded_but_not_forwarded() {
        let api = Arc::new(MockGenieApi::replying(MockReply::Text("x".into())));
        let (relay, _) = relay(api.clone(), true);

        let outcome = relay
            .handle(&click("ghost", FeedbackPolarity::Positive))
            .await
            .unwrap();

        assert_eq!(outcome, FeedbackOutcome::NoConversation);
        assert!(api.calls().await.is_empty());
        let stored = relay.store().get("ghost", "msg-1").await.unwrap().unwrap();
        assert_eq!(stored.session, None);
    }

    #[tokio::test]
    async fn conversationless_session_is_not_forwarded() {
        let api = Arc::new(MockGenieApi::replying(MockReply::Text("x".into())));
        let (relay, sessions) = relay(api.clone(), true);
        sessions.get_or_create("u-1", Some("Ana")).await.unwrap();

        let outcome = relay
            .submit("u-1", "msg-1", FeedbackPolarity::Negative)
            .await
            .unwrap();

        assert_eq!(outcome, FeedbackOutcome::NoConversation);
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn active_conversation_forwards_mapped_rating() {
        let api = Arc::new(MockGenieApi::replying(MockReply::Text("x".into())));
        let (relay, sessions) = relay(api.clone(), true);
        let mut session = sessions
            .get_or_create("u-1", Some("Ana"))
            .await
            .unwrap()
            .session;
        session.conversation_id = Some("conv-1".into());
        sessions.save(session).await.unwrap();

        let outcome = relay
            .handle(&click("u-1", FeedbackPolarity::Negative))
            .await
            .unwrap();

        assert_eq!(outcome, FeedbackOutcome::Sent);
        assert_eq!(
            api.feedback_calls().await,
            [MockCall::Feedback {
                conversation_id: "conv-1".into(),
                message_id: "msg-1".into(),
                rating: FeedbackRating::Negative,
            }]
        );
        let stored = relay.store().get("u-1", "msg-1").await.unwrap().unwrap();
        assert_eq!(stored.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(stored.session.unwrap().display_name, "Ana");
    }

    #[tokio::test]
    async fn disabled_relay_is_a_successful_no_op() {
        let api = Arc::new(MockGenieApi::replying(MockReply::Text("x".into())));
        let (relay, _) = relay(api.clone(), false);
        let outcome = relay
            .handle(&click("u-1", FeedbackPolarity::Positive))
            .await
            .unwrap();
        assert_eq!(outcome, FeedbackOutcome::Disabled);
        assert!(api.calls().await.is_empty());
        assert_eq!(relay.store().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let api = Arc::new(MockGenieApi::replying(MockReply::Text("x".into())));
        api.fail_feedback("bad rating").await;
        let (relay, sessions) = relay(api, true);
        let mut session = sessions.get_or_create("u-1", None).await.unwrap().session;
        session.conversation_id = Some("conv-1".into());
        sessions.save(session).await.unwrap();

        let err = relay
            .submit("u-1", "msg-1", FeedbackPolarity::Positive)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedbackError::Backend(_)));
    }
}
