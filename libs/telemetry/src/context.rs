use tracing::Span;

/// Identifiers attached to every span opened for one inbound activity.
#[derive(Debug, Clone, Default)]
pub struct TurnLabels {
    pub activity_type: String,
    pub channel_id: String,
    pub user_id: Option<String>,
    pub conversation_id: Option<String>,
}

impl TurnLabels {
    pub fn new(activity_type: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.into(),
            channel_id: channel_id.into(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Opens the `turn` span; user and conversation are recorded only when known.
    pub fn span(&self) -> Span {
        let span = tracing::info_span!(
            "turn",
            activity_type = %self.activity_type,
            channel_id = %self.channel_id,
            user_id = tracing::field::Empty,
            conversation_id = tracing::field::Empty,
        );
        if let Some(user_id) = &self.user_id {
            span.record("user_id", tracing::field::display(user_id));
        }
        if let Some(conversation_id) = &self.conversation_id {
            span.record("conversation_id", tracing::field::display(conversation_id));
        }
        span
    }
}
