//! Per-user session state for the Genie Teams bot.
//!
//! Sessions are keyed by the chat transport's user id and hold the handle of
//! the active Genie conversation. Storage sits behind [`SessionStore`] so the
//! in-memory map used today can be swapped for a durable backend without
//! touching command routing or formatting.

mod feedback;
mod manager;
mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub use feedback::{FeedbackPolarity, FeedbackRecord, FeedbackStore, SharedFeedbackStore};
pub use manager::{SessionLookup, SessionManager, SessionOrigin};
pub use memory::{MemoryFeedbackStore, MemorySessionStore};

/// Idle period after which the active conversation is dropped.
pub const CONVERSATION_TIMEOUT: Duration = Duration::hours(4);

/// Name used when the transport does not supply one.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// Shared session store handle used across the bot.
pub type SharedSessionStore = Arc<dyn SessionStore>;

/// Values stashed after each answered question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_question: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_response_at: Option<OffsetDateTime>,
    /// Genie message the latest feedback prompt should point at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_genie_message_id: Option<String>,
}

/// Lifecycle of the Genie conversation attached to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// The next question starts a new Genie conversation.
    New,
    /// Questions continue the stored conversation.
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
    #[serde(default)]
    pub context: SessionContext,
    /// Set when idleness dropped the conversation; cleared by the next answer
    /// or an explicit reset.
    #[serde(default)]
    pub restarted_by_timeout: bool,
}

impl UserSession {
    pub fn new(user_id: impl Into<String>, display_name: Option<&str>) -> Self {
        Self::new_at(user_id, display_name, OffsetDateTime::now_utc())
    }

    pub fn new_at(
        user_id: impl Into<String>,
        display_name: Option<&str>,
        now: OffsetDateTime,
    ) -> Self {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
            .to_string();
        Self {
            user_id: user_id.into(),
            display_name,
            conversation_id: None,
            created_at: now,
            last_activity: now,
            context: SessionContext::default(),
            restarted_by_timeout: false,
        }
    }

    pub fn state(&self) -> ConversationState {
        if self.conversation_id.is_some() {
            ConversationState::Active
        } else {
            ConversationState::New
        }
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_activity = now;
    }

    /// True when the session has been idle for strictly longer than `timeout`.
    pub fn is_timed_out(&self, now: OffsetDateTime, timeout: Duration) -> bool {
        now - self.last_activity > timeout
    }

    /// Drops the Genie conversation while keeping the user's identity.
    pub fn soft_reset(&mut self) {
        self.conversation_id = None;
        self.context.last_genie_message_id = None;
    }

    /// Records the outcome of a dispatched question.
    pub fn record_answer(
        &mut self,
        question: &str,
        conversation_id: Option<String>,
        message_id: Option<String>,
        now: OffsetDateTime,
    ) {
        self.conversation_id = conversation_id;
        self.context.last_question = Some(question.to_string());
        self.context.last_response_at = Some(now);
        self.context.last_genie_message_id = message_id;
        self.restarted_by_timeout = false;
    }

    /// `"{name} ({user_id})"`, used in log lines.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.display_name, self.user_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            conversation_id: self.conversation_id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            is_authenticated: true,
        }
    }
}

/// Point-in-time copy of a session, kept alongside feedback records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user_id: String,
    pub display_name: String,
    pub conversation_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
    /// Teams users are always authenticated by the channel.
    pub is_authenticated: bool,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserSession>>;
    async fn save(&self, session: UserSession) -> Result<()>;
    async fn delete(&self, user_id: &str) -> Result<()>;
}

/// Returns an in-memory session store wrapped in an [`Arc`].
pub fn shared_memory_store() -> SharedSessionStore {
    Arc::new(MemorySessionStore::new())
}

/// Returns an in-memory feedback store wrapped in an [`Arc`].
pub fn shared_feedback_store() -> SharedFeedbackStore {
    Arc::new(MemoryFeedbackStore::new())
}
