use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::SessionSnapshot;

pub type SharedFeedbackStore = Arc<dyn FeedbackStore>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackPolarity {
    Positive,
    Negative,
}

impl FeedbackPolarity {
    /// Parses the card payload label; anything other than `positive` counts as negative.
    pub fn from_label(label: &str) -> Self {
        if label == "positive" {
            Self::Positive
        } else {
            Self::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

/// One feedback click on a Genie answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub user_id: String,
    pub message_id: String,
    pub polarity: FeedbackPolarity,
    pub conversation_id: Option<String>,
    pub session: Option<SessionSnapshot>,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

impl FeedbackRecord {
    pub fn key(&self) -> String {
        record_key(&self.user_id, &self.message_id)
    }
}

pub(crate) fn record_key(user_id: &str, message_id: &str) -> String {
    format!("{user_id}_{message_id}")
}

/// Keeps the latest feedback per `(user, message)`; a second click overwrites the first.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn record(&self, record: FeedbackRecord) -> Result<()>;
    async fn get(&self, user_id: &str, message_id: &str) -> Result<Option<FeedbackRecord>>;
    async fn len(&self) -> Result<usize>;
}
