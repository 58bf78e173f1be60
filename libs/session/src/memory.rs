use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::feedback::record_key;
use crate::{FeedbackRecord, FeedbackStore, SessionStore, UserSession};

/// Process-local session map; contents are lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    by_user: DashMap<String, UserSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            by_user: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserSession>> {
        Ok(self.by_user.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, session: UserSession) -> Result<()> {
        self.by_user.insert(session.user_id.clone(), session);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        self.by_user.remove(user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFeedbackStore {
    by_key: DashMap<String, FeedbackRecord>,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self {
            by_key: DashMap::new(),
        }
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn record(&self, record: FeedbackRecord) -> Result<()> {
        self.by_key.insert(record.key(), record);
        Ok(())
    }

    async fn get(&self, user_id: &str, message_id: &str) -> Result<Option<FeedbackRecord>> {
        Ok(self
            .by_key
            .get(&record_key(user_id, message_id))
            .map(|entry| entry.value().clone()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.by_key.len())
    }
}
