use anyhow::Result;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::{CONVERSATION_TIMEOUT, SharedSessionStore, UserSession};

/// How a session was obtained for the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// No session existed for the user id.
    Created,
    /// Existing session, still within the idle window.
    Resumed,
    /// Existing session whose conversation was dropped for inactivity.
    Expired,
}

#[derive(Debug, Clone)]
pub struct SessionLookup {
    pub session: UserSession,
    pub origin: SessionOrigin,
}

/// Session lifecycle on top of a [`SessionStore`](crate::SessionStore).
#[derive(Clone)]
pub struct SessionManager {
    store: SharedSessionStore,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(store: SharedSessionStore) -> Self {
        Self {
            store,
            timeout: CONVERSATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &SharedSessionStore {
        &self.store
    }

    pub async fn get_or_create(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<SessionLookup> {
        self.get_or_create_at(user_id, display_name, OffsetDateTime::now_utc())
            .await
    }

    pub async fn get_or_create_at(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<SessionLookup> {
        if let Some(mut session) = self.store.get(user_id).await? {
            let origin = if session.is_timed_out(now, self.timeout) {
                info!(
                    user = %session.display_label(),
                    "conversation timed out, resetting"
                );
                session.soft_reset();
                session.restarted_by_timeout = true;
                SessionOrigin::Expired
            } else {
                SessionOrigin::Resumed
            };
            session.touch(now);
            self.store.save(session.clone()).await?;
            return Ok(SessionLookup { session, origin });
        }

        let session = UserSession::new_at(user_id, display_name, now);
        self.store.save(session.clone()).await?;
        info!(user = %session.display_label(), "session created");
        Ok(SessionLookup {
            session,
            origin: SessionOrigin::Created,
        })
    }

    /// Replaces any existing session for `user_id` with a fresh one named `name`.
    pub async fn set_identity(&self, user_id: &str, name: &str) -> Result<UserSession> {
        let session = UserSession::new(user_id, Some(name));
        self.store.save(session.clone()).await?;
        info!(user = %session.display_label(), "session identity replaced");
        Ok(session)
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserSession>> {
        self.store.get(user_id).await
    }

    pub async fn save(&self, session: UserSession) -> Result<()> {
        self.store.save(session).await
    }

    pub async fn delete(&self, user_id: &str) -> Result<()> {
        self.store.delete(user_id).await
    }

    /// Clears the active conversation; a no-op for unknown users.
    pub async fn reset_conversation(&self, user_id: &str) -> Result<Option<UserSession>> {
        let Some(mut session) = self.store.get(user_id).await? else {
            return Ok(None);
        };
        session.soft_reset();
        session.restarted_by_timeout = false;
        self.store.save(session.clone()).await?;
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConversationState, shared_memory_store};
    use time::macros::datetime;

    fn manager() -> SessionManager {
        SessionManager::new(shared_memory_store())
    }

    #[tokio::test]
    async fn creates_session_for_new_user() {
        let sessions = manager();
        let now = datetime!(2024-05-01 09:00 UTC);
        let lookup = sessions
            .get_or_create_at("u-1", Some("Ana"), now)
            .await
            .unwrap();
        assert_eq!(lookup.origin, SessionOrigin::Created);
        assert_eq!(lookup.session.conversation_id, None);
        assert_eq!(lookup.session.last_activity, now);
        assert!(!lookup.session.restarted_by_timeout);
    }

    #[tokio::test]
    async fn resumes_and_refreshes_activity() {
        let sessions = manager();
        let start = datetime!(2024-05-01 09:00 UTC);
        let mut session = sessions
            .get_or_create_at("u-1", Some("Ana"), start)
            .await
            .unwrap()
            .session;
        session.record_answer("q", Some("conv-1".into()), Some("m-1".into()), start);
        sessions.save(session).await.unwrap();

        let later = start + Duration::hours(3);
        let lookup = sessions
            .get_or_create_at("u-1", Some("Someone Else"), later)
            .await
            .unwrap();
        assert_eq!(lookup.origin, SessionOrigin::Resumed);
        assert_eq!(lookup.session.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(lookup.session.display_name, "Ana");
        assert_eq!(lookup.session.last_activity, later);
    }

    #[tokio::test]
    async fn idle_session_is_soft_reset() {
        let sessions = manager();
        let start = datetime!(2024-05-01 09:00 UTC);
        let mut session = sessions
            .get_or_create_at("u-1", Some("Ana"), start)
            .await
            .unwrap()
            .session;
        session.record_answer("q", Some("conv-1".into()), Some("m-1".into()), start);
        sessions.save(session).await.unwrap();

        let later = start + Duration::hours(4) + Duration::minutes(1);
        let lookup = sessions
            .get_or_create_at("u-1", None, later)
            .await
            .unwrap();
        assert_eq!(lookup.origin, SessionOrigin::Expired);
        assert!(lookup.session.restarted_by_timeout);
        assert_eq!(lookup.session.state(), ConversationState::New);
        assert_eq!(lookup.session.user_id, "u-1");
        assert_eq!(lookup.session.display_name, "Ana");
        assert_eq!(lookup.session.last_activity, later);

        let stored = sessions.get("u-1").await.unwrap().unwrap();
        assert_eq!(stored.conversation_id, None);
        assert!(stored.restarted_by_timeout);
    }

    #[tokio::test]
    async fn timeout_flag_survives_until_answer_or_reset() {
        let sessions = manager();
        let start = datetime!(2024-05-01 09:00 UTC);
        let mut session = sessions
            .get_or_create_at("u-1", Some("Ana"), start)
            .await
            .unwrap()
            .session;
        session.record_answer("q", Some("conv-1".into()), Some("m-1".into()), start);
        sessions.save(session).await.unwrap();

        let expired_at = start + Duration::hours(5);
        sessions
            .get_or_create_at("u-1", None, expired_at)
            .await
            .unwrap();
        let lookup = sessions
            .get_or_create_at("u-1", None, expired_at + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(lookup.origin, SessionOrigin::Resumed);
        assert!(lookup.session.restarted_by_timeout);

        let reset = sessions.reset_conversation("u-1").await.unwrap().unwrap();
        assert!(!reset.restarted_by_timeout);

        let mut session = lookup.session;
        session.record_answer("q2", Some("conv-2".into()), None, expired_at);
        assert!(!session.restarted_by_timeout);
    }

    #[tokio::test]
    async fn set_identity_discards_conversation() {
        let sessions = manager();
        let mut session = sessions
            .get_or_create("u-1", Some("Ana"))
            .await
            .unwrap()
            .session;
        session.conversation_id = Some("conv-1".into());
        sessions.save(session).await.unwrap();

        let replaced = sessions.set_identity("u-1", "Bruno").await.unwrap();
        assert_eq!(replaced.display_name, "Bruno");
        assert_eq!(replaced.conversation_id, None);
        let stored = sessions.get("u-1").await.unwrap().unwrap();
        assert_eq!(stored.display_name, "Bruno");
    }

    #[tokio::test]
    async fn delete_then_lookup_creates_fresh_session() {
        let sessions = manager();
        sessions.get_or_create("u-1", Some("Ana")).await.unwrap();
        sessions.delete("u-1").await.unwrap();
        let lookup = sessions.get_or_create("u-1", Some("Ana")).await.unwrap();
        assert_eq!(lookup.origin, SessionOrigin::Created);
    }

    #[tokio::test]
    async fn reset_conversation_ignores_unknown_user() {
        let sessions = manager();
        assert!(sessions.reset_conversation("ghost").await.unwrap().is_none());
    }
}
