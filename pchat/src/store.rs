//! Conversation storage contracts and an in-memory implementation.
//!
//! Stores own id and timestamp assignment. Within a session, turn creation
//! timestamps are strictly increasing: a new turn is stamped
//! `max(now, last + 1µs)`.
//!
//! ```rust
//! use pchat::{ConversationStore, InMemoryConversationStore, NewSession, NewTurn};
//! use pcommon::{TenantId, UserId};
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! runtime.block_on(async {
//!     let store = InMemoryConversationStore::new();
//!     let owner = UserId::from("u1");
//!     let session = store
//!         .create_session(NewSession::new(owner.clone(), TenantId::from("t1"), "Demo").with_model("gpt-4"))
//!         .await
//!         .unwrap();
//!
//!     let first = store.append_turn(&session.id, NewTurn::user(owner.clone(), "a", 1)).await.unwrap();
//!     let second = store.append_turn(&session.id, NewTurn::user(owner, "b", 1)).await.unwrap();
//!     assert!(second.created_at > first.created_at);
//! });
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use pcommon::time::{now, strictly_after};
use pcommon::{BoxFuture, SessionId, TurnId, UserId};

use crate::{ChatError, ConversationSession, NewSession, NewTurn, SessionSnapshot, SessionUpdate, Turn};

pub trait ConversationStore: Send + Sync {
    fn create_session<'a>(
        &'a self,
        session: NewSession,
    ) -> BoxFuture<'a, Result<ConversationSession, ChatError>>;

    /// Loads a session and all of its turns (deleted ones included) in creation order.
    /// Tombstoned sessions are returned; callers decide how to treat them.
    fn load_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionSnapshot>, ChatError>>;

    /// Active and inactive sessions of one owner, most recently updated first.
    fn list_sessions<'a>(
        &'a self,
        owner: &'a UserId,
    ) -> BoxFuture<'a, Result<Vec<ConversationSession>, ChatError>>;

    fn update_session<'a>(
        &'a self,
        session_id: &'a SessionId,
        update: SessionUpdate,
    ) -> BoxFuture<'a, Result<ConversationSession, ChatError>>;

    fn append_turn<'a>(
        &'a self,
        session_id: &'a SessionId,
        turn: NewTurn,
    ) -> BoxFuture<'a, Result<Turn, ChatError>>;

    /// Bumps the session's `updated_at`.
    fn touch_session<'a>(&'a self, session_id: &'a SessionId)
    -> BoxFuture<'a, Result<(), ChatError>>;

    /// Non-deleted turns in creation order.
    fn list_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<Turn>, ChatError>>;

    /// Soft-deletes one turn. Returns `false` when it was missing or already deleted.
    fn delete_turn<'a>(
        &'a self,
        session_id: &'a SessionId,
        turn_id: &'a TurnId,
    ) -> BoxFuture<'a, Result<bool, ChatError>>;

    /// Tombstones the session. Returns `false` when it does not exist.
    fn end_session<'a>(&'a self, session_id: &'a SessionId)
    -> BoxFuture<'a, Result<bool, ChatError>>;
}

#[derive(Debug)]
struct StoredSession {
    session: ConversationSession,
    turns: Vec<Turn>,
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    sessions: Mutex<HashMap<SessionId, StoredSession>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<SessionId, StoredSession>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|_| ChatError::store("conversation store lock poisoned", false))
    }
}

fn missing(session_id: &SessionId) -> ChatError {
    ChatError::store(format!("session '{session_id}' does not exist"), false)
}

impl ConversationStore for InMemoryConversationStore {
    fn create_session<'a>(
        &'a self,
        session: NewSession,
    ) -> BoxFuture<'a, Result<ConversationSession, ChatError>> {
        Box::pin(async move {
            let created_at = now();
            let record = ConversationSession {
                id: SessionId::generate(),
                owner: session.owner,
                tenant: session.tenant,
                title: session.title,
                model: session.model.unwrap_or_default(),
                system_directive: session.system_directive,
                temperature: session.temperature,
                max_output_tokens: session.max_output_tokens,
                active: true,
                created_at,
                updated_at: created_at,
                message_count: 0,
            };

            self.sessions()?.insert(
                record.id.clone(),
                StoredSession {
                    session: record.clone(),
                    turns: Vec::new(),
                },
            );
            Ok(record)
        })
    }

    fn load_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionSnapshot>, ChatError>> {
        Box::pin(async move {
            Ok(self.sessions()?.get(session_id).map(|stored| SessionSnapshot {
                session: stored.session.clone(),
                turns: stored.turns.clone(),
            }))
        })
    }

    fn list_sessions<'a>(
        &'a self,
        owner: &'a UserId,
    ) -> BoxFuture<'a, Result<Vec<ConversationSession>, ChatError>> {
        Box::pin(async move {
            let mut sessions = self
                .sessions()?
                .values()
                .filter(|stored| &stored.session.owner == owner)
                .map(|stored| stored.session.clone())
                .collect::<Vec<_>>();
            sessions.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
            Ok(sessions)
        })
    }

    fn update_session<'a>(
        &'a self,
        session_id: &'a SessionId,
        update: SessionUpdate,
    ) -> BoxFuture<'a, Result<ConversationSession, ChatError>> {
        Box::pin(async move {
            let mut sessions = self.sessions()?;
            let stored = sessions
                .get_mut(session_id)
                .ok_or_else(|| missing(session_id))?;
            let session = &mut stored.session;

            if let Some(title) = update.title {
                session.title = title;
            }
            if let Some(model) = update.model {
                session.model = model;
            }
            if let Some(directive) = update.system_directive {
                session.system_directive = Some(directive);
            }
            if let Some(temperature) = update.temperature {
                session.temperature = Some(temperature);
            }
            if let Some(max_output_tokens) = update.max_output_tokens {
                session.max_output_tokens = Some(max_output_tokens);
            }
            session.updated_at = strictly_after(Some(session.updated_at));

            Ok(session.clone())
        })
    }

    fn append_turn<'a>(
        &'a self,
        session_id: &'a SessionId,
        turn: NewTurn,
    ) -> BoxFuture<'a, Result<Turn, ChatError>> {
        Box::pin(async move {
            let mut sessions = self.sessions()?;
            let stored = sessions
                .get_mut(session_id)
                .ok_or_else(|| missing(session_id))?;

            let created_at = strictly_after(stored.turns.last().map(|last| last.created_at));
            let record = Turn {
                id: TurnId::generate(),
                session_id: session_id.clone(),
                author: turn.author,
                role: turn.role,
                content: turn.content,
                model: turn.model,
                token_count: turn.token_count,
                deleted: false,
                edited: false,
                truncated: turn.truncated,
                created_at,
                updated_at: created_at,
            };

            stored.turns.push(record.clone());
            stored.session.message_count += 1;
            Ok(record)
        })
    }

    fn touch_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let mut sessions = self.sessions()?;
            let stored = sessions
                .get_mut(session_id)
                .ok_or_else(|| missing(session_id))?;
            stored.session.updated_at = strictly_after(Some(stored.session.updated_at));
            Ok(())
        })
    }

    fn list_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<Turn>, ChatError>> {
        Box::pin(async move {
            let sessions = self.sessions()?;
            let stored = sessions.get(session_id).ok_or_else(|| missing(session_id))?;
            Ok(stored
                .turns
                .iter()
                .filter(|turn| !turn.deleted)
                .cloned()
                .collect())
        })
    }

    fn delete_turn<'a>(
        &'a self,
        session_id: &'a SessionId,
        turn_id: &'a TurnId,
    ) -> BoxFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let mut sessions = self.sessions()?;
            let stored = sessions
                .get_mut(session_id)
                .ok_or_else(|| missing(session_id))?;

            let Some(turn) = stored
                .turns
                .iter_mut()
                .find(|turn| &turn.id == turn_id && !turn.deleted)
            else {
                return Ok(false);
            };

            turn.deleted = true;
            turn.updated_at = strictly_after(Some(turn.updated_at));
            stored.session.message_count = stored.session.message_count.saturating_sub(1);
            Ok(true)
        })
    }

    fn end_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let mut sessions = self.sessions()?;
            let Some(stored) = sessions.get_mut(session_id) else {
                return Ok(false);
            };

            stored.session.active = false;
            stored.session.updated_at = strictly_after(Some(stored.session.updated_at));
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use pcommon::TenantId;
    use pprovider::Role;

    use super::*;

    async fn seeded_store() -> (InMemoryConversationStore, ConversationSession) {
        let store = InMemoryConversationStore::new();
        let session = store
            .create_session(
                NewSession::new(UserId::from("u1"), TenantId::from("t1"), "Demo")
                    .with_model("gpt-4"),
            )
            .await
            .expect("session should create");
        (store, session)
    }

    #[tokio::test]
    async fn append_turn_counts_and_orders_turns() {
        let (store, session) = seeded_store().await;
        let owner = UserId::from("u1");

        for index in 0..20 {
            store
                .append_turn(&session.id, NewTurn::user(owner.clone(), format!("m{index}"), 1))
                .await
                .expect("turn should append");
        }

        let turns = store.list_turns(&session.id).await.expect("turns should list");
        assert_eq!(turns.len(), 20);
        assert!(turns.windows(2).all(|pair| pair[0].created_at < pair[1].created_at));

        let snapshot = store
            .load_session(&session.id)
            .await
            .expect("load should work")
            .expect("session should exist");
        assert_eq!(snapshot.session.message_count, 20);
    }

    #[tokio::test]
    async fn delete_turn_hides_turn_and_decrements_count() {
        let (store, session) = seeded_store().await;
        let first = store
            .append_turn(&session.id, NewTurn::user(UserId::from("u1"), "a", 1))
            .await
            .expect("turn should append");
        store
            .append_turn(&session.id, NewTurn::assistant("b", "gpt-4", 1))
            .await
            .expect("turn should append");

        assert!(store.delete_turn(&session.id, &first.id).await.expect("delete"));
        assert!(!store.delete_turn(&session.id, &first.id).await.expect("delete twice"));

        let turns = store.list_turns(&session.id).await.expect("turns should list");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::Assistant);

        let snapshot = store
            .load_session(&session.id)
            .await
            .expect("load should work")
            .expect("session should exist");
        assert_eq!(snapshot.session.message_count, 1);
        assert_eq!(snapshot.turns.len(), 2);
    }

    #[tokio::test]
    async fn end_session_tombstones_but_keeps_record() {
        let (store, session) = seeded_store().await;
        assert!(store.end_session(&session.id).await.expect("end should work"));
        assert!(
            !store
                .end_session(&SessionId::from("missing"))
                .await
                .expect("end should work")
        );

        let snapshot = store
            .load_session(&session.id)
            .await
            .expect("load should work")
            .expect("session should exist");
        assert!(!snapshot.session.active);
    }

    #[tokio::test]
    async fn update_session_changes_only_given_fields() {
        let (store, session) = seeded_store().await;
        let updated = store
            .update_session(
                &session.id,
                SessionUpdate {
                    title: Some("Renamed".to_string()),
                    temperature: Some(0.2),
                    ..SessionUpdate::default()
                },
            )
            .await
            .expect("update should work");

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.model, "gpt-4");
        assert_eq!(updated.temperature, Some(0.2));
        assert!(updated.updated_at > session.updated_at);
    }

    #[tokio::test]
    async fn append_to_missing_session_is_store_error() {
        let store = InMemoryConversationStore::new();
        let error = store
            .append_turn(&SessionId::from("nope"), NewTurn::system("x"))
            .await
            .expect_err("append should fail");
        assert_eq!(error.kind, crate::ChatErrorKind::Store);
    }
}
