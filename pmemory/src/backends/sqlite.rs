use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta};
use pchat::{
    ChatError, ConversationSession, ConversationStore, NewSession, NewTurn, SessionSnapshot,
    SessionUpdate, Turn,
};
use pcommon::time::{Timestamp, strictly_after};
use pcommon::{BoxFuture, SessionId, TenantId, TurnId, UserId};
use pprovider::Role;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use crate::error::MemoryError;

const SESSION_SELECT: &str = "
    SELECT
        s.session_id,
        s.owner_id,
        s.tenant_id,
        s.title,
        s.model,
        s.system_directive,
        s.temperature,
        s.max_output_tokens,
        s.active,
        s.created_at_micros,
        s.updated_at_micros,
        (SELECT COUNT(*) FROM chat_turns t WHERE t.session_id = s.session_id AND t.deleted = 0)
    FROM chat_sessions s
";

const TURN_SELECT: &str = "
    SELECT
        turn_id,
        session_id,
        author_id,
        role,
        content,
        model,
        token_count,
        deleted,
        edited,
        truncated,
        created_at_micros,
        updated_at_micros
    FROM chat_turns
";

/// SQLite-backed conversation store. Timestamps are stored with microsecond precision.
#[derive(Debug)]
pub struct SqliteConversationStore {
    connection: Mutex<Connection>,
}

impl SqliteConversationStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                MemoryError::storage(format!(
                    "failed to create sqlite parent directory: {error}"
                ))
            })?;
        }

        let connection = Connection::open(path)
            .map_err(|error| sqlite_error("failed to open sqlite database", error))?;
        Self::from_connection(connection)
    }

    pub fn new_in_memory() -> Result<Self, MemoryError> {
        let connection = Connection::open_in_memory()
            .map_err(|error| sqlite_error("failed to open in-memory sqlite database", error))?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, MemoryError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| sqlite_error("failed to configure sqlite busy timeout", error))?;
        let store = Self {
            connection: Mutex::new(connection),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, MemoryError> {
        self.connection
            .lock()
            .map_err(|_| MemoryError::storage("sqlite store lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<(), MemoryError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS chat_sessions (
                session_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                title TEXT NOT NULL,
                model TEXT NOT NULL,
                system_directive TEXT,
                temperature REAL,
                max_output_tokens INTEGER,
                active INTEGER NOT NULL,
                created_at_micros INTEGER NOT NULL,
                updated_at_micros INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_sessions_owner
            ON chat_sessions(owner_id, updated_at_micros);

            CREATE TABLE IF NOT EXISTS chat_turns (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                turn_id TEXT NOT NULL UNIQUE,
                session_id TEXT NOT NULL,
                author_id TEXT,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                model TEXT,
                token_count INTEGER,
                deleted INTEGER NOT NULL DEFAULT 0,
                edited INTEGER NOT NULL DEFAULT 0,
                truncated INTEGER NOT NULL DEFAULT 0,
                created_at_micros INTEGER NOT NULL,
                updated_at_micros INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_turns_session
            ON chat_turns(session_id, created_at_micros, seq);
            ",
        )
        .map_err(|error| sqlite_error("failed to initialize sqlite schema", error))?;

        Ok(())
    }

    fn select_session(
        conn: &Connection,
        session_id: &SessionId,
    ) -> Result<Option<ConversationSession>, MemoryError> {
        conn.query_row(
            &format!("{SESSION_SELECT} WHERE s.session_id = ?1"),
            params![session_id.as_str()],
            session_from_row,
        )
        .optional()
        .map_err(|error| sqlite_error("failed to load session", error))
    }

    fn require_session(
        conn: &Connection,
        session_id: &SessionId,
    ) -> Result<ConversationSession, MemoryError> {
        Self::select_session(conn, session_id)?.ok_or_else(|| {
            MemoryError::not_found(format!("session '{session_id}' does not exist"))
        })
    }

    fn select_turns(
        conn: &Connection,
        session_id: &SessionId,
        include_deleted: bool,
    ) -> Result<Vec<Turn>, MemoryError> {
        let filter = if include_deleted {
            "WHERE session_id = ?1"
        } else {
            "WHERE session_id = ?1 AND deleted = 0"
        };
        let mut statement = conn
            .prepare(&format!(
                "{TURN_SELECT} {filter} ORDER BY created_at_micros, seq"
            ))
            .map_err(|error| sqlite_error("failed to prepare turn query", error))?;
        let rows = statement
            .query_map(params![session_id.as_str()], turn_from_row)
            .map_err(|error| sqlite_error("failed to query turns", error))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|error| sqlite_error("failed to decode turn row", error))
    }
}

impl ConversationStore for SqliteConversationStore {
    fn create_session<'a>(
        &'a self,
        session: NewSession,
    ) -> BoxFuture<'a, Result<ConversationSession, ChatError>> {
        Box::pin(async move {
            let created_at = next_stamp(None);
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

            let conn = self.connection()?;
            conn.execute(
                "
                INSERT INTO chat_sessions (
                    session_id,
                    owner_id,
                    tenant_id,
                    title,
                    model,
                    system_directive,
                    temperature,
                    max_output_tokens,
                    active,
                    created_at_micros,
                    updated_at_micros
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)
                ",
                params![
                    record.id.as_str(),
                    record.owner.as_str(),
                    record.tenant.as_str(),
                    &record.title,
                    &record.model,
                    record.system_directive.as_deref(),
                    record.temperature.map(f64::from),
                    record.max_output_tokens,
                    created_at.timestamp_micros(),
                ],
            )
            .map_err(|error| sqlite_error("failed to insert session", error))?;

            Ok(record)
        })
    }

    fn load_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionSnapshot>, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let Some(session) = Self::select_session(&conn, session_id)? else {
                return Ok(None);
            };
            let turns = Self::select_turns(&conn, session_id, true)?;
            Ok(Some(SessionSnapshot { session, turns }))
        })
    }

    fn list_sessions<'a>(
        &'a self,
        owner: &'a UserId,
    ) -> BoxFuture<'a, Result<Vec<ConversationSession>, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let mut statement = conn
                .prepare(&format!(
                    "{SESSION_SELECT} WHERE s.owner_id = ?1 ORDER BY s.updated_at_micros DESC"
                ))
                .map_err(|error| sqlite_error("failed to prepare session query", error))?;
            let rows = statement
                .query_map(params![owner.as_str()], session_from_row)
                .map_err(|error| sqlite_error("failed to query sessions", error))?;

            let sessions = rows
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| sqlite_error("failed to decode session row", error))?;
            Ok(sessions)
        })
    }

    fn update_session<'a>(
        &'a self,
        session_id: &'a SessionId,
        update: SessionUpdate,
    ) -> BoxFuture<'a, Result<ConversationSession, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let current = Self::require_session(&conn, session_id)?;
            let updated_at = next_stamp(Some(current.updated_at));

            conn.execute(
                "
                UPDATE chat_sessions SET
                    title = COALESCE(?2, title),
                    model = COALESCE(?3, model),
                    system_directive = COALESCE(?4, system_directive),
                    temperature = COALESCE(?5, temperature),
                    max_output_tokens = COALESCE(?6, max_output_tokens),
                    updated_at_micros = ?7
                WHERE session_id = ?1
                ",
                params![
                    session_id.as_str(),
                    update.title,
                    update.model,
                    update.system_directive,
                    update.temperature.map(f64::from),
                    update.max_output_tokens,
                    updated_at.timestamp_micros(),
                ],
            )
            .map_err(|error| sqlite_error("failed to update session", error))?;

            Ok(Self::require_session(&conn, session_id)?)
        })
    }

    fn append_turn<'a>(
        &'a self,
        session_id: &'a SessionId,
        turn: NewTurn,
    ) -> BoxFuture<'a, Result<Turn, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            Self::require_session(&conn, session_id)?;

            let last_micros = conn
                .query_row(
                    "SELECT MAX(created_at_micros) FROM chat_turns WHERE session_id = ?1",
                    params![session_id.as_str()],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .map_err(|error| sqlite_error("failed to read latest turn timestamp", error))?;
            let created_at = next_stamp(last_micros.and_then(DateTime::from_timestamp_micros));

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

            conn.execute(
                "
                INSERT INTO chat_turns (
                    turn_id,
                    session_id,
                    author_id,
                    role,
                    content,
                    model,
                    token_count,
                    truncated,
                    created_at_micros,
                    updated_at_micros
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                ",
                params![
                    record.id.as_str(),
                    session_id.as_str(),
                    record.author.as_ref().map(UserId::as_str),
                    record.role.as_str(),
                    &record.content,
                    record.model.as_deref(),
                    record.token_count,
                    record.truncated,
                    created_at.timestamp_micros(),
                ],
            )
            .map_err(|error| sqlite_error("failed to insert turn", error))?;

            Ok(record)
        })
    }

    fn touch_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let current = Self::require_session(&conn, session_id)?;
            let updated_at = next_stamp(Some(current.updated_at));

            conn.execute(
                "UPDATE chat_sessions SET updated_at_micros = ?2 WHERE session_id = ?1",
                params![session_id.as_str(), updated_at.timestamp_micros()],
            )
            .map_err(|error| sqlite_error("failed to touch session", error))?;
            Ok(())
        })
    }

    fn list_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<Turn>, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            Self::require_session(&conn, session_id)?;
            Ok(Self::select_turns(&conn, session_id, false)?)
        })
    }

    fn delete_turn<'a>(
        &'a self,
        session_id: &'a SessionId,
        turn_id: &'a TurnId,
    ) -> BoxFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            Self::require_session(&conn, session_id)?;

            let previous = conn
                .query_row(
                    "
                    SELECT updated_at_micros FROM chat_turns
                    WHERE session_id = ?1 AND turn_id = ?2 AND deleted = 0
                    ",
                    params![session_id.as_str(), turn_id.as_str()],
                    |row| row.get::<_, i64>(0),
                )
                .optional()
                .map_err(|error| sqlite_error("failed to look up turn", error))?;
            let Some(previous) = previous else {
                return Ok(false);
            };

            let updated_at = next_stamp(DateTime::from_timestamp_micros(previous));
            conn.execute(
                "
                UPDATE chat_turns SET deleted = 1, updated_at_micros = ?3
                WHERE session_id = ?1 AND turn_id = ?2
                ",
                params![
                    session_id.as_str(),
                    turn_id.as_str(),
                    updated_at.timestamp_micros()
                ],
            )
            .map_err(|error| sqlite_error("failed to delete turn", error))?;
            Ok(true)
        })
    }

    fn end_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let Some(current) = Self::select_session(&conn, session_id)? else {
                return Ok(false);
            };

            let updated_at = next_stamp(Some(current.updated_at));
            conn.execute(
                "UPDATE chat_sessions SET active = 0, updated_at_micros = ?2 WHERE session_id = ?1",
                params![session_id.as_str(), updated_at.timestamp_micros()],
            )
            .map_err(|error| sqlite_error("failed to end session", error))?;
            Ok(true)
        })
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationSession> {
    Ok(ConversationSession {
        id: SessionId::new(row.get::<_, String>(0)?),
        owner: UserId::new(row.get::<_, String>(1)?),
        tenant: TenantId::new(row.get::<_, String>(2)?),
        title: row.get(3)?,
        model: row.get(4)?,
        system_directive: row.get(5)?,
        temperature: row.get::<_, Option<f64>>(6)?.map(|value| value as f32),
        max_output_tokens: row.get(7)?,
        active: row.get(8)?,
        created_at: micros_column(row, 9)?,
        updated_at: micros_column(row, 10)?,
        message_count: row.get(11)?,
    })
}

fn turn_from_row(row: &Row<'_>) -> rusqlite::Result<Turn> {
    let role = row.get::<_, String>(3)?;
    let role = role_from_str(&role)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(error)))?;

    Ok(Turn {
        id: TurnId::new(row.get::<_, String>(0)?),
        session_id: SessionId::new(row.get::<_, String>(1)?),
        author: row.get::<_, Option<String>>(2)?.map(UserId::new),
        role,
        content: row.get(4)?,
        model: row.get(5)?,
        token_count: row.get(6)?,
        deleted: row.get(7)?,
        edited: row.get(8)?,
        truncated: row.get(9)?,
        created_at: micros_column(row, 10)?,
        updated_at: micros_column(row, 11)?,
    })
}

fn micros_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Timestamp> {
    let micros = row.get::<_, i64>(index)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, micros))
}

/// A microsecond-precision timestamp strictly later than `previous`.
fn next_stamp(previous: Option<Timestamp>) -> Timestamp {
    let candidate = strictly_after(previous);
    let candidate = DateTime::from_timestamp_micros(candidate.timestamp_micros()).unwrap_or(candidate);
    match previous {
        Some(previous) if candidate <= previous => previous + TimeDelta::microseconds(1),
        _ => candidate,
    }
}

fn role_from_str(value: &str) -> Result<Role, MemoryError> {
    match value {
        "system" => Ok(Role::System),
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        _ => Err(MemoryError::storage(format!("unknown role value '{value}'"))),
    }
}

fn sqlite_error(context: &str, error: rusqlite::Error) -> MemoryError {
    let busy = matches!(
        error.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    );
    let message = format!("{context}: {error}");
    if busy {
        MemoryError::busy(message)
    } else {
        MemoryError::storage(message)
    }
}

pub(crate) fn default_sqlite_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os("PALAVER_SQLITE_PATH") {
        return PathBuf::from(explicit);
    }

    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home)
            .join(".palaver")
            .join("conversations.sqlite3");
    }

    PathBuf::from("conversations.sqlite3")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir()
            .join(format!("pmemory-{prefix}-{unique}"))
            .join("store.sqlite3")
    }

    async fn seeded(store: &SqliteConversationStore) -> ConversationSession {
        store
            .create_session(
                NewSession::new(UserId::from("u1"), TenantId::from("t1"), "Demo")
                    .with_model("gpt-4")
                    .with_system_directive("Be brief.")
                    .with_temperature(0.25),
            )
            .await
            .expect("session should create")
    }

    #[tokio::test]
    async fn sessions_round_trip_with_settings() {
        let store = SqliteConversationStore::new_in_memory().expect("store");
        let session = seeded(&store).await;

        let snapshot = store
            .load_session(&session.id)
            .await
            .expect("load")
            .expect("session exists");
        assert_eq!(snapshot.session, session);
        assert!(snapshot.turns.is_empty());

        let updated = store
            .update_session(
                &session.id,
                SessionUpdate {
                    title: Some("Renamed".to_string()),
                    max_output_tokens: Some(256),
                    ..SessionUpdate::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.model, "gpt-4");
        assert_eq!(updated.system_directive.as_deref(), Some("Be brief."));
        assert_eq!(updated.temperature, Some(0.25));
        assert_eq!(updated.max_output_tokens, Some(256));
        assert!(updated.updated_at > session.updated_at);
    }

    #[tokio::test]
    async fn turns_are_ordered_counted_and_soft_deleted() {
        let store = SqliteConversationStore::new_in_memory().expect("store");
        let session = seeded(&store).await;
        let owner = UserId::from("u1");

        let first = store
            .append_turn(&session.id, NewTurn::user(owner.clone(), "hello", 2))
            .await
            .expect("user turn");
        let second = store
            .append_turn(&session.id, NewTurn::assistant("hi", "gpt-4", 1).mark_truncated())
            .await
            .expect("assistant turn");
        assert!(second.created_at > first.created_at);

        let turns = store.list_turns(&session.id).await.expect("turns");
        assert_eq!(turns, vec![first.clone(), second.clone()]);
        assert_eq!(turns[0].author.as_ref(), Some(&owner));
        assert!(turns[1].truncated);
        assert_eq!(turns[1].model.as_deref(), Some("gpt-4"));

        assert!(store.delete_turn(&session.id, &first.id).await.expect("delete"));
        assert!(!store.delete_turn(&session.id, &first.id).await.expect("delete again"));

        let visible = store.list_turns(&session.id).await.expect("turns");
        assert_eq!(visible.len(), 1);
        let snapshot = store
            .load_session(&session.id)
            .await
            .expect("load")
            .expect("session exists");
        assert_eq!(snapshot.turns.len(), 2);
        assert!(snapshot.turns[0].deleted);
        assert_eq!(snapshot.session.message_count, 1);
    }

    #[tokio::test]
    async fn ended_sessions_stay_loadable_but_inactive() {
        let store = SqliteConversationStore::new_in_memory().expect("store");
        let session = seeded(&store).await;

        assert!(store.end_session(&session.id).await.expect("end"));
        assert!(!store.end_session(&SessionId::from("missing")).await.expect("end missing"));

        let snapshot = store
            .load_session(&session.id)
            .await
            .expect("load")
            .expect("session exists");
        assert!(!snapshot.session.active);

        let error = store
            .append_turn(&SessionId::from("missing"), NewTurn::system("x"))
            .await
            .expect_err("missing session");
        assert!(!error.retryable);
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let path = temp_path("reopen");
        let session_id = {
            let store = SqliteConversationStore::new(&path).expect("store");
            let session = seeded(&store).await;
            store
                .append_turn(&session.id, NewTurn::user(UserId::from("u1"), "persist me", 3))
                .await
                .expect("turn");
            store.touch_session(&session.id).await.expect("touch");
            session.id
        };

        let reopened = SqliteConversationStore::new(&path).expect("reopen");
        let sessions = reopened
            .list_sessions(&UserId::from("u1"))
            .await
            .expect("list");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, session_id);
        assert_eq!(sessions[0].message_count, 1);

        let turns = reopened.list_turns(&session_id).await.expect("turns");
        assert_eq!(turns[0].content, "persist me");

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn next_stamp_is_strictly_increasing_at_microsecond_precision() {
        let far_future = DateTime::from_timestamp_micros(pcommon::time::now().timestamp_micros() + 60_000_000)
            .expect("valid timestamp");
        let next = next_stamp(Some(far_future));
        assert_eq!(next, far_future + TimeDelta::microseconds(1));
        assert_eq!(next.timestamp_subsec_nanos() % 1_000, 0);
    }
}
