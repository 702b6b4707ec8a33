//! SQLite-backed `HistoryHandle`: production persistence of conversation
//! messages (spec §6, "Persisted state: the core persists only
//! conversation messages").
//!
//! Messages are serialized as JSON on the value side with role as a
//! sideband column, per spec.md §6's storage contract.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragflow_core::{ConversationMessage, FlowError, MessageRole, Result};
use ragflow_engine::HistoryHandle;
use rusqlite::{params, Connection};

fn sqlite_err(err: rusqlite::Error) -> FlowError {
    FlowError::Other(anyhow::anyhow!("sqlite history store: {err}"))
}

/// Owns the SQLite connection backing every conversation's history.
/// Call `handle` to get the `HistoryHandle` capability for one
/// conversation id.
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(sqlite_err)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversation_messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                query TEXT NOT NULL,
                response TEXT,
                references_json TEXT,
                urls_json TEXT,
                provenance_json TEXT,
                timestamp TEXT NOT NULL,
                seq INTEGER NOT NULL
            )",
            [],
        )
        .map_err(sqlite_err)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_conversation
             ON conversation_messages(conversation_id, seq)",
            [],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    pub fn handle(self: &Arc<Self>, conversation_id: impl Into<String>) -> SqliteHistoryHandle {
        SqliteHistoryHandle {
            store: self.clone(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// One conversation's view onto a `SqliteHistoryStore`.
#[derive(Clone)]
pub struct SqliteHistoryHandle {
    store: Arc<SqliteHistoryStore>,
    conversation_id: String,
}

#[async_trait]
impl HistoryHandle for SqliteHistoryHandle {
    async fn append(&self, message: ConversationMessage) -> Result<()> {
        let conn = self.store.conn.lock().unwrap();
        let role = match message.role {
            MessageRole::Human => "human",
            MessageRole::Ai => "ai",
        };
        let references_json = serde_json::to_string(&message.references).map_err(FlowError::from)?;
        let urls_json = serde_json::to_string(&message.urls).map_err(FlowError::from)?;
        let provenance_json = message
            .provenance
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(FlowError::from)?;
        let next_seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM conversation_messages WHERE conversation_id = ?1",
                params![self.conversation_id],
                |row| row.get(0),
            )
            .map_err(sqlite_err)?;

        conn.execute(
            "INSERT INTO conversation_messages
             (id, conversation_id, role, query, response, references_json, urls_json, provenance_json, timestamp, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                message.id,
                self.conversation_id,
                role,
                message.query,
                message.response,
                references_json,
                urls_json,
                provenance_json,
                message.timestamp.to_rfc3339(),
                next_seq,
            ],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    async fn messages(&self) -> Result<Vec<ConversationMessage>> {
        let conn = self.store.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, role, query, response, references_json, urls_json, provenance_json, timestamp
                 FROM conversation_messages
                 WHERE conversation_id = ?1
                 ORDER BY seq ASC",
            )
            .map_err(sqlite_err)?;

        let rows = stmt
            .query_map(params![self.conversation_id], |row| {
                let id: String = row.get(0)?;
                let role: String = row.get(1)?;
                let query: String = row.get(2)?;
                let response: Option<String> = row.get(3)?;
                let references_json: String = row.get(4)?;
                let urls_json: String = row.get(5)?;
                let provenance_json: Option<String> = row.get(6)?;
                let timestamp: String = row.get(7)?;
                Ok((id, role, query, response, references_json, urls_json, provenance_json, timestamp))
            })
            .map_err(sqlite_err)?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, role, query, response, references_json, urls_json, provenance_json, timestamp) =
                row.map_err(sqlite_err)?;
            let role = match role.as_str() {
                "human" => MessageRole::Human,
                _ => MessageRole::Ai,
            };
            let references = serde_json::from_str(&references_json).map_err(FlowError::from)?;
            let urls = serde_json::from_str(&urls_json).map_err(FlowError::from)?;
            let provenance = provenance_json
                .map(|p| serde_json::from_str(&p))
                .transpose()
                .map_err(FlowError::from)?;
            let timestamp: DateTime<Utc> = timestamp
                .parse()
                .map_err(|err| FlowError::Other(anyhow::anyhow!("bad stored timestamp: {err}")))?;
            messages.push(ConversationMessage {
                id,
                role,
                query,
                timestamp,
                response,
                references,
                urls,
                provenance,
            });
        }
        Ok(messages)
    }
}
