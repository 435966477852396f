use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

use crate::models::{Conversation, ConversationStatus, Message, Role, StatusUpdate, TripPlan};

#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new() -> Result<Self> {
        let path = Self::db_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;

        tracing::info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database (used for testing and as placeholder)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn db_path() -> Result<PathBuf> {
        let data_dir = match std::env::var("XDG_DATA_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").context("Neither XDG_DATA_HOME nor HOME is set")?;
                PathBuf::from(home).join(".local/share")
            }
        };
        Ok(data_dir.join("tripchat").join("tripchat.db"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE conversations (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'active',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
                );

                CREATE TABLE settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX idx_conversations_created ON conversations(created_at DESC);
                CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "CREATE TABLE status_updates (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    agent_id TEXT NOT NULL,
                    agent_type TEXT NOT NULL,
                    update_text TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    fetched_at TEXT NOT NULL
                );
                CREATE INDEX idx_status_conversation ON status_updates(conversation_id);

                UPDATE schema_version SET version = 2;",
            )?;
        }

        if version < 3 {
            conn.execute_batch(
                "CREATE TABLE trip_plans (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX idx_trip_plans_conversation ON trip_plans(conversation_id, updated_at DESC);

                UPDATE schema_version SET version = 3;",
            )?;
        }

        Ok(())
    }

    // --- Conversations ---

    /// Insert a conversation unless it is already cached. Local titles and
    /// status survive backend refreshes.
    pub async fn cache_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conn = self.conn.clone();
        let conversation = conversation.clone();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO conversations (id, user_id, title, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    conversation.id,
                    conversation.user_id,
                    conversation.title,
                    conversation.status.as_str(),
                    conversation.created_at.to_rfc3339(),
                    conversation.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, status, created_at, updated_at
                 FROM conversations WHERE id = ?1",
            )?;
            let mut rows = stmt.query_map(params![id], |row| Ok(Self::row_to_conversation(row)))?;
            match rows.next() {
                Some(Ok(Ok(conversation))) => Ok(Some(conversation)),
                Some(Ok(Err(e))) => Err(e),
                Some(Err(e)) => Err(e.into()),
                None => Ok(None),
            }
        })
        .await?
    }

    /// Cached conversations for one user, newest first.
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, status, created_at, updated_at
                 FROM conversations WHERE user_id = ?1 ORDER BY created_at DESC",
            )?;
            let conversations = stmt
                .query_map(params![user_id], |row| Ok(Self::row_to_conversation(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;
            Ok(conversations)
        })
        .await?
    }

    pub async fn update_conversation_title(&self, id: &str, title: &str) -> Result<()> {
        let conn = self.conn.clone();
        let id = id.to_string();
        let title = title.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn update_conversation_status(
        &self,
        id: &str,
        status: ConversationStatus,
    ) -> Result<()> {
        let conn = self.conn.clone();
        let id = id.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "UPDATE conversations SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await?
    }

    // --- Messages ---

    pub async fn insert_message(&self, message: &Message) -> Result<()> {
        let conn = self.conn.clone();
        let message = message.clone();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.conversation_id,
                    message.role.as_str(),
                    message.content,
                    message.created_at.to_rfc3339(),
                ],
            )?;
            conn.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![message.created_at.to_rfc3339(), message.conversation_id],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn.clone();
        let conversation_id = conversation_id.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, created_at
                 FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
            )?;
            let messages = stmt
                .query_map(params![conversation_id], |row| Ok(Self::row_to_message(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await?
    }

    // --- Status updates ---

    /// Store polled records. Records already seen (same `_id`) are skipped.
    /// Returns how many were new.
    pub async fn insert_status_updates(&self, updates: &[StatusUpdate]) -> Result<usize> {
        let conn = self.conn.clone();
        let updates = updates.to_vec();
        task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn.transaction()?;
            let fetched_at = Utc::now().to_rfc3339();
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO status_updates
                        (id, conversation_id, agent_id, agent_type, update_text, timestamp, fetched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for update in &updates {
                    inserted += stmt.execute(params![
                        update.id,
                        update.conversation_id,
                        update.agent_id,
                        update.agent_type,
                        update.update,
                        update.timestamp,
                        fetched_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await?
    }

    /// Cached records for a conversation in arrival order.
    pub async fn list_status_updates(&self, conversation_id: &str) -> Result<Vec<StatusUpdate>> {
        let conn = self.conn.clone();
        let conversation_id = conversation_id.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, agent_id, agent_type, update_text, timestamp
                 FROM status_updates WHERE conversation_id = ?1 ORDER BY rowid ASC",
            )?;
            let updates = stmt
                .query_map(params![conversation_id], |row| {
                    Ok(StatusUpdate {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        agent_id: row.get(2)?,
                        agent_type: row.get(3)?,
                        update: row.get(4)?,
                        timestamp: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(updates)
        })
        .await?
    }

    // --- Trip plans ---

    pub async fn save_trip_plan(&self, plan: &TripPlan) -> Result<()> {
        let conn = self.conn.clone();
        let body = serde_json::to_string(plan)?;
        let plan = plan.clone();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO trip_plans (id, conversation_id, status, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    conversation_id = ?2, status = ?3, body = ?4, updated_at = ?5",
                params![
                    plan.id,
                    plan.conversation_id,
                    plan.status.as_str(),
                    body,
                    plan.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn get_trip_plan(&self, id: &str) -> Result<Option<TripPlan>> {
        self.query_trip_plan("SELECT body FROM trip_plans WHERE id = ?1", id)
            .await
    }

    /// Most recently updated plan for a conversation.
    pub async fn trip_plan_for_conversation(&self, conversation_id: &str) -> Result<Option<TripPlan>> {
        self.query_trip_plan(
            "SELECT body FROM trip_plans WHERE conversation_id = ?1
             ORDER BY updated_at DESC LIMIT 1",
            conversation_id,
        )
        .await
    }

    async fn query_trip_plan(&self, sql: &'static str, key: &str) -> Result<Option<TripPlan>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let body: Option<String> = conn
                .query_row(sql, params![key], |row| row.get(0))
                .optional()?;
            match body {
                Some(body) => Ok(Some(
                    serde_json::from_str(&body).context("Stored trip plan is not valid JSON")?,
                )),
                None => Ok(None),
            }
        })
        .await?
    }

    // --- Settings ---

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let result: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(result)
        })
        .await?
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            Ok(())
        })
        .await?
    }

    // --- Row helpers ---

    fn row_to_conversation(row: &rusqlite::Row) -> Result<Conversation> {
        let status_str: String = row.get(3)?;
        let created_str: String = row.get(4)?;
        let updated_str: String = row.get(5)?;

        Ok(Conversation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            status: ConversationStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Unknown conversation status: {}", status_str))?,
            created_at: DateTime::parse_from_rfc3339(&created_str)?.with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_str)?.with_timezone(&Utc),
        })
    }

    fn row_to_message(row: &rusqlite::Row) -> Result<Message> {
        let role_str: String = row.get(2)?;
        let created_str: String = row.get(4)?;

        Ok(Message {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            role: Role::from_str(&role_str)
                .ok_or_else(|| anyhow::anyhow!("Unknown role: {}", role_str))?,
            content: row.get(3)?,
            created_at: DateTime::parse_from_rfc3339(&created_str)?.with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::PlanStatus;

    fn status(id: &str, conversation_id: &str, update: &str) -> StatusUpdate {
        StatusUpdate {
            id: id.to_string(),
            agent_id: "a1".to_string(),
            agent_type: "hotel_agent".to_string(),
            conversation_id: conversation_id.to_string(),
            update: update.to_string(),
            timestamp: "2024-07-01T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_schema_initialization() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.list_conversations("u1").await.unwrap().is_empty());
        assert!(db.get_setting("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conversation_cache_keeps_local_edits() {
        let db = Database::new_in_memory().unwrap();
        let now = Utc::now();

        let older = Conversation::new("c1".into(), "u1".into(), now - Duration::days(1));
        let newer = Conversation::new("c2".into(), "u1".into(), now);
        db.cache_conversation(&older).await.unwrap();
        db.cache_conversation(&newer).await.unwrap();

        db.update_conversation_title("c1", "Lisbon long weekend").await.unwrap();
        db.update_conversation_status("c1", ConversationStatus::Completed)
            .await
            .unwrap();
        db.cache_conversation(&older).await.unwrap();

        let cached = db.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(cached.title, "Lisbon long weekend");
        assert_eq!(cached.status, ConversationStatus::Completed);

        let listed = db.list_conversations("u1").await.unwrap();
        assert_eq!(listed.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), ["c2", "c1"]);
        assert!(db.list_conversations("someone-else").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_messages_in_order() {
        let db = Database::new_in_memory().unwrap();
        let now = Utc::now();
        db.cache_conversation(&Conversation::new("c1".into(), "u1".into(), now))
            .await
            .unwrap();

        for (i, (role, text)) in [(Role::User, "Paris in July"), (Role::Assistant, "How many travelers?")]
            .into_iter()
            .enumerate()
        {
            db.insert_message(&Message {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: "c1".into(),
                role,
                content: text.into(),
                created_at: now + Duration::seconds(i as i64),
            })
            .await
            .unwrap();
        }

        let messages = db.list_messages("c1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "How many travelers?");
    }

    #[tokio::test]
    async fn test_status_updates_deduplicate() {
        let db = Database::new_in_memory().unwrap();
        let first = vec![status("s1", "c1", "Searching hotels"), status("s2", "c1", "Found 3 hotels")];
        assert_eq!(db.insert_status_updates(&first).await.unwrap(), 2);

        let again = vec![status("s2", "c1", "Found 3 hotels"), status("s3", "c1", "TASK_COMPLETE")];
        assert_eq!(db.insert_status_updates(&again).await.unwrap(), 1);

        let cached = db.list_status_updates("c1").await.unwrap();
        assert_eq!(cached.len(), 3);
        assert_eq!(cached[0].id, "s1");
        assert!(cached[2].is_task_complete());
        assert!(db.list_status_updates("c2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trip_plan_upsert() {
        let db = Database::new_in_memory().unwrap();
        let mut plan: TripPlan = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "conversationId": "c1",
            "destination": "Kyoto",
            "dates": {"start": "2024-10-01", "end": "2024-10-05"},
            "status": "reviewing"
        }))
        .unwrap();
        db.save_trip_plan(&plan).await.unwrap();

        plan.status = PlanStatus::Approved;
        db.save_trip_plan(&plan).await.unwrap();

        let stored = db.get_trip_plan("p1").await.unwrap().unwrap();
        assert_eq!(stored.status, PlanStatus::Approved);
        let by_conversation = db.trip_plan_for_conversation("c1").await.unwrap().unwrap();
        assert_eq!(by_conversation.destination, "Kyoto");
        assert!(db.trip_plan_for_conversation("c9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("k", "one").await.unwrap();
        db.set_setting("k", "two").await.unwrap();
        assert_eq!(db.get_setting("k").await.unwrap().as_deref(), Some("two"));
    }
}
