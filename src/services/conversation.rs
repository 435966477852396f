use anyhow::{bail, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::api::{ApiError, BackendClient, ConversationRecord, TitleClient};
use crate::models::conversation::default_title;
use crate::models::user::parse_timestamp;
use crate::models::{Conversation, ConversationStatus, Message, Role};
use crate::services::database::Database;

/// Conversations live on the backend; titles, status and transcripts are
/// kept locally on top of that.
#[derive(Debug, Clone)]
pub struct ConversationService {
    backend: BackendClient,
    titles: TitleClient,
    db: Database,
}

impl ConversationService {
    pub fn new(backend: BackendClient, titles: TitleClient, db: Database) -> Self {
        Self {
            backend,
            titles,
            db,
        }
    }

    pub async fn create(&self, user_id: &str) -> Result<Conversation> {
        let id = self.backend.create_conversation().await?;
        let conversation = Conversation::new(id, user_id.to_string(), Utc::now());
        self.db.cache_conversation(&conversation).await?;
        tracing::info!("Created conversation {}", conversation.id);
        Ok(conversation)
    }

    /// Newest first, archived hidden. Falls back to the local cache when the
    /// backend cannot be reached.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let mut conversations = match self.backend.list_conversations().await {
            Ok(records) => {
                let mut merged = Vec::with_capacity(records.len());
                for record in records {
                    let remote = record_to_conversation(record, user_id);
                    match self.db.get_conversation(&remote.id).await? {
                        Some(local) => merged.push(Conversation {
                            title: local.title,
                            status: local.status,
                            updated_at: local.updated_at.max(remote.updated_at),
                            ..remote
                        }),
                        None => {
                            self.db.cache_conversation(&remote).await?;
                            merged.push(remote);
                        }
                    }
                }
                merged
            }
            Err(ApiError::NetworkError(e)) => {
                tracing::warn!("Backend unreachable, showing cached conversations: {}", e);
                self.db.list_conversations(user_id).await?
            }
            Err(e) => return Err(e.into()),
        };

        conversations.retain(|c| c.status != ConversationStatus::Archived);
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(conversations)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        self.db.get_conversation(id).await
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            bail!("Title cannot be empty");
        }
        self.db.update_conversation_title(id, title).await
    }

    pub async fn set_status(&self, id: &str, status: ConversationStatus) -> Result<()> {
        tracing::debug!("Conversation {} is now {}", id, status.as_str());
        self.db.update_conversation_status(id, status).await
    }

    pub async fn archive(&self, id: &str) -> Result<()> {
        self.set_status(id, ConversationStatus::Archived).await
    }

    /// Name the conversation after its opening message.
    pub async fn retitle_from_first_message(&self, id: &str, text: &str) -> Result<String> {
        let title = self.titles.generate_title(text).await;
        self.db.update_conversation_title(id, &title).await?;
        Ok(title)
    }

    pub async fn save_message(&self, conversation_id: &str, role: Role, content: &str) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_message(&message).await?;
        Ok(message)
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.db.list_messages(conversation_id).await
    }

    pub async fn user_message_count(&self, conversation_id: &str) -> Result<usize> {
        let messages = self.db.list_messages(conversation_id).await?;
        Ok(messages.iter().filter(|m| m.role == Role::User).count())
    }
}

fn record_to_conversation(record: ConversationRecord, fallback_user: &str) -> Conversation {
    let now = Utc::now();
    let created_at = record
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let updated_at = record
        .updated_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(created_at);
    Conversation {
        id: record.id,
        user_id: record
            .user_id
            .unwrap_or_else(|| fallback_user.to_string()),
        title: record
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| default_title(created_at)),
        status: record
            .status
            .as_deref()
            .and_then(ConversationStatus::from_str)
            .unwrap_or(ConversationStatus::Active),
        created_at,
        updated_at,
    }
}

/// First line of `text`, shortened to a sidebar-sized title.
pub fn truncate_title(text: &str) -> String {
    let first_line = text.trim().lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= 50 {
        return first_line.to_string();
    }
    let head: String = first_line.chars().take(47).collect();
    format!("{}...", head.trim_end())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::test_support::MockServer;

    async fn backend() -> MockServer {
        let app = Router::new()
            .route(
                "/conversations/",
                post(|| async { Json(json!("c-new")) }).get(|| async {
                    Json(json!([
                        {"_id": "c-old", "title": "Rome", "created_at": "2024-01-01T09:00:00"},
                        {"_id": "c-mid", "created_at": "2024-02-01T09:00:00Z"},
                        {"_id": "c-arch", "title": "Oslo", "created_at": "2024-03-01T09:00:00Z"}
                    ]))
                }),
            )
            .route(
                "/generate-title",
                post(|| async { Json(json!({"title": "\"Sunny Lisbon Escape\""})) }),
            );
        MockServer::start(app).await
    }

    fn service(server: &MockServer, db: Database) -> ConversationService {
        let backend = BackendClient::new(server.url());
        backend.set_token(Some("t".into()));
        let titles = TitleClient::new(
            Url::parse(&format!("{}/generate-title", server.base_url)).unwrap(),
        );
        ConversationService::new(backend, titles, db)
    }

    #[tokio::test]
    async fn test_create_uses_default_title() {
        let server = backend().await;
        let db = Database::new_in_memory().unwrap();
        let svc = service(&server, db.clone());

        let conv = svc.create("u1").await.unwrap();
        assert_eq!(conv.id, "c-new");
        assert!(conv.title.starts_with("New Trip Planning - "));
        assert!(db.get_conversation("c-new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_merges_local_state() {
        let server = backend().await;
        let db = Database::new_in_memory().unwrap();
        let svc = service(&server, db);

        let first = svc.list("u1").await.unwrap();
        assert_eq!(first.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), ["c-arch", "c-mid", "c-old"]);
        assert!(first[1].title.starts_with("New Trip Planning - "));

        svc.rename("c-old", "  Roman holiday ").await.unwrap();
        svc.archive("c-arch").await.unwrap();

        let second = svc.list("u1").await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].title, "Roman holiday");
    }

    #[tokio::test]
    async fn test_list_falls_back_to_cache() {
        let db = Database::new_in_memory().unwrap();
        db.cache_conversation(&Conversation::new("cached".into(), "u1".into(), Utc::now()))
            .await
            .unwrap();

        let backend = BackendClient::new(Url::parse("http://127.0.0.1:9").unwrap());
        backend.set_token(Some("t".into()));
        let titles = TitleClient::new(Url::parse("http://127.0.0.1:9/t").unwrap());
        let svc = ConversationService::new(backend, titles, db);

        let listed = svc.list("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "cached");
    }

    #[tokio::test]
    async fn test_list_propagates_expired_session() {
        let app = Router::new().route(
            "/conversations/",
            axum::routing::get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({}))) }),
        );
        let server = MockServer::start(app).await;
        let svc = service(&server, Database::new_in_memory().unwrap());

        let err = svc.list("u1").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::SessionExpired)
        ));
    }

    #[tokio::test]
    async fn test_messages_and_retitle() {
        let server = backend().await;
        let db = Database::new_in_memory().unwrap();
        let svc = service(&server, db.clone());
        let conv = svc.create("u1").await.unwrap();

        svc.save_message(&conv.id, Role::User, "A week in Lisbon in June")
            .await
            .unwrap();
        svc.save_message(&conv.id, Role::Assistant, "How many people?")
            .await
            .unwrap();
        assert_eq!(svc.user_message_count(&conv.id).await.unwrap(), 1);
        assert_eq!(svc.list_messages(&conv.id).await.unwrap().len(), 2);

        let title = svc
            .retitle_from_first_message(&conv.id, "A week in Lisbon in June")
            .await
            .unwrap();
        assert_eq!(title, "Sunny Lisbon Escape");
        assert_eq!(svc.get(&conv.id).await.unwrap().unwrap().title, title);
    }

    #[tokio::test]
    async fn test_rename_rejects_blank() {
        let server = backend().await;
        let svc = service(&server, Database::new_in_memory().unwrap());
        assert!(svc.rename("c1", "   ").await.is_err());
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("  Lisbon in May\nwith friends"), "Lisbon in May");
        let long = "é".repeat(60);
        assert_eq!(truncate_title(&long), format!("{}...", "é".repeat(47)));
    }
}
