use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::error::ApiError;
use super::wire::{ErrorBody, StatusReadRequest, StatusReadResponse};
use crate::config::endpoint;
use crate::models::StatusUpdate;

/// Anything that can report the agent progress records of a conversation.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn read(&self, conversation_id: &str) -> Result<Vec<StatusUpdate>, ApiError>;
}

/// `POST {status}/read` against the status-reporting service.
#[derive(Debug, Clone)]
pub struct StatusClient {
    client: Client,
    base_url: Url,
}

impl StatusClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    async fn read(&self, conversation_id: &str) -> Result<Vec<StatusUpdate>, ApiError> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "read"))
            .json(&StatusReadRequest { conversation_id })
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message())
                .unwrap_or_else(|| format!("HTTP {}: Failed to fetch status updates", status.as_u16()));
            return Err(ApiError::RequestFailed(message));
        }

        let parsed: StatusReadResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        // Records come back as-is. The backend may spell the conversation id
        // differently from the one we posted, and the completion record must
        // still reach the poller.
        Ok(parsed.status_updates)
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::services::status::{run_polling, PollEvent};
    use crate::test_support::MockServer;

    #[tokio::test]
    async fn test_read_posts_conversation_id() {
        let app = Router::new().route(
            "/read",
            post(|Json(body): Json<serde_json::Value>| async move {
                let id = body["conversation_id"].as_str().unwrap_or_default().to_string();
                Json(json!({
                    "status_updates": [
                        {"_id": "1", "agent_id": "a", "agent_type": "flight_agent",
                         "conversation_id": id, "update": "Searching flights",
                         "timestamp": "2024-07-01T09:00:00"},
                        {"_id": "2", "agent_id": "a", "agent_type": "hotel_agent",
                         "conversation_id": "68b1f0c2e4", "update": "Comparing hotels",
                         "timestamp": "2024-07-01T09:00:01"}
                    ]
                }))
            }),
        );
        let server = MockServer::start(app).await;
        let client = StatusClient::new(server.url());

        let updates = client.read("conv-1").await.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].conversation_id, "conv-1");
        assert_eq!(updates[0].update, "Searching flights");
        assert_eq!(updates[1].conversation_id, "68b1f0c2e4");
    }

    #[tokio::test]
    async fn test_completion_with_other_id_spelling_stops_polling() {
        let app = Router::new().route(
            "/read",
            post(|| async {
                Json(json!({
                    "status_updates": [
                        {"_id": "1", "agent_id": "a", "agent_type": "planner",
                         "conversation_id": "68b1f0c2e4", "update": "TASK_COMPLETE",
                         "timestamp": "2024-07-01T09:05:00"}
                    ]
                }))
            }),
        );
        let server = MockServer::start(app).await;
        let source: Arc<dyn StatusSource> = Arc::new(StatusClient::new(server.url()));

        let mut events = Vec::new();
        let polling = run_polling(
            source,
            "conv-1".to_string(),
            Duration::from_millis(5),
            CancellationToken::new(),
            |event| events.push(event),
        );
        tokio::time::timeout(Duration::from_secs(5), polling)
            .await
            .expect("polling should stop on the completion record");

        assert_eq!(events.len(), 1);
        match &events[0] {
            PollEvent::Complete(updates) => assert!(updates[0].is_task_complete()),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_error_status() {
        let app = Router::new().route(
            "/read",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let server = MockServer::start(app).await;
        let client = StatusClient::new(server.url());

        let err = client.read("conv-1").await.unwrap_err();
        assert!(matches!(err, ApiError::RequestFailed(ref m) if m.starts_with("HTTP 502")));
    }

    #[tokio::test]
    async fn test_read_missing_list_is_empty() {
        let app = Router::new().route("/read", post(|| async { Json(json!({})) }));
        let server = MockServer::start(app).await;
        let client = StatusClient::new(server.url());
        assert!(client.read("conv-1").await.unwrap().is_empty());
    }
}
