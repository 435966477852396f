use std::sync::{Arc, RwLock};

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::error::ApiError;
use super::wire::{ConversationRecord, ErrorBody, TokenResponse};
use crate::config::endpoint;
use crate::models::{NewUser, UserProfile};

/// Client for the trip-planning backend: accounts and conversations.
///
/// Clones share the bearer token, so a 401 seen by one clone signs every
/// clone out.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
    token: Arc<RwLock<Option<String>>>,
}

impl BackendClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    pub fn clear_token(&self) {
        self.set_token(None);
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    fn require_token(&self) -> Result<String, ApiError> {
        self.token().ok_or(ApiError::NotLoggedIn)
    }

    async fn error_message(response: Response, fallback: &str) -> String {
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message())
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Map a non-success response of an authenticated call. A 401 drops the
    /// stored token.
    async fn check_authed(&self, response: Response, fallback: &str) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("Backend rejected the access token, signing out");
            self.clear_token();
            return Err(ApiError::SessionExpired);
        }
        Err(ApiError::RequestFailed(
            Self::error_message(response, fallback).await,
        ))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    pub async fn create_user(&self, new_user: &NewUser) -> Result<UserProfile, ApiError> {
        let response = self
            .client
            .post(self.url("users/"))
            .json(new_user)
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::RequestFailed(
                Self::error_message(response, "Failed to create user").await,
            ));
        }
        Self::json(response).await
    }

    /// OAuth2 password grant. On success the token is kept for later calls.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let response = self
            .client
            .post(self.url("token"))
            .form(&[("username", email), ("password", password)])
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::RequestFailed(
                Self::error_message(response, "Login failed").await,
            ));
        }

        let token: TokenResponse = Self::json(response).await?;
        self.set_token(Some(token.access_token.clone()));
        Ok(token)
    }

    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let token = self.require_token()?;
        let response = self
            .client
            .get(self.url("users/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let response = self
            .check_authed(response, "Failed to fetch user profile")
            .await?;
        Self::json(response).await
    }

    /// Returns the id of the new conversation.
    pub async fn create_conversation(&self) -> Result<String, ApiError> {
        let token = self.require_token()?;
        let response = self
            .client
            .post(self.url("conversations/"))
            .bearer_auth(token)
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let response = self
            .check_authed(response, "Failed to create conversation")
            .await?;
        let value: serde_json::Value = Self::json(response).await?;
        conversation_id_from(&value).ok_or_else(|| {
            ApiError::InvalidResponse(format!("no conversation id in {}", value))
        })
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, ApiError> {
        let token = self.require_token()?;
        let response = self
            .client
            .get(self.url("conversations/"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let response = self
            .check_authed(response, "Failed to fetch conversations")
            .await?;
        Self::json(response).await
    }
}

/// The create endpoint answers with a bare JSON string; older deployments
/// wrapped it in an object.
fn conversation_id_from(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
        serde_json::Value::Object(map) => ["conversation_id", "id", "_id"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Form;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::test_support::MockServer;

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer good-token")
    }

    async fn backend() -> MockServer {
        let app = Router::new()
            .route(
                "/token",
                post(|Form(form): Form<Vec<(String, String)>>| async move {
                    let ok = form.contains(&("username".into(), "ana@example.com".into()))
                        && form.contains(&("password".into(), "secret".into()));
                    if ok {
                        (
                            StatusCode::OK,
                            Json(json!({"access_token": "good-token", "token_type": "bearer"})),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"detail": "Incorrect username or password"})),
                        )
                    }
                }),
            )
            .route(
                "/users/",
                post(|Json(body): Json<serde_json::Value>| async move {
                    if body["email"] == "taken@example.com" {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"detail": "Email already registered"})),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "id": 7,
                            "email": body["email"],
                            "FirstName": body["FirstName"],
                            "LastName": body["LastName"],
                            "phoneNumber": body["phoneNumber"],
                            "createdAt": "2024-05-01T10:00:00"
                        })),
                    )
                }),
            )
            .route(
                "/users/me",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "expired"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "id": "u1", "email": "ana@example.com", "FirstName": "Ana",
                            "LastName": "Silva", "phoneNumber": "1", "createdAt": "2024-05-01T10:00:00"
                        })),
                    )
                }),
            )
            .route(
                "/conversations/",
                post(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "expired"})));
                    }
                    (StatusCode::OK, Json(json!("conv-123")))
                })
                .get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "expired"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!([
                            {"_id": "c1", "title": "Paris", "created_at": "2024-01-15T10:00:00"},
                            {"id": "c2", "name": "Tokyo"}
                        ])),
                    )
                }),
            );
        MockServer::start(app).await
    }

    #[tokio::test]
    async fn test_login_stores_token() {
        let server = backend().await;
        let client = BackendClient::new(server.url());
        assert!(!client.is_authenticated());

        let token = client.login("ana@example.com", "secret").await.unwrap();
        assert_eq!(token.access_token, "good-token");
        assert_eq!(client.token().as_deref(), Some("good-token"));
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_detail() {
        let server = backend().await;
        let client = BackendClient::new(server.url());
        let err = client.login("ana@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Incorrect username or password");
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_authed_calls_without_token() {
        let server = backend().await;
        let client = BackendClient::new(server.url());
        let err = client.create_conversation().await.unwrap_err();
        assert!(matches!(err, ApiError::NotLoggedIn));
        assert_eq!(err.to_string(), "No access token found. Please log in.");
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token() {
        let server = backend().await;
        let client = BackendClient::new(server.url());
        client.set_token(Some("stale".into()));
        let shared = client.clone();

        let err = client.fetch_profile().await.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert!(!shared.is_authenticated());
    }

    #[tokio::test]
    async fn test_conversation_crud() {
        let server = backend().await;
        let client = BackendClient::new(server.url());
        client.login("ana@example.com", "secret").await.unwrap();

        assert_eq!(client.create_conversation().await.unwrap(), "conv-123");

        let records = client.list_conversations().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].title.as_deref(), Some("Tokyo"));
    }

    #[tokio::test]
    async fn test_create_user_and_profile() {
        let server = backend().await;
        let client = BackendClient::new(server.url());
        let new_user = NewUser {
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            email: "ana@example.com".into(),
            phone_number: "1".into(),
            password: "secret".into(),
            country: None,
            city: None,
        };
        let created = client.create_user(&new_user).await.unwrap();
        assert_eq!(created.id, "7");

        let taken = NewUser {
            email: "taken@example.com".into(),
            ..new_user
        };
        let err = client.create_user(&taken).await.unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");

        client.login("ana@example.com", "secret").await.unwrap();
        let profile = client.fetch_profile().await.unwrap();
        assert_eq!(profile.first_name, "Ana");
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let client = BackendClient::new(Url::parse("http://127.0.0.1:9").unwrap());
        let err = client.login("a", "b").await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkError(_)));
    }

    #[test]
    fn test_conversation_id_shapes() {
        assert_eq!(conversation_id_from(&json!("abc")).as_deref(), Some("abc"));
        assert_eq!(
            conversation_id_from(&json!({"conversation_id": "x"})).as_deref(),
            Some("x")
        );
        assert!(conversation_id_from(&json!("")).is_none());
        assert!(conversation_id_from(&json!(12)).is_none());
    }
}
