use std::sync::{Arc, RwLock};

use crate::api::{ApiError, BackendClient};
use crate::models::{NewUser, User};
use crate::services::keyring::KeyringService;

/// Session handling on top of the backend client. The access token is kept
/// in the keyring when one is available so a session survives restarts.
#[derive(Debug, Clone)]
pub struct AuthService {
    backend: BackendClient,
    keyring: Option<KeyringService>,
    user: Arc<RwLock<Option<User>>>,
}

impl AuthService {
    pub fn new(backend: BackendClient, keyring: Option<KeyringService>) -> Self {
        Self {
            backend,
            keyring,
            user: Arc::new(RwLock::new(None)),
        }
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.read().ok().and_then(|guard| guard.clone())
    }

    fn set_user(&self, user: Option<User>) {
        if let Ok(mut guard) = self.user.write() {
            *guard = user;
        }
    }

    /// Create the account, then sign straight in with the same credentials.
    pub async fn sign_up(&self, new_user: &NewUser) -> Result<User, ApiError> {
        let profile = self.backend.create_user(new_user).await?;
        tracing::info!("Created account for {}", profile.email);
        self.login(&new_user.email, &new_user.password).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let token = self.backend.login(email.trim(), password).await?;
        self.persist_token(&token.access_token).await;

        let user: User = self.backend.fetch_profile().await?.into();
        tracing::info!("Signed in as {}", user.email);
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Resume a stored session. A stale token is dropped; network failures
    /// keep it for the next launch.
    pub async fn restore_session(&self) -> Result<Option<User>, ApiError> {
        let Some(keyring) = &self.keyring else {
            return Ok(None);
        };
        let token = match keyring.retrieve_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!("Could not read stored session: {}", e);
                return Ok(None);
            }
        };

        self.backend.set_token(Some(token));
        match self.backend.fetch_profile().await {
            Ok(profile) => {
                let user: User = profile.into();
                tracing::info!("Restored session for {}", user.email);
                self.set_user(Some(user.clone()));
                Ok(Some(user))
            }
            Err(ApiError::SessionExpired) => {
                tracing::info!("Stored session expired");
                self.forget_token().await;
                Ok(None)
            }
            Err(e) => {
                self.backend.clear_token();
                Err(e)
            }
        }
    }

    pub async fn logout(&self) {
        self.backend.clear_token();
        self.set_user(None);
        self.forget_token().await;
        tracing::info!("Signed out");
    }

    /// Called when any request reports an expired session.
    pub async fn handle_expired(&self) {
        self.set_user(None);
        self.forget_token().await;
    }

    async fn persist_token(&self, token: &str) {
        if let Some(keyring) = &self.keyring {
            if let Err(e) = keyring.store_token(token).await {
                tracing::warn!("Session will not survive a restart: {}", e);
            }
        }
    }

    async fn forget_token(&self) {
        if let Some(keyring) = &self.keyring {
            if let Err(e) = keyring.delete_token().await {
                tracing::warn!("Failed to remove stored session: {}", e);
            }
        }
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

    async fn backend() -> MockServer {
        let app = Router::new()
            .route(
                "/users/",
                post(|Json(body): Json<serde_json::Value>| async move {
                    Json(json!({"id": 1, "email": body["email"], "FirstName": body["FirstName"]}))
                }),
            )
            .route(
                "/token",
                post(|Form(form): Form<Vec<(String, String)>>| async move {
                    if form.contains(&("password".into(), "pw".into())) {
                        (StatusCode::OK, Json(json!({"access_token": "t1"})))
                    } else {
                        (StatusCode::BAD_REQUEST, Json(json!({"detail": "Incorrect username or password"})))
                    }
                }),
            )
            .route(
                "/users/me",
                get(|headers: HeaderMap| async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer t1") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "id": "u1", "email": "maya@example.com", "FirstName": "Maya",
                            "LastName": "Chen", "city": "Oslo", "country": "Norway"
                        })),
                    )
                }),
            );
        MockServer::start(app).await
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let server = backend().await;
        let auth = AuthService::new(BackendClient::new(server.url()), None);

        let user = auth.login(" maya@example.com ", "pw").await.unwrap();
        assert_eq!(user.name, "Maya Chen");
        assert_eq!(user.location().as_deref(), Some("Oslo, Norway"));
        assert_eq!(auth.current_user(), Some(user));

        auth.logout().await;
        assert!(auth.current_user().is_none());
        assert!(!auth.backend().is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_login_leaves_signed_out() {
        let server = backend().await;
        let auth = AuthService::new(BackendClient::new(server.url()), None);
        let err = auth.login("maya@example.com", "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Incorrect username or password");
        assert!(auth.current_user().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_signs_in() {
        let server = backend().await;
        let auth = AuthService::new(BackendClient::new(server.url()), None);
        let new_user = NewUser {
            first_name: "Maya".into(),
            last_name: "Chen".into(),
            email: "maya@example.com".into(),
            phone_number: "555".into(),
            password: "pw".into(),
            country: None,
            city: None,
        };
        let user = auth.sign_up(&new_user).await.unwrap();
        assert_eq!(user.id, "u1");
        assert!(auth.backend().is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_without_keyring() {
        let server = backend().await;
        let auth = AuthService::new(BackendClient::new(server.url()), None);
        assert_eq!(auth.restore_session().await.unwrap(), None);
    }
}
