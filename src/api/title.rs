use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use reqwest::Client;
use url::Url;

use super::wire::{TitleRequest, TitleResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TITLE_CHARS: usize = 80;

/// Names conversations from their opening message. Never fails: any problem
/// with the title service yields a dated fallback.
#[derive(Debug, Clone)]
pub struct TitleClient {
    client: Client,
    url: Url,
}

impl TitleClient {
    pub fn new(url: Url) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, url }
    }

    pub async fn generate_title(&self, text: &str) -> String {
        match self.request_title(text).await {
            Ok(Some(title)) => clamp_title(&title),
            Ok(None) => {
                tracing::warn!("Title service returned no title, using fallback");
                fallback_title(Utc::now())
            }
            Err(e) => {
                tracing::warn!("Title generation failed: {}", e);
                fallback_title(Utc::now())
            }
        }
    }

    async fn request_title(&self, text: &str) -> Result<Option<String>, reqwest::Error> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&TitleRequest { text })
            .send()
            .await?
            .error_for_status()?;
        let parsed: TitleResponse = response.json().await?;
        Ok(parsed.into_title())
    }
}

pub fn fallback_title(now: DateTime<Utc>) -> String {
    format!(
        "Trip Planning - {}",
        now.with_timezone(&Local).format("%-m/%-d/%Y")
    )
}

fn clamp_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let cut: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::test_support::MockServer;

    #[tokio::test]
    async fn test_generated_title() {
        let app = Router::new().route(
            "/generate-title",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert!(body["text"].as_str().unwrap_or_default().contains("Paris"));
                Json(json!({"generated_title": "Paris with Friends"}))
            }),
        );
        let server = MockServer::start(app).await;
        let url = Url::parse(&format!("{}/generate-title", server.base_url)).unwrap();
        let client = TitleClient::new(url);

        let title = client
            .generate_title("Plan a trip to Paris with friends on July 5th")
            .await;
        assert_eq!(title, "Paris with Friends");
    }

    #[tokio::test]
    async fn test_fallback_on_error() {
        let app = Router::new().route(
            "/generate-title",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let server = MockServer::start(app).await;
        let url = Url::parse(&format!("{}/generate-title", server.base_url)).unwrap();
        let client = TitleClient::new(url);

        let title = client.generate_title("anything").await;
        assert!(title.starts_with("Trip Planning - "));
    }

    #[test]
    fn test_clamp_title() {
        let long = "a".repeat(200);
        let clamped = clamp_title(&long);
        assert_eq!(clamped.chars().count(), MAX_TITLE_CHARS);
        assert!(clamped.ends_with("..."));
        assert_eq!(clamp_title("Short"), "Short");
    }
}
