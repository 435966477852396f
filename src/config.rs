use anyhow::{Context, Result};
use url::Url;

pub const APP_ID: &str = "com.tripchat.TripChat";
pub const APP_NAME: &str = "TripChat";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_API_URL: &str = "https://yaytravel-backend-534113739138.europe-west1.run.app";
const DEFAULT_TITLE_URL: &str =
    "https://waitlist-api-534113739138.europe-west1.run.app/generate-title";
const DEFAULT_VOICE_URL: &str = "wss://api.elevenlabs.io/v1/convai/conversation";

/// Remote endpoints the client talks to, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_url: Url,
    pub status_url: Url,
    pub title_url: Url,
    pub voice_url: Url,
    pub voice_agent_id: Option<String>,
    pub voice_api_key: Option<String>,
}

impl Endpoints {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve endpoints through an arbitrary variable lookup. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = parse_url("TRIPCHAT_API_URL", get("TRIPCHAT_API_URL"), DEFAULT_API_URL)?;
        let status_url = match get("TRIPCHAT_STATUS_URL") {
            Some(raw) => parse_url("TRIPCHAT_STATUS_URL", Some(raw), "")?,
            None => api_url.clone(),
        };
        let title_url =
            parse_url("TRIPCHAT_TITLE_URL", get("TRIPCHAT_TITLE_URL"), DEFAULT_TITLE_URL)?;
        let voice_url =
            parse_url("TRIPCHAT_VOICE_URL", get("TRIPCHAT_VOICE_URL"), DEFAULT_VOICE_URL)?;

        Ok(Self {
            api_url,
            status_url,
            title_url,
            voice_url,
            voice_agent_id: get("ELEVENLABS_AGENT_ID"),
            voice_api_key: get("ELEVENLABS_API_KEY"),
        })
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice_agent_id.is_some()
    }
}

fn parse_url(name: &str, value: Option<String>, default: &str) -> Result<Url> {
    let raw = value.unwrap_or_else(|| default.to_string());
    Url::parse(raw.trim()).with_context(|| format!("{} is not a valid URL: {}", name, raw))
}

/// Join a path onto a base URL without dropping any path prefix the base carries.
pub fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let endpoints = Endpoints::from_lookup(lookup(&[])).unwrap();
        assert_eq!(endpoints.api_url.as_str(), format!("{}/", DEFAULT_API_URL));
        assert_eq!(endpoints.status_url, endpoints.api_url);
        assert_eq!(endpoints.title_url.as_str(), DEFAULT_TITLE_URL);
        assert!(!endpoints.voice_enabled());
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let endpoints = Endpoints::from_lookup(lookup(&[
            ("TRIPCHAT_API_URL", "http://localhost:8000"),
            ("TRIPCHAT_STATUS_URL", "http://localhost:9000/status"),
            ("ELEVENLABS_AGENT_ID", "agent-1"),
            ("ELEVENLABS_API_KEY", "   "),
        ]))
        .unwrap();
        assert_eq!(endpoints.api_url.as_str(), "http://localhost:8000/");
        assert_eq!(endpoints.status_url.as_str(), "http://localhost:9000/status");
        assert_eq!(endpoints.voice_agent_id.as_deref(), Some("agent-1"));
        assert!(endpoints.voice_api_key.is_none());
    }

    #[test]
    fn test_invalid_url_names_variable() {
        let err = Endpoints::from_lookup(lookup(&[("TRIPCHAT_TITLE_URL", "not a url")]))
            .unwrap_err();
        assert!(err.to_string().contains("TRIPCHAT_TITLE_URL"));
    }

    #[test]
    fn test_endpoint_join() {
        let base = Url::parse("http://localhost:9000/status/").unwrap();
        assert_eq!(endpoint(&base, "/read"), "http://localhost:9000/status/read");
        let base = Url::parse("http://localhost:8000").unwrap();
        assert_eq!(endpoint(&base, "conversations/"), "http://localhost:8000/conversations/");
    }
}
