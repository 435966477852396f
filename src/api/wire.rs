use serde::{Deserialize, Serialize};

use crate::models::StatusUpdate;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
}

fn bearer() -> String {
    "bearer".to_string()
}

/// FastAPI-style error body. `detail` is either a message or a list of
/// validation errors.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .map(str::to_string)
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("; "))
                }
            }
            _ => None,
        }
    }
}

/// A conversation as listed by `GET /conversations/`. The backend has used
/// several spellings over time, so every field but the id is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRecord {
    #[serde(alias = "_id", alias = "conversation_id")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReadRequest<'a> {
    pub conversation_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StatusReadResponse {
    #[serde(default)]
    pub status_updates: Vec<StatusUpdate>,
}

#[derive(Debug, Serialize)]
pub struct TitleRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TitleResponse {
    pub title: Option<String>,
    pub generated_title: Option<String>,
}

impl TitleResponse {
    pub fn into_title(self) -> Option<String> {
        self.title
            .or(self.generated_title)
            .map(|t| t.trim().trim_matches('"').to_string())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_variants() {
        let plain: ErrorBody = serde_json::from_str(r#"{"detail": "Email already registered"}"#).unwrap();
        assert_eq!(plain.message().as_deref(), Some("Email already registered"));

        let validation: ErrorBody = serde_json::from_str(
            r#"{"detail": [{"loc": ["body", "email"], "msg": "field required"}, {"msg": "bad phone"}]}"#,
        )
        .unwrap();
        assert_eq!(validation.message().as_deref(), Some("field required; bad phone"));

        let empty: ErrorBody = serde_json::from_str("{}").unwrap();
        assert!(empty.message().is_none());
    }

    #[test]
    fn test_conversation_record_aliases() {
        let record: ConversationRecord = serde_json::from_str(
            r#"{"_id": "abc", "name": "Tokyo", "createdAt": "2024-01-10T08:00:00Z", "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.title.as_deref(), Some("Tokyo"));
        assert!(record.updated_at.is_none());
    }

    #[test]
    fn test_title_response_prefers_title() {
        let both: TitleResponse =
            serde_json::from_str(r#"{"title": "Paris", "generated_title": "Other"}"#).unwrap();
        assert_eq!(both.into_title().as_deref(), Some("Paris"));

        let generated: TitleResponse =
            serde_json::from_str(r#"{"generated_title": "\"Rome Weekend\""}"#).unwrap();
        assert_eq!(generated.into_title().as_deref(), Some("Rome Weekend"));

        let blank: TitleResponse = serde_json::from_str(r#"{"title": "  "}"#).unwrap();
        assert!(blank.into_title().is_none());
    }
}
