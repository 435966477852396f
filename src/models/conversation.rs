use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
    Archived,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ConversationStatus::Active),
            "completed" => Some(ConversationStatus::Completed),
            "archived" => Some(ConversationStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// A freshly created conversation as the backend hands back only its id.
    pub fn new(id: String, user_id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            title: default_title(now),
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Title given to a conversation before the title service has named it.
pub fn default_title(now: DateTime<Utc>) -> String {
    format!(
        "New Trip Planning - {}",
        now.with_timezone(&Local).format("%-m/%-d/%Y")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_is_active() {
        let now = Utc::now();
        let conv = Conversation::new("abc".into(), "user-1".into(), now);
        assert_eq!(conv.status, ConversationStatus::Active);
        assert!(conv.title.starts_with("New Trip Planning - "));
        assert_eq!(conv.created_at, conv.updated_at);
    }

    #[test]
    fn test_status_strings() {
        for status in [
            ConversationStatus::Active,
            ConversationStatus::Completed,
            ConversationStatus::Archived,
        ] {
            assert_eq!(ConversationStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ConversationStatus::from_str("paused"), None);
    }
}
