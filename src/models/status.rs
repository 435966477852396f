use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::parse_timestamp;

/// Update text the backend uses to signal that plan generation finished.
pub const TASK_COMPLETE: &str = "TASK_COMPLETE";

/// A progress record written by one of the backend planning agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub agent_type: String,
    pub conversation_id: String,
    pub update: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
}

impl StatusUpdate {
    pub fn is_task_complete(&self) -> bool {
        self.update == TASK_COMPLETE
    }

    pub fn level(&self) -> StatusLevel {
        if self.is_task_complete() {
            StatusLevel::Success
        } else {
            StatusLevel::Info
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Text shown to the user; the sentinel gets a friendlier wording.
    pub fn display_text(&self) -> &str {
        if self.is_task_complete() {
            "Trip plan generated successfully"
        } else {
            &self.update
        }
    }

    /// Agent type with underscores turned into words, e.g. `flight_agent` -> `Flight Agent`.
    pub fn agent_label(&self) -> String {
        if self.agent_type.is_empty() {
            return "Planner".to_string();
        }
        self.agent_type
            .split(['_', '-'])
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(update: &str) -> StatusUpdate {
        serde_json::from_value(serde_json::json!({
            "_id": "65f0",
            "agent_id": "a1",
            "agent_type": "hotel_agent",
            "conversation_id": "c1",
            "update": update,
            "timestamp": "2024-07-01T09:30:00.000Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(record(TASK_COMPLETE).is_task_complete());
        assert!(!record("task_complete").is_task_complete());
        assert!(!record("Searching hotels").is_task_complete());
        assert_eq!(record(TASK_COMPLETE).level(), StatusLevel::Success);
    }

    #[test]
    fn test_agent_label_and_timestamp() {
        let update = record("Searching hotels");
        assert_eq!(update.agent_label(), "Hotel Agent");
        assert!(update.parsed_timestamp().is_some());
        assert_eq!(update.display_text(), "Searching hotels");
    }

    #[test]
    fn test_missing_optional_fields() {
        let update: StatusUpdate = serde_json::from_str(
            r#"{"_id": "x", "conversation_id": "c1", "update": "Working"}"#,
        )
        .unwrap();
        assert_eq!(update.agent_label(), "Planner");
        assert!(update.parsed_timestamp().is_none());
    }
}
