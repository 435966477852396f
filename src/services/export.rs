use std::path::Path;

use anyhow::{Context, Result};

use crate::models::{Conversation, Message, Role, TripPlan};
use crate::services::plan::format_markdown;

pub fn export_to_markdown(conversation: &Conversation, messages: &[Message]) -> String {
    let mut output = format!("# {}\n\n", conversation.title);
    output.push_str(&format!(
        "> Status: {} | Started: {}\n\n",
        conversation.status.as_str(),
        conversation.created_at.format("%Y-%m-%d %H:%M")
    ));

    output.push_str("---\n\n");

    for msg in messages {
        let role_label = match msg.role {
            Role::User => "You",
            Role::Assistant => "Trip Planner",
        };
        output.push_str(&format!(
            "### {} ({})\n\n{}\n\n",
            role_label,
            msg.created_at.format("%H:%M"),
            msg.content
        ));
    }

    output
}

pub fn export_plan_to_markdown(plan: &TripPlan) -> String {
    format_markdown(plan)
}

pub async fn write_markdown(path: &Path, contents: String) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Exported to {}", path.display());
    Ok(())
}

/// File name offered in the save dialog.
pub fn suggested_file_name(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "trip.md".to_string()
    } else {
        format!("{}.md", slug)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_transcript_export() {
        let now = Utc::now();
        let mut conv = Conversation::new("c1".into(), "u1".into(), now);
        conv.title = "Lisbon in June".into();
        let messages = vec![
            Message {
                id: "m1".into(),
                conversation_id: "c1".into(),
                role: Role::User,
                content: "Four of us, one week".into(),
                created_at: now,
            },
            Message {
                id: "m2".into(),
                conversation_id: "c1".into(),
                role: Role::Assistant,
                content: "Any budget in mind?".into(),
                created_at: now,
            },
        ];
        let md = export_to_markdown(&conv, &messages);
        assert!(md.starts_with("# Lisbon in June\n\n> Status: active"));
        assert!(md.contains("### You ("));
        assert!(md.contains("Any budget in mind?"));
    }

    #[test]
    fn test_suggested_file_name() {
        assert_eq!(suggested_file_name("New Trip Planning - 7/5/2024"), "new-trip-planning-7-5-2024.md");
        assert_eq!(suggested_file_name("???"), "trip.md");
    }

    #[tokio::test]
    async fn test_write_markdown() {
        let path = std::env::temp_dir().join(format!("tripchat-export-{}.md", uuid::Uuid::new_v4()));
        write_markdown(&path, "# Hi\n".into()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Hi\n");
        let _ = std::fs::remove_file(path);
    }
}
