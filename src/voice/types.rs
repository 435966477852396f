use thiserror::Error;

use crate::models::Role;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Voice is not configured: set ELEVENLABS_AGENT_ID")]
    NotConfigured,

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Voice session is closed")]
    SessionClosed,

    #[error("Audio device error: {0}")]
    AudioDevice(String),
}

/// Who currently holds the floor in a voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    Speaking,
    Listening,
}

impl AgentMode {
    pub fn label(&self) -> &'static str {
        match self {
            AgentMode::Speaking => "AI is speaking...",
            AgentMode::Listening => "Listening...",
        }
    }
}

/// A transcribed line from either side of the voice conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptMessage {
    pub content: String,
    pub role: Role,
}

impl TranscriptMessage {
    /// Build from the provider's `source` tag. Blank text yields nothing.
    pub fn from_source(text: &str, source: &str) -> Option<Self> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            content: content.to_string(),
            role: role_for_source(source),
        })
    }
}

pub fn role_for_source(source: &str) -> Role {
    match source {
        "human" | "user" => Role::User,
        _ => Role::Assistant,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    Connected { conversation_id: String },
    ModeChanged(AgentMode),
    Message(TranscriptMessage),
    Disconnected,
    Error(String),
}

/// Frames a session pushes to the provider, before wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    /// Mono PCM16 at the provider's input rate.
    Audio(Vec<i16>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_roles() {
        assert_eq!(role_for_source("human"), Role::User);
        assert_eq!(role_for_source("user"), Role::User);
        assert_eq!(role_for_source("ai"), Role::Assistant);
        assert_eq!(role_for_source(""), Role::Assistant);
    }

    #[test]
    fn test_blank_messages_dropped() {
        assert!(TranscriptMessage::from_source("   \n", "ai").is_none());
        let msg = TranscriptMessage::from_source("  Hi there ", "user").unwrap();
        assert_eq!(msg.content, "Hi there");
        assert_eq!(msg.role, Role::User);
    }
}
