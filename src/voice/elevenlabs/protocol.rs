//! Wire format of the ElevenLabs conversational agent socket.

use serde::Deserialize;
use serde_json::json;

use crate::voice::audio;
use crate::voice::types::{AgentMode, OutboundFrame, TranscriptMessage, VoiceEvent};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConversationInitiationMetadata {
        conversation_initiation_metadata_event: MetadataEvent,
    },
    AgentResponse {
        agent_response_event: AgentResponseEvent,
    },
    UserTranscript {
        user_transcription_event: UserTranscriptionEvent,
    },
    Audio {},
    Interruption {},
    Ping {
        ping_event: PingEvent,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct MetadataEvent {
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AgentResponseEvent {
    #[serde(default)]
    pub agent_response: String,
}

#[derive(Debug, Deserialize)]
pub struct UserTranscriptionEvent {
    #[serde(default)]
    pub user_transcript: String,
}

#[derive(Debug, Deserialize)]
pub struct PingEvent {
    pub event_id: u64,
}

/// What the adapter should do with one server frame.
#[derive(Debug, PartialEq)]
pub enum Action {
    Emit(Vec<VoiceEvent>),
    Reply(String),
    Ignore,
}

pub fn parse(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn handle(message: ServerMessage) -> Action {
    match message {
        ServerMessage::ConversationInitiationMetadata {
            conversation_initiation_metadata_event: meta,
        } => Action::Emit(vec![
            VoiceEvent::Connected {
                conversation_id: meta.conversation_id,
            },
            VoiceEvent::ModeChanged(AgentMode::Listening),
        ]),
        ServerMessage::AgentResponse {
            agent_response_event: event,
        } => emit_message(&event.agent_response, "ai"),
        ServerMessage::UserTranscript {
            user_transcription_event: event,
        } => emit_message(&event.user_transcript, "user"),
        ServerMessage::Audio {} => Action::Emit(vec![VoiceEvent::ModeChanged(AgentMode::Speaking)]),
        ServerMessage::Interruption {} => {
            Action::Emit(vec![VoiceEvent::ModeChanged(AgentMode::Listening)])
        }
        ServerMessage::Ping { ping_event } => Action::Reply(pong(ping_event.event_id)),
        ServerMessage::Unknown => Action::Ignore,
    }
}

fn emit_message(text: &str, source: &str) -> Action {
    match TranscriptMessage::from_source(text, source) {
        Some(message) => Action::Emit(vec![VoiceEvent::Message(message)]),
        None => Action::Ignore,
    }
}

pub fn initiation() -> String {
    json!({"type": "conversation_initiation_client_data"}).to_string()
}

pub fn pong(event_id: u64) -> String {
    json!({"type": "pong", "event_id": event_id}).to_string()
}

pub fn encode(frame: &OutboundFrame) -> String {
    match frame {
        OutboundFrame::Text(text) => json!({"type": "user_message", "text": text}).to_string(),
        OutboundFrame::Audio(pcm) => {
            json!({"user_audio_chunk": audio::encode_chunk(pcm)}).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn handled(raw: &str) -> Action {
        handle(parse(raw).unwrap())
    }

    #[test]
    fn test_metadata_connects() {
        let action = handled(
            r#"{"type":"conversation_initiation_metadata","conversation_initiation_metadata_event":{"conversation_id":"el-42","agent_output_audio_format":"pcm_16000"}}"#,
        );
        assert_eq!(
            action,
            Action::Emit(vec![
                VoiceEvent::Connected {
                    conversation_id: "el-42".into()
                },
                VoiceEvent::ModeChanged(AgentMode::Listening),
            ])
        );
    }

    #[test]
    fn test_transcripts_map_roles() {
        let agent = handled(
            r#"{"type":"agent_response","agent_response_event":{"agent_response":"Where to?"}}"#,
        );
        let user = handled(
            r#"{"type":"user_transcript","user_transcription_event":{"user_transcript":"Lisbon in May"}}"#,
        );
        match (agent, user) {
            (Action::Emit(a), Action::Emit(u)) => {
                assert!(matches!(&a[0], VoiceEvent::Message(m) if m.role == Role::Assistant));
                assert!(
                    matches!(&u[0], VoiceEvent::Message(m) if m.role == Role::User && m.content == "Lisbon in May")
                );
            }
            other => panic!("unexpected actions: {:?}", other),
        }
    }

    #[test]
    fn test_blank_transcript_ignored() {
        let action = handled(
            r#"{"type":"user_transcript","user_transcription_event":{"user_transcript":"  "}}"#,
        );
        assert_eq!(action, Action::Ignore);
    }

    #[test]
    fn test_ping_and_unknown() {
        let action = handled(r#"{"type":"ping","ping_event":{"event_id":9,"ping_ms":30}}"#);
        match action {
            Action::Reply(raw) => {
                let pong: serde_json::Value = serde_json::from_str(&raw).unwrap();
                assert_eq!(pong["type"], "pong");
                assert_eq!(pong["event_id"], 9);
            }
            other => panic!("expected pong, got {:?}", other),
        }
        assert_eq!(handled(r#"{"type":"vad_score","vad_score_event":{}}"#), Action::Ignore);
        assert_eq!(
            handled(r#"{"type":"audio","audio_event":{"audio_base_64":"AAAA","event_id":1}}"#),
            Action::Emit(vec![VoiceEvent::ModeChanged(AgentMode::Speaking)])
        );
    }

    #[test]
    fn test_encode_frames() {
        let text: serde_json::Value =
            serde_json::from_str(&encode(&OutboundFrame::Text("hello".into()))).unwrap();
        assert_eq!(text["type"], "user_message");
        assert_eq!(text["text"], "hello");

        let audio: serde_json::Value =
            serde_json::from_str(&encode(&OutboundFrame::Audio(vec![1, -1]))).unwrap();
        assert_eq!(audio["user_audio_chunk"], "AQD//w==");
    }
}
