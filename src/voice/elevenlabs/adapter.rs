use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::protocol::{self, Action};
use crate::config::Endpoints;
use crate::voice::audio::TARGET_SAMPLE_RATE;
use crate::voice::traits::{VoiceProvider, VoiceSession};
use crate::voice::types::{AgentMode, VoiceError, VoiceEvent};

const SIGNED_URL_ENDPOINT: &str =
    "https://api.elevenlabs.io/v1/convai/conversation/get-signed-url";

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

pub struct ElevenLabsProvider {
    client: Client,
    ws_url: Url,
    signed_url_endpoint: String,
    agent_id: String,
    api_key: Option<String>,
}

impl ElevenLabsProvider {
    pub fn new(ws_url: Url, agent_id: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            ws_url,
            signed_url_endpoint: SIGNED_URL_ENDPOINT.to_string(),
            agent_id,
            api_key,
        }
    }

    pub fn from_endpoints(endpoints: &Endpoints) -> Result<Self, VoiceError> {
        let agent_id = endpoints
            .voice_agent_id
            .clone()
            .ok_or(VoiceError::NotConfigured)?;
        Ok(Self::new(
            endpoints.voice_url.clone(),
            agent_id,
            endpoints.voice_api_key.clone(),
        ))
    }

    #[cfg(test)]
    pub fn with_signed_url_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.signed_url_endpoint = endpoint.into();
        self
    }

    /// Private agents need a short-lived signed URL; public agents take the
    /// agent id as a query parameter.
    async fn session_url(&self) -> Result<String, VoiceError> {
        let Some(api_key) = &self.api_key else {
            let mut url = self.ws_url.clone();
            url.query_pairs_mut().append_pair("agent_id", &self.agent_id);
            return Ok(url.to_string());
        };

        let response = self
            .client
            .get(&self.signed_url_endpoint)
            .query(&[("agent_id", self.agent_id.as_str())])
            .header("xi-api-key", api_key)
            .send()
            .await
            .map_err(|e| VoiceError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(VoiceError::AuthError(format!(
                "signed URL request rejected ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::ConnectionFailed(format!(
                "signed URL request failed ({}): {}",
                status, body
            )));
        }

        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::ConnectionFailed(e.to_string()))?;
        Ok(signed.signed_url)
    }
}

#[async_trait]
impl VoiceProvider for ElevenLabsProvider {
    fn name(&self) -> &'static str {
        "ElevenLabs"
    }

    async fn start_session(
        &self,
        events: mpsc::Sender<VoiceEvent>,
    ) -> Result<VoiceSession, VoiceError> {
        let url = self.session_url().await?;
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| VoiceError::ConnectionFailed(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        sink.send(WsMessage::Text(protocol::initiation()))
            .await
            .map_err(|e| VoiceError::ConnectionFailed(e.to_string()))?;

        let (out_tx, mut out_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let session = VoiceSession::new(out_tx, cancel.clone(), TARGET_SAMPLE_RATE);
        let id_slot = session.id_slot();

        tokio::spawn(async move {
            let mut mode: Option<AgentMode> = None;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break;
                    }
                    frame = out_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Err(e) = sink.send(WsMessage::Text(protocol::encode(&frame))).await {
                            let _ = events.send(VoiceEvent::Error(e.to_string())).await;
                            break;
                        }
                    }
                    incoming = stream.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Text(text))) => {
                                let action = match protocol::parse(&text) {
                                    Ok(message) => protocol::handle(message),
                                    Err(e) => {
                                        tracing::debug!("Unparsed voice frame: {}", e);
                                        Action::Ignore
                                    }
                                };
                                match action {
                                    Action::Emit(batch) => {
                                        for event in batch {
                                            if let VoiceEvent::ModeChanged(next) = event {
                                                if mode == Some(next) {
                                                    continue;
                                                }
                                                mode = Some(next);
                                            }
                                            if let VoiceEvent::Connected { conversation_id } = &event {
                                                if let Ok(mut slot) = id_slot.write() {
                                                    *slot = Some(conversation_id.clone());
                                                }
                                            }
                                            if events.send(event).await.is_err() {
                                                cancel.cancel();
                                            }
                                        }
                                    }
                                    Action::Reply(reply) => {
                                        if let Err(e) = sink.send(WsMessage::Text(reply)).await {
                                            tracing::warn!("Failed to answer voice ping: {}", e);
                                        }
                                    }
                                    Action::Ignore => {}
                                }
                            }
                            Some(Ok(WsMessage::Close(frame))) => {
                                tracing::info!("Voice socket closed by server: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                let _ = events.send(VoiceEvent::Error(e.to_string())).await;
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            cancel.cancel();
            let _ = events.send(VoiceEvent::Disconnected).await;
        });

        tracing::info!("Voice session opened");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::models::Role;
    use crate::test_support::MockServer;

    /// One-connection agent: greets, pings, echoes a user message back as a
    /// transcript and an answer, then hangs up.
    async fn fake_agent() -> (String, tokio::task::JoinHandle<Vec<serde_json::Value>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let mut received = Vec::new();

            let next_json = |msg: WsMessage| -> serde_json::Value {
                match msg {
                    WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
                    other => panic!("unexpected frame: {:?}", other),
                }
            };

            received.push(next_json(ws.next().await.unwrap().unwrap()));
            ws.send(WsMessage::Text(
                json!({
                    "type": "conversation_initiation_metadata",
                    "conversation_initiation_metadata_event": {"conversation_id": "el-1"}
                })
                .to_string(),
            ))
            .await
            .unwrap();
            ws.send(WsMessage::Text(
                json!({"type": "ping", "ping_event": {"event_id": 5}}).to_string(),
            ))
            .await
            .unwrap();
            received.push(next_json(ws.next().await.unwrap().unwrap()));

            let user = next_json(ws.next().await.unwrap().unwrap());
            let text = user["text"].as_str().unwrap_or_default().to_string();
            received.push(user);
            ws.send(WsMessage::Text(
                json!({"type": "user_transcript", "user_transcription_event": {"user_transcript": text}})
                    .to_string(),
            ))
            .await
            .unwrap();
            for _ in 0..2 {
                ws.send(WsMessage::Text(
                    json!({"type": "audio", "audio_event": {"audio_base_64": ""}}).to_string(),
                ))
                .await
                .unwrap();
            }
            ws.send(WsMessage::Text(
                json!({"type": "agent_response", "agent_response_event": {"agent_response": "Booking it."}})
                    .to_string(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
            received
        });

        (format!("ws://{}/", addr), handle)
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let (ws_url, server) = fake_agent().await;
        let provider =
            ElevenLabsProvider::new(Url::parse(&ws_url).unwrap(), "agent-1".into(), None);
        let (tx, mut rx) = mpsc::channel(32);

        let session = provider.start_session(tx).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(VoiceEvent::Connected {
                conversation_id: "el-1".into()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(VoiceEvent::ModeChanged(AgentMode::Listening))
        );
        assert_eq!(session.conversation_id().as_deref(), Some("el-1"));

        session.send_text("Rome next week").await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event == VoiceEvent::Disconnected;
            events.push(event);
            if done {
                break;
            }
        }

        assert!(matches!(&events[0], VoiceEvent::Message(m) if m.role == Role::User && m.content == "Rome next week"));
        assert_eq!(events[1], VoiceEvent::ModeChanged(AgentMode::Speaking));
        assert!(matches!(&events[2], VoiceEvent::Message(m) if m.role == Role::Assistant));
        assert_eq!(events.last(), Some(&VoiceEvent::Disconnected));
        assert!(!session.is_active());

        let received = server.await.unwrap();
        assert_eq!(received[0]["type"], "conversation_initiation_client_data");
        assert_eq!(received[1]["type"], "pong");
        assert_eq!(received[1]["event_id"], 5);
        assert_eq!(received[2]["type"], "user_message");
    }

    #[tokio::test]
    async fn test_signed_url_requires_key() {
        let app = Router::new().route(
            "/get-signed-url",
            get(|headers: HeaderMap| async move {
                if headers.get("xi-api-key").and_then(|v| v.to_str().ok()) == Some("good") {
                    (
                        StatusCode::OK,
                        Json(json!({"signed_url": "wss://example.test/?token=abc"})),
                    )
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad key"})))
                }
            }),
        );
        let server = MockServer::start(app).await;
        let endpoint = format!("{}/get-signed-url", server.base_url);
        let ws_url = Url::parse(SIGNED_URL_ENDPOINT).unwrap();

        let provider = ElevenLabsProvider::new(ws_url.clone(), "agent-1".into(), Some("good".into()))
            .with_signed_url_endpoint(endpoint.clone());
        assert_eq!(
            provider.session_url().await.unwrap(),
            "wss://example.test/?token=abc"
        );

        let provider = ElevenLabsProvider::new(ws_url, "agent-1".into(), Some("bad".into()))
            .with_signed_url_endpoint(endpoint);
        assert!(matches!(
            provider.session_url().await,
            Err(VoiceError::AuthError(_))
        ));
    }

    #[tokio::test]
    async fn test_public_agent_url() {
        let provider = ElevenLabsProvider::new(
            Url::parse("wss://api.elevenlabs.io/v1/convai/conversation").unwrap(),
            "agent 1".into(),
            None,
        );
        assert_eq!(
            provider.session_url().await.unwrap(),
            "wss://api.elevenlabs.io/v1/convai/conversation?agent_id=agent+1"
        );
    }

    #[test]
    fn test_requires_agent_id() {
        let endpoints = Endpoints::from_lookup(|_| None).unwrap();
        assert!(matches!(
            ElevenLabsProvider::from_endpoints(&endpoints),
            Err(VoiceError::NotConfigured)
        ));
    }
}
