use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::audio;
use super::types::{OutboundFrame, VoiceError, VoiceEvent};

#[async_trait]
pub trait VoiceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a session. Events flow into `events` until the session ends,
    /// which is always signalled by a final `VoiceEvent::Disconnected`.
    async fn start_session(
        &self,
        events: mpsc::Sender<VoiceEvent>,
    ) -> Result<VoiceSession, VoiceError>;
}

/// Handle on a running voice session. Clones drive the same session.
#[derive(Debug, Clone)]
pub struct VoiceSession {
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
    input_rate: u32,
    conversation_id: Arc<RwLock<Option<String>>>,
}

impl VoiceSession {
    pub fn new(
        outbound: mpsc::Sender<OutboundFrame>,
        cancel: CancellationToken,
        input_rate: u32,
    ) -> Self {
        Self {
            outbound,
            cancel,
            input_rate,
            conversation_id: Arc::new(RwLock::new(None)),
        }
    }

    /// Id the voice service assigned once the session was accepted.
    pub fn conversation_id(&self) -> Option<String> {
        self.conversation_id.read().ok().and_then(|id| id.clone())
    }

    /// Shared slot the transport fills in. It does not keep the outbound
    /// channel alive the way a session clone would.
    pub(crate) fn id_slot(&self) -> Arc<RwLock<Option<String>>> {
        self.conversation_id.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.outbound.is_closed()
    }

    pub async fn send_text(&self, text: &str) -> Result<(), VoiceError> {
        if !self.is_active() {
            return Err(VoiceError::SessionClosed);
        }
        self.outbound
            .send(OutboundFrame::Text(text.to_string()))
            .await
            .map_err(|_| VoiceError::SessionClosed)
    }

    /// Resampler from a capture device rate to the rate this session wants.
    /// One per capture stream, reused for every chunk.
    pub fn resampler(&self, sample_rate: u32) -> audio::Resampler {
        audio::Resampler::new(sample_rate, self.input_rate)
    }

    /// Queue captured microphone samples. Drops the chunk rather than block
    /// when the socket is backed up.
    pub fn send_audio(
        &self,
        resampler: &mut audio::Resampler,
        samples: &[f32],
    ) -> Result<(), VoiceError> {
        if !self.is_active() {
            return Err(VoiceError::SessionClosed);
        }
        let resampled = resampler.process(samples);
        let pcm = audio::to_pcm16(&resampled);
        match self.outbound.try_send(OutboundFrame::Audio(pcm)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("Voice socket busy, dropping audio chunk");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(VoiceError::SessionClosed),
        }
    }

    pub fn end(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_frames_and_end() {
        let (tx, mut rx) = mpsc::channel(4);
        let session = VoiceSession::new(tx, CancellationToken::new(), 16_000);

        assert!(session.conversation_id().is_none());
        if let Ok(mut slot) = session.id_slot().write() {
            *slot = Some("el-9".into());
        }
        assert_eq!(session.conversation_id().as_deref(), Some("el-9"));

        session.send_text("Weekend getaway to Tokyo").await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(OutboundFrame::Text("Weekend getaway to Tokyo".into()))
        );

        let mut resampler = session.resampler(32_000);
        session.send_audio(&mut resampler, &[0.5; 320]).unwrap();
        match rx.recv().await {
            Some(OutboundFrame::Audio(pcm)) => {
                assert_eq!(pcm.len(), 160);
                assert_eq!(pcm[0], 16383);
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        session.end();
        assert!(!session.is_active());
        assert!(matches!(
            session.send_text("late").await,
            Err(VoiceError::SessionClosed)
        ));
    }
}
