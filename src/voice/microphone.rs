use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use tokio::sync::mpsc;

use super::audio;
use super::types::VoiceError;

/// Default input device capture. Chunks are mono f32 at the device rate.
///
/// The cpal stream is not `Send`; keep this on the thread that created it.
pub struct Microphone {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    is_recording: Arc<AtomicBool>,
}

impl Microphone {
    pub fn new() -> Result<Self, VoiceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceError::AudioDevice("No input device available".into()))?;

        tracing::info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config = device
            .default_input_config()
            .map_err(|e| VoiceError::AudioDevice(format!("Failed to get input config: {}", e)))?
            .into();

        Ok(Self {
            device,
            config,
            stream: None,
            is_recording: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    pub fn start(&mut self, chunks: mpsc::Sender<Vec<f32>>) -> Result<(), VoiceError> {
        if self.is_recording() {
            tracing::warn!("Microphone already recording");
            return Ok(());
        }

        let channels = self.config.channels as usize;
        let is_recording = Arc::clone(&self.is_recording);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !is_recording.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Err(e) = chunks.try_send(audio::downmix(data, channels)) {
                        tracing::debug!("Dropping microphone chunk: {}", e);
                    }
                },
                |err| tracing::error!("Microphone stream error: {}", err),
                None,
            )
            .map_err(|e| VoiceError::AudioDevice(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| VoiceError::AudioDevice(format!("Failed to start input stream: {}", e)))?;

        self.is_recording.store(true, Ordering::SeqCst);
        self.stream = Some(stream);
        tracing::info!("Microphone recording started");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.is_recording.store(false, Ordering::SeqCst);
        if self.stream.take().is_some() {
            tracing::info!("Microphone recording stopped");
        }
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_state() {
        // Machines without an input device skip this.
        if let Ok(mut mic) = Microphone::new() {
            assert!(mic.sample_rate() > 0);
            assert!(!mic.is_recording());

            let (tx, _rx) = mpsc::channel(8);
            if mic.start(tx).is_ok() {
                assert!(mic.is_recording());
                mic.stop();
                assert!(!mic.is_recording());
            }
        }
    }
}
