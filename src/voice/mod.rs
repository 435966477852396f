pub mod audio;
pub mod elevenlabs;
#[cfg(feature = "microphone")]
pub mod microphone;
mod traits;
mod types;

pub use traits::{VoiceProvider, VoiceSession};
pub use types::{AgentMode, TranscriptMessage, VoiceError, VoiceEvent};
