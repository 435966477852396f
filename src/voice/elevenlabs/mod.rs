mod adapter;
pub mod protocol;

pub use adapter::ElevenLabsProvider;
