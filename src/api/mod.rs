pub mod backend;
pub mod error;
pub mod status;
pub mod title;
pub mod wire;

pub use backend::BackendClient;
pub use error::ApiError;
pub use status::{StatusClient, StatusSource};
pub use title::TitleClient;
pub use wire::{ConversationRecord, TokenResponse};
