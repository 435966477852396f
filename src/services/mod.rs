pub mod activity;
pub mod auth;
pub mod conversation;
pub mod database;
pub mod export;
pub mod keyring;
pub mod markdown;
pub mod plan;
pub mod settings;
pub mod status;

pub use auth::AuthService;
pub use conversation::ConversationService;
pub use database::Database;
pub use keyring::KeyringService;
pub use plan::TripPlanService;
pub use settings::SettingsService;
