pub mod activity_view;
pub mod chat_view;
pub mod dialogs;
pub mod input_area;
pub mod message_widget;
pub mod onboarding;
pub mod plan_view;
pub mod preferences;
pub mod profile_view;
pub mod sidebar;
pub mod status_view;
pub mod window;
