pub mod appearance_page;
pub mod behavior_page;
