pub mod conversation;
pub mod message;
pub mod status;
pub mod trip_plan;
pub mod user;

pub use conversation::{Conversation, ConversationStatus};
pub use message::{Message, Role};
pub use status::{StatusLevel, StatusUpdate, TASK_COMPLETE};
pub use trip_plan::{PlanDecision, PlanStatus, TripPlan, TripTask};
pub use user::{NewUser, User, UserProfile};
