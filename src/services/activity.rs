use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::models::{Conversation, ConversationStatus, StatusUpdate};
use crate::services::database::Database;
use crate::services::status::find_completion;

/// A conversation with activity in the last two hours counts as active.
const ACTIVE_WINDOW_HOURS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Active,
    Completed,
    Inactive,
}

impl ActivityState {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityState::Active => "Active",
            ActivityState::Completed => "Completed",
            ActivityState::Inactive => "Inactive",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            ActivityState::Active => "activity-active",
            ActivityState::Completed => "activity-completed",
            ActivityState::Inactive => "activity-inactive",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            ActivityState::Active => "media-playback-start-symbolic",
            ActivityState::Completed => "emblem-ok-symbolic",
            ActivityState::Inactive => "media-playback-pause-symbolic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityFilter {
    #[default]
    All,
    Only(ActivityState),
}

impl ActivityFilter {
    pub const LABELS: [&'static str; 4] = ["All", "Active", "Completed", "Inactive"];

    /// Position in `LABELS`, as used by the filter dropdown.
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => ActivityFilter::Only(ActivityState::Active),
            2 => ActivityFilter::Only(ActivityState::Completed),
            3 => ActivityFilter::Only(ActivityState::Inactive),
            _ => ActivityFilter::All,
        }
    }

    fn accepts(&self, state: ActivityState) -> bool {
        match self {
            ActivityFilter::All => true,
            ActivityFilter::Only(wanted) => *wanted == state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivitySort {
    #[default]
    Recent,
    Oldest,
    MostUpdates,
    LeastUpdates,
}

impl ActivitySort {
    pub const LABELS: [&'static str; 4] =
        ["Most recent", "Oldest first", "Most updates", "Least updates"];

    pub fn from_index(index: u32) -> Self {
        match index {
            1 => ActivitySort::Oldest,
            2 => ActivitySort::MostUpdates,
            3 => ActivitySort::LeastUpdates,
            _ => ActivitySort::Recent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationActivity {
    pub conversation: Conversation,
    pub update_count: usize,
    pub last_activity: DateTime<Utc>,
    pub latest_update: Option<String>,
    pub state: ActivityState,
}

pub fn summarize(
    conversation: Conversation,
    updates: &[StatusUpdate],
    now: DateTime<Utc>,
) -> ConversationActivity {
    let last_activity = updates
        .iter()
        .filter_map(|u| u.parsed_timestamp())
        .max()
        .map_or(conversation.updated_at, |latest| latest.max(conversation.updated_at));

    let state = if conversation.status == ConversationStatus::Completed
        || find_completion(updates).is_some()
    {
        ActivityState::Completed
    } else if now - last_activity < Duration::hours(ACTIVE_WINDOW_HOURS) {
        ActivityState::Active
    } else {
        ActivityState::Inactive
    };

    ConversationActivity {
        latest_update: updates.last().map(|u| u.display_text().to_string()),
        update_count: updates.len(),
        last_activity,
        state,
        conversation,
    }
}

pub fn filter_and_sort(
    mut items: Vec<ConversationActivity>,
    filter: ActivityFilter,
    sort: ActivitySort,
) -> Vec<ConversationActivity> {
    items.retain(|item| filter.accepts(item.state));
    match sort {
        ActivitySort::Recent => items.sort_by(|a, b| b.last_activity.cmp(&a.last_activity)),
        ActivitySort::Oldest => items.sort_by(|a, b| a.last_activity.cmp(&b.last_activity)),
        ActivitySort::MostUpdates => items.sort_by(|a, b| b.update_count.cmp(&a.update_count)),
        ActivitySort::LeastUpdates => items.sort_by(|a, b| a.update_count.cmp(&b.update_count)),
    }
    items
}

/// Build the overview from the locally cached status records.
pub async fn load_overview(
    db: &Database,
    conversations: Vec<Conversation>,
) -> Result<Vec<ConversationActivity>> {
    let now = Utc::now();
    let mut items = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let updates = db.list_status_updates(&conversation.id).await?;
        items.push(summarize(conversation, &updates, now));
    }
    Ok(items)
}
