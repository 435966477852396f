use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Draft,
    Reviewing,
    Approved,
    Rejected,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Reviewing => "reviewing",
            PlanStatus::Approved => "approved",
            PlanStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PlanStatus::Draft),
            "reviewing" => Some(PlanStatus::Reviewing),
            "approved" => Some(PlanStatus::Approved),
            "rejected" => Some(PlanStatus::Rejected),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "Draft",
            PlanStatus::Reviewing => "Ready for review",
            PlanStatus::Approved => "Approved",
            PlanStatus::Rejected => "Rejected",
        }
    }

    /// Only plans still open for review accept a decision.
    pub fn is_decided(&self) -> bool {
        matches!(self, PlanStatus::Approved | PlanStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDecision {
    Approve,
    Reject,
}

impl PlanDecision {
    pub fn resulting_status(&self) -> PlanStatus {
        match self {
            PlanDecision::Approve => PlanStatus::Approved,
            PlanDecision::Reject => PlanStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Accommodation,
    Transportation,
    Activities,
    Dining,
    Logistics,
}

impl TaskCategory {
    pub fn label(&self) -> &'static str {
        match self {
            TaskCategory::Accommodation => "Accommodation",
            TaskCategory::Transportation => "Transportation",
            TaskCategory::Activities => "Activities",
            TaskCategory::Dining => "Dining",
            TaskCategory::Logistics => "Logistics",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            TaskCategory::Accommodation => "go-home-symbolic",
            TaskCategory::Transportation => "mark-location-symbolic",
            TaskCategory::Activities => "starred-symbolic",
            TaskCategory::Dining => "emoji-food-symbolic",
            TaskCategory::Logistics => "view-list-symbolic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn label(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            TaskPriority::Low => "priority-low",
            TaskPriority::Medium => "priority-medium",
            TaskPriority::High => "priority-high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: TaskCategory,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "lenient_date::option")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripDates {
    #[serde(with = "lenient_date")]
    pub start: NaiveDate,
    #[serde(with = "lenient_date")]
    pub end: NaiveDate,
}

impl TripDates {
    /// Inclusive number of days covered by the trip.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub from: String,
    pub to: String,
    #[serde(with = "lenient_date")]
    pub date: NaiveDate,
    pub price: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Companion {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub name: String,
    #[serde(with = "lenient_date")]
    pub start_date: NaiveDate,
    #[serde(with = "lenient_date")]
    pub end_date: NaiveDate,
    pub address: String,
    pub price: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub name: String,
    #[serde(with = "lenient_date")]
    pub date: NaiveDate,
    pub start_time: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_required: Option<bool>,
}

/// Bookings attached to a plan. Every list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(default)]
    pub flights: Vec<Flight>,
    #[serde(default)]
    pub companions: Vec<Companion>,
    #[serde(default)]
    pub hotels: Vec<Hotel>,
    #[serde(default)]
    pub restaurants: Vec<Restaurant>,
}

impl Itinerary {
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
            && self.companions.is_empty()
            && self.hotels.is_empty()
            && self.restaurants.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    pub id: String,
    pub conversation_id: String,
    pub destination: String,
    pub dates: TripDates,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<TripTask>,
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Itinerary::is_empty")]
    pub itinerary: Itinerary,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl TripPlan {
    /// Sum of every task's estimated cost; tasks without an estimate count as zero.
    pub fn total_estimated_cost(&self) -> f64 {
        self.tasks.iter().filter_map(|t| t.estimated_cost).sum()
    }
}

/// Dates arrive either as `YYYY-MM-DD` or as a full ISO timestamp.
mod lenient_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw, FORMAT)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
            .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, FORMAT).ok()))
    }

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
    }

    pub mod option {
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => super::serialize(d, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
            let raw = Option::<String>::deserialize(d)?;
            match raw {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: &str = r#"{
        "id": "1",
        "conversationId": "conv-1",
        "destination": "Paris, France",
        "dates": { "start": "2024-07-05", "end": "2024-07-12T00:00:00.000Z" },
        "participants": ["Charlie", "Alex", "Fergus", "Marissa"],
        "tasks": [
            { "id": "1", "title": "Book Hotel", "description": "Central hotel for 4",
              "category": "accommodation", "status": "pending", "priority": "high",
              "estimatedCost": 1200 },
            { "id": "2", "title": "Book Flights", "description": "Round trip",
              "category": "transportation", "status": "in_progress", "priority": "high",
              "estimatedCost": 2400, "dueDate": "2024-06-01" },
            { "id": "3", "title": "Pick a bistro", "description": "",
              "category": "dining", "status": "pending", "priority": "low" }
        ],
        "status": "reviewing"
    }"#;

    #[test]
    fn test_parse_plan_json() {
        let plan: TripPlan = serde_json::from_str(PARIS).unwrap();
        assert_eq!(plan.status, PlanStatus::Reviewing);
        assert_eq!(plan.dates.days(), 8);
        assert_eq!(plan.tasks[1].status, TaskStatus::InProgress);
        assert_eq!(
            plan.tasks[1].due_date,
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
        assert!(plan.itinerary.is_empty());
    }

    #[test]
    fn test_total_estimated_cost_skips_missing() {
        let plan: TripPlan = serde_json::from_str(PARIS).unwrap();
        assert_eq!(plan.total_estimated_cost(), 3600.0);
    }

    #[test]
    fn test_decision_status() {
        assert_eq!(PlanDecision::Approve.resulting_status(), PlanStatus::Approved);
        assert_eq!(PlanDecision::Reject.resulting_status(), PlanStatus::Rejected);
        assert!(PlanStatus::Approved.is_decided());
        assert!(!PlanStatus::Reviewing.is_decided());
    }

    #[test]
    fn test_itinerary_round_trip_keeps_dates() {
        let json = serde_json::json!({
            "hotels": [{ "name": "Le Marais", "startDate": "2024-07-05", "endDate": "2024-07-12",
                         "address": "Rue X", "price": 180.0, "currency": "EUR", "rating": 4.5 }]
        });
        let itinerary: Itinerary = serde_json::from_value(json).unwrap();
        let back = serde_json::to_value(&itinerary).unwrap();
        assert_eq!(back["hotels"][0]["startDate"], "2024-07-05");
    }
}
