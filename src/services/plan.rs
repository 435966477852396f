use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{PlanDecision, TripPlan};
use crate::services::database::Database;

/// Trip plans imported from the planner's JSON output and kept locally.
#[derive(Debug, Clone)]
pub struct TripPlanService {
    db: Database,
}

impl TripPlanService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, conversation_id: &str) -> Result<Option<TripPlan>> {
        self.db.trip_plan_for_conversation(conversation_id).await
    }

    pub async fn save(&self, plan: &TripPlan) -> Result<()> {
        self.db.save_trip_plan(plan).await
    }

    /// Import a plan file. When `conversation_id` is given the plan is
    /// attached to that conversation regardless of what the file says.
    pub async fn import_json(&self, path: &Path, conversation_id: Option<&str>) -> Result<TripPlan> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let plan = parse_plan(&raw, conversation_id)
            .with_context(|| format!("{} is not a trip plan", path.display()))?;
        self.save(&plan).await?;
        tracing::info!("Imported trip plan {} for {}", plan.id, plan.conversation_id);
        Ok(plan)
    }

    pub async fn decide(&self, plan_id: &str, decision: PlanDecision) -> Result<TripPlan> {
        let mut plan = self
            .db
            .get_trip_plan(plan_id)
            .await?
            .with_context(|| format!("Trip plan {} not found", plan_id))?;
        plan.status = decision.resulting_status();
        plan.updated_at = Utc::now();
        self.save(&plan).await?;
        tracing::info!("Trip plan {} {}", plan.id, plan.status.as_str());
        Ok(plan)
    }
}

/// Parse plan JSON, filling in an id when the planner left it out.
pub fn parse_plan(raw: &str, conversation_id: Option<&str>) -> Result<TripPlan> {
    let mut value: serde_json::Value = serde_json::from_str(raw)?;
    let object = value
        .as_object_mut()
        .context("expected a JSON object")?;
    if !object.get("id").is_some_and(|id| id.is_string()) {
        object.insert("id".into(), Uuid::new_v4().to_string().into());
    }
    if let Some(conversation_id) = conversation_id {
        object.insert("conversationId".into(), conversation_id.into());
    }
    Ok(serde_json::from_value(value)?)
}

pub fn total_estimated_cost(plan: &TripPlan) -> f64 {
    plan.total_estimated_cost()
}

fn short_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

/// Render a plan as Markdown: overview, tasks, then each itinerary section.
pub fn format_markdown(plan: &TripPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Trip Plan: {}\n", plan.destination);
    let _ = writeln!(
        out,
        "**Dates:** {} to {} ({} days)  ",
        short_date(plan.dates.start),
        short_date(plan.dates.end),
        plan.dates.days()
    );
    if !plan.participants.is_empty() {
        let _ = writeln!(out, "**Travelers:** {}  ", plan.participants.join(", "));
    }
    let _ = writeln!(out, "**Status:** {}  ", plan.status.label());
    let total = plan.total_estimated_cost();
    if total > 0.0 {
        let _ = writeln!(out, "**Estimated cost:** {:.2}", total);
    }
    out.push('\n');

    if !plan.tasks.is_empty() {
        out.push_str("## Tasks\n\n");
        for task in &plan.tasks {
            let _ = write!(
                out,
                "- **{}** ({}, {} priority, {})",
                task.title,
                task.category.label(),
                task.priority.label(),
                task.status.label()
            );
            if !task.description.is_empty() {
                let _ = write!(out, ": {}", task.description);
            }
            out.push('\n');
            if let Some(cost) = task.estimated_cost {
                let _ = writeln!(out, "  - Estimated cost: {:.2}", cost);
            }
            if let Some(due) = task.due_date {
                let _ = writeln!(out, "  - Due: {}", short_date(due));
            }
            if let Some(who) = &task.assigned_to {
                let _ = writeln!(out, "  - Assigned to: {}", who);
            }
            if let Some(notes) = &task.notes {
                let _ = writeln!(out, "  - Notes: {}", notes);
            }
        }
        out.push('\n');
    }

    let itinerary = &plan.itinerary;
    if !itinerary.flights.is_empty() {
        out.push_str("## Flights\n\n");
        for flight in &itinerary.flights {
            let _ = writeln!(out, "### {} to {}\n", flight.from, flight.to);
            let _ = writeln!(out, "- Date: {}", short_date(flight.date));
            let _ = writeln!(out, "- Price: {} {}", flight.currency, flight.price);
            if let Some(airline) = &flight.airline {
                let _ = writeln!(out, "- Airline: {}", airline);
            }
            if let Some(number) = &flight.flight_number {
                let _ = writeln!(out, "- Flight: {}", number);
            }
            if let Some(time) = &flight.departure_time {
                let _ = writeln!(out, "- Departure: {}", time);
            }
            if let Some(time) = &flight.arrival_time {
                let _ = writeln!(out, "- Arrival: {}", time);
            }
            out.push('\n');
        }
    }

    if !itinerary.companions.is_empty() {
        out.push_str("## Companions\n\n");
        for companion in &itinerary.companions {
            let _ = write!(out, "- **{}**", companion.name);
            if let Some(relationship) = &companion.relationship {
                let _ = write!(out, " ({})", relationship);
            }
            if let Some(email) = &companion.email {
                let _ = write!(out, ", {}", email);
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !itinerary.hotels.is_empty() {
        out.push_str("## Hotels\n\n");
        for hotel in &itinerary.hotels {
            let _ = writeln!(out, "### {}\n", hotel.name);
            let _ = writeln!(
                out,
                "- Dates: {} to {}",
                short_date(hotel.start_date),
                short_date(hotel.end_date)
            );
            let _ = writeln!(out, "- Address: {}", hotel.address);
            let _ = writeln!(out, "- Price: {} {}/night", hotel.currency, hotel.price);
            if let Some(rating) = hotel.rating {
                let _ = writeln!(out, "- Rating: {}/5", rating);
            }
            if let Some(room) = &hotel.room_type {
                let _ = writeln!(out, "- Room: {}", room);
            }
            if !hotel.amenities.is_empty() {
                let _ = writeln!(out, "- Amenities: {}", hotel.amenities.join(", "));
            }
            out.push('\n');
        }
    }

    if !itinerary.restaurants.is_empty() {
        out.push_str("## Restaurants\n\n");
        for restaurant in &itinerary.restaurants {
            let _ = writeln!(out, "### {}\n", restaurant.name);
            let _ = writeln!(
                out,
                "- When: {} at {}",
                short_date(restaurant.date),
                restaurant.start_time
            );
            let _ = writeln!(out, "- Address: {}", restaurant.address);
            if let Some(cuisine) = &restaurant.cuisine {
                let _ = writeln!(out, "- Cuisine: {}", cuisine);
            }
            if let Some(range) = &restaurant.price_range {
                let _ = writeln!(out, "- Price Range: {}", range);
            }
            if let Some(rating) = restaurant.rating {
                let _ = writeln!(out, "- Rating: {}/5", rating);
            }
            if restaurant.reservation_required == Some(true) {
                out.push_str("- Reservation required\n");
            }
            out.push('\n');
        }
    }

    out.trim_end().to_string() + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlanStatus;

    const PLAN: &str = r#"{
        "destination": "Paris, France",
        "conversationId": "from-file",
        "dates": {"start": "2024-03-15", "end": "2024-03-22"},
        "participants": ["Sarah", "Mike"],
        "tasks": [
            {"id": "1", "title": "Book Hotel", "description": "Central, near the Louvre",
             "category": "accommodation", "status": "pending", "priority": "high",
             "estimatedCost": 1200, "notes": "Prefer the Marais"}
        ],
        "status": "reviewing",
        "itinerary": {
            "flights": [{"from": "New York (JFK)", "to": "Paris (CDG)", "date": "2024-03-15",
                         "price": 650, "currency": "USD", "airline": "Air France"}],
            "hotels": [{"name": "Le Marais Boutique Hotel", "startDate": "2024-03-19",
                        "endDate": "2024-03-22", "address": "8 Rue de Jouy", "price": 220,
                        "currency": "EUR", "rating": 4.5}],
            "restaurants": [{"name": "Le Jules Verne", "date": "2024-03-20", "startTime": "8:00 PM",
                             "address": "Eiffel Tower", "reservationRequired": true}]
        }
    }"#;

    #[test]
    fn test_parse_fills_id_and_conversation() {
        let plan = parse_plan(PLAN, Some("c1")).unwrap();
        assert_eq!(plan.conversation_id, "c1");
        assert!(Uuid::parse_str(&plan.id).is_ok());

        let kept = parse_plan(PLAN, None).unwrap();
        assert_eq!(kept.conversation_id, "from-file");
        assert!(parse_plan("[1, 2]", None).is_err());
    }

    #[test]
    fn test_format_markdown_sections() {
        let plan = parse_plan(PLAN, None).unwrap();
        let md = format_markdown(&plan);
        assert!(md.starts_with("# Trip Plan: Paris, France\n"));
        assert!(md.contains("**Dates:** 3/15/2024 to 3/22/2024 (8 days)"));
        assert!(md.contains("- **Book Hotel** (Accommodation, High priority, Pending)"));
        assert!(md.contains("- Price: USD 650\n"));
        assert!(md.contains("- Price: EUR 220/night"));
        assert!(md.contains("- Rating: 4.5/5"));
        assert!(md.contains("- Reservation required"));
        assert!(!md.contains("## Companions"));
        assert_eq!(total_estimated_cost(&plan), 1200.0);
    }

    #[tokio::test]
    async fn test_import_and_decide() {
        let dir = std::env::temp_dir().join(format!("tripchat-plan-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("plan.json");
        std::fs::write(&path, PLAN).unwrap();

        let service = TripPlanService::new(Database::new_in_memory().unwrap());
        let imported = service.import_json(&path, Some("c1")).await.unwrap();
        assert_eq!(service.get("c1").await.unwrap().unwrap().id, imported.id);

        let approved = service.decide(&imported.id, PlanDecision::Approve).await.unwrap();
        assert_eq!(approved.status, PlanStatus::Approved);
        assert_eq!(
            service.get("c1").await.unwrap().unwrap().status,
            PlanStatus::Approved
        );

        assert!(service.decide("missing", PlanDecision::Reject).await.is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
