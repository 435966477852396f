use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in traveller.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone_number: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn location(&self) -> Option<String> {
        match (self.city.as_deref(), self.country.as_deref()) {
            (Some(city), Some(country)) => Some(format!("{}, {}", city, country)),
            (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
            (None, None) => None,
        }
    }

    pub fn initials(&self) -> String {
        let initials: String = self
            .name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect();
        if initials.is_empty() {
            self.email.chars().take(1).collect::<String>().to_uppercase()
        } else {
            initials.to_uppercase()
        }
    }
}

/// Profile as returned by `GET /users/me` and `POST /users/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(rename = "FirstName", default)]
    pub first_name: String,
    #[serde(rename = "LastName", default)]
    pub last_name: String,
    #[serde(rename = "phoneNumber", default)]
    pub phone_number: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl From<UserProfile> for User {
    fn from(profile: UserProfile) -> Self {
        let name = format!("{} {}", profile.first_name, profile.last_name)
            .trim()
            .to_string();
        let created_at = profile.created_at.as_deref().and_then(parse_timestamp);
        User {
            id: profile.id,
            email: profile.email,
            name,
            phone_number: profile.phone_number,
            country: profile.country.filter(|c| !c.is_empty()),
            city: profile.city.filter(|c| !c.is_empty()),
            created_at,
        }
    }
}

/// Sign-up payload for `POST /users/`.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    #[serde(rename = "FirstName")]
    pub first_name: String,
    #[serde(rename = "LastName")]
    pub last_name: String,
    pub email: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Accepts RFC 3339 as well as the naive ISO timestamps the backend emits.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_to_user() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": 42, "email": "ana@example.com", "FirstName": "Ana", "LastName": "Silva",
                "phoneNumber": "+351", "country": "Portugal", "city": "", "createdAt": "2024-05-01T10:00:00"}"#,
        )
        .unwrap();
        let user = User::from(profile);
        assert_eq!(user.id, "42");
        assert_eq!(user.name, "Ana Silva");
        assert_eq!(user.city, None);
        assert_eq!(user.location().as_deref(), Some("Portugal"));
        assert_eq!(user.initials(), "AS");
        assert!(user.created_at.is_some());
    }

    #[test]
    fn test_new_user_wire_names() {
        let new_user = NewUser {
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            email: "ana@example.com".into(),
            phone_number: "123".into(),
            password: "secret".into(),
            country: None,
            city: Some("Lisbon".into()),
        };
        let json = serde_json::to_value(&new_user).unwrap();
        assert_eq!(json["FirstName"], "Ana");
        assert_eq!(json["phoneNumber"], "123");
        assert_eq!(json["city"], "Lisbon");
        assert!(json.get("country").is_none());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00.123456").is_some());
        assert!(parse_timestamp("2024-05-01 10:00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
