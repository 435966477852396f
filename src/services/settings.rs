use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::database::Database;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
const MIN_POLL_INTERVAL_MS: u64 = 1000;
const MAX_POLL_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub send_with_enter: bool,
    pub color_scheme: ColorScheme,
    pub poll_interval_ms: u64,
    /// Ask the title service to name a conversation after its first message.
    pub auto_titles: bool,
    pub show_examples: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorScheme {
    System,
    Light,
    Dark,
}

impl ColorScheme {
    /// In the order the preferences combo lists them.
    pub const ALL: [ColorScheme; 3] = [ColorScheme::System, ColorScheme::Light, ColorScheme::Dark];

    pub fn label(&self) -> &'static str {
        match self {
            ColorScheme::System => "Follow system",
            ColorScheme::Light => "Light",
            ColorScheme::Dark => "Dark",
        }
    }

    pub fn position(&self) -> u32 {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0) as u32
    }

    pub fn from_position(position: u32) -> Self {
        Self::ALL
            .get(position as usize)
            .copied()
            .unwrap_or(ColorScheme::System)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            send_with_enter: true,
            color_scheme: ColorScheme::System,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            auto_titles: true,
            show_examples: true,
        }
    }
}

impl AppSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }
}

/// A single edit made on a preferences page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingChange {
    SendWithEnter(bool),
    ColorScheme(ColorScheme),
    PollIntervalMs(u64),
    AutoTitles(bool),
    ShowExamples(bool),
}

impl SettingChange {
    pub fn apply(self, settings: &mut AppSettings) {
        match self {
            SettingChange::SendWithEnter(on) => settings.send_with_enter = on,
            SettingChange::ColorScheme(scheme) => settings.color_scheme = scheme,
            SettingChange::PollIntervalMs(ms) => {
                settings.poll_interval_ms = ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
            }
            SettingChange::AutoTitles(on) => settings.auto_titles = on,
            SettingChange::ShowExamples(on) => settings.show_examples = on,
        }
    }
}

pub struct SettingsService;

impl SettingsService {
    pub async fn load(db: &Database) -> AppSettings {
        match db.get_setting("app_settings").await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable settings: {}", e);
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::error!("Failed to load settings: {}", e);
                AppSettings::default()
            }
        }
    }

    pub async fn save(db: &Database, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        db.set_setting("app_settings", &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let db = Database::new_in_memory().unwrap();
        let settings = SettingsService::load(&db).await;
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.poll_interval(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_save_and_partial_json() {
        let db = Database::new_in_memory().unwrap();
        let settings = AppSettings {
            color_scheme: ColorScheme::Dark,
            auto_titles: false,
            ..Default::default()
        };
        SettingsService::save(&db, &settings).await.unwrap();
        assert_eq!(SettingsService::load(&db).await, settings);

        db.set_setting("app_settings", r#"{"send_with_enter": false}"#)
            .await
            .unwrap();
        let loaded = SettingsService::load(&db).await;
        assert!(!loaded.send_with_enter);
        assert!(loaded.show_examples);
    }

    #[test]
    fn test_poll_interval_clamped() {
        let fast = AppSettings {
            poll_interval_ms: 10,
            ..Default::default()
        };
        assert_eq!(fast.poll_interval(), Duration::from_millis(1000));
        let slow = AppSettings {
            poll_interval_ms: 600_000,
            ..Default::default()
        };
        assert_eq!(slow.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_setting_changes_apply_in_place() {
        let mut settings = AppSettings::default();
        SettingChange::SendWithEnter(false).apply(&mut settings);
        SettingChange::ColorScheme(ColorScheme::Dark).apply(&mut settings);
        SettingChange::PollIntervalMs(100).apply(&mut settings);
        assert!(!settings.send_with_enter);
        assert_eq!(settings.color_scheme, ColorScheme::Dark);
        assert_eq!(settings.poll_interval_ms, 1000);
        assert!(settings.auto_titles);
    }

    #[test]
    fn test_color_scheme_positions() {
        for scheme in ColorScheme::ALL {
            assert_eq!(ColorScheme::from_position(scheme.position()), scheme);
        }
        assert_eq!(ColorScheme::from_position(42), ColorScheme::System);
    }
}
