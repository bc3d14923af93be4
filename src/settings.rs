use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// Connection settings for the exercise backend and the embedded
/// pose-tracking surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSettings {
    pub api_base: String,
    pub tracker_base: String,
    pub tracker_token: String,
    pub exercise: String,
    pub difficulty: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            tracker_base: String::new(),
            tracker_token: String::new(),
            exercise: "pushup".into(),
            difficulty: "easy".into(),
            viewport_width: 390,
            viewport_height: 844,
        }
    }
}

impl TrackerSettings {
    /// URL for the embedded pose-tracking page, carrying the query
    /// parameters the surface expects.
    pub fn tracker_url(&self) -> String {
        format!(
            "{}?token={}&exercise={}&difficulty={}&width={}&height={}&keypoints=true",
            self.tracker_base,
            urlencoding::encode(&self.tracker_token),
            urlencoding::encode(&self.exercise),
            urlencoding::encode(&self.difficulty),
            self.viewport_width,
            self.viewport_height,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UserSettings {
    tracker: TrackerSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn tracker(&self) -> TrackerSettings {
        self.data.read().unwrap().tracker.clone()
    }

    pub fn update_tracker(&self, settings: TrackerSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.tracker = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}
