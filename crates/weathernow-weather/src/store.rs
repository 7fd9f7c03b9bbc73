use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::cache::normalize_city;
use crate::types::{Coordinates, TemperatureUnit};

/// Prefix shared by every file the store owns
pub const NAMESPACE: &str = "weathernow_";
pub const MAX_RECENT_SEARCHES: usize = 5;
pub const MAX_FAVORITES: usize = 10;

const RECENT_SEARCHES: &str = "recent_searches";
const FAVORITES: &str = "favorites";
const LAST_LOCATION: &str = "last_location";
const PREFERENCES: &str = "preferences";

/// A saved place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: Option<String>,
}

impl Favorite {
    /// Favorite keyed by its coordinates, so the same spot saved under two
    /// spellings is still one entry.
    pub fn new(name: impl Into<String>, coords: Coordinates) -> Self {
        Self {
            id: format!("{:.4},{:.4}", coords.lat, coords.lon),
            name: name.into(),
            lat: coords.lat,
            lon: coords.lon,
            country: None,
        }
    }
}

/// Last place weather was shown for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastLocation {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    /// Epoch millis when saved
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "24h")]
    TwentyFourHour,
}

impl TimeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwelveHour => "12h",
            Self::TwentyFourHour => "24h",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Auto => "auto",
        }
    }
}

/// Display preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub temperature_unit: TemperatureUnit,
    pub time_format: TimeFormat,
    pub theme: Theme,
}

/// Partial preference change; `None` fields keep their stored value
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferencesUpdate {
    pub temperature_unit: Option<TemperatureUnit>,
    pub time_format: Option<TimeFormat>,
    pub theme: Option<Theme>,
}

impl Preferences {
    pub fn merged(self, update: PreferencesUpdate) -> Self {
        Self {
            temperature_unit: update.temperature_unit.unwrap_or(self.temperature_unit),
            time_format: update.time_format.unwrap_or(self.time_format),
            theme: update.theme.unwrap_or(self.theme),
        }
    }
}

/// JSON-file store for user data that outlives a session.
///
/// Reads never fail: a missing, unreadable or corrupt file reads as empty
/// (logged). Writes report errors to the caller.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", NAMESPACE, name))
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.path(name);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring corrupt store file {:?}: {}", path, e);
                None
            }
        }
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create data directory")?;

        let path = self.path(name);
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", name))?;

        fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
        tracing::debug!("Stored {} at {:?}", name, path);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to delete {:?}", path))?;
            tracing::debug!("Deleted {:?}", path);
        }
        Ok(())
    }

    // Recent searches

    /// Most recent first
    pub fn recent_searches(&self) -> Vec<String> {
        self.read(RECENT_SEARCHES).unwrap_or_default()
    }

    /// Move `city` to the front, dropping any case-insensitive duplicate and
    /// anything past the fifth entry. Blank input is ignored.
    pub fn add_recent_search(&self, city: &str) -> Result<Vec<String>> {
        let city = city.trim();
        let mut recent = self.recent_searches();
        if city.is_empty() {
            return Ok(recent);
        }

        let key = normalize_city(city);
        recent.retain(|existing| normalize_city(existing) != key);
        recent.insert(0, city.to_string());
        recent.truncate(MAX_RECENT_SEARCHES);

        self.write(RECENT_SEARCHES, &recent)?;
        Ok(recent)
    }

    pub fn clear_recent_searches(&self) -> Result<()> {
        self.remove(RECENT_SEARCHES)
    }

    // Favorites

    /// Newest first
    pub fn favorites(&self) -> Vec<Favorite> {
        self.read(FAVORITES).unwrap_or_default()
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites().iter().any(|f| f.id == id)
    }

    /// Add to the front. Returns `false` when the id is already saved.
    /// The oldest entry is dropped once the list is full.
    pub fn add_favorite(&self, favorite: Favorite) -> Result<bool> {
        let mut favorites = self.favorites();
        if favorites.iter().any(|f| f.id == favorite.id) {
            return Ok(false);
        }

        tracing::info!("Adding favorite: {}", favorite.name);
        favorites.insert(0, favorite);
        favorites.truncate(MAX_FAVORITES);
        self.write(FAVORITES, &favorites)?;
        Ok(true)
    }

    /// Returns `false` when nothing had that id.
    pub fn remove_favorite(&self, id: &str) -> Result<bool> {
        let mut favorites = self.favorites();
        let before = favorites.len();
        favorites.retain(|f| f.id != id);
        if favorites.len() == before {
            return Ok(false);
        }

        self.write(FAVORITES, &favorites)?;
        Ok(true)
    }

    /// Add when absent, remove when present. Returns whether it is now a favorite.
    pub fn toggle_favorite(&self, favorite: Favorite) -> Result<bool> {
        if self.is_favorite(&favorite.id) {
            self.remove_favorite(&favorite.id)?;
            Ok(false)
        } else {
            self.add_favorite(favorite)
        }
    }

    // Last location

    pub fn save_last_location(&self, coords: Coordinates, name: &str) -> Result<LastLocation> {
        let location = LastLocation {
            lat: coords.lat,
            lon: coords.lon,
            name: name.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.write(LAST_LOCATION, &location)?;
        Ok(location)
    }

    pub fn last_location(&self) -> Option<LastLocation> {
        self.read(LAST_LOCATION)
    }

    pub fn clear_last_location(&self) -> Result<()> {
        self.remove(LAST_LOCATION)
    }

    // Preferences

    pub fn preferences(&self) -> Preferences {
        self.read(PREFERENCES).unwrap_or_default()
    }

    /// Merge `update` into the stored preferences and persist the result.
    pub fn update_preferences(&self, update: PreferencesUpdate) -> Result<Preferences> {
        let preferences = self.preferences().merged(update);
        self.write(PREFERENCES, &preferences)?;
        Ok(preferences)
    }

    /// Remove every file this store owns.
    pub fn clear_all(&self) -> Result<()> {
        for name in [RECENT_SEARCHES, FAVORITES, LAST_LOCATION, PREFERENCES] {
            self.remove(name)?;
        }
        tracing::info!("Cleared local store at {:?}", self.dir);
        Ok(())
    }
}
