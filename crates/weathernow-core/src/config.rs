use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{AppError, ConfigError};

/// Environment variable that overrides `api.openweather_api_key`.
pub const OPENWEATHER_KEY_ENV: &str = "OPENWEATHER_API_KEY";
/// Environment variable that overrides `api.locationiq_api_key`.
pub const LOCATIONIQ_KEY_ENV: &str = "LOCATIONIQ_API_KEY";

const APP_DIR: &str = "weathernow";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds the local store)
    pub config_dir: PathBuf,

    /// Upstream API endpoints and keys
    #[serde(default)]
    pub api: ApiConfig,

    /// Response cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Position acquisition settings
    #[serde(default)]
    pub location: LocationConfig,
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// OpenWeatherMap API key (sent as `appid`)
    pub openweather_api_key: String,

    /// Base URL for the current-conditions and forecast endpoints
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    /// LocationIQ API key (sent as `key`)
    pub locationiq_api_key: String,

    /// Base URL for the reverse/forward geocoding endpoints
    #[serde(default = "default_geocoding_base_url")]
    pub geocoding_base_url: String,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_geocoding_base_url() -> String {
    "https://us1.locationiq.com/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Placeholder keys written into a fresh config file.
const OPENWEATHER_PLACEHOLDER: &str = "YOUR_OPENWEATHER_API_KEY";
const LOCATIONIQ_PLACEHOLDER: &str = "YOUR_LOCATIONIQ_API_KEY";

fn key_is_configured(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && !key.to_ascii_uppercase().starts_with("YOUR_")
}

impl ApiConfig {
    /// Check if the weather key is set (not empty, not a placeholder)
    pub fn has_weather_key(&self) -> bool {
        key_is_configured(&self.openweather_api_key)
    }

    /// Check if the geocoding key is set (not empty, not a placeholder)
    pub fn has_geocoding_key(&self) -> bool {
        key_is_configured(&self.locationiq_api_key)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            openweather_api_key: OPENWEATHER_PLACEHOLDER.to_string(),
            weather_base_url: default_weather_base_url(),
            locationiq_api_key: LOCATIONIQ_PLACEHOLDER.to_string(),
            geocoding_base_url: default_geocoding_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of cached current conditions, in minutes (default: 5)
    #[serde(default = "default_current_ttl")]
    pub current_ttl_minutes: u32,
    /// Lifetime of cached forecasts, in minutes (default: 30)
    #[serde(default = "default_forecast_ttl")]
    pub forecast_ttl_minutes: u32,
}

fn default_current_ttl() -> u32 {
    5
}

fn default_forecast_ttl() -> u32 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            current_ttl_minutes: default_current_ttl(),
            forecast_ttl_minutes: default_forecast_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Hard timeout for acquiring a position fix
    #[serde(default = "default_location_timeout")]
    pub timeout_secs: u64,
    /// How long a previous fix may be reused without a new read
    #[serde(default = "default_max_age")]
    pub max_age_minutes: u32,
    /// City shown when nothing else is known
    #[serde(default = "default_city")]
    pub default_city: String,
    /// Coordinates reported by the fixed position source
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

fn default_location_timeout() -> u64 {
    10
}

fn default_max_age() -> u32 {
    5
}

fn default_city() -> String {
    "London".to_string()
}

fn default_latitude() -> f64 {
    51.5074
}

fn default_longitude() -> f64 {
    -0.1278
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_location_timeout(),
            max_age_minutes: default_max_age(),
            default_city: default_city(),
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            config_dir,
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist.
    ///
    /// API keys found in the environment override the file.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from an explicit path, writing defaults there if absent.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            AppError::from(ConfigError::ParseError(format!(
                "{}: {}",
                config_path.display(),
                e
            )))
        })?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.ensure_valid().map_err(AppError::from)?;
        Ok((config, validation))
    }

    /// Validate, logging warnings. Any error makes the whole config invalid.
    pub fn ensure_valid(&self) -> std::result::Result<ValidationResult, ConfigError> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(validation)
    }

    /// Replace API keys with values from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(OPENWEATHER_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            tracing::debug!("Using {} from environment", OPENWEATHER_KEY_ENV);
            self.api.openweather_api_key = key;
        }
        if let Some(key) = lookup(LOCATIONIQ_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            tracing::debug!("Using {} from environment", LOCATIONIQ_KEY_ENV);
            self.api.locationiq_api_key = key;
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.weather_base_url, "api.weather_base_url", &mut result);
        self.validate_url(
            &self.api.geocoding_base_url,
            "api.geocoding_base_url",
            &mut result,
        );

        if self.api.request_timeout_secs == 0 {
            result.add_error("api.request_timeout_secs", "Request timeout must be greater than 0");
        }

        // A missing weather key is reported again (as Unauthorized) on first fetch
        if !self.api.has_weather_key() {
            result.add_warning(
                "api.openweather_api_key",
                format!("OpenWeather API key not configured - set {}", OPENWEATHER_KEY_ENV),
            );
        }
        if !self.api.has_geocoding_key() {
            result.add_warning(
                "api.locationiq_api_key",
                "LocationIQ API key not configured - place names will be limited",
            );
        }

        if self.cache.current_ttl_minutes == 0 {
            result.add_warning("cache.current_ttl_minutes", "Current-conditions caching disabled");
        }
        if self.cache.forecast_ttl_minutes == 0 {
            result.add_warning("cache.forecast_ttl_minutes", "Forecast caching disabled");
        } else if self.cache.forecast_ttl_minutes > 1440 {
            result.add_warning(
                "cache.forecast_ttl_minutes",
                "Forecast cache lifetime is more than 24 hours",
            );
        }

        if self.location.timeout_secs == 0 {
            result.add_error("location.timeout_secs", "Location timeout must be greater than 0");
        }
        if !(-90.0..=90.0).contains(&self.location.latitude) {
            result.add_error("location.latitude", "Latitude must be between -90 and 90");
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            result.add_error("location.longitude", "Longitude must be between -180 and 180");
        }
        if self.location.default_city.trim().is_empty() {
            result.add_warning("location.default_city", "No default city configured");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR);

        Ok(config_dir.join("config.toml"))
    }
}
