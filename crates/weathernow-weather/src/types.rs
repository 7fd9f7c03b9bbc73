use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a metric reading into this unit
    pub fn convert(&self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

/// Coarse sky condition, as reported in `weather[].main`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String")]
pub enum ConditionCategory {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Thunderstorm,
    Snow,
    Mist,
    Smoke,
    Haze,
    Dust,
    Fog,
    Sand,
    Ash,
    Squall,
    Tornado,
    #[default]
    Unknown,
}

impl ConditionCategory {
    /// Parse the upstream `main` string; unrecognized values map to `Unknown`
    pub fn from_main(main: &str) -> Self {
        match main.trim() {
            "Clear" => Self::Clear,
            "Clouds" => Self::Clouds,
            "Rain" => Self::Rain,
            "Drizzle" => Self::Drizzle,
            "Thunderstorm" => Self::Thunderstorm,
            "Snow" => Self::Snow,
            "Mist" => Self::Mist,
            "Smoke" => Self::Smoke,
            "Haze" => Self::Haze,
            "Dust" => Self::Dust,
            "Fog" => Self::Fog,
            "Sand" => Self::Sand,
            "Ash" => Self::Ash,
            "Squall" => Self::Squall,
            "Tornado" => Self::Tornado,
            _ => Self::Unknown,
        }
    }

    /// Convert a fine-grained condition code to its category
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_code(code: i32) -> Self {
        match code {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            701 => Self::Mist,
            711 => Self::Smoke,
            721 => Self::Haze,
            731 | 761 => Self::Dust,
            741 => Self::Fog,
            751 => Self::Sand,
            762 => Self::Ash,
            771 => Self::Squall,
            781 => Self::Tornado,
            800 => Self::Clear,
            801..=804 => Self::Clouds,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Rain => "Rain",
            Self::Drizzle => "Drizzle",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Mist => "Mist",
            Self::Smoke => "Smoke",
            Self::Haze => "Haze",
            Self::Dust => "Dust",
            Self::Fog => "Fog",
            Self::Sand => "Sand",
            Self::Ash => "Ash",
            Self::Squall => "Squall",
            Self::Tornado => "Tornado",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<String> for ConditionCategory {
    fn from(main: String) -> Self {
        Self::from_main(&main)
    }
}

impl std::fmt::Display for ConditionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Short label used when no place name is known, e.g. "51.51, -0.13"
    pub fn label(&self) -> String {
        format!("{:.2}, {:.2}", self.lat, self.lon)
    }
}

/// One `weather[]` element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionInfo {
    pub id: i32,
    pub main: ConditionCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
}

const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

impl Wind {
    /// Eight-point compass direction the wind blows from
    pub fn compass(&self) -> &'static str {
        let normalized = self.deg.rem_euclid(360.0);
        let index = (normalized / 45.0).round() as usize % COMPASS_POINTS.len();
        COMPASS_POINTS[index]
    }

    /// Speed in km/h (upstream reports m/s in metric units)
    pub fn speed_kmh(&self) -> i64 {
        (self.speed * 3.6).round() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Clouds {
    pub all: u8,
}

/// `main` block of a current-conditions payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_max: Option<f64>,
    pub humidity: u8,
    pub pressure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CurrentSys {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sunrise: i64,
    #[serde(default)]
    pub sunset: i64,
}

/// Current-conditions payload, deserialized but otherwise untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub coord: Coordinates,
    #[serde(default)]
    pub weather: Vec<ConditionInfo>,
    pub main: MainReadings,
    #[serde(default)]
    pub visibility: Option<u32>,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default)]
    pub clouds: Clouds,
    pub dt: i64,
    #[serde(default)]
    pub sys: CurrentSys,
    #[serde(default)]
    pub timezone: Option<i32>,
    #[serde(default)]
    pub name: String,
}

impl CurrentConditions {
    /// First `weather[]` entry; upstream lists the primary condition first
    pub fn primary_condition(&self) -> Option<&ConditionInfo> {
        self.weather.first()
    }

    pub fn category(&self) -> ConditionCategory {
        self.primary_condition()
            .map(|c| c.main)
            .unwrap_or_default()
    }

    /// Observation time falls before sunrise or after sunset
    pub fn is_night(&self) -> bool {
        if self.sys.sunrise == 0 && self.sys.sunset == 0 {
            return false;
        }
        self.dt < self.sys.sunrise || self.dt > self.sys.sunset
    }
}

/// One fixed-interval forecast point (three-hour spacing upstream)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "wire::ForecastItem")]
pub struct RawSample {
    /// Epoch seconds
    pub timestamp: i64,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    /// hPa
    pub pressure: f64,
    /// m/s
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub cloud_cover: u8,
    pub condition: ConditionCategory,
    pub condition_code: i32,
    pub description: String,
    pub icon: String,
    /// Probability of precipitation, 0–1
    pub pop: Option<f64>,
}

impl RawSample {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// UTC calendar date used for daily grouping
    pub fn date_utc(&self) -> Option<NaiveDate> {
        self.time().map(|t| t.date_naive())
    }
}

/// Forecast payload: `list[]` of samples plus the city block
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<RawSample>,
    #[serde(default)]
    pub city: Option<ForecastCity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub coord: Option<Coordinates>,
    #[serde(default)]
    pub timezone: Option<i32>,
}

/// Derived per-day forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Timestamp of the first sample of the day
    pub timestamp: i64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_avg: i64,
    pub condition: ConditionCategory,
    pub description: String,
    pub condition_code: i32,
    pub icon: String,
    pub humidity_avg: i64,
    pub wind_avg: i64,
    /// Highest precipitation probability of the day, percent
    pub precipitation_chance: u8,
}

/// Derived near-term forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub timestamp: i64,
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub temp: i64,
    pub feels_like: i64,
    pub humidity: u8,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub cloud_cover: u8,
    pub condition: ConditionCategory,
    pub condition_code: i32,
    pub description: String,
    pub icon: String,
    /// Precipitation probability, percent
    pub precipitation_chance: u8,
}

/// Upstream JSON shapes that only exist to be flattened
mod wire {
    use super::{Clouds, ConditionCategory, ConditionInfo, RawSample, Wind};
    use serde::Deserialize;

    #[derive(Deserialize)]
    pub(super) struct ForecastMain {
        temp: f64,
        feels_like: f64,
        #[serde(default)]
        humidity: u8,
        #[serde(default)]
        pressure: f64,
    }

    #[derive(Deserialize)]
    pub(super) struct ForecastItem {
        dt: i64,
        main: ForecastMain,
        #[serde(default)]
        weather: Vec<ConditionInfo>,
        #[serde(default)]
        wind: Wind,
        #[serde(default)]
        clouds: Clouds,
        #[serde(default)]
        pop: Option<f64>,
    }

    impl From<ForecastItem> for RawSample {
        fn from(item: ForecastItem) -> Self {
            let (condition, condition_code, description, icon) = match item.weather.into_iter().next() {
                Some(w) => {
                    // Trust the code when the string is something we don't know
                    let condition = match w.main {
                        ConditionCategory::Unknown => ConditionCategory::from_code(w.id),
                        known => known,
                    };
                    (condition, w.id, w.description, w.icon)
                }
                None => (ConditionCategory::Unknown, 0, String::new(), String::new()),
            };

            RawSample {
                timestamp: item.dt,
                temperature: item.main.temp,
                feels_like: item.main.feels_like,
                humidity: item.main.humidity,
                pressure: item.main.pressure,
                wind_speed: item.wind.speed,
                wind_deg: item.wind.deg,
                cloud_cover: item.clouds.all,
                condition,
                condition_code,
                description,
                icon,
                pop: item.pop,
            }
        }
    }
}
