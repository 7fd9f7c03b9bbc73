//! Weather data for WeatherNow
//!
//! Current conditions and five-day forecasts from OpenWeatherMap behind a
//! short-lived response cache, forecast aggregation into daily and hourly
//! views, current-place resolution with LocationIQ reverse geocoding, and a
//! small JSON store for recent searches, favorites and preferences.

pub mod cache;
pub mod client;
pub mod error;
pub mod forecast;
pub mod geocode;
pub mod location;
pub mod store;
pub mod types;

pub use cache::{CacheTtl, Clock, Fingerprint, ManualClock, RequestKind, ResponseCache, SystemClock};
pub use client::{SearchQuery, WeatherClient, WeatherReport};
pub use error::{LocationError, WeatherError};
pub use forecast::{to_daily_summaries, to_hourly_samples, DEFAULT_HOURLY_COUNT, MAX_DAYS};
pub use geocode::{Geocoder, Place, PlaceCandidate};
pub use location::{FixedPosition, LocationResolver, NoPosition, PositionSource, ResolvedPlace};
pub use store::{Favorite, LastLocation, LocalStore, Preferences, PreferencesUpdate, Theme, TimeFormat};
pub use types::*;
