//! Geocoding: coordinates to place names and back.
//! Uses LocationIQ (OpenStreetMap data); requests carry the API key as `key`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

use crate::client::handle_response;
use crate::error::WeatherError;
use crate::types::Coordinates;

pub const LOCATIONIQ_BASE: &str = "https://us1.locationiq.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("WeatherNow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<Address>,
}

/// Reverse-geocoded place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub city: String,
    pub state: String,
    pub country: String,
    /// Upper-cased ISO code, empty when unknown
    pub country_code: String,
    pub display_name: String,
}

impl Place {
    /// "City, State" (or "City, Country") for disambiguation, else just the city
    pub fn label(&self) -> String {
        let suffix = [&self.state, &self.country]
            .into_iter()
            .find(|s| !s.is_empty() && **s != self.city);

        match suffix {
            Some(s) => format!("{}, {}", self.city, s),
            None => self.city.clone(),
        }
    }
}

/// Search suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    pub display_name: String,
    pub coordinates: Coordinates,
}

impl From<Address> for Place {
    fn from(addr: Address) -> Self {
        // Prefer city > town > village > municipality > county
        let city = addr
            .city
            .or(addr.town)
            .or(addr.village)
            .or(addr.municipality)
            .or(addr.county)
            .unwrap_or_else(|| "Unknown Location".to_string());

        Place {
            city,
            state: addr.state.unwrap_or_default(),
            country: addr.country.unwrap_or_default(),
            country_code: addr.country_code.unwrap_or_default().to_uppercase(),
            display_name: String::new(),
        }
    }
}

/// LocationIQ client for reverse geocoding and place search.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl Geocoder {
    /// Create a geocoder. `api_key` of `None` (or blank) makes every call fail
    /// with `MissingApiKey` without touching the network.
    pub fn new(api_key: Option<String>) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: LOCATIONIQ_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn key(&self) -> Result<&str, WeatherError> {
        self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)
    }

    /// Reverse geocode coordinates to a place.
    #[instrument(skip(self), level = "debug")]
    pub async fn reverse(&self, lat: f64, lon: f64) -> Result<Place, WeatherError> {
        let key = self.key()?;
        let url = format!("{}/reverse", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", key.to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await?;

        let body: ReverseResponse =
            handle_response(response, &format!("{}, {}", lat, lon)).await?;

        let mut place = Place::from(body.address.unwrap_or_default());
        place.display_name = body
            .display_name
            .unwrap_or_else(|| Coordinates::new(lat, lon).label());

        tracing::info!("Reverse geocoded to: {}", place.label());
        Ok(place)
    }

    /// Place suggestions for a partial query. A blank query returns nothing
    /// without a request.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<PlaceCandidate>, WeatherError> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let key = self.key()?;
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", key.to_string()),
                ("q", query.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        let hits: Vec<SearchHit> = handle_response(response, query).await?;

        let candidates = hits
            .into_iter()
            .filter_map(|hit| {
                let lat = hit.lat.parse::<f64>().ok()?;
                let lon = hit.lon.parse::<f64>().ok()?;
                let name = hit
                    .address
                    .map(|a| Place::from(a).label())
                    .unwrap_or_else(|| hit.display_name.clone());
                Some(PlaceCandidate {
                    name,
                    display_name: hit.display_name,
                    coordinates: Coordinates::new(lat, lon),
                })
            })
            .take(limit)
            .collect();

        Ok(candidates)
    }
}
