//! OpenWeatherMap client for current conditions and five-day forecasts.

use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::cache::{CacheTtl, Clock, Fingerprint, RequestKind, ResponseCache};
use crate::error::WeatherError;
use crate::forecast::{to_daily_summaries, to_hourly_samples};
use crate::types::{Coordinates, CurrentConditions, DailySummary, ForecastResponse, HourlySample};

pub const OPENWEATHER_BASE: &str = "https://api.openweathermap.org/data/2.5";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// What the user asked for: a city name or a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    City(String),
    Coords(Coordinates),
}

impl SearchQuery {
    pub fn city(name: impl Into<String>) -> Self {
        Self::City(name.into())
    }

    pub fn coords(lat: f64, lon: f64) -> Self {
        Self::Coords(Coordinates::new(lat, lon))
    }

    pub fn fingerprint(&self, kind: RequestKind) -> Fingerprint {
        match self {
            Self::City(name) => Fingerprint::city(kind, name),
            Self::Coords(c) => Fingerprint::coords(kind, c.lat, c.lon),
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::City(name) => vec![("q", name.trim().to_string())],
            Self::Coords(c) => vec![("lat", c.lat.to_string()), ("lon", c.lon.to_string())],
        }
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::City(name) => f.write_str(name.trim()),
            Self::Coords(c) => f.write_str(&c.label()),
        }
    }
}

/// Current conditions and forecast for one place.
#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub forecast: ForecastResponse,
}

impl WeatherReport {
    pub fn daily(&self) -> Vec<DailySummary> {
        to_daily_summaries(&self.forecast.list)
    }

    pub fn hourly(&self, count: usize) -> Vec<HourlySample> {
        to_hourly_samples(&self.forecast.list, count)
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Current(CurrentConditions),
    Forecast(ForecastResponse),
}

/// Weather data client. Consults its response cache before every request.
///
/// The cache lock is never held across an await; two concurrent misses for
/// the same fingerprint both go to the network and the later write wins.
pub struct WeatherClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    cache: Mutex<ResponseCache<Payload>>,
    last_search: Mutex<Option<SearchQuery>>,
}

impl WeatherClient {
    /// Create a client. A missing or blank key is reported as `MissingApiKey`
    /// on the first fetch, before any network I/O.
    pub fn new(api_key: Option<String>) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("OpenWeather API key is not configured");
        }

        Ok(Self {
            client,
            api_key,
            base_url: OPENWEATHER_BASE.to_string(),
            cache: Mutex::new(ResponseCache::new()),
            last_search: Mutex::new(None),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the cache with an empty one using the given lifetimes and clock.
    pub fn with_cache_policy(mut self, ttl: CacheTtl, clock: Arc<dyn Clock>) -> Self {
        self.cache = Mutex::new(ResponseCache::with_clock(ttl, clock));
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, WeatherError> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Current conditions for a city name.
    pub async fn fetch_current_by_city(&self, name: &str) -> Result<CurrentConditions, WeatherError> {
        self.fetch_current(&SearchQuery::city(name)).await
    }

    /// Current conditions for a coordinate pair.
    pub async fn fetch_current_by_coords(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<CurrentConditions, WeatherError> {
        self.fetch_current(&SearchQuery::coords(lat, lon)).await
    }

    /// Five-day / three-hour forecast for a city name.
    pub async fn fetch_forecast_by_city(&self, name: &str) -> Result<ForecastResponse, WeatherError> {
        self.fetch_forecast(&SearchQuery::city(name)).await
    }

    /// Five-day / three-hour forecast for a coordinate pair.
    pub async fn fetch_forecast_by_coords(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<ForecastResponse, WeatherError> {
        self.fetch_forecast(&SearchQuery::coords(lat, lon)).await
    }

    #[instrument(skip(self, query), fields(query = %query), level = "info")]
    pub async fn fetch_current(&self, query: &SearchQuery) -> Result<CurrentConditions, WeatherError> {
        self.remember(query);
        let fingerprint = query.fingerprint(RequestKind::Current);

        let cached = self.cache.lock().get(&fingerprint);
        if let Some(Payload::Current(current)) = cached {
            return Ok(current);
        }

        let current: CurrentConditions = self.request("weather", query).await?;
        self.cache
            .lock()
            .put(fingerprint, Payload::Current(current.clone()));
        Ok(current)
    }

    #[instrument(skip(self, query), fields(query = %query), level = "info")]
    pub async fn fetch_forecast(&self, query: &SearchQuery) -> Result<ForecastResponse, WeatherError> {
        self.remember(query);
        let fingerprint = query.fingerprint(RequestKind::Forecast);

        let cached = self.cache.lock().get(&fingerprint);
        if let Some(Payload::Forecast(forecast)) = cached {
            return Ok(forecast);
        }

        let forecast: ForecastResponse = self.request("forecast", query).await?;
        tracing::debug!("Forecast returned {} samples", forecast.list.len());
        self.cache
            .lock()
            .put(fingerprint, Payload::Forecast(forecast.clone()));
        Ok(forecast)
    }

    /// Current conditions followed by the forecast for the same place.
    pub async fn fetch_report(&self, query: &SearchQuery) -> Result<WeatherReport, WeatherError> {
        let current = self.fetch_current(query).await?;
        let forecast = self.fetch_forecast(query).await?;
        Ok(WeatherReport { current, forecast })
    }

    /// Re-issue the most recent search. Never called automatically.
    pub async fn retry_last(&self) -> Result<WeatherReport, WeatherError> {
        let query = self.last_search().ok_or(WeatherError::NoPreviousSearch)?;
        tracing::info!("Retrying last search: {}", query);
        self.fetch_report(&query).await
    }

    /// Most recently attempted query, successful or not
    pub fn last_search(&self) -> Option<SearchQuery> {
        self.last_search.lock().clone()
    }

    /// Forget every cached response so the next fetch goes to the network.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_responses(&self) -> usize {
        self.cache.lock().len()
    }

    fn remember(&self, query: &SearchQuery) {
        *self.last_search.lock() = Some(query.clone());
    }

    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &SearchQuery,
    ) -> Result<T, WeatherError> {
        let key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;

        if let SearchQuery::City(name) = query {
            if name.trim().is_empty() {
                return Err(WeatherError::NotFound(String::new()));
            }
        }

        let url = format!("{}/{}", self.base_url, endpoint);
        let mut params = query.params();
        params.push(("units", "metric".to_string()));
        params.push(("appid", key.to_string()));

        tracing::debug!("GET {} for {}", url, query);
        let response = self.client.get(&url).query(&params).send().await?;

        handle_response(response, &query.to_string()).await
    }
}

impl std::fmt::Debug for WeatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("cache", &*self.cache.lock())
            .finish()
    }
}

/// Map an HTTP response to a payload or a classified error.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
    subject: &str,
) -> Result<T, WeatherError> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| WeatherError::Parse(format!("JSON parse error: {}", e)))
    } else if status == StatusCode::NOT_FOUND {
        tracing::info!("Upstream has no data for {}", subject);
        Err(WeatherError::NotFound(subject.to_string()))
    } else if status == StatusCode::UNAUTHORIZED {
        tracing::error!("API key rejected by upstream");
        Err(WeatherError::Unauthorized)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        tracing::warn!("Rate limited (retry after {:?} s)", retry_after);
        Err(WeatherError::RateLimited { retry_after })
    } else {
        let text = response.text().await.unwrap_or_default();
        tracing::warn!("Upstream returned {}: {}", status, text);
        Err(WeatherError::Api {
            status: status.as_u16(),
            message: text,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::cache::ManualClock;
    use weathernow_core::ErrorKind;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_json(name: &str) -> serde_json::Value {
        serde_json::json!({
            "coord": {"lat": 51.51, "lon": -0.13},
            "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}],
            "main": {"temp": 14.2, "feels_like": 13.5, "humidity": 72, "pressure": 1015},
            "visibility": 10000,
            "wind": {"speed": 4.1, "deg": 240},
            "clouds": {"all": 75},
            "dt": 1_709_290_800,
            "sys": {"country": "GB", "sunrise": 1_709_275_000, "sunset": 1_709_315_000},
            "timezone": 0,
            "name": name
        })
    }

    fn client_for(server: &MockServer) -> WeatherClient {
        WeatherClient::new(Some("test_key".to_string()))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_fetch_current_by_city() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "London"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_json("London")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let current = client.fetch_current_by_city("London").await.unwrap();

        assert_eq!(current.name, "London");
        assert_eq!(current.main.humidity, 72);
        assert_eq!(client.last_search(), Some(SearchQuery::city("London")));
    }

    #[tokio::test]
    async fn test_fetch_forecast_by_coords() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("lat", "51.5"))
            .and(query_param("lon", "-0.12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [{
                    "dt": 1_709_290_800,
                    "main": {"temp": 9.6, "feels_like": 7.0, "humidity": 80, "pressure": 1009},
                    "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
                    "wind": {"speed": 5.5, "deg": 200},
                    "clouds": {"all": 100},
                    "pop": 0.7
                }],
                "city": {"name": "London", "country": "GB"}
            })))
            .mount(&server)
            .await;

        let forecast = client_for(&server)
            .fetch_forecast_by_coords(51.5, -0.12)
            .await
            .unwrap();

        assert_eq!(forecast.list.len(), 1);
        assert_eq!(forecast.list[0].pop, Some(0.7));
        assert_eq!(forecast.city.unwrap().name, "London");
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_json("Paris")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.fetch_current_by_city("Paris").await.unwrap();
        let again = client.fetch_current_by_city("  PARIS ").await.unwrap();

        assert_eq!(again.name, "Paris");
        assert_eq!(client.cached_responses(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_json("Oslo")))
            .expect(2)
            .mount(&server)
            .await;

        let clock = ManualClock::new(0);
        let client = client_for(&server)
            .with_cache_policy(CacheTtl::default(), Arc::new(clock.clone()));

        client.fetch_current_by_city("Oslo").await.unwrap();
        clock.advance(Duration::from_secs(5 * 60));
        client.fetch_current_by_city("Oslo").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_json("Rome")))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.fetch_current_by_city("Rome").await.unwrap();
        client.clear_cache();
        client.fetch_current_by_city("Rome").await.unwrap();
    }

    #[tokio::test]
    async fn test_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404", "message": "city not found"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_current_by_city("Atlantis").await.unwrap_err();

        assert!(matches!(err, WeatherError::NotFound(ref s) if s == "Atlantis"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        // Failed attempts still count as the last search
        assert_eq!(client.last_search(), Some(SearchQuery::city("Atlantis")));
        assert_eq!(client.cached_responses(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_current_by_city("London")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "60"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_forecast_by_city("London")
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::RateLimited { retry_after: Some(60) }));
    }

    #[tokio::test]
    async fn test_server_error_is_unknown() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_current_by_coords(1.0, 2.0)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Api { status: 503, .. }));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_malformed_body_is_unknown() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_current_by_city("London")
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Parse(_)));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_network_failure() {
        // Nothing listens on port 1
        let client = WeatherClient::new(Some("k".into()))
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let err = client.fetch_current_by_city("London").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkUnavailable);
    }

    #[tokio::test]
    async fn test_missing_key_is_detected_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = WeatherClient::new(None).unwrap().with_base_url(server.uri());
        assert!(!client.has_api_key());
        let err = client.fetch_forecast_by_city("London").await.unwrap_err();
        assert!(matches!(err, WeatherError::MissingApiKey));
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_retry_without_previous_search() {
        let client = WeatherClient::new(Some("k".into())).unwrap();
        assert!(matches!(
            client.retry_last().await,
            Err(WeatherError::NoPreviousSearch)
        ));
    }

    #[test]
    fn test_search_query_display() {
        assert_eq!(SearchQuery::city(" Lima ").to_string(), "Lima");
        assert_eq!(SearchQuery::coords(51.5074, -0.1278).to_string(), "51.51, -0.13");
    }
}
