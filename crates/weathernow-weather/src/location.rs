//! Current-place resolution: a position fix plus a human-readable name.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Clock, SystemClock};
use crate::error::LocationError;
use crate::geocode::Geocoder;
use crate::types::Coordinates;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Anything that can produce the device's position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Position supplied up front (configuration or command line).
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// Position source for platforms with no location service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPosition;

#[async_trait]
impl PositionSource for NoPosition {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable)
    }
}

/// Resolved coordinates and display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    pub lat: f64,
    pub lon: f64,
    pub place_name: String,
}

#[derive(Debug, Clone, Copy)]
struct Fix {
    coords: Coordinates,
    taken_at_millis: i64,
}

pub struct LocationResolver {
    source: Arc<dyn PositionSource>,
    geocoder: Geocoder,
    timeout: Duration,
    max_age: Duration,
    clock: Arc<dyn Clock>,
    last_fix: Mutex<Option<Fix>>,
}

impl LocationResolver {
    pub fn new(source: Arc<dyn PositionSource>, geocoder: Geocoder) -> Self {
        Self {
            source,
            geocoder,
            timeout: DEFAULT_TIMEOUT,
            max_age: DEFAULT_MAX_AGE,
            clock: Arc::new(SystemClock),
            last_fix: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long a previous fix may be reused without asking the source again.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current position, reusing a recent fix when one exists.
    ///
    /// # Errors
    /// `Timeout` when the source does not answer in time, otherwise whatever
    /// the source reports.
    pub async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let now = self.clock.now_millis();
        let recent = *self.last_fix.lock();
        if let Some(fix) = recent {
            if now - fix.taken_at_millis < self.max_age.as_millis() as i64 {
                tracing::debug!("Reusing position fix from {} ms ago", now - fix.taken_at_millis);
                return Ok(fix.coords);
            }
        }

        let coords = tokio::time::timeout(self.timeout, self.source.current_position())
            .await
            .map_err(|_| {
                tracing::warn!("Position request timed out after {:?}", self.timeout);
                LocationError::Timeout
            })??;

        *self.last_fix.lock() = Some(Fix {
            coords,
            taken_at_millis: self.clock.now_millis(),
        });

        Ok(coords)
    }

    /// Display name for coordinates. Falls back to the coordinate label when
    /// reverse geocoding fails for any reason.
    pub async fn place_name(&self, coords: Coordinates) -> String {
        match self.geocoder.reverse(coords.lat, coords.lon).await {
            Ok(place) => place.label(),
            Err(e) => {
                tracing::warn!("Reverse geocoding failed, using coordinates: {}", e);
                coords.label()
            }
        }
    }

    /// Position plus name. Position failures propagate; naming never fails.
    pub async fn resolve_current_place(&self) -> Result<ResolvedPlace, LocationError> {
        let coords = self.current_position().await?;
        let place_name = self.place_name(coords).await;

        tracing::info!("Resolved current place: {}", place_name);
        Ok(ResolvedPlace {
            lat: coords.lat,
            lon: coords.lon,
            place_name,
        })
    }
}

impl std::fmt::Debug for LocationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationResolver")
            .field("timeout", &self.timeout)
            .field("max_age", &self.max_age)
            .field("last_fix", &self.last_fix.lock().map(|f| f.coords))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::cache::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Counts reads and answers with a fixed position
    struct CountingSource {
        coords: Coordinates,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl PositionSource for CountingSource {
        async fn current_position(&self) -> Result<Coordinates, LocationError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.coords)
        }
    }

    struct StalledSource;

    #[async_trait]
    impl PositionSource for StalledSource {
        async fn current_position(&self) -> Result<Coordinates, LocationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Coordinates::new(0.0, 0.0))
        }
    }

    struct DeniedSource;

    #[async_trait]
    impl PositionSource for DeniedSource {
        async fn current_position(&self) -> Result<Coordinates, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    fn offline_geocoder() -> Geocoder {
        Geocoder::new(None).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_name_from_geocoder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Lyon, Auvergne-Rhône-Alpes, France",
                "address": {"city": "Lyon", "state": "Auvergne-Rhône-Alpes", "country": "France"}
            })))
            .mount(&server)
            .await;

        let geocoder = Geocoder::new(Some("k".into()))
            .unwrap()
            .with_base_url(server.uri());
        let resolver = LocationResolver::new(
            Arc::new(FixedPosition(Coordinates::new(45.76, 4.84))),
            geocoder,
        );

        let place = resolver.resolve_current_place().await.unwrap();
        assert_eq!(place.place_name, "Lyon, Auvergne-Rhône-Alpes");
        assert_eq!(place.lat, 45.76);
    }

    #[tokio::test]
    async fn test_geocoding_failure_falls_back_to_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let geocoder = Geocoder::new(Some("k".into()))
            .unwrap()
            .with_base_url(server.uri());
        let resolver = LocationResolver::new(
            Arc::new(FixedPosition(Coordinates::new(51.5074, -0.1278))),
            geocoder,
        );

        let place = resolver.resolve_current_place().await.unwrap();
        assert_eq!(place.place_name, "51.51, -0.13");
    }

    #[tokio::test]
    async fn test_missing_geocoding_key_falls_back() {
        let resolver = LocationResolver::new(
            Arc::new(FixedPosition(Coordinates::new(-33.8688, 151.2093))),
            offline_geocoder(),
        );
        let place = resolver.resolve_current_place().await.unwrap();
        assert_eq!(place.place_name, "-33.87, 151.21");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_source_times_out() {
        let resolver = LocationResolver::new(Arc::new(StalledSource), offline_geocoder());
        let err = resolver.resolve_current_place().await.unwrap_err();
        assert_eq!(err, LocationError::Timeout);
    }

    #[tokio::test]
    async fn test_permission_denied_propagates() {
        let resolver = LocationResolver::new(Arc::new(DeniedSource), offline_geocoder());
        assert_eq!(
            resolver.current_position().await.unwrap_err(),
            LocationError::PermissionDenied
        );
    }

    #[tokio::test]
    async fn test_no_position_is_unavailable() {
        let resolver = LocationResolver::new(Arc::new(NoPosition), offline_geocoder());
        assert_eq!(
            resolver.current_position().await.unwrap_err(),
            LocationError::Unavailable
        );
    }

    #[tokio::test]
    async fn test_recent_fix_is_reused() {
        let source = Arc::new(CountingSource {
            coords: Coordinates::new(10.0, 20.0),
            reads: AtomicUsize::new(0),
        });
        let clock = ManualClock::new(1_000_000);
        let resolver = LocationResolver::new(source.clone(), offline_geocoder())
            .with_clock(Arc::new(clock.clone()));

        resolver.current_position().await.unwrap();
        clock.advance(Duration::from_secs(4 * 60));
        resolver.current_position().await.unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(60));
        resolver.current_position().await.unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }
}
