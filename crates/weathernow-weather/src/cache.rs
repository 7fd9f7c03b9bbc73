//! In-memory response cache with per-kind expiry.
//!
//! Entries are never evicted: an expired entry simply stops being returned
//! and is overwritten by the next fetch for the same fingerprint. The entry
//! count is bounded by the number of distinct places looked up in a session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Request class; decides how long a response stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Current,
    Forecast,
}

impl RequestKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Forecast => "forecast",
        }
    }
}

/// Deterministic cache key: request kind plus normalized parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    kind: RequestKind,
    key: String,
}

impl Fingerprint {
    /// Key for a city-name query. Case-insensitive and whitespace-stable.
    pub fn city(kind: RequestKind, name: &str) -> Self {
        Self {
            kind,
            key: format!("city:{}", normalize_city(name)),
        }
    }

    /// Key for a coordinate query
    pub fn coords(kind: RequestKind, lat: f64, lon: f64) -> Self {
        Self {
            kind,
            key: format!("coords:{}:{}", lat, lon),
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.key)
    }
}

/// Lower-case, trim, and collapse runs of whitespace to a single space.
pub fn normalize_city(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Time-to-live per request kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub current: Duration,
    pub forecast: Duration,
}

impl CacheTtl {
    pub fn for_kind(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Current => self.current,
            RequestKind::Forecast => self.forecast,
        }
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            current: Duration::from_secs(5 * 60),
            forecast: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    fetched_at_millis: i64,
}

/// Fingerprint → payload map with time-based expiry.
pub struct ResponseCache<V> {
    entries: HashMap<Fingerprint, CacheEntry<V>>,
    ttl: CacheTtl,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResponseCache<V> {
    /// Cache with default TTLs on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(CacheTtl::default(), Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: CacheTtl, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    /// Payload if present and fresh; expired entries read as absent.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<V> {
        let entry = self.entries.get(fingerprint)?;
        let age = self.clock.now_millis() - entry.fetched_at_millis;
        let ttl = self.ttl.for_kind(fingerprint.kind()).as_millis() as i64;

        if age < ttl {
            tracing::debug!("Cache hit for {} (age {} ms)", fingerprint, age);
            Some(entry.payload.clone())
        } else {
            tracing::debug!("Cache entry for {} expired (age {} ms)", fingerprint, age);
            None
        }
    }

    /// Store `payload` stamped with the current time, replacing any prior entry.
    pub fn put(&mut self, fingerprint: Fingerprint, payload: V) {
        let fetched_at_millis = self.clock.now_millis();
        self.entries.insert(
            fingerprint,
            CacheEntry {
                payload,
                fetched_at_millis,
            },
        );
    }

    /// Drop everything (manual refresh).
    pub fn clear(&mut self) {
        tracing::debug!("Clearing {} cached responses", self.entries.len());
        self.entries.clear();
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
