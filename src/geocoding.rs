//! Reverse geocoding of route endpoints with caching and request coalescing.
//!
//! - Results are cached per coordinate rounded to 4 decimals and expire after a TTL
//! - Concurrent lookups of the same key share one in-flight request
//! - Request starts are spaced by a minimum interval (Nominatim allows 1 req/s)
//!
//! The cache is an explicit service: build one [`LocationCache`] per process and
//! share it. Storage clock and geocoder are injected so the cache can be driven
//! deterministically in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const NOMINATIM_API: &str = "https://nominatim.openstreetmap.org";

const UNAVAILABLE_NAME: &str = "Location unavailable";
const UNAVAILABLE_DISPLAY_NAME: &str = "Location details unavailable";

/// Human readable place name of a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub name: String,
    pub display_name: String,
}

impl LocationInfo {
    /// Fallback returned when the lookup fails.
    pub fn unavailable() -> Self {
        Self {
            name: UNAVAILABLE_NAME.to_string(),
            display_name: UNAVAILABLE_DISPLAY_NAME.to_string(),
        }
    }

    pub fn from_response(response: &ReverseResponse) -> Self {
        let name = response
            .address
            .as_ref()
            .map(format_location_name)
            .unwrap_or_else(|| format_location_name(&Address::default()));
        let display_name = non_empty(&response.display_name)
            .unwrap_or(UNAVAILABLE_DISPLAY_NAME)
            .to_string();
        Self { name, display_name }
    }
}

/// Address block of a reverse geocoding response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub municipality: Option<String>,
    pub suburb: Option<String>,
    pub neighbourhood: Option<String>,
    pub road: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverseResponse {
    pub address: Option<Address>,
    pub display_name: Option<String>,
    /// Set instead of an address when Nominatim cannot resolve the point.
    pub error: Option<String>,
}

impl ReverseResponse {
    /// Turn an `{"error": ...}` body (sent with status 200) into an error.
    pub fn into_result(self) -> Result<Self, GeocodeError> {
        match self.error {
            Some(message) => Err(GeocodeError::Other(message)),
            None => Ok(self),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("reverse geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("reverse geocoding failed: {0}")]
    Other(String),
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Most specific settlement name, or a "district, region" style fallback.
pub fn format_location_name(address: &Address) -> String {
    let settlement = [
        &address.city,
        &address.town,
        &address.village,
        &address.municipality,
    ]
    .into_iter()
    .find_map(non_empty);
    if let Some(name) = settlement {
        return name.to_string();
    }

    let mut components: Vec<&str> = Vec::new();
    if let Some(local) = [&address.suburb, &address.neighbourhood, &address.road]
        .into_iter()
        .find_map(non_empty)
    {
        components.push(local);
    }

    let not_listed = |region: &&str| !components.iter().any(|c| c.contains(*region));
    let state = non_empty(&address.state).filter(not_listed);
    let county = non_empty(&address.county).filter(not_listed);
    if let Some(region) = state.or(county) {
        components.push(region);
    }

    if components.is_empty() {
        if let Some(country) = non_empty(&address.country) {
            components.push(country);
        }
    }

    if components.is_empty() {
        "Unknown Location".to_string()
    } else {
        components.join(", ")
    }
}

/// Cache key: coordinates rounded to 4 decimals (about 11 m).
pub fn cache_key(lat: f64, lon: f64) -> String {
    format!("{lat:.4},{lon:.4}")
}

/// Source of the current time for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

pub type ReverseFuture = BoxFuture<'static, Result<ReverseResponse, GeocodeError>>;

/// Network side of the lookup.
pub trait ReverseGeocoder: Send + Sync {
    fn reverse(&self, lat: f64, lon: f64) -> ReverseFuture;
}

/// Nominatim `/reverse` client.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub fn new(user_agent: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: NOMINATIM_API.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, lat: f64, lon: f64) -> ReverseFuture {
        let request = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".to_string()),
                ("zoom", "12".to_string()),
            ]);

        async move {
            let response = request.send().await?.error_for_status()?;
            response.json::<ReverseResponse>().await?.into_result()
        }
        .boxed()
    }
}

/// Options for the location cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodingOptions {
    /// How long a resolved name stays valid (default: 3600 s)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Minimum spacing between request starts (default: 1000 ms)
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

impl Default for GeocodingOptions {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    60 * 60
}

fn default_min_request_interval_ms() -> u64 {
    1000
}

/// Spaces out when requests START. Each caller reserves the next free slot.
struct DispatchRateLimiter {
    interval: Duration,
    next_dispatch: tokio::sync::Mutex<Instant>,
}

impl DispatchRateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: tokio::sync::Mutex::new(Instant::now()),
        }
    }

    async fn wait_for_dispatch_slot(&self) {
        let wait = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();
            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.interval;
            dispatch_at - now
        };

        // Wait outside the lock
        if !wait.is_zero() {
            debug!("waiting {wait:?} for geocoding slot");
            tokio::time::sleep(wait).await;
        }
    }
}

struct CacheEntry {
    data: LocationInfo,
    stored_at: Instant,
}

type PendingLookup = Shared<BoxFuture<'static, LocationInfo>>;

struct Inner<C> {
    geocoder: Arc<dyn ReverseGeocoder>,
    clock: C,
    ttl: Duration,
    limiter: DispatchRateLimiter,
    entries: Mutex<HashMap<String, CacheEntry>>,
    pending: Mutex<HashMap<String, PendingLookup>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C: Clock> Inner<C> {
    fn cached(&self, key: &str) -> Option<LocationInfo> {
        let mut entries = lock(&self.entries);
        let entry = entries.get(key)?;
        if self.clock.now().duration_since(entry.stored_at) < self.ttl {
            return Some(entry.data.clone());
        }
        entries.remove(key);
        None
    }

    async fn fetch(self: Arc<Self>, lat: f64, lon: f64, key: String) -> LocationInfo {
        self.limiter.wait_for_dispatch_slot().await;

        let info = match self.geocoder.reverse(lat, lon).await {
            Ok(response) => {
                let info = LocationInfo::from_response(&response);
                let entry = CacheEntry {
                    data: info.clone(),
                    stored_at: self.clock.now(),
                };
                lock(&self.entries).insert(key.clone(), entry);
                info
            }
            Err(e) => {
                warn!("Failed to fetch location name for {key}: {e}");
                LocationInfo::unavailable()
            }
        };

        lock(&self.pending).remove(&key);
        info
    }
}

/// Reverse geocoding cache shared by everything that labels coordinates.
pub struct LocationCache<C = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for LocationCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl LocationCache<SystemClock> {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, opts: &GeocodingOptions) -> Self {
        Self::with_clock(geocoder, SystemClock, opts)
    }
}

impl<C: Clock + 'static> LocationCache<C> {
    pub fn with_clock(
        geocoder: Arc<dyn ReverseGeocoder>,
        clock: C,
        opts: &GeocodingOptions,
    ) -> Self {
        let interval = Duration::from_millis(opts.min_request_interval_ms);
        Self {
            inner: Arc::new(Inner {
                geocoder,
                clock,
                ttl: Duration::from_secs(opts.ttl_secs),
                limiter: DispatchRateLimiter::new(interval),
                entries: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Place name of a coordinate. Never fails: lookup errors yield
    /// [`LocationInfo::unavailable`], which is not cached.
    pub async fn location_name(&self, lat: f64, lon: f64) -> LocationInfo {
        let key = cache_key(lat, lon);

        let lookup = {
            let mut pending = lock(&self.inner.pending);
            if let Some(hit) = self.inner.cached(&key) {
                return hit;
            }
            match pending.get(&key) {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let lookup = Arc::clone(&self.inner)
                        .fetch(lat, lon, key.clone())
                        .boxed()
                        .shared();
                    pending.insert(key, lookup.clone());
                    lookup
                }
            }
        };

        lookup.await
    }

    /// Number of cached names, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry.
    pub fn evict_expired(&self) {
        let now = self.inner.clock.now();
        let ttl = self.inner.ttl;
        lock(&self.inner.entries).retain(|_, e| now.duration_since(e.stored_at) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeGeocoder {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl FakeGeocoder {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(delay_ms),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ReverseGeocoder for FakeGeocoder {
        fn reverse(&self, lat: f64, lon: f64) -> ReverseFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay;
            let fail = self.fail;
            async move {
                tokio::time::sleep(delay).await;
                if fail {
                    return ReverseResponse {
                        error: Some("Unable to geocode".to_string()),
                        ..Default::default()
                    }
                    .into_result();
                }
                Ok(ReverseResponse {
                    address: Some(Address {
                        town: Some(format!("Town {lat:.1}")),
                        ..Default::default()
                    }),
                    display_name: Some(format!("{lat}, {lon}")),
                    error: None,
                })
            }
            .boxed()
        }
    }

    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            })
        }

        fn advance(&self, by: Duration) {
            *lock(&self.offset) += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *lock(&self.offset)
        }
    }

    fn fast_options() -> GeocodingOptions {
        GeocodingOptions {
            ttl_secs: 60,
            min_request_interval_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_concurrent_lookups_are_coalesced() {
        let geocoder = FakeGeocoder::new(30);
        let cache = LocationCache::new(geocoder.clone(), &fast_options());

        let (a, b, c) = tokio::join!(
            cache.location_name(45.12341, 6.5),
            cache.location_name(45.12342, 6.5),
            cache.location_name(45.1234, 6.50001),
        );

        assert_eq!(geocoder.calls(), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.name, "Town 45.1");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_until_expiry() {
        let geocoder = FakeGeocoder::new(0);
        let clock = ManualClock::new();
        let cache = LocationCache::with_clock(geocoder.clone(), clock.clone(), &fast_options());

        cache.location_name(1.0, 2.0).await;
        cache.location_name(1.0, 2.0).await;
        assert_eq!(geocoder.calls(), 1);

        clock.advance(Duration::from_secs(59));
        cache.location_name(1.0, 2.0).await;
        assert_eq!(geocoder.calls(), 1);

        clock.advance(Duration::from_secs(2));
        cache.evict_expired();
        assert!(cache.is_empty());
        cache.location_name(1.0, 2.0).await;
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_fall_back_and_are_not_cached() {
        let geocoder = FakeGeocoder::failing();
        let cache = LocationCache::new(geocoder.clone(), &fast_options());

        let info = cache.location_name(1.0, 2.0).await;
        assert_eq!(info, LocationInfo::unavailable());
        assert!(cache.is_empty());

        cache.location_name(1.0, 2.0).await;
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_requests_are_spaced() {
        let geocoder = FakeGeocoder::new(0);
        let opts = GeocodingOptions {
            ttl_secs: 60,
            min_request_interval_ms: 50,
        };
        let cache = LocationCache::new(geocoder.clone(), &opts);

        let start = Instant::now();
        cache.location_name(1.0, 1.0).await;
        cache.location_name(2.0, 2.0).await;
        let elapsed = start.elapsed();

        assert_eq!(geocoder.calls(), 2);
        assert!(elapsed >= Duration::from_millis(40), "got {elapsed:?}");
    }

    #[test]
    fn test_cache_key_rounds_to_four_decimals() {
        assert_eq!(cache_key(45.123449, -6.0), "45.1234,-6.0000");
        assert_eq!(cache_key(45.12346, 6.5), "45.1235,6.5000");
    }

    #[test]
    fn test_format_prefers_settlement() {
        let address = Address {
            village: Some("Bonneval".to_string()),
            town: Some("Lanslebourg".to_string()),
            state: Some("Auvergne-Rhône-Alpes".to_string()),
            ..Default::default()
        };
        assert_eq!(format_location_name(&address), "Lanslebourg");
    }

    #[test]
    fn test_format_falls_back_to_district_and_region() {
        let address = Address {
            road: Some("Route des Grandes Alpes".to_string()),
            state: Some("Auvergne-Rhône-Alpes".to_string()),
            county: Some("Savoie".to_string()),
            ..Default::default()
        };
        assert_eq!(
            format_location_name(&address),
            "Route des Grandes Alpes, Auvergne-Rhône-Alpes"
        );

        let address = Address {
            suburb: Some("Savoie North".to_string()),
            state: Some("Savoie".to_string()),
            county: Some("Maurienne".to_string()),
            ..Default::default()
        };
        assert_eq!(format_location_name(&address), "Savoie North, Maurienne");
    }

    #[test]
    fn test_format_country_and_unknown() {
        let address = Address {
            country: Some("France".to_string()),
            ..Default::default()
        };
        assert_eq!(format_location_name(&address), "France");
        assert_eq!(format_location_name(&Address::default()), "Unknown Location");

        let address = Address {
            city: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(format_location_name(&address), "Unknown Location");
    }

    #[test]
    fn test_response_without_display_name() {
        let response: ReverseResponse =
            serde_json::from_str(r#"{"address": {"city": "Grenoble"}}"#).unwrap();
        let info = LocationInfo::from_response(&response);
        assert_eq!(info.name, "Grenoble");
        assert_eq!(info.display_name, "Location details unavailable");
    }

    #[test]
    fn test_error_body_becomes_error() {
        let response: ReverseResponse =
            serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        let err = response.into_result().unwrap_err();
        assert!(matches!(&err, GeocodeError::Other(m) if m == "Unable to geocode"));
        assert_eq!(err.to_string(), "reverse geocoding failed: Unable to geocode");

        let response: ReverseResponse =
            serde_json::from_str(r#"{"display_name": "Grenoble, Isère, France"}"#).unwrap();
        assert!(response.into_result().is_ok());
    }
}
