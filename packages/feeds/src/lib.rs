#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! External data feeds for the hazard risk pipeline.
//!
//! Each feed issues one bounded request per run and normalizes the
//! provider's response into the shared model types:
//!
//! - [`usgs`]: time-windowed, radius-bounded seismic event query.
//! - [`weather`]: single-point current conditions.
//! - [`ipinfo`]: IP-based geolocation for "use my location".
//!
//! Endpoints, timeouts and retry budgets come from the embedded
//! [`feed_registry`]. All requests go through [`retry`], which retries
//! transient failures once with backoff by default.

pub mod feed_registry;
pub mod ipinfo;
pub mod retry;
pub mod usgs;
pub mod weather;

use async_trait::async_trait;
use hazard_risk_models::{LookbackWindow, SeismicEvent, WeatherSnapshot};

/// Errors from external feed requests.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response body is not the expected shape.
    #[error("Malformed response: {message}")]
    Malformed {
        /// Description of what was missing or invalid.
        message: String,
    },
}

impl FeedError {
    /// Whether this error came from a request timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

/// Parameters of one seismic feed query.
#[derive(Debug, Clone, PartialEq)]
pub struct SeismicQuery {
    /// Center latitude.
    pub latitude: f64,
    /// Center longitude.
    pub longitude: f64,
    /// Search radius in km.
    pub radius_km: f64,
    /// UTC interval to search.
    pub window: LookbackWindow,
    /// Magnitude floor; `None` returns every reported event.
    pub min_magnitude: Option<f64>,
}

/// Events returned by one seismic query.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    /// Well-formed events, in feed order.
    pub events: Vec<SeismicEvent>,
    /// Number of feed entries skipped as malformed.
    pub skipped: usize,
}

/// A coordinate fix from IP geolocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// City reported by the provider.
    pub city: String,
    /// Country code or name reported by the provider.
    pub country: String,
}

/// A source of seismic events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetches all events matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] on network failure, timeout, non-2xx status
    /// or a response without a feature list. Individual malformed
    /// events are skipped, not reported as errors.
    async fn fetch_events(&self, query: &SeismicQuery) -> Result<EventBatch, FeedError>;
}

/// A source of current weather conditions.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Reads current conditions for a city name or `"lat,lon"` query.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] on failure. Never substitutes values.
    async fn current(&self, location_query: &str) -> Result<WeatherSnapshot, FeedError>;
}

/// A source of the caller's approximate position.
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    /// Locates the current machine.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the lookup fails.
    async fn locate(&self) -> Result<GeoFix, FeedError>;
}
