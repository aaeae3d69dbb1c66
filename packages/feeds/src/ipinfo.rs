//! IP geolocation via `ipinfo.io`.
//!
//! Used when the user asks for their current location instead of picking
//! a city. The provider reports coordinates as a single `"lat,lon"`
//! string.

use async_trait::async_trait;

use crate::feed_registry::FeedService;
use crate::retry::{self, RetryPolicy};
use crate::{FeedError, GeoFix, GeolocationSource};

/// City label used when the provider does not report one.
const UNKNOWN_CITY: &str = "Unknown";

/// Client for the `ipinfo.io` JSON endpoint.
pub struct IpInfoFeed {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl IpInfoFeed {
    /// Creates a client for the given feed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the HTTP client cannot be built.
    pub fn new(service: &FeedService) -> Result<Self, FeedError> {
        Ok(Self {
            client: service.client()?,
            base_url: service.base_url.clone(),
            policy: service.retry_policy(),
        })
    }
}

#[async_trait]
impl GeolocationSource for IpInfoFeed {
    async fn locate(&self) -> Result<GeoFix, FeedError> {
        let body = retry::send_json(&self.policy, || self.client.get(&self.base_url)).await?;
        parse_response(&body)
    }
}

/// Parses an `ipinfo.io` response.
///
/// # Errors
///
/// Returns [`FeedError::Malformed`] if `loc` is missing or not a
/// `"lat,lon"` pair.
pub fn parse_response(body: &serde_json::Value) -> Result<GeoFix, FeedError> {
    let loc = body["loc"].as_str().ok_or_else(|| FeedError::Malformed {
        message: "Missing loc in geolocation response".to_string(),
    })?;

    let (latitude, longitude) = loc
        .split_once(',')
        .and_then(|(lat, lon)| {
            Some((
                lat.trim().parse::<f64>().ok()?,
                lon.trim().parse::<f64>().ok()?,
            ))
        })
        .ok_or_else(|| FeedError::Malformed {
            message: format!("Invalid loc {loc:?} in geolocation response"),
        })?;

    Ok(GeoFix {
        latitude,
        longitude,
        city: body["city"].as_str().unwrap_or(UNKNOWN_CITY).to_string(),
        country: body["country"].as_str().unwrap_or_default().to_string(),
    })
}
