//! WeatherAPI current-conditions client.
//!
//! One `current.json` read per run, normalized into a
//! [`WeatherSnapshot`]. A failed read is reported, never replaced with
//! made-up values.
//!
//! Oxygen concentration is not observable from any weather provider, so
//! the fire model's oxygen input is synthesized by
//! [`estimate_oxygen_pct`] around the sea-level atmospheric baseline.
//!
//! See <https://www.weatherapi.com/docs/>

use async_trait::async_trait;
use hazard_risk_models::WeatherSnapshot;
use rand::Rng;

use crate::feed_registry::FeedService;
use crate::retry::{self, RetryPolicy};
use crate::{FeedError, WeatherSource};

/// Atmospheric oxygen percentage at sea level.
pub const ATMOSPHERIC_OXYGEN_PCT: f64 = 20.95;

/// Half-width of the uniform jitter applied to the oxygen baseline.
pub const OXYGEN_JITTER_PCT: f64 = 0.5;

/// Synthesizes an oxygen reading: `20.95 + uniform(-0.5, 0.5)`, rounded
/// to two decimals. The fire model was trained on this distribution.
pub fn estimate_oxygen_pct<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let jitter = rng.random_range(-OXYGEN_JITTER_PCT..OXYGEN_JITTER_PCT);
    ((ATMOSPHERIC_OXYGEN_PCT + jitter) * 100.0).round() / 100.0
}

/// Client for the WeatherAPI current-conditions endpoint.
pub struct WeatherApiFeed {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl WeatherApiFeed {
    /// Creates a client for the given feed configuration and API key.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the HTTP client cannot be built.
    pub fn new(service: &FeedService, api_key: impl Into<String>) -> Result<Self, FeedError> {
        Ok(Self {
            client: service.client()?,
            base_url: service.base_url.clone(),
            api_key: api_key.into(),
            policy: service.retry_policy(),
        })
    }
}

#[async_trait]
impl WeatherSource for WeatherApiFeed {
    async fn current(&self, location_query: &str) -> Result<WeatherSnapshot, FeedError> {
        log::debug!("WeatherAPI current conditions for {location_query:?}");

        let body = retry::send_json(&self.policy, || {
            self.client
                .get(&self.base_url)
                .query(&[("key", self.api_key.as_str()), ("q", location_query)])
        })
        .await?;

        parse_current(&body)
    }
}

/// Parses a `current.json` response body.
///
/// # Errors
///
/// Returns [`FeedError::Malformed`] if the `current` block, its
/// temperature or its humidity is missing.
pub fn parse_current(body: &serde_json::Value) -> Result<WeatherSnapshot, FeedError> {
    let current = body
        .get("current")
        .filter(|c| c.is_object())
        .ok_or_else(|| FeedError::Malformed {
            message: body["error"]["message"].as_str().map_or_else(
                || "No current block in weather response".to_string(),
                |m| format!("No current block in weather response: {m}"),
            ),
        })?;

    let temperature_c = current["temp_c"]
        .as_f64()
        .ok_or_else(|| FeedError::Malformed {
            message: "Missing current.temp_c in weather response".to_string(),
        })?;

    let humidity_pct = current["humidity"]
        .as_f64()
        .filter(|h| (0.0..=100.0).contains(h))
        .ok_or_else(|| FeedError::Malformed {
            message: "Missing or invalid current.humidity in weather response".to_string(),
        })?;

    let precipitation_mm = current["precip_mm"].as_f64().unwrap_or(0.0).max(0.0);

    Ok(WeatherSnapshot {
        temperature_c,
        humidity_pct,
        precipitation_mm,
    })
}
