//! Compile-time registry of external feed configurations.
//!
//! Each feed is defined in a TOML file under `feeds/`. The registry
//! embeds these at compile time and exposes them via [`all_feeds`] and
//! [`feed`].

use std::time::Duration;

use serde::Deserialize;

use crate::FeedError;
use crate::retry::RetryPolicy;

/// An external feed endpoint loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedService {
    /// Unique identifier (e.g., `"usgs"`, `"weatherapi"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Endpoint URL.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the first attempt on transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_max_retries() -> u32 {
    1
}

const fn default_backoff_ms() -> u64 {
    1_000
}

impl FeedService {
    /// Same service pointed at a different endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The retry policy for this feed.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    /// Builds an HTTP client carrying this feed's timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the TLS backend cannot initialise.
    pub fn client(&self) -> Result<reqwest::Client, FeedError> {
        Ok(reqwest::Client::builder().timeout(self.timeout()).build()?)
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const FEED_TOMLS: &[(&str, &str)] = &[
    ("usgs", include_str!("../feeds/usgs.toml")),
    ("weatherapi", include_str!("../feeds/weatherapi.toml")),
    ("ipinfo", include_str!("../feeds/ipinfo.toml")),
];

#[cfg(test)]
const EXPECTED_FEED_COUNT: usize = 3;

/// Returns all feed configurations.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_feeds() -> Vec<FeedService> {
    FEED_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse feed '{name}': {e}"))
        })
        .collect()
}

/// Returns the feed with the given id.
#[must_use]
pub fn feed(id: &str) -> Option<FeedService> {
    all_feeds().into_iter().find(|f| f.id == id)
}
