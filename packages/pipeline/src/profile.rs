//! Compile-time registry of pipeline profiles.
//!
//! A profile fixes the parameters that differ between dashboards: the
//! lookback window, the search radius, the magnitude floor, the fire tier
//! scheme and which earthquake predictor generation is fed. Profiles are
//! TOML files under `profiles/`, embedded at compile time.

use std::ops::RangeInclusive;

use hazard_risk_predict::classify::FireTierScheme;
use hazard_risk_predict::features::EarthquakeFeatureSet;
use serde::Deserialize;
use thiserror::Error;

/// Radius used when a profile does not set one.
pub const DEFAULT_RADIUS_KM: f64 = 300.0;

/// Profile used when none is named.
pub const DEFAULT_PROFILE: &str = "earthquake_live";

/// Lookback lengths a caller may choose, in days.
pub const LOOKBACK_DAYS_RANGE: RangeInclusive<u32> = 1..=365;

/// Search radii a caller may choose, in km.
pub const RADIUS_KM_RANGE: RangeInclusive<f64> = 100.0..=1_000.0;

/// A per-run override outside its allowed range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverrideError {
    /// Lookback length outside [`LOOKBACK_DAYS_RANGE`].
    #[error("Lookback of {0} days is outside 1..=365")]
    LookbackDays(u32),
    /// Radius outside [`RADIUS_KM_RANGE`].
    #[error("Radius of {0} km is outside 100..=1000")]
    RadiusKm(f64),
}

/// Parameters of one pipeline variant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineProfile {
    /// Unique identifier (e.g., `"combined"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Event-feed window length in days.
    pub lookback_days: u32,
    /// Event search radius in km.
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    /// Smallest magnitude requested from the feed. `None` requests all.
    #[serde(default)]
    pub min_magnitude: Option<f64>,
    /// Number of newest events averaged for depth. `None` uses all.
    #[serde(default)]
    pub depth_sample_limit: Option<usize>,
    /// Number of newest events kept as supporting evidence. `None` keeps
    /// all.
    #[serde(default)]
    pub supporting_event_limit: Option<usize>,
    /// Fire tier scheme.
    #[serde(default)]
    pub fire_scheme: FireTierScheme,
    /// Earthquake predictor inputs.
    #[serde(default)]
    pub earthquake_features: EarthquakeFeatureSet,
}

const fn default_radius_km() -> f64 {
    DEFAULT_RADIUS_KM
}

impl PipelineProfile {
    /// Replaces the lookback window length.
    ///
    /// # Errors
    ///
    /// Returns [`OverrideError::LookbackDays`] outside
    /// [`LOOKBACK_DAYS_RANGE`].
    pub fn with_lookback_days(mut self, days: u32) -> Result<Self, OverrideError> {
        if !LOOKBACK_DAYS_RANGE.contains(&days) {
            return Err(OverrideError::LookbackDays(days));
        }
        log::debug!("Profile {}: lookback {} -> {days} days", self.id, self.lookback_days);
        self.lookback_days = days;
        Ok(self)
    }

    /// Replaces the event search radius.
    ///
    /// # Errors
    ///
    /// Returns [`OverrideError::RadiusKm`] outside [`RADIUS_KM_RANGE`],
    /// NaN included.
    pub fn with_radius_km(mut self, radius_km: f64) -> Result<Self, OverrideError> {
        if !RADIUS_KM_RANGE.contains(&radius_km) {
            return Err(OverrideError::RadiusKm(radius_km));
        }
        log::debug!("Profile {}: radius {} -> {radius_km} km", self.id, self.radius_km);
        self.radius_km = radius_km;
        Ok(self)
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const PROFILE_TOMLS: &[(&str, &str)] = &[
    ("combined", include_str!("../profiles/combined.toml")),
    ("earthquake_live", include_str!("../profiles/earthquake_live.toml")),
    ("dashboard", include_str!("../profiles/dashboard.toml")),
    ("legacy_place", include_str!("../profiles/legacy_place.toml")),
];

#[cfg(test)]
const EXPECTED_PROFILE_COUNT: usize = 4;

/// Returns all pipeline profiles.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_profiles() -> Vec<PipelineProfile> {
    PROFILE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse profile '{name}': {e}"))
        })
        .collect()
}

/// Returns the profile with the given id.
#[must_use]
pub fn profile(id: &str) -> Option<PipelineProfile> {
    all_profiles().into_iter().find(|p| p.id == id)
}
