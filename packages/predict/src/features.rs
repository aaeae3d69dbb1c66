//! Reduces fetched data to predictor inputs.
//!
//! Each builder returns a [`FeatureFrame`] of named values; the caller
//! projects it onto the predictor's schema. Empty or partial seismic data
//! is not an error here: the documented fallbacks below stand in for
//! missing readings.

use hazard_risk_models::{SeismicEvent, WeatherSnapshot};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::schema::FeatureFrame;

/// Fire predictor inputs, in training order.
pub const FIRE_FEATURES: [&str; 3] = ["oxygen_pct", "temperature_c", "humidity_pct"];

/// Depth/location earthquake predictor inputs, in training order.
pub const DEPTH_FEATURES: [&str; 3] = ["depth_km", "latitude", "longitude"];

/// Numeric inputs of the place-categorical earthquake predictor. Its
/// schema adds one `place_<label>` column per training-time place.
pub const PLACE_NUMERIC_FEATURES: [&str; 4] = ["nst", "gap", "rms", "depth"];

/// Column prefix of the one-hot place encoding.
pub const PLACE_PREFIX: &str = "place_";

/// Depth used when no event in a batch reports one.
pub const DEFAULT_DEPTH_KM: f64 = 10.0;

/// Station count used when the observation has none.
pub const DEFAULT_NST: f64 = 20.0;

/// Azimuthal gap (degrees) used when the observation has none.
pub const DEFAULT_GAP: f64 = 50.0;

/// Travel-time residual (seconds) used when the observation has none.
pub const DEFAULT_RMS: f64 = 1.0;

/// Which earthquake predictor generation a pipeline feeds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EarthquakeFeatureSet {
    /// Mean batch depth plus the query location.
    #[default]
    DepthLocation,
    /// One observation's station metrics plus a one-hot place label.
    PlaceCategorical,
}

/// Fire inputs from a weather snapshot and a synthesized oxygen reading.
#[must_use]
pub fn fire_frame(oxygen_pct: f64, weather: &WeatherSnapshot) -> FeatureFrame {
    FeatureFrame::new()
        .with(FIRE_FEATURES[0], oxygen_pct)
        .with(FIRE_FEATURES[1], weather.temperature_c)
        .with(FIRE_FEATURES[2], weather.humidity_pct)
}

/// Arithmetic mean of the reported depths among the first `limit` events
/// (all events when `limit` is `None`). Events without a depth are left
/// out of both the sum and the divisor.
///
/// Returns `None` when no considered event has a depth.
#[must_use]
pub fn average_depth_km(events: &[SeismicEvent], limit: Option<usize>) -> Option<f64> {
    let (sum, count) = events
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .filter_map(|e| e.depth_km)
        .fold((0.0, 0_u32), |(sum, count), depth| (sum + depth, count + 1));

    (count > 0).then(|| sum / f64::from(count))
}

/// Depth/location inputs for a batch around `(latitude, longitude)`.
///
/// Returns the frame and the depth fed into it, which is
/// [`DEFAULT_DEPTH_KM`] when the batch has no usable depth.
#[must_use]
pub fn depth_location_frame(
    events: &[SeismicEvent],
    latitude: f64,
    longitude: f64,
    limit: Option<usize>,
) -> (FeatureFrame, f64) {
    let depth = average_depth_km(events, limit).unwrap_or_else(|| {
        log::debug!(
            "No depth among {} event(s), using {DEFAULT_DEPTH_KM} km",
            events.len()
        );
        DEFAULT_DEPTH_KM
    });

    let frame = FeatureFrame::new()
        .with(DEPTH_FEATURES[0], depth)
        .with(DEPTH_FEATURES[1], latitude)
        .with(DEPTH_FEATURES[2], longitude);

    (frame, depth)
}

/// Reduces a feed place description to its training-time category by
/// dropping everything up to and including the last `"of "`.
///
/// `"10 km SSW of Tokyo, Japan"` becomes `"Tokyo, Japan"`; labels without
/// a direction prefix are kept as they are.
#[must_use]
pub fn normalize_place_label(label: &str) -> &str {
    label
        .rfind("of ")
        .map_or(label, |i| &label[i + "of ".len()..])
        .trim()
}

/// One observation for the place-categorical predictor.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyObservation {
    /// Number of reporting stations.
    pub nst: f64,
    /// Azimuthal gap in degrees.
    pub gap: f64,
    /// Travel-time residual in seconds.
    pub rms: f64,
    /// Depth in km.
    pub depth_km: f64,
    /// Raw place description, `None` for an unseen place.
    pub place: Option<String>,
}

impl LegacyObservation {
    /// All defaults and no place, which encodes as all-zero.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            nst: DEFAULT_NST,
            gap: DEFAULT_GAP,
            rms: DEFAULT_RMS,
            depth_km: DEFAULT_DEPTH_KM,
            place: None,
        }
    }

    /// The observation an event reports, with defaults for missing
    /// metrics.
    #[must_use]
    pub fn from_event(event: &SeismicEvent) -> Self {
        Self {
            nst: event.nst.map_or(DEFAULT_NST, f64::from),
            gap: event.gap.unwrap_or(DEFAULT_GAP),
            rms: event.rms.unwrap_or(DEFAULT_RMS),
            depth_km: event.depth_km.unwrap_or(DEFAULT_DEPTH_KM),
            place: Some(event.place_label.clone()),
        }
    }

    /// The observation of the newest event, or [`Self::fallback`] for an
    /// empty batch. Does not assume the batch is sorted.
    #[must_use]
    pub fn newest(events: &[SeismicEvent]) -> Self {
        events
            .iter()
            .max_by_key(|e| e.timestamp)
            .map_or_else(Self::fallback, Self::from_event)
    }

    /// Place-categorical inputs for this observation.
    #[must_use]
    pub fn frame(&self) -> FeatureFrame {
        let frame = FeatureFrame::new()
            .with(PLACE_NUMERIC_FEATURES[0], self.nst)
            .with(PLACE_NUMERIC_FEATURES[1], self.gap)
            .with(PLACE_NUMERIC_FEATURES[2], self.rms)
            .with(PLACE_NUMERIC_FEATURES[3], self.depth_km);

        match &self.place {
            Some(place) => frame.with_one_hot(PLACE_PREFIX, normalize_place_label(place)),
            None => frame.with_indicator_prefix(PLACE_PREFIX),
        }
    }
}
