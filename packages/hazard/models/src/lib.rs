#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the hazard risk pipeline.
//!
//! A run resolves one [`Location`], reads external data for it
//! ([`SeismicEvent`] batches and [`WeatherSnapshot`]s) and ends in a
//! [`RiskAssessment`]. None of these types are mutated after they are
//! produced; every run builds its own.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// IANA zone id used when no timezone boundary contains a location.
pub const UTC_ZONE: &str = "UTC";

/// Label given to events whose feed entry has no `place`.
pub const UNKNOWN_PLACE: &str = "Unknown location";

/// The hazard a pipeline run assesses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Hazard {
    /// Forest fire probability from current weather.
    Fire,
    /// Earthquake magnitude from recent seismic activity.
    Earthquake,
}

/// Discrete risk category derived from a continuous prediction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// No action needed.
    Safe,
    /// Elevated but not dangerous.
    Moderate,
    /// Dangerous.
    High,
}

/// A resolved place with coordinates and timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Country name as listed in the gazetteer (empty for raw coordinates
    /// without a known country).
    pub country: String,
    /// City name as listed in the gazetteer.
    pub city: String,
    /// Latitude (WGS84), within `[-90, 90]`.
    pub latitude: f64,
    /// Longitude (WGS84), within `[-180, 180]`.
    pub longitude: f64,
    /// IANA zone id, [`UTC_ZONE`] when the lookup found nothing.
    pub timezone: String,
}

impl Location {
    /// Human-readable `"City, Country"` label.
    #[must_use]
    pub fn label(&self) -> String {
        match (self.city.is_empty(), self.country.is_empty()) {
            (false, false) => format!("{}, {}", self.city, self.country),
            (false, true) => self.city.clone(),
            (true, false) => self.country.clone(),
            (true, true) => format!("{:.4}, {:.4}", self.latitude, self.longitude),
        }
    }

    /// The location's zone. Ids the tz database does not know fall back
    /// to UTC.
    #[must_use]
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }

    /// `instant` in the location's zone.
    #[must_use]
    pub fn local_time(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.tz())
    }
}

/// One event reported by the seismic feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeismicEvent {
    /// Origin time.
    pub timestamp: DateTime<Utc>,
    /// Reported magnitude.
    pub magnitude: f64,
    /// Hypocenter depth in km. `None` when the feed omits it.
    pub depth_km: Option<f64>,
    /// Epicenter latitude.
    pub latitude: f64,
    /// Epicenter longitude.
    pub longitude: f64,
    /// Feed-provided place description (e.g. `"10 km SSW of Tokyo, Japan"`).
    pub place_label: String,
    /// Number of seismic stations used to locate the event.
    pub nst: Option<u32>,
    /// Largest azimuthal gap between stations, in degrees.
    pub gap: Option<f64>,
    /// Root-mean-square travel time residual, in seconds.
    pub rms: Option<f64>,
}

/// Sorts events newest first. Feeds do not guarantee any order.
pub fn sort_newest_first(events: &mut [SeismicEvent]) {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Current weather conditions at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    /// Air temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Relative humidity, `[0, 100]`.
    pub humidity_pct: f64,
    /// Precipitation in mm, `>= 0`.
    pub precipitation_mm: f64,
}

/// The `[start, end]` UTC interval bounding an event-feed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookbackWindow {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Inclusive end.
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    /// The window of `days` days ending at `end`.
    #[must_use]
    pub fn ending_at(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - TimeDelta::days(i64::from(days)),
            end,
        }
    }

    /// Whether `instant` falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Terminal output of one successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Which hazard was assessed.
    pub hazard: Hazard,
    /// The location the run resolved.
    pub location: Location,
    /// Discrete tier.
    pub tier: RiskTier,
    /// Display label of the tier under the scheme that produced it
    /// (e.g. `"Danger"`, `"Low"`).
    pub tier_label: String,
    /// Normalized score on a 0-100 scale.
    pub score: f64,
    /// The predictor's raw output (fire probability or magnitude).
    pub raw_prediction: f64,
    /// Events that fed the prediction, newest first. Empty for fire runs.
    pub supporting_events: Vec<SeismicEvent>,
    /// The weather reading behind a fire prediction.
    pub weather: Option<WeatherSnapshot>,
    /// The event-feed window. `None` for fire runs, which read a single
    /// snapshot at `assessed_at`.
    pub window: Option<LookbackWindow>,
    /// When the external data was read.
    pub assessed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn event_at(secs: i64) -> SeismicEvent {
        SeismicEvent {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            magnitude: 3.2,
            depth_km: Some(10.0),
            latitude: 35.0,
            longitude: 139.0,
            place_label: UNKNOWN_PLACE.to_string(),
            nst: None,
            gap: None,
            rms: None,
        }
    }

    #[test]
    fn sorts_events_newest_first() {
        let mut events = vec![event_at(100), event_at(300), event_at(200)];
        sort_newest_first(&mut events);
        let secs: Vec<i64> = events.iter().map(|e| e.timestamp.timestamp()).collect();
        assert_eq!(secs, vec![300, 200, 100]);
    }

    #[test]
    fn lookback_window_spans_days() {
        let end = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
        let window = LookbackWindow::ending_at(end, 90);
        assert_eq!(window.start.to_string(), "2024-01-02 12:00:00 UTC");
        assert!(window.contains(end));
        assert!(window.contains(window.start));
        assert!(!window.contains(window.start - TimeDelta::seconds(1)));
    }

    #[test]
    fn location_label_prefers_city_and_country() {
        let location = Location {
            country: "Japan".to_string(),
            city: "Tokyo".to_string(),
            latitude: 35.6897,
            longitude: 139.6922,
            timezone: "Asia/Tokyo".to_string(),
        };
        assert_eq!(location.label(), "Tokyo, Japan");

        let raw = Location {
            country: String::new(),
            city: String::new(),
            ..location
        };
        assert_eq!(raw.label(), "35.6897, 139.6922");
    }

    fn located_in(timezone: &str) -> Location {
        Location {
            country: "Japan".to_string(),
            city: "Tokyo".to_string(),
            latitude: 35.6897,
            longitude: 139.6922,
            timezone: timezone.to_string(),
        }
    }

    #[test]
    fn converts_instants_to_local_time() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let tokyo = located_in("Asia/Tokyo").local_time(instant);
        assert_eq!(tokyo.to_rfc3339(), "2024-01-01T09:00:00+09:00");
        assert_eq!(tokyo.with_timezone(&Utc), instant);

        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let new_york = located_in("America/New_York").local_time(summer);
        assert_eq!(new_york.format("%H:%M %Z").to_string(), "08:00 EDT");
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(located_in("Mars/Olympus").tz(), Tz::UTC);
        assert_eq!(located_in(UTC_ZONE).tz(), Tz::UTC);
        assert_eq!(
            located_in("").local_time(instant).to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn tiers_round_trip_through_strings() {
        assert_eq!(RiskTier::Moderate.to_string(), "MODERATE");
        assert_eq!("HIGH".parse::<RiskTier>().unwrap(), RiskTier::High);
        assert_eq!("earthquake".parse::<Hazard>().unwrap(), Hazard::Earthquake);
    }
}
