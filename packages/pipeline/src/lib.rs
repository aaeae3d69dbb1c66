#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location-to-risk pipeline.
//!
//! One user-triggered run walks
//! `Idle -> Resolving -> Fetching -> Aggregating -> Classifying` and ends
//! in `Done` with a [`RiskAssessment`] or `Failed` with a [`RunFailure`].
//! Runs share only the read-only reference data and predictors loaded at
//! start; every run fetches and aggregates its own data.

pub mod event_table;
pub mod profile;
pub mod run;
pub mod session;

use hazard_risk_feeds::FeedError;
use hazard_risk_gazetteer::GazetteerError;
use hazard_risk_models::{Hazard, RiskAssessment};
use hazard_risk_predict::{FeatureError, ModelError};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use run::{CombinedReport, LocationRequest, Pipeline};

/// A stage of one pipeline run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum RunStage {
    /// Not started.
    Idle,
    /// Resolving the requested place to a location.
    Resolving,
    /// Reading external data.
    Fetching,
    /// Reducing fetched data to predictor inputs.
    Aggregating,
    /// Running the predictor and mapping its output to a tier.
    Classifying,
    /// Finished with an assessment.
    Done,
    /// Finished with a failure.
    Failed,
}

impl RunStage {
    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Why a run failed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum FailureReason {
    /// The place is unknown or the current location is unavailable.
    ResolutionFailed,
    /// An external feed timed out, returned non-2xx or an unusable body.
    FetchFailed,
    /// Inputs could not be built for the predictor's schema.
    AggregationFailed,
    /// The predictor is missing or failed.
    ModelFailed,
}

/// A failed run: a reason tag and a short message for display.
///
/// The underlying error is logged where it occurs and never carried here.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason}: {message}")]
pub struct RunFailure {
    /// Reason tag.
    pub reason: FailureReason,
    /// User-facing message.
    pub message: String,
}

impl RunFailure {
    /// Creates a failure.
    #[must_use]
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    /// A place resolution failure.
    #[must_use]
    pub fn resolution(error: &GazetteerError) -> Self {
        log::warn!("Resolution failed: {error}");

        let message = match error {
            GazetteerError::UnknownPlace { country, city } => {
                format!("{city}, {country} was not found")
            }
            GazetteerError::InvalidCoordinates {
                latitude,
                longitude,
            } => format!("({latitude}, {longitude}) is not a valid location"),
            _ => "Place lookup is unavailable".to_string(),
        };

        Self::new(FailureReason::ResolutionFailed, message)
    }

    /// A current-location lookup failure.
    #[must_use]
    pub fn geolocation(error: &FeedError) -> Self {
        log::warn!("Geolocation failed: {error}");
        Self::new(
            FailureReason::ResolutionFailed,
            "Current location could not be determined",
        )
    }

    /// A feed failure. `feed` names the source in the message.
    #[must_use]
    pub fn fetch(feed: &str, error: &FeedError) -> Self {
        log::warn!("{feed} fetch failed: {error}");

        let message = match error {
            FeedError::Status { status, .. } => format!("{feed} returned HTTP {status}"),
            FeedError::Malformed { .. } => format!("{feed} returned an unusable response"),
            e if e.is_timeout() => format!("{feed} timed out"),
            FeedError::Http(_) => format!("{feed} is unreachable"),
        };

        Self::new(FailureReason::FetchFailed, message)
    }

    /// A feature projection failure.
    #[must_use]
    pub fn aggregation(hazard: Hazard, error: &FeatureError) -> Self {
        log::warn!("{hazard} aggregation failed: {error}");
        Self::new(
            FailureReason::AggregationFailed,
            format!("Inputs do not match the {hazard} model"),
        )
    }

    /// A predictor failure.
    #[must_use]
    pub fn model(hazard: Hazard, error: &ModelError) -> Self {
        log::warn!("{hazard} model failed: {error}");
        Self::new(
            FailureReason::ModelFailed,
            format!("The {hazard} model could not produce a prediction"),
        )
    }

    /// No predictor is loaded for the hazard.
    #[must_use]
    pub fn no_model(hazard: Hazard) -> Self {
        Self::new(
            FailureReason::ModelFailed,
            format!("No {hazard} model is loaded"),
        )
    }
}

/// The record of one run: the stages it passed through and how it ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The assessed hazard.
    pub hazard: Hazard,
    /// Stages in the order entered, starting at `Idle` and ending at
    /// `Done` or `Failed`.
    pub trace: Vec<RunStage>,
    /// The terminal result.
    pub outcome: Result<RiskAssessment, RunFailure>,
}

impl RunReport {
    /// The terminal stage.
    #[must_use]
    pub fn state(&self) -> RunStage {
        self.trace.last().copied().unwrap_or(RunStage::Idle)
    }

    /// The assessment, if the run succeeded.
    #[must_use]
    pub fn assessment(&self) -> Option<&RiskAssessment> {
        self.outcome.as_ref().ok()
    }

    /// The failure, if the run failed.
    #[must_use]
    pub fn failure(&self) -> Option<&RunFailure> {
        self.outcome.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages_are_short_and_tagged() {
        let failure = RunFailure::fetch(
            "Seismic feed",
            &FeedError::Status {
                status: 503,
                url: "https://example.test/query?key=secret".to_string(),
            },
        );
        assert_eq!(failure.reason, FailureReason::FetchFailed);
        assert_eq!(failure.message, "Seismic feed returned HTTP 503");
        assert_eq!(failure.to_string(), "FetchFailed: Seismic feed returned HTTP 503");
    }

    #[test]
    fn malformed_body_is_a_fetch_failure() {
        let failure = RunFailure::fetch(
            "Weather service",
            &FeedError::Malformed {
                message: "expected value at line 1 column 1".to_string(),
            },
        );
        assert_eq!(failure.reason, FailureReason::FetchFailed);
        assert!(!failure.message.contains("line 1"));
    }

    #[tokio::test]
    async fn feed_timeout_is_a_fetch_failure() {
        use std::time::Duration;

        use chrono::Utc;
        use hazard_risk_feeds::feed_registry::FeedService;
        use hazard_risk_feeds::usgs::UsgsFeed;
        use hazard_risk_feeds::{EventSource, SeismicQuery};
        use hazard_risk_models::LookbackWindow;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let feed = UsgsFeed::new(&FeedService {
            id: "usgs".to_string(),
            name: "USGS".to_string(),
            base_url: format!("{}/fdsnws/event/1/query", server.uri()),
            timeout_ms: 100,
            max_retries: 0,
            backoff_ms: 0,
        })
        .unwrap();

        let error = feed
            .fetch_events(&SeismicQuery {
                latitude: 35.0,
                longitude: 139.0,
                radius_km: 300.0,
                window: LookbackWindow::ending_at(Utc::now(), 30),
                min_magnitude: None,
            })
            .await
            .unwrap_err();
        assert!(error.is_timeout());

        let failure = RunFailure::fetch("Seismic feed", &error);
        assert_eq!(failure.reason, FailureReason::FetchFailed);
        assert_eq!(failure.message, "Seismic feed timed out");
    }

    #[test]
    fn unknown_place_is_a_resolution_failure() {
        let failure = RunFailure::resolution(&GazetteerError::UnknownPlace {
            country: "Atlantis".to_string(),
            city: "Poseidonia".to_string(),
        });
        assert_eq!(failure.reason, FailureReason::ResolutionFailed);
        assert_eq!(failure.message, "Poseidonia, Atlantis was not found");
    }

    #[test]
    fn model_failures_name_the_hazard() {
        let failure = RunFailure::no_model(Hazard::Fire);
        assert_eq!(failure.reason, FailureReason::ModelFailed);
        assert_eq!(failure.message, "No fire model is loaded");

        let failure = RunFailure::aggregation(
            Hazard::Earthquake,
            &FeatureError::MissingFeature {
                name: "nst".to_string(),
            },
        );
        assert_eq!(failure.reason, FailureReason::AggregationFailed);
    }

    #[test]
    fn terminal_stages() {
        assert!(RunStage::Done.is_terminal());
        assert!(RunStage::Failed.is_terminal());
        assert!(!RunStage::Fetching.is_terminal());
        assert_eq!(FailureReason::ModelFailed.as_ref(), "ModelFailed");
    }
}
