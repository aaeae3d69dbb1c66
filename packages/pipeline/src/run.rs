//! The pipeline orchestrator.
//!
//! [`Pipeline`] holds the collaborators loaded at process start and runs
//! one hazard (or both) per call. Each stage failure ends the run with a
//! tagged [`RunFailure`]; nothing is retried here beyond what the feeds
//! do themselves.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hazard_risk_feeds::weather::estimate_oxygen_pct;
use hazard_risk_feeds::{
    EventBatch, EventSource, FeedError, GeolocationSource, SeismicQuery, WeatherSource,
};
use hazard_risk_gazetteer::PlaceResolver;
use hazard_risk_models::{
    Hazard, Location, LookbackWindow, RiskAssessment, WeatherSnapshot, sort_newest_first,
};
use hazard_risk_predict::classify::{classify_earthquake, classify_fire};
use hazard_risk_predict::features::{
    EarthquakeFeatureSet, LegacyObservation, depth_location_frame, fire_frame,
};
use hazard_risk_predict::model::{ProbabilityModel, RegressionModel};

use crate::profile::PipelineProfile;
use crate::{FailureReason, RunFailure, RunReport, RunStage};

const SEISMIC_FEED: &str = "Seismic feed";
const WEATHER_SERVICE: &str = "Weather service";

/// What the user picked as the place to assess.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationRequest {
    /// A gazetteer `(country, city)` selection.
    Place {
        /// Country as listed in the gazetteer.
        country: String,
        /// City as listed in the gazetteer.
        city: String,
    },
    /// A raw coordinate pair.
    Coordinates {
        /// Latitude (WGS84).
        latitude: f64,
        /// Longitude (WGS84).
        longitude: f64,
    },
    /// The caller's position from IP geolocation.
    CurrentLocation,
}

/// Reports of a run that assessed both hazards for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedReport {
    /// The fire run.
    pub fire: RunReport,
    /// The earthquake run.
    pub earthquake: RunReport,
}

/// Stage bookkeeping for one run.
struct Tracker {
    hazard: Hazard,
    trace: Vec<RunStage>,
}

impl Tracker {
    fn new(hazard: Hazard) -> Self {
        Self {
            hazard,
            trace: vec![RunStage::Idle],
        }
    }

    fn enter(&mut self, stage: RunStage) {
        let from = self.trace.last().copied().unwrap_or(RunStage::Idle);
        log::debug!("{} run: {from} -> {stage}", self.hazard);
        self.trace.push(stage);
    }

    fn finish(mut self, outcome: Result<RiskAssessment, RunFailure>) -> RunReport {
        match &outcome {
            Ok(assessment) => {
                self.enter(RunStage::Done);
                log::info!(
                    "{} risk at {}: {} ({:.1})",
                    self.hazard,
                    assessment.location.label(),
                    assessment.tier_label,
                    assessment.score
                );
            }
            Err(failure) => {
                self.enter(RunStage::Failed);
                log::warn!("{} run failed: {failure}", self.hazard);
            }
        }

        RunReport {
            hazard: self.hazard,
            trace: self.trace,
            outcome,
        }
    }
}

/// The location-to-risk pipeline.
///
/// Reference data, sources and predictors are shared read-only across
/// runs; each run owns the data it fetches.
#[derive(Clone)]
pub struct Pipeline {
    resolver: PlaceResolver,
    profile: PipelineProfile,
    events: Arc<dyn EventSource>,
    weather: Arc<dyn WeatherSource>,
    geolocation: Option<Arc<dyn GeolocationSource>>,
    fire_model: Option<Arc<dyn ProbabilityModel>>,
    earthquake_model: Option<Arc<dyn RegressionModel>>,
}

impl Pipeline {
    /// Creates a pipeline with no predictors and no geolocation.
    #[must_use]
    pub fn new(
        resolver: PlaceResolver,
        profile: PipelineProfile,
        events: Arc<dyn EventSource>,
        weather: Arc<dyn WeatherSource>,
    ) -> Self {
        Self {
            resolver,
            profile,
            events,
            weather,
            geolocation: None,
            fire_model: None,
            earthquake_model: None,
        }
    }

    /// Enables [`LocationRequest::CurrentLocation`].
    #[must_use]
    pub fn with_geolocation(mut self, source: Arc<dyn GeolocationSource>) -> Self {
        self.geolocation = Some(source);
        self
    }

    /// Sets the fire probability predictor.
    #[must_use]
    pub fn with_fire_model(mut self, model: Arc<dyn ProbabilityModel>) -> Self {
        self.fire_model = Some(model);
        self
    }

    /// Sets the magnitude predictor. Its schema must match the profile's
    /// [`EarthquakeFeatureSet`].
    #[must_use]
    pub fn with_earthquake_model(mut self, model: Arc<dyn RegressionModel>) -> Self {
        self.earthquake_model = Some(model);
        self
    }

    /// The active profile.
    #[must_use]
    pub const fn profile(&self) -> &PipelineProfile {
        &self.profile
    }

    /// The place resolver.
    #[must_use]
    pub const fn resolver(&self) -> &PlaceResolver {
        &self.resolver
    }

    /// Runs one hazard now.
    pub async fn run(&self, hazard: Hazard, request: &LocationRequest) -> RunReport {
        self.run_at(hazard, request, Utc::now()).await
    }

    /// Runs one hazard with the lookback window ending at `now`.
    pub async fn run_at(
        &self,
        hazard: Hazard,
        request: &LocationRequest,
        now: DateTime<Utc>,
    ) -> RunReport {
        let mut tracker = Tracker::new(hazard);
        let outcome = self.execute(&mut tracker, request, now).await;
        tracker.finish(outcome)
    }

    /// Runs both hazards now.
    pub async fn run_combined(&self, request: &LocationRequest) -> CombinedReport {
        self.run_combined_at(request, Utc::now()).await
    }

    /// Runs both hazards for one resolved location. The weather and
    /// seismic fetches run concurrently; each hazard ends in its own
    /// terminal state.
    pub async fn run_combined_at(
        &self,
        request: &LocationRequest,
        now: DateTime<Utc>,
    ) -> CombinedReport {
        let mut fire = Tracker::new(Hazard::Fire);
        let mut earthquake = Tracker::new(Hazard::Earthquake);

        fire.enter(RunStage::Resolving);
        earthquake.enter(RunStage::Resolving);

        let location = match self.resolve(request).await {
            Ok(location) => location,
            Err(failure) => {
                return CombinedReport {
                    fire: fire.finish(Err(failure.clone())),
                    earthquake: earthquake.finish(Err(failure)),
                };
            }
        };

        fire.enter(RunStage::Fetching);
        earthquake.enter(RunStage::Fetching);

        let window = self.window(now);
        let location_query = weather_query(&location);
        let seismic_query = self.seismic_query(&location, window);

        let (weather, events) = tokio::join!(
            self.weather.current(&location_query),
            self.events.fetch_events(&seismic_query),
        );

        let fire_outcome = self.assess_fire(&mut fire, location.clone(), weather, now);
        let earthquake_outcome =
            self.assess_earthquake(&mut earthquake, location, window, events, now);

        CombinedReport {
            fire: fire.finish(fire_outcome),
            earthquake: earthquake.finish(earthquake_outcome),
        }
    }

    async fn execute(
        &self,
        tracker: &mut Tracker,
        request: &LocationRequest,
        now: DateTime<Utc>,
    ) -> Result<RiskAssessment, RunFailure> {
        tracker.enter(RunStage::Resolving);
        let location = self.resolve(request).await?;

        tracker.enter(RunStage::Fetching);
        match tracker.hazard {
            Hazard::Fire => {
                let weather = self.weather.current(&weather_query(&location)).await;
                self.assess_fire(tracker, location, weather, now)
            }
            Hazard::Earthquake => {
                let window = self.window(now);
                let events = self
                    .events
                    .fetch_events(&self.seismic_query(&location, window))
                    .await;
                self.assess_earthquake(tracker, location, window, events, now)
            }
        }
    }

    async fn resolve(&self, request: &LocationRequest) -> Result<Location, RunFailure> {
        match request {
            LocationRequest::Place { country, city } => self
                .resolver
                .resolve_place(country, city)
                .map_err(|e| RunFailure::resolution(&e)),
            LocationRequest::Coordinates {
                latitude,
                longitude,
            } => self
                .resolver
                .resolve_coordinates(*latitude, *longitude, "", "")
                .map_err(|e| RunFailure::resolution(&e)),
            LocationRequest::CurrentLocation => {
                let source = self.geolocation.as_ref().ok_or_else(|| {
                    RunFailure::new(
                        FailureReason::ResolutionFailed,
                        "Current location is not available",
                    )
                })?;
                let fix = source
                    .locate()
                    .await
                    .map_err(|e| RunFailure::geolocation(&e))?;
                self.resolver
                    .resolve_coordinates(fix.latitude, fix.longitude, &fix.city, &fix.country)
                    .map_err(|e| RunFailure::resolution(&e))
            }
        }
    }

    fn window(&self, now: DateTime<Utc>) -> LookbackWindow {
        LookbackWindow::ending_at(now, self.profile.lookback_days)
    }

    fn seismic_query(&self, location: &Location, window: LookbackWindow) -> SeismicQuery {
        SeismicQuery {
            latitude: location.latitude,
            longitude: location.longitude,
            radius_km: self.profile.radius_km,
            window,
            min_magnitude: self.profile.min_magnitude,
        }
    }

    fn assess_fire(
        &self,
        tracker: &mut Tracker,
        location: Location,
        weather: Result<WeatherSnapshot, FeedError>,
        now: DateTime<Utc>,
    ) -> Result<RiskAssessment, RunFailure> {
        let weather = weather.map_err(|e| RunFailure::fetch(WEATHER_SERVICE, &e))?;

        tracker.enter(RunStage::Aggregating);
        let model = self
            .fire_model
            .as_ref()
            .ok_or_else(|| RunFailure::no_model(Hazard::Fire))?;
        let oxygen_pct = estimate_oxygen_pct(&mut rand::rng());
        let input = fire_frame(oxygen_pct, &weather)
            .project(model.schema())
            .map_err(|e| RunFailure::aggregation(Hazard::Fire, &e))?;

        tracker.enter(RunStage::Classifying);
        let classification = classify_fire(&**model, &input, self.profile.fire_scheme)
            .map_err(|e| RunFailure::model(Hazard::Fire, &e))?;

        Ok(RiskAssessment {
            hazard: Hazard::Fire,
            location,
            tier: classification.tier,
            tier_label: classification.label.to_string(),
            score: classification.score,
            raw_prediction: classification.raw_prediction,
            supporting_events: Vec::new(),
            weather: Some(weather),
            window: None,
            assessed_at: now,
        })
    }

    fn assess_earthquake(
        &self,
        tracker: &mut Tracker,
        location: Location,
        window: LookbackWindow,
        batch: Result<EventBatch, FeedError>,
        now: DateTime<Utc>,
    ) -> Result<RiskAssessment, RunFailure> {
        let EventBatch {
            mut events,
            skipped,
        } = batch.map_err(|e| RunFailure::fetch(SEISMIC_FEED, &e))?;
        sort_newest_first(&mut events);

        log::debug!(
            "{} event(s) near {} ({skipped} skipped)",
            events.len(),
            location.label()
        );

        tracker.enter(RunStage::Aggregating);
        let model = self
            .earthquake_model
            .as_ref()
            .ok_or_else(|| RunFailure::no_model(Hazard::Earthquake))?;
        let frame = match self.profile.earthquake_features {
            EarthquakeFeatureSet::DepthLocation => {
                depth_location_frame(
                    &events,
                    location.latitude,
                    location.longitude,
                    self.profile.depth_sample_limit,
                )
                .0
            }
            EarthquakeFeatureSet::PlaceCategorical => LegacyObservation::newest(&events).frame(),
        };
        let input = frame
            .project(model.schema())
            .map_err(|e| RunFailure::aggregation(Hazard::Earthquake, &e))?;

        tracker.enter(RunStage::Classifying);
        let classification = classify_earthquake(&**model, &input)
            .map_err(|e| RunFailure::model(Hazard::Earthquake, &e))?;

        if let Some(limit) = self.profile.supporting_event_limit {
            events.truncate(limit);
        }

        Ok(RiskAssessment {
            hazard: Hazard::Earthquake,
            location,
            tier: classification.tier,
            tier_label: classification.label.to_string(),
            score: classification.score,
            raw_prediction: classification.raw_prediction,
            supporting_events: events,
            weather: None,
            window: Some(window),
            assessed_at: now,
        })
    }
}

/// The weather provider query for a location: its city name, or
/// `"lat,lon"` when it has none.
fn weather_query(location: &Location) -> String {
    if location.city.is_empty() {
        format!("{},{}", location.latitude, location.longitude)
    } else {
        location.city.clone()
    }
}
