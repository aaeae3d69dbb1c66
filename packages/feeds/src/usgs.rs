//! USGS FDSN event service client.
//!
//! Issues one `format=geojson` query bounded by a UTC time window and a
//! radius around a point, and normalizes the returned `FeatureCollection`
//! into [`SeismicEvent`]s. Entries missing a time, magnitude or epicenter
//! are skipped and counted; the rest of the batch is kept.
//!
//! See <https://earthquake.usgs.gov/fdsnws/event/1/>

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hazard_risk_models::{SeismicEvent, UNKNOWN_PLACE};

use crate::feed_registry::FeedService;
use crate::retry::{self, RetryPolicy};
use crate::{EventBatch, EventSource, FeedError, SeismicQuery};

/// Timestamp format accepted by the FDSN `starttime`/`endtime` params.
const FDSN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Client for the USGS seismic event feed.
pub struct UsgsFeed {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl UsgsFeed {
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

    fn query_params(query: &SeismicQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("format", "geojson".to_string()),
            (
                "starttime",
                query.window.start.format(FDSN_TIME_FORMAT).to_string(),
            ),
            (
                "endtime",
                query.window.end.format(FDSN_TIME_FORMAT).to_string(),
            ),
            ("latitude", query.latitude.to_string()),
            ("longitude", query.longitude.to_string()),
            ("maxradiuskm", query.radius_km.to_string()),
        ];
        if let Some(min) = query.min_magnitude {
            params.push(("minmagnitude", min.to_string()));
        }
        params
    }
}

#[async_trait]
impl EventSource for UsgsFeed {
    async fn fetch_events(&self, query: &SeismicQuery) -> Result<EventBatch, FeedError> {
        let params = Self::query_params(query);

        log::debug!(
            "USGS query around ({}, {}) r={}km from {} to {}",
            query.latitude,
            query.longitude,
            query.radius_km,
            query.window.start,
            query.window.end,
        );

        let body = retry::send_json(&self.policy, || {
            self.client.get(&self.base_url).query(&params)
        })
        .await?;

        let batch = parse_feature_collection(&body)?;
        if batch.skipped > 0 {
            log::warn!(
                "USGS: skipped {} malformed events ({} kept)",
                batch.skipped,
                batch.events.len()
            );
        }
        Ok(batch)
    }
}

/// Parses a `GeoJSON` `FeatureCollection` body.
///
/// # Errors
///
/// Returns [`FeedError::Malformed`] if the body has no `features` array.
pub fn parse_feature_collection(body: &serde_json::Value) -> Result<EventBatch, FeedError> {
    let features = body["features"]
        .as_array()
        .ok_or_else(|| FeedError::Malformed {
            message: "No features array in seismic feed response".to_string(),
        })?;

    let mut events = Vec::with_capacity(features.len());
    let mut skipped = 0;

    for feature in features {
        match parse_event(feature) {
            Ok(event) => events.push(event),
            Err(reason) => {
                log::trace!("  skipping malformed event: {reason}");
                skipped += 1;
            }
        }
    }

    Ok(EventBatch { events, skipped })
}

/// Parses one feature, returning the reason it is unusable on failure.
#[allow(clippy::cast_possible_truncation)]
fn parse_event(feature: &serde_json::Value) -> Result<SeismicEvent, String> {
    let props = &feature["properties"];
    let coords = feature["geometry"]["coordinates"]
        .as_array()
        .ok_or("missing geometry.coordinates")?;

    let timestamp = props["time"]
        .as_i64()
        .or_else(|| props["time"].as_f64().map(|ms| ms as i64))
        .and_then(millis_to_utc)
        .ok_or("missing or invalid properties.time")?;

    let magnitude = props["mag"]
        .as_f64()
        .ok_or("missing properties.mag")?;

    let longitude = coords
        .first()
        .and_then(serde_json::Value::as_f64)
        .filter(|lon| (-180.0..=180.0).contains(lon))
        .ok_or("missing or invalid longitude")?;

    let latitude = coords
        .get(1)
        .and_then(serde_json::Value::as_f64)
        .filter(|lat| (-90.0..=90.0).contains(lat))
        .ok_or("missing or invalid latitude")?;

    // Events above the reference surface report small negative depths.
    let depth_km = coords
        .get(2)
        .and_then(serde_json::Value::as_f64)
        .map(|d| d.max(0.0));

    let place_label = props["place"]
        .as_str()
        .map_or_else(|| UNKNOWN_PLACE.to_string(), String::from);

    Ok(SeismicEvent {
        timestamp,
        magnitude,
        depth_km,
        latitude,
        longitude,
        place_label,
        nst: props["nst"].as_u64().and_then(|n| u32::try_from(n).ok()),
        gap: props["gap"].as_f64(),
        rms: props["rms"].as_f64(),
    })
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hazard_risk_models::LookbackWindow;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn feature(time: i64, mag: f64, depth: serde_json::Value, place: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "properties": { "time": time, "mag": mag, "place": place, "nst": 42, "gap": 71.0, "rms": 0.8 },
            "geometry": { "type": "Point", "coordinates": [139.1, 35.2, depth] }
        })
    }

    fn query() -> SeismicQuery {
        let end = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        SeismicQuery {
            latitude: 35.0,
            longitude: 139.0,
            radius_km: 300.0,
            window: LookbackWindow::ending_at(end, 90),
            min_magnitude: Some(3.0),
        }
    }

    fn service(server: &MockServer) -> FeedService {
        FeedService {
            id: "usgs".to_string(),
            name: "USGS".to_string(),
            base_url: format!("{}/fdsnws/event/1/query", server.uri()),
            timeout_ms: 200,
            max_retries: 1,
            backoff_ms: 10,
        }
    }

    #[test]
    fn parses_well_formed_events() {
        let body = serde_json::json!({
            "type": "FeatureCollection",
            "features": [feature(1_700_000_000_000, 4.6, serde_json::json!(10.0), "10 km SSW of Tokyo, Japan")]
        });
        let batch = parse_feature_collection(&body).unwrap();
        assert_eq!(batch.skipped, 0);
        let event = &batch.events[0];
        assert_eq!(event.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert!((event.magnitude - 4.6).abs() < f64::EPSILON);
        assert_eq!(event.depth_km, Some(10.0));
        assert!((event.longitude - 139.1).abs() < f64::EPSILON);
        assert!((event.latitude - 35.2).abs() < f64::EPSILON);
        assert_eq!(event.place_label, "10 km SSW of Tokyo, Japan");
        assert_eq!(event.nst, Some(42));
    }

    #[test]
    fn null_depth_and_place_are_kept() {
        let body = serde_json::json!({
            "features": [{
                "properties": { "time": 1_700_000_000_000_i64, "mag": 3.1, "place": null },
                "geometry": { "coordinates": [139.0, 35.0, null] }
            }]
        });
        let batch = parse_feature_collection(&body).unwrap();
        assert_eq!(batch.events[0].depth_km, None);
        assert_eq!(batch.events[0].place_label, UNKNOWN_PLACE);
        assert_eq!(batch.events[0].nst, None);
    }

    #[test]
    fn skips_malformed_entries_without_aborting() {
        let body = serde_json::json!({
            "features": [
                feature(1_700_000_000_000, 3.5, serde_json::json!(12.0), "A"),
                { "properties": { "time": 1_700_000_000_000_i64, "mag": null }, "geometry": { "coordinates": [139.0, 35.0, 5.0] } },
                { "properties": { "time": 1_700_000_000_000_i64, "mag": 3.3 }, "geometry": null },
                { "properties": { "mag": 3.3 }, "geometry": { "coordinates": [139.0, 35.0, 5.0] } },
                { "properties": { "time": 1_700_000_000_000_i64, "mag": 3.3 }, "geometry": { "coordinates": [139.0] } },
            ]
        });
        let batch = parse_feature_collection(&body).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.skipped, 4);
    }

    #[test]
    fn negative_depth_clamps_to_surface() {
        let body = serde_json::json!({
            "features": [feature(1_700_000_000_000, 3.0, serde_json::json!(-1.2), "A")]
        });
        let batch = parse_feature_collection(&body).unwrap();
        assert_eq!(batch.events[0].depth_km, Some(0.0));
    }

    #[test]
    fn missing_feature_list_is_malformed() {
        let err = parse_feature_collection(&serde_json::json!({"error": "bad"})).unwrap_err();
        assert!(matches!(err, FeedError::Malformed { .. }));
    }

    #[tokio::test]
    async fn sends_bounded_window_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fdsnws/event/1/query"))
            .and(query_param("format", "geojson"))
            .and(query_param("starttime", "2024-01-02T00:00:00"))
            .and(query_param("endtime", "2024-04-01T00:00:00"))
            .and(query_param("minmagnitude", "3"))
            .and(query_param("maxradiuskm", "300"))
            .and(query_param("latitude", "35"))
            .and(query_param("longitude", "139"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": [
                    feature(1_700_000_000_000, 3.4, serde_json::json!(10.0), "A"),
                    feature(1_700_000_100_000, 3.9, serde_json::json!(20.0), "B"),
                    feature(1_700_000_200_000, 4.1, serde_json::Value::Null, "C"),
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let feed = UsgsFeed::new(&service(&server)).unwrap();
        let batch = feed.fetch_events(&query()).await.unwrap();
        assert_eq!(batch.events.len(), 3);
        assert_eq!(batch.skipped, 0);
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": []
            })))
            .mount(&server)
            .await;

        let feed = UsgsFeed::new(&service(&server)).unwrap();
        let batch = feed.fetch_events(&query()).await.unwrap();
        assert!(batch.events.is_empty());
    }

    #[tokio::test]
    async fn omits_magnitude_floor_when_unset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"features": []})))
            .mount(&server)
            .await;

        let feed = UsgsFeed::new(&service(&server)).unwrap();
        let mut q = query();
        q.min_magnitude = None;
        feed.fetch_events(&q).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(
            !requests[0]
                .url
                .query_pairs()
                .any(|(k, _)| k == "minmagnitude")
        );
    }

    #[tokio::test]
    async fn non_success_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let feed = UsgsFeed::new(&service(&server)).unwrap();
        let err = feed.fetch_events(&query()).await.unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn timeout_fails_after_one_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"features": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let feed = UsgsFeed::new(&service(&server)).unwrap();
        let err = feed.fetch_events(&query()).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
