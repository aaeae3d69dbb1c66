//! Rows of the supporting-event table.

use std::io::Write;

use chrono::{DateTime, FixedOffset, Utc};
use geo::{Distance, Haversine, Point};
use hazard_risk_models::{Location, RiskTier, SeismicEvent};
use hazard_risk_predict::classify::{earthquake_label, earthquake_tier};
use serde::Serialize;

/// One event as shown next to an assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    /// Origin time.
    pub timestamp: DateTime<Utc>,
    /// Origin time in the assessed location's zone.
    pub local_time: DateTime<FixedOffset>,
    /// Reported magnitude.
    pub magnitude: f64,
    /// Depth in km, if reported.
    pub depth_km: Option<f64>,
    /// Feed place description.
    pub place_label: String,
    /// Great-circle distance from the assessed location.
    pub distance_km: f64,
    /// Tier of the reported magnitude.
    pub tier: RiskTier,
    /// Display label of `tier`.
    pub status: &'static str,
}

/// Great-circle distance in km.
#[must_use]
pub fn distance_km(location: &Location, event: &SeismicEvent) -> f64 {
    let origin = Point::new(location.longitude, location.latitude);
    let epicenter = Point::new(event.longitude, event.latitude);
    Haversine.distance(origin, epicenter) / 1_000.0
}

/// Table rows for `events`, in the order given.
#[must_use]
pub fn event_table(location: &Location, events: &[SeismicEvent]) -> Vec<EventRow> {
    events
        .iter()
        .map(|event| {
            let tier = earthquake_tier(event.magnitude);
            EventRow {
                timestamp: event.timestamp,
                local_time: location.local_time(event.timestamp).fixed_offset(),
                magnitude: event.magnitude,
                depth_km: event.depth_km,
                place_label: event.place_label.clone(),
                distance_km: distance_km(location, event),
                tier,
                status: earthquake_label(tier),
            }
        })
        .collect()
}

/// Writes `rows` as CSV with a header line.
///
/// # Errors
///
/// Returns an error if a row cannot be serialized or the writer fails.
pub fn write_csv<W: Write>(rows: &[EventRow], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn location(latitude: f64, longitude: f64) -> Location {
        Location {
            country: "Japan".to_string(),
            city: "Tokyo".to_string(),
            latitude,
            longitude,
            timezone: "Asia/Tokyo".to_string(),
        }
    }

    fn event(latitude: f64, longitude: f64, magnitude: f64) -> SeismicEvent {
        SeismicEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            magnitude,
            depth_km: None,
            latitude,
            longitude,
            place_label: "somewhere".to_string(),
            nst: None,
            gap: None,
            rms: None,
        }
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_km(&location(35.0, 139.0), &event(36.0, 139.0, 3.0));
        assert!((d - 111.2).abs() < 0.5, "{d}");
    }

    #[test]
    fn same_point_is_zero() {
        let d = distance_km(&location(35.0, 139.0), &event(35.0, 139.0, 3.0));
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn rows_carry_per_event_status() {
        let rows = event_table(
            &location(0.0, 0.0),
            &[event(0.0, 1.0, 4.4), event(0.0, 2.0, 4.5), event(0.0, 3.0, 6.0)],
        );
        let statuses: Vec<&str> = rows.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec!["Safe", "Moderate Risk", "High Risk"]);
        assert!(rows[0].distance_km < rows[1].distance_km);
    }

    #[test]
    fn exports_rows_as_csv() {
        let mut deep = event(0.0, 1.0, 4.5);
        deep.depth_km = Some(12.5);
        let rows = event_table(&location(0.0, 0.0), &[deep, event(0.0, 2.0, 3.0)]);

        let mut out = Vec::new();
        write_csv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,localTime,magnitude,depthKm,placeLabel"));
        assert!(lines[1].contains(",4.5,12.5,somewhere,"));
        assert!(lines[1].ends_with(",Moderate Risk"));
        assert!(lines[2].contains(",3.0,,somewhere,"));
    }

    #[test]
    fn empty_table_exports_nothing() {
        let mut out = Vec::new();
        write_csv(&[], &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn rows_carry_local_origin_time() {
        let rows = event_table(&location(35.0, 139.0), &[event(35.5, 139.5, 3.0)]);
        assert_eq!(rows[0].local_time.to_rfc3339(), "2024-01-01T09:00:00+09:00");
        assert_eq!(rows[0].local_time, rows[0].timestamp);

        let utc = Location {
            timezone: "UTC".to_string(),
            ..location(35.0, 139.0)
        };
        let rows = event_table(&utc, &[event(35.5, 139.5, 3.0)]);
        assert_eq!(rows[0].local_time.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
