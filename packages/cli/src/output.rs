//! Terminal, JSON and CSV rendering of run reports.

use std::fs::File;
use std::path::Path;

use chrono::Utc;
use hazard_risk_pipeline::RunReport;
use hazard_risk_pipeline::event_table::{EventRow, event_table, write_csv};

/// Prints a human-readable report.
pub fn print_report(report: &RunReport) {
    println!();
    println!("== {} ==", report.hazard);

    let assessment = match &report.outcome {
        Ok(assessment) => assessment,
        Err(failure) => {
            println!("Failed ({}): {}", failure.reason, failure.message);
            return;
        }
    };

    let location = &assessment.location;
    println!(
        "Location:   {} ({:.4}, {:.4})",
        location.label(),
        location.latitude,
        location.longitude
    );
    println!(
        "Local time: {} ({})",
        location.local_time(Utc::now()).format("%Y-%m-%d %H:%M:%S"),
        location.tz()
    );
    println!("Risk:       {} [{}]", assessment.tier_label, assessment.tier);
    println!("Score:      {:.1} / 100", assessment.score);
    println!("Prediction: {:.3}", assessment.raw_prediction);

    if let Some(weather) = &assessment.weather {
        println!(
            "Weather:    {:.1} C, {:.0}% humidity, {:.1} mm precipitation",
            weather.temperature_c, weather.humidity_pct, weather.precipitation_mm
        );
    }

    if let Some(window) = &assessment.window {
        println!(
            "Window:     {} to {}",
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        );
        println!("Events:     {}", assessment.supporting_events.len());
    }

    let rows = event_table(location, &assessment.supporting_events);
    if rows.is_empty() {
        return;
    }

    println!();
    println!(
        "{:<24} {:>5} {:>8} {:>9} {:<14} PLACE",
        "LOCAL TIME", "MAG", "DEPTH", "DIST KM", "STATUS"
    );
    println!("{}", "-".repeat(87));
    for row in rows {
        let depth = row
            .depth_km
            .map_or_else(|| "-".to_string(), |d| format!("{d:.1}"));
        println!(
            "{:<24} {:>5.1} {:>8} {:>9.1} {:<14} {}",
            row.local_time.format("%Y-%m-%d %H:%M %:z"),
            row.magnitude,
            depth,
            row.distance_km,
            row.status,
            row.place_label
        );
    }
}

/// Prints the assessment, or the failure, as one JSON document.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json(report: &RunReport) -> Result<(), serde_json::Error> {
    let json = match &report.outcome {
        Ok(assessment) => serde_json::json!({
            "hazard": report.hazard,
            "state": report.state(),
            "assessment": assessment,
            "events": event_table(&assessment.location, &assessment.supporting_events),
        }),
        Err(failure) => serde_json::json!({
            "hazard": report.hazard,
            "state": report.state(),
            "failure": failure,
        }),
    };

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Writes the supporting events of every successful report to `path` as
/// one CSV table. Returns the number of rows written.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_events_csv(
    path: &Path,
    reports: &[RunReport],
) -> Result<usize, Box<dyn std::error::Error>> {
    let rows: Vec<EventRow> = reports
        .iter()
        .filter_map(RunReport::assessment)
        .flat_map(|a| event_table(&a.location, &a.supporting_events))
        .collect();

    write_csv(&rows, File::create(path)?)?;
    log::info!("Wrote {} event(s) to {}", rows.len(), path.display());
    Ok(rows.len())
}
