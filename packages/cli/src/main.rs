#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the hazard risk pipeline.
//!
//! Loads the gazetteer, timezone boundaries and predictors once, runs one
//! pipeline for the chosen place and prints the outcome.

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hazard_risk_feeds::feed_registry::feed;
use hazard_risk_feeds::ipinfo::IpInfoFeed;
use hazard_risk_feeds::usgs::UsgsFeed;
use hazard_risk_feeds::weather::WeatherApiFeed;
use hazard_risk_gazetteer::{Gazetteer, PlaceResolver, TimezoneIndex};
use hazard_risk_models::Hazard;
use hazard_risk_pipeline::profile::{DEFAULT_PROFILE, all_profiles, profile};
use hazard_risk_pipeline::{LocationRequest, Pipeline};
use hazard_risk_predict::model::TrainedModel;

/// Environment variable holding the `WeatherAPI` key.
const WEATHER_KEY_VAR: &str = "WEATHERAPI_KEY";

#[derive(Parser)]
#[command(
    name = "hazard_risk_cli",
    about = "Fire and earthquake risk for a location"
)]
struct Cli {
    /// Gazetteer CSV (`city`, `lat`, `lng`, `country` columns)
    #[arg(long)]
    gazetteer: Option<PathBuf>,
    /// Timezone boundary `GeoJSON` with a `tzid` property per feature
    #[arg(long)]
    timezones: Option<PathBuf>,
    /// Fire probability model file (TOML or JSON)
    #[arg(long)]
    fire_model: Option<PathBuf>,
    /// Earthquake magnitude model file (TOML or JSON)
    #[arg(long)]
    earthquake_model: Option<PathBuf>,
    /// Pipeline profile id
    #[arg(long, default_value = DEFAULT_PROFILE)]
    profile: String,
    /// Seismic lookback in days (1-365), replacing the profile's
    #[arg(long)]
    days: Option<u32>,
    /// Seismic search radius in km (100-1000), replacing the profile's
    #[arg(long)]
    radius_km: Option<f64>,
    /// Country of the place to assess
    #[arg(long, requires = "city")]
    country: Option<String>,
    /// City of the place to assess
    #[arg(long, requires = "country")]
    city: Option<String>,
    /// Latitude of the point to assess
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,
    /// Longitude of the point to assess
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,
    /// Assess the location of this machine's public IP
    #[arg(long)]
    current_location: bool,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
    /// Also write the supporting earthquake events to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forest fire probability from current weather
    Fire,
    /// Earthquake magnitude from recent seismic activity
    Earthquake,
    /// Both hazards for one location
    Combined,
    /// List gazetteer countries
    Countries,
    /// List gazetteer cities of a country
    Cities {
        /// Country name as listed in the gazetteer
        country: String,
    },
    /// List pipeline profiles
    Profiles,
}

impl Cli {
    fn location_request(&self) -> Result<LocationRequest, Box<dyn std::error::Error>> {
        if self.current_location {
            return Ok(LocationRequest::CurrentLocation);
        }
        if let (Some(latitude), Some(longitude)) = (self.lat, self.lon) {
            return Ok(LocationRequest::Coordinates {
                latitude,
                longitude,
            });
        }
        if let (Some(country), Some(city)) = (&self.country, &self.city) {
            return Ok(LocationRequest::Place {
                country: country.clone(),
                city: city.clone(),
            });
        }
        Err("Choose a place with --country/--city, --lat/--lon or --current-location".into())
    }
}

fn build_pipeline(
    cli: &Cli,
    resolver: PlaceResolver,
) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let mut profile =
        profile(&cli.profile).ok_or_else(|| format!("Unknown profile {}", cli.profile))?;
    if let Some(days) = cli.days {
        profile = profile.with_lookback_days(days)?;
    }
    if let Some(radius_km) = cli.radius_km {
        profile = profile.with_radius_km(radius_km)?;
    }
    log::info!("Using profile {} ({})", profile.id, profile.name);

    let usgs = feed("usgs").ok_or("usgs feed is not configured")?;
    let weatherapi = feed("weatherapi").ok_or("weatherapi feed is not configured")?;
    let ipinfo = feed("ipinfo").ok_or("ipinfo feed is not configured")?;

    let api_key = std::env::var(WEATHER_KEY_VAR).unwrap_or_else(|_| {
        log::warn!("{WEATHER_KEY_VAR} is not set, weather reads will be rejected");
        String::new()
    });

    let mut pipeline = Pipeline::new(
        resolver,
        profile,
        Arc::new(UsgsFeed::new(&usgs)?),
        Arc::new(WeatherApiFeed::new(&weatherapi, api_key)?),
    )
    .with_geolocation(Arc::new(IpInfoFeed::new(&ipinfo)?));

    if let Some(path) = &cli.fire_model {
        pipeline = pipeline.with_fire_model(Arc::new(TrainedModel::load(path)?));
    }
    if let Some(path) = &cli.earthquake_model {
        pipeline = pipeline.with_earthquake_model(Arc::new(TrainedModel::load(path)?));
    }

    Ok(pipeline)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Profiles) {
        println!("{:<20} NAME", "ID");
        println!("{}", "-".repeat(50));
        for profile in all_profiles() {
            println!("{:<20} {}", profile.id, profile.name);
        }
        return Ok(());
    }

    let gazetteer_path = cli.gazetteer.as_ref().ok_or("--gazetteer is required")?;
    let gazetteer = Arc::new(Gazetteer::load(gazetteer_path)?);

    match &cli.command {
        Commands::Countries => {
            for country in gazetteer.countries() {
                println!("{country}");
            }
            return Ok(());
        }
        Commands::Cities { country } => {
            for city in gazetteer.cities(country) {
                println!("{city}");
            }
            return Ok(());
        }
        Commands::Profiles | Commands::Fire | Commands::Earthquake | Commands::Combined => {}
    }

    let timezones = match &cli.timezones {
        Some(path) => TimezoneIndex::load(path)?,
        None => {
            log::warn!("No timezone boundaries given, every location resolves to UTC");
            TimezoneIndex::empty()
        }
    };

    let request = cli.location_request()?;
    let pipeline = build_pipeline(&cli, PlaceResolver::new(gazetteer, Arc::new(timezones)))?;

    let reports = match cli.command {
        Commands::Fire => vec![pipeline.run(Hazard::Fire, &request).await],
        Commands::Earthquake => vec![pipeline.run(Hazard::Earthquake, &request).await],
        _ => {
            let combined = pipeline.run_combined(&request).await;
            vec![combined.fire, combined.earthquake]
        }
    };

    for report in &reports {
        if cli.json {
            output::print_json(report)?;
        } else {
            output::print_report(report);
        }
    }

    if let Some(path) = &cli.csv {
        output::write_events_csv(path, &reports)?;
    }

    if reports.iter().all(|r| r.failure().is_some()) {
        std::process::exit(1);
    }

    Ok(())
}
