#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Place resolution for the hazard risk pipeline.
//!
//! Maps a `(country, city)` pair from the reference gazetteer, or a raw
//! `(lat, lon)` pair, to a canonical [`Location`]. Timezones come from a
//! point-in-polygon lookup over timezone boundaries
//! ([`timezone::TimezoneIndex`]); a miss falls back to UTC instead of
//! failing.
//!
//! The gazetteer table and timezone index are loaded once at process
//! start and shared read-only.

pub mod timezone;

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use csv::StringRecord;
use hazard_risk_models::{Location, UTC_ZONE};
use serde::Deserialize;
use thiserror::Error;

pub use timezone::{TimezoneIndex, TimezoneLookup};

/// Errors from loading reference data or resolving a place.
#[derive(Debug, Error)]
pub enum GazetteerError {
    /// I/O error reading a reference file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The gazetteer CSV could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The timezone boundary file is unusable.
    #[error("Boundary error: {message}")]
    Boundary {
        /// Description of the failure.
        message: String,
    },

    /// No gazetteer row matches the requested place.
    #[error("Unknown place: {city}, {country}")]
    UnknownPlace {
        /// Requested country.
        country: String,
        /// Requested city.
        city: String,
    },

    /// Raw coordinates outside the valid WGS84 range.
    #[error("Invalid coordinates: lat={latitude}, lon={longitude}")]
    InvalidCoordinates {
        /// Requested latitude.
        latitude: f64,
        /// Requested longitude.
        longitude: f64,
    },
}

/// One row of the reference gazetteer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GazetteerRow {
    /// Country name.
    pub country: String,
    /// City name.
    pub city: String,
    /// Latitude (WGS84).
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude (WGS84).
    #[serde(rename = "lng")]
    pub longitude: f64,
}

/// The reference table of known cities, in file order.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    rows: Vec<GazetteerRow>,
}

impl Gazetteer {
    /// Loads a `worldcities.csv` style file (`city`, `lat`, `lng`,
    /// `country` headers; other columns are ignored).
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError`] if the file cannot be opened or its
    /// header row cannot be read.
    pub fn load(path: &Path) -> Result<Self, GazetteerError> {
        let file = std::fs::File::open(path)?;
        let gazetteer = Self::from_reader(file)?;
        log::info!(
            "Loaded {} gazetteer rows from {}",
            gazetteer.len(),
            path.display()
        );
        Ok(gazetteer)
    }

    /// Reads gazetteer rows from CSV. Malformed rows and rows with
    /// out-of-range coordinates are skipped.
    ///
    /// Fields are read as UTF-8; a field that is not valid UTF-8 is read
    /// as Latin-1, so `worldcities.csv` exports in either encoding load.
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError::Csv`] if the header row is unreadable.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, GazetteerError> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = decode_record(csv_reader.byte_headers()?);

        let mut rows = Vec::new();
        let mut skipped = 0u64;

        for result in csv_reader.byte_records() {
            let result = result.and_then(|record| {
                decode_record(&record).deserialize::<GazetteerRow>(Some(&headers))
            });
            match result {
                Ok(row) if coordinates_valid(row.latitude, row.longitude) => rows.push(row),
                Ok(row) => {
                    log::trace!(
                        "  skipping {}, {}: coordinates out of range",
                        row.city,
                        row.country
                    );
                    skipped += 1;
                }
                Err(e) => {
                    log::trace!("  skipping malformed row: {e}");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {skipped} malformed gazetteer rows");
        }

        Ok(Self { rows })
    }

    /// Builds a gazetteer from rows already in memory.
    #[must_use]
    pub const fn from_rows(rows: Vec<GazetteerRow>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the gazetteer has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All distinct country names, sorted.
    #[must_use]
    pub fn countries(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.country.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// All distinct city names within `country`, sorted.
    #[must_use]
    pub fn cities(&self, country: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.country == country)
            .map(|r| r.city.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The first row matching `(country, city)` exactly. Duplicate city
    /// names within a country resolve to the earliest listed row.
    #[must_use]
    pub fn find(&self, country: &str, city: &str) -> Option<&GazetteerRow> {
        self.rows
            .iter()
            .find(|r| r.country == country && r.city == city)
    }
}

/// Resolves places to [`Location`]s using shared reference data.
#[derive(Clone)]
pub struct PlaceResolver {
    gazetteer: Arc<Gazetteer>,
    timezones: Arc<dyn TimezoneLookup>,
}

impl PlaceResolver {
    /// Creates a resolver over preloaded reference data.
    #[must_use]
    pub fn new(gazetteer: Arc<Gazetteer>, timezones: Arc<dyn TimezoneLookup>) -> Self {
        Self {
            gazetteer,
            timezones,
        }
    }

    /// The gazetteer this resolver reads from.
    #[must_use]
    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    /// Resolves a gazetteer `(country, city)` selection.
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError::UnknownPlace`] if no row matches.
    pub fn resolve_place(&self, country: &str, city: &str) -> Result<Location, GazetteerError> {
        let row = self
            .gazetteer
            .find(country, city)
            .ok_or_else(|| GazetteerError::UnknownPlace {
                country: country.to_string(),
                city: city.to_string(),
            })?;

        Ok(self.locate(&row.country, &row.city, row.latitude, row.longitude))
    }

    /// Resolves a raw coordinate pair (e.g. from IP geolocation).
    /// `city` and `country` are display labels and may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError::InvalidCoordinates`] if the pair is
    /// outside the WGS84 range.
    pub fn resolve_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        city: &str,
        country: &str,
    ) -> Result<Location, GazetteerError> {
        if !coordinates_valid(latitude, longitude) {
            return Err(GazetteerError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }

        Ok(self.locate(country, city, latitude, longitude))
    }

    fn locate(&self, country: &str, city: &str, latitude: f64, longitude: f64) -> Location {
        let timezone = self
            .timezones
            .timezone_at(longitude, latitude)
            .map_or_else(
                || {
                    log::debug!("No timezone at ({latitude}, {longitude}), using {UTC_ZONE}");
                    UTC_ZONE.to_string()
                },
                String::from,
            );

        Location {
            country: country.to_string(),
            city: city.to_string(),
            latitude,
            longitude,
            timezone,
        }
    }
}

fn coordinates_valid(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

fn decode_record(record: &csv::ByteRecord) -> StringRecord {
    StringRecord::from(record.iter().map(decode_field).collect::<Vec<_>>())
}

fn decode_field(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes).map_or_else(
        |_| bytes.iter().copied().map(char::from).collect(),
        str::to_owned,
    )
}
