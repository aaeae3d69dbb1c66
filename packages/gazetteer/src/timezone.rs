//! In-memory timezone boundary index.
//!
//! Loads timezone polygons from a `GeoJSON` `FeatureCollection` (one
//! feature per zone, `properties.tzid` holding the IANA id), builds an
//! R-tree over their bounding boxes, and answers point-in-polygon
//! lookups keyed by `(lon, lat)`.

use std::path::Path;

use geo::{Area, BoundingRect, Contains, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};

use crate::GazetteerError;

/// Anything that can map a point to an IANA timezone id.
pub trait TimezoneLookup: Send + Sync {
    /// Returns the zone containing `(longitude, latitude)`, if any.
    fn timezone_at(&self, longitude: f64, latitude: f64) -> Option<&str>;
}

/// A zone polygon stored in the R-tree with its id.
struct ZoneEntry {
    tzid: String,
    area: f64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over timezone boundaries.
///
/// Built once at process start and shared read-only by every run.
pub struct TimezoneIndex {
    zones: RTree<ZoneEntry>,
}

impl TimezoneIndex {
    /// An index with no zones. Every lookup returns `None`, so resolved
    /// locations fall back to UTC.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            zones: RTree::new(),
        }
    }

    /// Loads a boundary file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError`] if the file cannot be read or is not a
    /// `GeoJSON` `FeatureCollection`.
    pub fn load(path: &Path) -> Result<Self, GazetteerError> {
        let text = std::fs::read_to_string(path)?;
        let index = Self::from_geojson_str(&text)?;
        log::info!(
            "Loaded {} timezone boundaries from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Builds an index from `GeoJSON` text.
    ///
    /// Features without a `tzid` property or without a polygonal
    /// geometry are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError::Boundary`] if the text is not a
    /// `FeatureCollection`.
    pub fn from_geojson_str(text: &str) -> Result<Self, GazetteerError> {
        let geojson: GeoJson = text.parse().map_err(|e| GazetteerError::Boundary {
            message: format!("invalid GeoJSON: {e}"),
        })?;

        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(GazetteerError::Boundary {
                message: "expected a FeatureCollection".to_string(),
            });
        };

        let mut entries = Vec::with_capacity(collection.features.len());

        for feature in collection.features {
            let Some(tzid) = feature
                .property("tzid")
                .and_then(|v| v.as_str())
                .map(String::from)
            else {
                log::trace!("Skipping timezone feature without tzid");
                continue;
            };

            let Some(polygon) = feature.geometry.and_then(to_multipolygon) else {
                log::warn!("Failed to parse boundary geometry for {tzid}");
                continue;
            };

            entries.push(ZoneEntry {
                envelope: compute_envelope(&polygon),
                area: polygon.unsigned_area(),
                tzid,
                polygon,
            });
        }

        Ok(Self {
            zones: RTree::bulk_load(entries),
        })
    }

    /// Number of zones in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.size()
    }

    /// Whether the index holds no zones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.size() == 0
    }
}

impl TimezoneLookup for TimezoneIndex {
    /// Zones can overlap along disputed borders; the smallest wins.
    fn timezone_at(&self, longitude: f64, latitude: f64) -> Option<&str> {
        let point = geo::Point::new(longitude, latitude);
        let query_env = AABB::from_point([longitude, latitude]);

        let mut best: Option<&ZoneEntry> = None;

        for entry in self.zones.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.contains(&point) {
                match best {
                    None => best = Some(entry),
                    Some(current) if entry.area < current.area => best = Some(entry),
                    _ => {}
                }
            }
        }

        best.map(|e| e.tzid.as_str())
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
