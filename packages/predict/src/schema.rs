//! Predictor feature schemas and ordered projection.
//!
//! A predictor declares the exact, ordered list of feature names it was
//! trained on. Inputs are collected by name in a [`FeatureFrame`] and
//! then projected onto the schema: every output slot is filled by its
//! schema position, so the vector's order is the schema's order no matter
//! how the inputs were inserted.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::FeatureError;

/// The ordered feature names a predictor accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
    positions: BTreeMap<String, usize>,
}

impl FeatureSchema {
    /// Creates a schema from ordered names.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::DuplicateFeature`] if a name repeats.
    pub fn new<I, S>(names: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut positions = BTreeMap::new();
        for (i, name) in names.iter().enumerate() {
            if positions.insert(name.clone(), i).is_some() {
                return Err(FeatureError::DuplicateFeature { name: name.clone() });
            }
        }
        Ok(Self { names, positions })
    }

    /// Feature names in schema order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the schema has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of `name` in the schema.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }
}

/// Named inputs collected before projection.
///
/// Numeric values are required inputs: each must exist in the schema
/// and each schema slot that is not an indicator must receive one.
/// Indicator values are one-hot columns sharing a prefix: schema slots
/// with that prefix default to `0.0`, and indicators the schema does not
/// know (categories unseen at training time) are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    numeric: BTreeMap<String, f64>,
    indicators: BTreeMap<String, f64>,
    indicator_prefix: Option<String>,
}

impl FeatureFrame {
    /// An empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required numeric input.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(name.into(), value);
        self
    }

    /// Declares `prefix` as the one-hot column prefix without setting any
    /// category, so every prefixed schema slot encodes as `0.0`.
    #[must_use]
    pub fn with_indicator_prefix(mut self, prefix: &str) -> Self {
        self.indicator_prefix = Some(prefix.to_string());
        self
    }

    /// Declares `prefix` as the one-hot column prefix and sets
    /// `prefix + category` to `1.0`.
    #[must_use]
    pub fn with_one_hot(mut self, prefix: &str, category: &str) -> Self {
        self.indicators.insert(format!("{prefix}{category}"), 1.0);
        self.with_indicator_prefix(prefix)
    }

    /// Projects the frame onto `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::UnexpectedFeature`] for a numeric input
    /// the schema lacks, and [`FeatureError::MissingFeature`] for a
    /// non-indicator schema slot with no input.
    pub fn project(&self, schema: &Arc<FeatureSchema>) -> Result<FeatureVector, FeatureError> {
        if let Some(name) = self.numeric.keys().find(|k| schema.position(k).is_none()) {
            return Err(FeatureError::UnexpectedFeature { name: name.clone() });
        }

        for name in self.indicators.keys() {
            if schema.position(name).is_none() {
                log::trace!("Indicator {name} not in schema, encoding as all-zero");
            }
        }

        let mut values = vec![0.0; schema.len()];

        for (slot, name) in values.iter_mut().zip(schema.names()) {
            *slot = if let Some(v) = self.numeric.get(name) {
                *v
            } else if let Some(v) = self.indicators.get(name) {
                *v
            } else if self.is_indicator(name) {
                0.0
            } else {
                return Err(FeatureError::MissingFeature { name: name.clone() });
            };
        }

        Ok(FeatureVector {
            schema: Arc::clone(schema),
            values,
        })
    }

    fn is_indicator(&self, name: &str) -> bool {
        self.indicator_prefix
            .as_deref()
            .is_some_and(|prefix| name.starts_with(prefix))
    }
}

/// A predictor input laid out in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: Arc<FeatureSchema>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// The schema this vector was projected onto.
    #[must_use]
    pub const fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    /// Values in schema order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of the named feature.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.position(name).map(|i| self.values[i])
    }

    /// `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.schema
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(names: &[&str]) -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema::new(names.iter().copied()).unwrap())
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = FeatureSchema::new(["a", "b", "a"]).unwrap_err();
        assert!(matches!(err, FeatureError::DuplicateFeature { name } if name == "a"));
    }

    #[test]
    fn projection_follows_schema_order_not_insertion_order() {
        let schema = schema(&["oxygen_pct", "temperature_c", "humidity_pct"]);
        let vector = FeatureFrame::new()
            .with("humidity_pct", 40.0)
            .with("oxygen_pct", 21.0)
            .with("temperature_c", 30.0)
            .project(&schema)
            .unwrap();
        assert_eq!(vector.values(), &[21.0, 30.0, 40.0]);
        assert_eq!(vector.get("temperature_c"), Some(30.0));
    }

    #[test]
    fn missing_numeric_input_is_an_error() {
        let schema = schema(&["depth_km", "latitude", "longitude"]);
        let err = FeatureFrame::new()
            .with("depth_km", 10.0)
            .with("latitude", 35.0)
            .project(&schema)
            .unwrap_err();
        assert!(matches!(err, FeatureError::MissingFeature { name } if name == "longitude"));
    }

    #[test]
    fn unknown_numeric_input_is_an_error() {
        let schema = schema(&["depth_km"]);
        let err = FeatureFrame::new()
            .with("depth_km", 10.0)
            .with("depth", 10.0)
            .project(&schema)
            .unwrap_err();
        assert!(matches!(err, FeatureError::UnexpectedFeature { name } if name == "depth"));
    }

    #[test]
    fn one_hot_fills_absent_columns_with_zero() {
        let schema = schema(&["place_Alaska", "nst", "place_Tokyo, Japan", "depth"]);
        let vector = FeatureFrame::new()
            .with("depth", 12.0)
            .with("nst", 30.0)
            .with_one_hot("place_", "Tokyo, Japan")
            .project(&schema)
            .unwrap();
        assert_eq!(vector.values(), &[0.0, 30.0, 1.0, 12.0]);
    }

    #[test]
    fn unseen_category_encodes_as_all_zero() {
        let schema = schema(&["nst", "place_Alaska", "place_Chile"]);
        let vector = FeatureFrame::new()
            .with("nst", 5.0)
            .with_one_hot("place_", "Atlantis")
            .project(&schema)
            .unwrap();
        assert_eq!(vector.values(), &[5.0, 0.0, 0.0]);
    }

    #[test]
    fn bare_prefix_zeroes_every_indicator() {
        let schema = schema(&["place_Alaska", "depth"]);
        let vector = FeatureFrame::new()
            .with("depth", 10.0)
            .with_indicator_prefix("place_")
            .project(&schema)
            .unwrap();
        assert_eq!(vector.values(), &[0.0, 10.0]);

        let err = FeatureFrame::new()
            .with("depth", 10.0)
            .project(&schema)
            .unwrap_err();
        assert!(matches!(err, FeatureError::MissingFeature { name } if name == "place_Alaska"));
    }

    #[test]
    fn iterates_in_schema_order() {
        let schema = schema(&["b", "a"]);
        let vector = FeatureFrame::new()
            .with("a", 1.0)
            .with("b", 2.0)
            .project(&schema)
            .unwrap();
        let pairs: Vec<(&str, f64)> = vector.iter().collect();
        assert_eq!(pairs, vec![("b", 2.0), ("a", 1.0)]);
    }
}
