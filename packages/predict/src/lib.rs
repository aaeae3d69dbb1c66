#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature aggregation, predictors and risk classification.
//!
//! - [`schema`]: a predictor's declared feature schema and the
//!   [`FeatureVector`](schema::FeatureVector) built by projecting named
//!   inputs onto it.
//! - [`features`]: reduces weather snapshots and seismic event batches to
//!   the named inputs each predictor expects.
//! - [`model`]: the predictor traits and the file-backed
//!   [`TrainedModel`](model::TrainedModel).
//! - [`classify`]: maps a prediction to a [`RiskTier`](hazard_risk_models::RiskTier)
//!   and a 0-100 score.

pub mod classify;
pub mod features;
pub mod model;
pub mod schema;

use thiserror::Error;

/// Errors from building a feature vector.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// A schema lists the same feature twice.
    #[error("Duplicate feature in schema: {name}")]
    DuplicateFeature {
        /// The repeated name.
        name: String,
    },

    /// The schema needs a value the inputs do not provide.
    #[error("Missing feature: {name}")]
    MissingFeature {
        /// The missing name.
        name: String,
    },

    /// The inputs provide a value the schema does not declare.
    #[error("Unexpected feature: {name}")]
    UnexpectedFeature {
        /// The unknown name.
        name: String,
    },
}

/// Errors from loading or invoking a predictor.
#[derive(Debug, Error)]
pub enum ModelError {
    /// I/O error reading a model file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML model file could not be parsed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON model file could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The model file parsed but is structurally unusable.
    #[error("Invalid model: {message}")]
    Invalid {
        /// Description of the defect.
        message: String,
    },

    /// A feature vector was built for a different schema.
    #[error("Feature schema mismatch for model {model}")]
    SchemaMismatch {
        /// Model name.
        model: String,
    },

    /// The model cannot produce the requested kind of output.
    #[error("Model {model} does not support {operation}")]
    Unsupported {
        /// Model name.
        model: String,
        /// The requested operation.
        operation: &'static str,
    },

    /// The model produced a value outside its output domain.
    #[error("Model {model} produced invalid output {value}")]
    InvalidOutput {
        /// Model name.
        model: String,
        /// The offending value.
        value: f64,
    },
}
