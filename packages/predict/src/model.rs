//! Predictor interfaces and file-backed trained models.
//!
//! Predictors are loaded once at process start and shared read-only.
//! A model file declares the feature schema it was trained on and an
//! estimator:
//!
//! ```toml
//! name = "fire"
//! features = ["oxygen_pct", "temperature_c", "humidity_pct"]
//!
//! [estimator]
//! kind = "logistic"
//! intercept = -4.2
//! weights = [0.05, 0.12, -0.03]
//! ```
//!
//! Forests are lists of binary regression trees stored as flat node
//! arrays (root at index 0). A split sends `x <= threshold` left. The
//! forest output is the mean of its trees' leaf values.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::ModelError;
use crate::schema::{FeatureSchema, FeatureVector};

/// Common surface of every predictor.
pub trait Predictor: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// The schema inputs must be projected onto.
    fn schema(&self) -> &Arc<FeatureSchema>;
}

/// A two-class probability predictor. Index 1 is the positive class.
pub trait ProbabilityModel: Predictor {
    /// Class probabilities for one input.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the input schema does not match or the
    /// model cannot produce a probability.
    fn predict_proba(&self, input: &FeatureVector) -> Result<[f64; 2], ModelError>;
}

/// A scalar regression predictor.
pub trait RegressionModel: Predictor {
    /// Prediction for one input.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the input schema does not match or the
    /// model cannot produce a scalar.
    fn predict(&self, input: &FeatureVector) -> Result<f64, ModelError>;
}

/// On-disk model description.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelFile {
    /// Model name.
    pub name: String,
    /// Feature names in training order.
    pub features: Vec<String>,
    /// The fitted estimator.
    pub estimator: Estimator,
}

/// A fitted estimator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    /// `intercept + w . x`
    Linear {
        /// Bias term.
        intercept: f64,
        /// One weight per feature.
        weights: Vec<f64>,
    },
    /// `sigmoid(intercept + w . x)`, the positive-class probability.
    Logistic {
        /// Bias term.
        intercept: f64,
        /// One weight per feature.
        weights: Vec<f64>,
    },
    /// Mean of regression tree outputs.
    Forest {
        /// The trees.
        trees: Vec<Tree>,
    },
}

/// One binary regression tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tree {
    /// Nodes, root first. Children always follow their parent.
    pub nodes: Vec<TreeNode>,
}

/// A tree node.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Internal node.
    Split {
        /// Feature index into the schema.
        feature: usize,
        /// Values `<= threshold` go left.
        threshold: f64,
        /// Index of the left child.
        left: usize,
        /// Index of the right child.
        right: usize,
    },
    /// Terminal node.
    Leaf {
        /// Output of this leaf.
        value: f64,
    },
}

impl Tree {
    fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= feature_count {
                        return Err(format!(
                            "node {i} splits on feature {feature}, model has {feature_count}"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has a non-finite threshold"));
                    }
                    for child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child index {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {i} has a non-finite value"));
                    }
                }
            }
        }

        Ok(())
    }

    fn evaluate(&self, values: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if values[feature] <= threshold {
                        left
                    } else {
                        right
                    };
                }
                TreeNode::Leaf { value } => return value,
            }
        }
    }
}

impl Estimator {
    fn validate(&self, feature_count: usize) -> Result<(), String> {
        match self {
            Self::Linear { intercept, weights } | Self::Logistic { intercept, weights } => {
                if weights.len() != feature_count {
                    return Err(format!(
                        "{} weights for {feature_count} features",
                        weights.len()
                    ));
                }
                if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
                    return Err("non-finite coefficient".to_string());
                }
                Ok(())
            }
            Self::Forest { trees } => {
                if trees.is_empty() {
                    return Err("forest has no trees".to_string());
                }
                trees
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, tree)| {
                        tree.validate(feature_count)
                            .map_err(|e| format!("tree {i}: {e}"))
                    })
            }
        }
    }
}

fn dot(intercept: f64, weights: &[f64], values: &[f64]) -> f64 {
    weights
        .iter()
        .zip(values)
        .fold(intercept, |acc, (w, x)| w.mul_add(*x, acc))
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// A predictor loaded from a model file.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    name: String,
    schema: Arc<FeatureSchema>,
    estimator: Estimator,
}

impl TrainedModel {
    /// Loads a model file. `.json` files are read as JSON, anything else
    /// as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        let model = if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        log::info!(
            "Loaded model {} ({} features) from {}",
            model.name,
            model.schema.len(),
            path.display()
        );

        Ok(model)
    }

    /// Parses and validates a TOML model description.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ModelError> {
        Self::from_file(toml::de::from_str(content)?)
    }

    /// Parses and validates a JSON model description.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if parsing or validation fails.
    pub fn from_json_str(content: &str) -> Result<Self, ModelError> {
        Self::from_file(serde_json::from_str(content)?)
    }

    /// Validates a parsed model description.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Invalid`] if the schema has duplicates or the
    /// estimator does not fit it.
    pub fn from_file(file: ModelFile) -> Result<Self, ModelError> {
        let schema = FeatureSchema::new(file.features).map_err(|e| ModelError::Invalid {
            message: format!("{}: {e}", file.name),
        })?;

        if schema.is_empty() {
            return Err(ModelError::Invalid {
                message: format!("{}: no features declared", file.name),
            });
        }

        file.estimator
            .validate(schema.len())
            .map_err(|e| ModelError::Invalid {
                message: format!("{}: {e}", file.name),
            })?;

        Ok(Self {
            name: file.name,
            schema: Arc::new(schema),
            estimator: file.estimator,
        })
    }

    /// The fitted estimator.
    #[must_use]
    pub const fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    fn check_schema(&self, input: &FeatureVector) -> Result<(), ModelError> {
        if Arc::ptr_eq(input.schema(), &self.schema) || **input.schema() == *self.schema {
            Ok(())
        } else {
            Err(ModelError::SchemaMismatch {
                model: self.name.clone(),
            })
        }
    }

    fn checked(&self, value: f64) -> Result<f64, ModelError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ModelError::InvalidOutput {
                model: self.name.clone(),
                value,
            })
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn forest_mean(trees: &[Tree], values: &[f64]) -> f64 {
        trees.iter().map(|t| t.evaluate(values)).sum::<f64>() / trees.len() as f64
    }
}

impl Predictor for TrainedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }
}

impl ProbabilityModel for TrainedModel {
    fn predict_proba(&self, input: &FeatureVector) -> Result<[f64; 2], ModelError> {
        self.check_schema(input)?;
        let values = input.values();

        let positive = match &self.estimator {
            Estimator::Logistic { intercept, weights } => {
                sigmoid(dot(*intercept, weights, values))
            }
            Estimator::Forest { trees } => Self::forest_mean(trees, values),
            Estimator::Linear { .. } => {
                return Err(ModelError::Unsupported {
                    model: self.name.clone(),
                    operation: "probability prediction",
                });
            }
        };

        let positive = self.checked(positive)?;
        if !(0.0..=1.0).contains(&positive) {
            return Err(ModelError::InvalidOutput {
                model: self.name.clone(),
                value: positive,
            });
        }

        Ok([1.0 - positive, positive])
    }
}

impl RegressionModel for TrainedModel {
    fn predict(&self, input: &FeatureVector) -> Result<f64, ModelError> {
        self.check_schema(input)?;
        let values = input.values();

        let value = match &self.estimator {
            Estimator::Linear { intercept, weights } => dot(*intercept, weights, values),
            Estimator::Forest { trees } => Self::forest_mean(trees, values),
            Estimator::Logistic { .. } => {
                return Err(ModelError::Unsupported {
                    model: self.name.clone(),
                    operation: "regression",
                });
            }
        };

        self.checked(value)
    }
}
