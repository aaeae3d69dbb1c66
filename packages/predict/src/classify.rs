//! Maps predictions to risk tiers and display scores.
//!
//! Thresholds are fixed. Fire tiers compare the unrounded probability
//! with a strict `>`, so exactly `0.5` is not dangerous. Earthquake
//! tiers are half-open: `[4.5, 6.0)` is moderate.

use hazard_risk_models::RiskTier;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::ModelError;
use crate::model::{ProbabilityModel, RegressionModel};
use crate::schema::FeatureVector;

/// Fire probability above which the location is dangerous.
pub const FIRE_HIGH_PROBABILITY: f64 = 0.5;

/// Fire probability above which a three-tier scheme reports moderate risk.
pub const FIRE_MODERATE_PROBABILITY: f64 = 0.35;

/// Lowest magnitude rated moderate.
pub const EARTHQUAKE_MODERATE_MAGNITUDE: f64 = 4.5;

/// Lowest magnitude rated high.
pub const EARTHQUAKE_HIGH_MAGNITUDE: f64 = 6.0;

/// Magnitude mapped to a score of 0.
pub const SCORE_MIN_MAGNITUDE: f64 = 3.0;

/// Magnitude mapped to a score of 100.
pub const SCORE_MAX_MAGNITUDE: f64 = 10.0;

/// How fire probabilities are bucketed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FireTierScheme {
    /// Danger above 50%, safe otherwise.
    #[default]
    Binary,
    /// High above 50%, moderate from 35%, low below 35%.
    ThreeTier,
}

impl FireTierScheme {
    /// Tier for a fire probability.
    #[must_use]
    pub fn tier(self, probability: f64) -> RiskTier {
        if probability > FIRE_HIGH_PROBABILITY {
            RiskTier::High
        } else if self == Self::ThreeTier && probability >= FIRE_MODERATE_PROBABILITY {
            RiskTier::Moderate
        } else {
            RiskTier::Safe
        }
    }

    /// Display label for a tier under this scheme.
    #[must_use]
    pub const fn label(self, tier: RiskTier) -> &'static str {
        match (self, tier) {
            (Self::Binary, RiskTier::High) => "Danger",
            (Self::Binary, _) => "Safe",
            (Self::ThreeTier, RiskTier::High) => "High",
            (Self::ThreeTier, RiskTier::Moderate) => "Moderate",
            (Self::ThreeTier, RiskTier::Safe) => "Low",
        }
    }
}

/// Tier for a magnitude.
#[must_use]
pub fn earthquake_tier(magnitude: f64) -> RiskTier {
    if magnitude < EARTHQUAKE_MODERATE_MAGNITUDE {
        RiskTier::Safe
    } else if magnitude < EARTHQUAKE_HIGH_MAGNITUDE {
        RiskTier::Moderate
    } else {
        RiskTier::High
    }
}

/// Display label for an earthquake tier.
#[must_use]
pub const fn earthquake_label(tier: RiskTier) -> &'static str {
    match tier {
        RiskTier::Safe => "Safe",
        RiskTier::Moderate => "Moderate Risk",
        RiskTier::High => "High Risk",
    }
}

/// `clamp((magnitude - 3) / 7, 0, 1) * 100`
#[must_use]
pub fn earthquake_score(magnitude: f64) -> f64 {
    ((magnitude - SCORE_MIN_MAGNITUDE) / (SCORE_MAX_MAGNITUDE - SCORE_MIN_MAGNITUDE))
        .clamp(0.0, 1.0)
        * 100.0
}

/// Fire probability as a percentage.
#[must_use]
pub fn fire_score(probability: f64) -> f64 {
    probability.clamp(0.0, 1.0) * 100.0
}

/// A classified prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Risk tier.
    pub tier: RiskTier,
    /// Display label for the tier.
    pub label: &'static str,
    /// 0-100 display score.
    pub score: f64,
    /// The predictor's raw output.
    pub raw_prediction: f64,
}

/// Runs the fire predictor and classifies its positive-class probability.
///
/// # Errors
///
/// Returns [`ModelError`] if the predictor fails.
pub fn classify_fire(
    model: &dyn ProbabilityModel,
    input: &FeatureVector,
    scheme: FireTierScheme,
) -> Result<Classification, ModelError> {
    let [_, probability] = model.predict_proba(input)?;
    let tier = scheme.tier(probability);

    log::debug!(
        "{} fire probability {probability:.3} -> {tier}",
        model.name()
    );

    Ok(Classification {
        tier,
        label: scheme.label(tier),
        score: fire_score(probability),
        raw_prediction: probability,
    })
}

/// Runs a magnitude predictor and classifies its estimate.
///
/// # Errors
///
/// Returns [`ModelError`] if the predictor fails.
pub fn classify_earthquake(
    model: &dyn RegressionModel,
    input: &FeatureVector,
) -> Result<Classification, ModelError> {
    let magnitude = model.predict(input)?;
    let tier = earthquake_tier(magnitude);

    log::debug!("{} magnitude {magnitude:.2} -> {tier}", model.name());

    Ok(Classification {
        tier,
        label: earthquake_label(tier),
        score: earthquake_score(magnitude),
        raw_prediction: magnitude,
    })
}
