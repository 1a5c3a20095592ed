//! Rule-based body-shape classifier.
//!
//! Rules are evaluated in order and the first match wins; the regions they
//! describe overlap, so order is part of the semantics. Every rule is a set of
//! signed slacks over the ratios: a slack is non-negative when its condition
//! holds, so a value sitting exactly on a threshold belongs to the first rule
//! that tests it.

use crate::measurement::Ratios;
use crate::types::BodyType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Named constants (no magic numbers) ---
pub const DEFAULT_HIGH_THRESHOLD: f32 = 1.15;
pub const DEFAULT_LOW_THRESHOLD: f32 = 0.85;
pub const DEFAULT_WAIST_NARROW_THRESHOLD: f32 = 0.75;
pub const DEFAULT_SIMILARITY_BAND: f32 = 0.05;
pub const DEFAULT_RECTANGLE_BAND: f32 = 0.10;
pub const DEFAULT_CONFIDENCE_SCALE: f32 = 0.10;

/// Confidence reported for ratios lying exactly on a decision boundary.
pub const MIN_CONFIDENCE: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("ratios must be finite and positive, got {0:?}")]
    InvalidRatios(Ratios),
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),
}

/// Tunable decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Shoulder-to-hip ratio at or above which shoulders dominate.
    pub high: f32,
    /// Shoulder-to-hip ratio at or below which hips dominate.
    pub low: f32,
    /// Waist-to-shoulder ratio at or below which the waist counts as defined.
    pub waist_narrow: f32,
    /// How far shoulder-to-hip may stray from 1.0 for an hourglass, and how
    /// far the waist may exceed shoulders or hips for a rectangle.
    pub similarity_band: f32,
    /// How far shoulder-to-hip may stray from 1.0 for a rectangle.
    pub rectangle_band: f32,
    /// Margin (in ratio units) over which confidence rises from 0.5 toward 1.0.
    pub confidence_scale: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_THRESHOLD,
            low: DEFAULT_LOW_THRESHOLD,
            waist_narrow: DEFAULT_WAIST_NARROW_THRESHOLD,
            similarity_band: DEFAULT_SIMILARITY_BAND,
            rectangle_band: DEFAULT_RECTANGLE_BAND,
            confidence_scale: DEFAULT_CONFIDENCE_SCALE,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        let values = [
            self.high,
            self.low,
            self.waist_narrow,
            self.similarity_band,
            self.rectangle_band,
            self.confidence_scale,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::InvalidThresholds(
                "all thresholds must be finite".into(),
            ));
        }
        if self.low <= 0.0 || self.low >= self.high {
            return Err(ClassifierError::InvalidThresholds(format!(
                "expected 0 < low < high, got low={} high={}",
                self.low, self.high
            )));
        }
        if self.waist_narrow <= 0.0 {
            return Err(ClassifierError::InvalidThresholds(format!(
                "waist_narrow must be positive, got {}",
                self.waist_narrow
            )));
        }
        if self.similarity_band < 0.0 || self.rectangle_band < 0.0 {
            return Err(ClassifierError::InvalidThresholds(
                "bands must not be negative".into(),
            ));
        }
        if self.confidence_scale <= 0.0 {
            return Err(ClassifierError::InvalidThresholds(format!(
                "confidence_scale must be positive, got {}",
                self.confidence_scale
            )));
        }
        Ok(())
    }
}

/// Outcome of classifying one set of ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub body_type: BodyType,
    /// Distance-from-boundary confidence in [0.5, 1.0].
    pub confidence: f32,
    pub ratios: Ratios,
}

/// One entry of the ordered rule list.
struct Rule {
    label: BodyType,
    slacks: fn(&Ratios, &Thresholds) -> Vec<f32>,
}

impl Rule {
    fn evaluate(&self, ratios: &Ratios, thresholds: &Thresholds) -> Vec<f32> {
        (self.slacks)(ratios, thresholds)
    }
}

const RULES: [Rule; 4] = [
    Rule {
        label: BodyType::InvertedTriangle,
        slacks: broad_shoulders,
    },
    Rule {
        label: BodyType::Pear,
        slacks: broad_hips,
    },
    Rule {
        label: BodyType::Hourglass,
        slacks: defined_waist,
    },
    Rule {
        label: BodyType::Rectangle,
        slacks: uniform_torso,
    },
];

/// Label for ratios no rule claims.
const FALLBACK: BodyType = BodyType::Apple;

fn broad_shoulders(r: &Ratios, t: &Thresholds) -> Vec<f32> {
    vec![r.shoulder_to_hip - t.high]
}

fn broad_hips(r: &Ratios, t: &Thresholds) -> Vec<f32> {
    vec![t.low - r.shoulder_to_hip]
}

fn defined_waist(r: &Ratios, t: &Thresholds) -> Vec<f32> {
    vec![
        t.similarity_band - (r.shoulder_to_hip - 1.0).abs(),
        t.waist_narrow - r.waist_to_shoulder,
    ]
}

fn uniform_torso(r: &Ratios, t: &Thresholds) -> Vec<f32> {
    let waist_ceiling = 1.0 + t.similarity_band;
    vec![
        t.rectangle_band - (r.shoulder_to_hip - 1.0).abs(),
        r.waist_to_shoulder - t.waist_narrow,
        waist_ceiling - r.waist_to_shoulder,
        r.waist_to_hip - t.waist_narrow,
        waist_ceiling - r.waist_to_hip,
    ]
}

fn satisfied(slacks: &[f32]) -> bool {
    slacks.iter().all(|&s| s >= 0.0)
}

/// Depth inside a region: the tightest slack.
fn depth_inside(slacks: &[f32]) -> f32 {
    slacks.iter().copied().fold(f32::INFINITY, f32::min)
}

/// Distance to a region from outside it: the largest violation.
fn distance_outside(slacks: &[f32]) -> f32 {
    slacks.iter().map(|&s| -s).fold(0.0, f32::max)
}

/// Map a boundary margin to [0.5, 1.0], monotonically.
fn confidence(margin: f32, scale: f32) -> f32 {
    let rise = 1.0 - (-margin.max(0.0) / scale).exp();
    (MIN_CONFIDENCE + (1.0 - MIN_CONFIDENCE) * rise).clamp(MIN_CONFIDENCE, 1.0)
}

/// Classifies [`Ratios`] against a fixed set of [`Thresholds`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    thresholds: Thresholds,
}

impl Classifier {
    pub fn new(thresholds: Thresholds) -> Result<Self, ClassifierError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Apply the rules in order.
    ///
    /// The confidence margin is the distance to the nearest boundary of the
    /// winning region: its own tightest slack, and the distance to every
    /// earlier rule it had to miss.
    pub fn classify(&self, ratios: Ratios) -> Result<ClassificationResult, ClassifierError> {
        let values = [ratios.shoulder_to_hip, ratios.waist_to_shoulder, ratios.waist_to_hip];
        if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(ClassifierError::InvalidRatios(ratios));
        }

        let mut margin = f32::INFINITY;
        let mut body_type = FALLBACK;

        for rule in &RULES {
            let slacks = rule.evaluate(&ratios, &self.thresholds);
            if satisfied(&slacks) {
                margin = margin.min(depth_inside(&slacks));
                body_type = rule.label;
                break;
            }
            margin = margin.min(distance_outside(&slacks));
        }

        let confidence = confidence(margin, self.thresholds.confidence_scale);
        tracing::debug!(?body_type, margin, confidence, ?ratios, "classified");

        Ok(ClassificationResult {
            body_type,
            confidence,
            ratios,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(s2h: f32, w2s: f32, w2h: f32) -> ClassificationResult {
        Classifier::default()
            .classify(Ratios::new(s2h, w2s, w2h))
            .unwrap()
    }

    #[test]
    fn test_canonical_ratios() {
        assert_eq!(classify(1.0, 0.7, 0.7).body_type, BodyType::Hourglass);
        assert_eq!(classify(1.0, 0.9, 0.9).body_type, BodyType::Rectangle);
        assert_eq!(classify(1.3, 0.8, 1.04).body_type, BodyType::InvertedTriangle);
        assert_eq!(classify(0.7, 1.0, 0.7).body_type, BodyType::Pear);
        assert_eq!(classify(1.0, 1.2, 1.2).body_type, BodyType::Apple);
    }

    #[test]
    fn test_rule_order_decides_overlap() {
        // Wide bands make the hourglass and rectangle rules match too.
        let classifier = Classifier::new(Thresholds {
            similarity_band: 0.5,
            rectangle_band: 0.5,
            ..Thresholds::default()
        })
        .unwrap();
        let result = classifier.classify(Ratios::new(1.20, 0.7, 0.84)).unwrap();
        assert_eq!(result.body_type, BodyType::InvertedTriangle);

        let result = classifier.classify(Ratios::new(1.0, 0.75, 0.75)).unwrap();
        assert_eq!(result.body_type, BodyType::Hourglass);
    }

    #[test]
    fn test_boundaries_inclusive_on_first_rule() {
        let at_high = classify(DEFAULT_HIGH_THRESHOLD, 0.8, 0.9);
        assert_eq!(at_high.body_type, BodyType::InvertedTriangle);
        assert_eq!(at_high.confidence, MIN_CONFIDENCE);

        let at_low = classify(DEFAULT_LOW_THRESHOLD, 0.9, 0.8);
        assert_eq!(at_low.body_type, BodyType::Pear);
        assert_eq!(at_low.confidence, MIN_CONFIDENCE);

        // Waist exactly at the narrow threshold is claimed by hourglass, not rectangle.
        let at_waist = classify(1.0, DEFAULT_WAIST_NARROW_THRESHOLD, 0.8);
        assert_eq!(at_waist.body_type, BodyType::Hourglass);
        assert_eq!(at_waist.confidence, MIN_CONFIDENCE);
    }

    #[test]
    fn test_confidence_rises_away_from_high_threshold() {
        let mut last = 0.0;
        for s2h in [1.16, 1.2, 1.3, 1.5, 2.0] {
            let result = classify(s2h, 0.7, 0.9);
            assert_eq!(result.body_type, BodyType::InvertedTriangle);
            assert!(result.confidence > last, "{s2h}: {} <= {last}", result.confidence);
            last = result.confidence;
        }
    }

    #[test]
    fn test_confidence_rises_away_from_low_threshold() {
        let mut last = 0.0;
        for s2h in [0.84, 0.8, 0.7, 0.5] {
            let result = classify(s2h, 1.0, 0.7);
            assert_eq!(result.body_type, BodyType::Pear);
            assert!(result.confidence > last);
            last = result.confidence;
        }
    }

    #[test]
    fn test_confidence_falls_approaching_boundary_from_inside_rectangle() {
        let mut last = 1.1;
        for s2h in [1.0, 1.03, 1.06, 1.09] {
            let result = classify(s2h, 0.9, 0.9);
            assert_eq!(result.body_type, BodyType::Rectangle);
            assert!(result.confidence < last);
            last = result.confidence;
        }
    }

    #[test]
    fn test_confidence_bounds() {
        let far = classify(100.0, 0.5, 50.0);
        assert!(far.confidence <= 1.0);
        assert!(far.confidence > 0.99);

        for ratios in [(1.0, 0.7, 0.7), (1.0, 0.9, 0.9), (1.1, 1.0, 1.1), (0.86, 1.0, 0.86)] {
            let c = classify(ratios.0, ratios.1, ratios.2).confidence;
            assert!((MIN_CONFIDENCE..=1.0).contains(&c), "{ratios:?} -> {c}");
        }
    }

    #[test]
    fn test_apple_confidence_uses_nearest_region() {
        // Waist 0.15 wider than the rectangle ceiling; shoulders 0.15 from both thresholds.
        let result = classify(1.0, 1.2, 1.2);
        let expected = confidence(0.15, DEFAULT_CONFIDENCE_SCALE);
        assert!((result.confidence - expected).abs() < 1e-4);
    }

    #[test]
    fn test_deterministic() {
        let a = classify(1.07, 0.88, 0.94);
        let b = classify(1.07, 0.88, 0.94);
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_ratios_rejected() {
        let classifier = Classifier::default();
        assert!(classifier.classify(Ratios::new(f32::NAN, 1.0, 1.0)).is_err());
        assert!(classifier.classify(Ratios::new(1.0, 0.0, 1.0)).is_err());
        assert!(classifier.classify(Ratios::new(1.0, 1.0, f32::INFINITY)).is_err());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let inverted = Thresholds {
            low: 1.2,
            high: 1.1,
            ..Thresholds::default()
        };
        assert!(Classifier::new(inverted).is_err());

        let flat = Thresholds {
            confidence_scale: 0.0,
            ..Thresholds::default()
        };
        assert!(Classifier::new(flat).is_err());
    }

    #[test]
    fn test_thresholds_partial_toml() {
        let thresholds: Thresholds = toml::from_str("high = 1.2\n").unwrap();
        assert_eq!(thresholds.high, 1.2);
        assert_eq!(thresholds.low, DEFAULT_LOW_THRESHOLD);
    }
}
