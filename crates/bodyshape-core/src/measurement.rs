//! Body measurements derived from pose landmarks.
//!
//! No landmark sits on the waist, so waist width is interpolated from the
//! shoulder and hip widths.

use crate::types::{Landmark, LandmarkName, Landmarks};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Waist width as a fraction of the mean of shoulder and hip width.
pub const WAIST_INTERPOLATION_FACTOR: f32 = 1.0 / 1.1;
/// Landmarks below this visibility are treated as not detected.
pub const DEFAULT_MIN_VISIBILITY: f32 = 0.5;
/// Widths at or below this are too small to form a ratio.
const MIN_WIDTH: f32 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    #[error("required landmark {0} was not detected")]
    MissingLandmark(LandmarkName),
    #[error("landmark {name} visibility {visibility:.2} is below the minimum {minimum:.2}")]
    LowVisibility {
        name: LandmarkName,
        visibility: f32,
        minimum: f32,
    },
    #[error("{0} width is degenerate")]
    DegenerateWidth(&'static str),
    #[error("minimum visibility {0} is outside [0, 1]")]
    InvalidMinVisibility(f32),
}

/// Torso widths in normalized image units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub shoulder_width: f32,
    pub hip_width: f32,
    pub waist_width: f32,
    /// Vertical distance between shoulder and hip midpoints.
    pub torso_length: f32,
}

impl Measurements {
    pub fn ratios(&self) -> Ratios {
        Ratios {
            shoulder_to_hip: self.shoulder_width / self.hip_width,
            waist_to_shoulder: self.waist_width / self.shoulder_width,
            waist_to_hip: self.waist_width / self.hip_width,
        }
    }
}

/// Proportions used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    pub shoulder_to_hip: f32,
    pub waist_to_shoulder: f32,
    pub waist_to_hip: f32,
}

impl Ratios {
    pub fn new(shoulder_to_hip: f32, waist_to_shoulder: f32, waist_to_hip: f32) -> Self {
        Self {
            shoulder_to_hip,
            waist_to_shoulder,
            waist_to_hip,
        }
    }
}

/// Converts a landmark set into [`Measurements`].
#[derive(Debug, Clone, Copy)]
pub struct MeasurementExtractor {
    min_visibility: f32,
}

impl Default for MeasurementExtractor {
    fn default() -> Self {
        Self {
            min_visibility: DEFAULT_MIN_VISIBILITY,
        }
    }
}

impl MeasurementExtractor {
    pub fn new(min_visibility: f32) -> Result<Self, MeasurementError> {
        if !(0.0..=1.0).contains(&min_visibility) {
            return Err(MeasurementError::InvalidMinVisibility(min_visibility));
        }
        Ok(Self { min_visibility })
    }

    /// Measure the torso. All four shoulder and hip landmarks must be present
    /// and visible; nothing is estimated for a missing point.
    pub fn extract(&self, landmarks: &Landmarks) -> Result<Measurements, MeasurementError> {
        let left_shoulder = self.require(landmarks, LandmarkName::LeftShoulder)?;
        let right_shoulder = self.require(landmarks, LandmarkName::RightShoulder)?;
        let left_hip = self.require(landmarks, LandmarkName::LeftHip)?;
        let right_hip = self.require(landmarks, LandmarkName::RightHip)?;

        let shoulder_width = left_shoulder.distance(right_shoulder);
        let hip_width = left_hip.distance(right_hip);

        if shoulder_width <= MIN_WIDTH {
            return Err(MeasurementError::DegenerateWidth("shoulder"));
        }
        if hip_width <= MIN_WIDTH {
            return Err(MeasurementError::DegenerateWidth("hip"));
        }

        let waist_width = (shoulder_width + hip_width) / 2.0 * WAIST_INTERPOLATION_FACTOR;

        let shoulder_center_y = (left_shoulder.y + right_shoulder.y) / 2.0;
        let hip_center_y = (left_hip.y + right_hip.y) / 2.0;
        let torso_length = (hip_center_y - shoulder_center_y).abs();

        let measurements = Measurements {
            shoulder_width,
            hip_width,
            waist_width,
            torso_length,
        };
        tracing::debug!(?measurements, "torso measured");

        Ok(measurements)
    }

    fn require<'a>(
        &self,
        landmarks: &'a Landmarks,
        name: LandmarkName,
    ) -> Result<&'a Landmark, MeasurementError> {
        let landmark = landmarks
            .get(name)
            .ok_or(MeasurementError::MissingLandmark(name))?;
        if landmark.visibility.is_nan() || landmark.visibility < self.min_visibility {
            return Err(MeasurementError::LowVisibility {
                name,
                visibility: landmark.visibility,
                minimum: self.min_visibility,
            });
        }
        Ok(landmark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torso(shoulder_width: f32, hip_width: f32, visibility: f32) -> Landmarks {
        vec![
            Landmark::new(LandmarkName::LeftShoulder, 0.5 + shoulder_width / 2.0, 0.3, visibility),
            Landmark::new(LandmarkName::RightShoulder, 0.5 - shoulder_width / 2.0, 0.3, visibility),
            Landmark::new(LandmarkName::LeftHip, 0.5 + hip_width / 2.0, 0.6, visibility),
            Landmark::new(LandmarkName::RightHip, 0.5 - hip_width / 2.0, 0.6, visibility),
        ]
        .into()
    }

    #[test]
    fn test_extract_widths() {
        let m = MeasurementExtractor::default()
            .extract(&torso(0.30, 0.28, 0.9))
            .unwrap();
        assert!((m.shoulder_width - 0.30).abs() < 1e-5);
        assert!((m.hip_width - 0.28).abs() < 1e-5);
        assert!((m.waist_width - 0.58 / 2.2).abs() < 1e-5);
        assert!((m.torso_length - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_extract_uses_euclidean_distance() {
        // Tilted shoulders: 0.3 across, 0.4 down.
        let mut landmarks = torso(0.3, 0.3, 0.9);
        landmarks.insert(Landmark::new(LandmarkName::LeftShoulder, 0.0, 0.0, 0.9));
        landmarks.insert(Landmark::new(LandmarkName::RightShoulder, 0.3, 0.4, 0.9));
        let m = MeasurementExtractor::default().extract(&landmarks).unwrap();
        assert!((m.shoulder_width - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_ratios() {
        let m = Measurements {
            shoulder_width: 0.35,
            hip_width: 0.20,
            waist_width: 0.25,
            torso_length: 0.3,
        };
        let r = m.ratios();
        assert!((r.shoulder_to_hip - 1.75).abs() < 1e-5);
        assert!((r.waist_to_shoulder - 0.25 / 0.35).abs() < 1e-5);
        assert!((r.waist_to_hip - 1.25).abs() < 1e-5);
    }

    #[test]
    fn test_missing_hip_fails() {
        let mut landmarks: Landmarks = torso(0.3, 0.3, 0.9)
            .iter()
            .filter(|l| l.name != LandmarkName::RightHip)
            .copied()
            .collect();
        landmarks.insert(Landmark::new(LandmarkName::Nose, 0.5, 0.1, 0.99));
        let err = MeasurementExtractor::default().extract(&landmarks).unwrap_err();
        assert_eq!(err, MeasurementError::MissingLandmark(LandmarkName::RightHip));
    }

    #[test]
    fn test_low_visibility_shoulder_fails() {
        let mut landmarks = torso(0.3, 0.3, 0.9);
        landmarks.insert(Landmark::new(LandmarkName::RightShoulder, 0.35, 0.3, 0.2));
        let err = MeasurementExtractor::default().extract(&landmarks).unwrap_err();
        assert!(matches!(
            err,
            MeasurementError::LowVisibility { name: LandmarkName::RightShoulder, .. }
        ));
    }

    #[test]
    fn test_raised_minimum_rejects_torso() {
        let err = MeasurementExtractor::new(0.95)
            .unwrap()
            .extract(&torso(0.3, 0.3, 0.9))
            .unwrap_err();
        assert!(matches!(err, MeasurementError::LowVisibility { .. }));
    }

    #[test]
    fn test_visibility_at_minimum_is_accepted() {
        let extractor = MeasurementExtractor::new(0.5).unwrap();
        assert!(extractor.extract(&torso(0.3, 0.3, 0.5)).is_ok());
    }

    #[test]
    fn test_min_visibility_must_be_probability() {
        for bad in [f32::NAN, 1.5, -0.1, f32::INFINITY] {
            assert!(
                matches!(
                    MeasurementExtractor::new(bad),
                    Err(MeasurementError::InvalidMinVisibility(_))
                ),
                "{bad}"
            );
        }
        assert!(MeasurementExtractor::new(0.0).is_ok());
        assert!(MeasurementExtractor::new(1.0).is_ok());
    }

    #[test]
    fn test_nan_visibility_fails() {
        let mut landmarks = torso(0.3, 0.3, 0.9);
        landmarks.insert(Landmark::new(LandmarkName::LeftHip, 0.65, 0.6, f32::NAN));
        assert!(MeasurementExtractor::default().extract(&landmarks).is_err());
    }

    #[test]
    fn test_collapsed_hips_fail() {
        let err = MeasurementExtractor::default()
            .extract(&torso(0.3, 0.0, 0.9))
            .unwrap_err();
        assert_eq!(err, MeasurementError::DegenerateWidth("hip"));
    }

    #[test]
    fn test_empty_landmarks_fail() {
        let err = MeasurementExtractor::default()
            .extract(&Landmarks::new())
            .unwrap_err();
        assert_eq!(err, MeasurementError::MissingLandmark(LandmarkName::LeftShoulder));
    }
}
