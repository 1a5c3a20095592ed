//! Photo → landmarks → measurements → classification → recommendations.

use crate::advisor::{Advisor, RecommendationRecord};
use crate::classifier::{ClassificationResult, Classifier, ClassifierError};
use crate::measurement::{MeasurementError, MeasurementExtractor, Measurements};
use crate::photo::{self, PhotoError, DEFAULT_MAX_DIMENSION};
use crate::provider::{LandmarkProvider, ProviderError};
use crate::types::{BodyType, Landmarks};
use image::RgbImage;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("could not detect pose")]
    InsufficientLandmarks(#[source] MeasurementError),
    #[error("could not detect pose")]
    NoPose(#[source] ProviderError),
    #[error("invalid image")]
    InvalidImage(#[from] PhotoError),
    #[error("pose model unavailable")]
    ProviderUnavailable(#[source] ProviderError),
    #[error("pose estimation failed")]
    Inference(#[source] ProviderError),
    #[error(transparent)]
    InvalidRatios(#[from] ClassifierError),
}

impl AnalysisError {
    /// Wrap a provider construction failure. These are fatal for the process,
    /// unlike per-photo errors.
    pub fn provider_unavailable(err: ProviderError) -> Self {
        Self::ProviderUnavailable(err)
    }

    /// True when the photo itself was fine but no usable body was found.
    pub fn is_no_pose(&self) -> bool {
        matches!(self, Self::InsufficientLandmarks(_) | Self::NoPose(_))
    }

    /// What the user can do about it.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::InsufficientLandmarks(_) | Self::NoPose(_) => {
                "Make sure your full body is visible, facing the camera, in good lighting."
            }
            Self::InvalidImage(_) => "Use a readable JPEG or PNG photo.",
            Self::ProviderUnavailable(_) => {
                "Check the pose model path and that ONNX Runtime is available."
            }
            Self::Inference(_) => "Try again, or with a different photo.",
            Self::InvalidRatios(_) => {
                "Try a photo where shoulders and hips are clearly separated."
            }
        }
    }
}

impl From<MeasurementError> for AnalysisError {
    fn from(err: MeasurementError) -> Self {
        Self::InsufficientLandmarks(err)
    }
}

impl From<ProviderError> for AnalysisError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NoPoseDetected => Self::NoPose(err),
            ProviderError::ModelNotFound(_) | ProviderError::Initialization(_) => {
                Self::ProviderUnavailable(err)
            }
            ProviderError::InferenceFailed(_) | ProviderError::Ort(_) => Self::Inference(err),
        }
    }
}

/// Full result of analyzing one photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    #[serde(flatten)]
    pub classification: ClassificationResult,
    pub display_name: &'static str,
    pub measurements: Measurements,
    pub recommendations: RecommendationRecord,
}

impl Analysis {
    pub fn body_type(&self) -> BodyType {
        self.classification.body_type
    }

    pub fn confidence(&self) -> f32 {
        self.classification.confidence
    }
}

/// Owns one landmark provider and the read-only stages behind it.
///
/// The provider is created once by the caller and reused for every photo.
pub struct Analyzer<P> {
    provider: P,
    extractor: MeasurementExtractor,
    classifier: Classifier,
    advisor: Advisor,
    max_dimension: u32,
}

impl<P: LandmarkProvider> Analyzer<P> {
    pub fn new(
        provider: P,
        extractor: MeasurementExtractor,
        classifier: Classifier,
        advisor: Advisor,
    ) -> Self {
        Self {
            provider,
            extractor,
            classifier,
            advisor,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Bound the photo resolution handed to the provider.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn analyze_path(&mut self, path: &Path) -> Result<Analysis, AnalysisError> {
        let decoded = photo::load_path(path)?;
        let image = photo::prepare(&decoded, self.max_dimension)?;
        tracing::debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "photo loaded"
        );
        self.analyze_image(&image)
    }

    pub fn analyze_bytes(&mut self, bytes: &[u8]) -> Result<Analysis, AnalysisError> {
        let decoded = photo::load_bytes(bytes)?;
        let image = photo::prepare(&decoded, self.max_dimension)?;
        self.analyze_image(&image)
    }

    pub fn analyze_image(&mut self, image: &RgbImage) -> Result<Analysis, AnalysisError> {
        let landmarks = self.provider.detect(image)?;
        tracing::debug!(count = landmarks.len(), "landmarks detected");
        self.analyze_landmarks(&landmarks)
    }

    /// Run the stages after pose estimation.
    pub fn analyze_landmarks(&self, landmarks: &Landmarks) -> Result<Analysis, AnalysisError> {
        let measurements = self.extractor.extract(landmarks)?;
        let classification = self.classifier.classify(measurements.ratios())?;
        let body_type = classification.body_type;

        tracing::info!(
            body_type = body_type.as_str(),
            confidence = classification.confidence,
            "analysis complete"
        );

        Ok(Analysis {
            classification,
            display_name: body_type.display_name(),
            measurements,
            recommendations: self.advisor.advise(body_type).clone(),
        })
    }
}
