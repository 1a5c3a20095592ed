//! Landmark providers: anything that turns a photo into body landmarks.

use crate::types::Landmarks;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("model file not found: {0}; download a BlazePose landmark model in ONNX format")]
    ModelNotFound(String),
    #[error("pose model failed to initialize: {0}")]
    Initialization(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("no pose detected")]
    NoPoseDetected,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Pose estimation capability consumed by the pipeline.
pub trait LandmarkProvider {
    /// Detect the landmarks of the most prominent body in `image`.
    ///
    /// Coordinates are normalized to the image size. Returns
    /// [`ProviderError::NoPoseDetected`] when no body is found.
    fn detect(&mut self, image: &RgbImage) -> Result<Landmarks, ProviderError>;
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect(&mut self, image: &RgbImage) -> Result<Landmarks, ProviderError> {
        (**self).detect(image)
    }
}

/// Replays a fixed landmark set for every image, e.g. landmarks exported
/// from another pose tool. An empty set behaves as "no pose".
#[derive(Debug, Clone, Default)]
pub struct RecordedLandmarks {
    landmarks: Landmarks,
}

impl RecordedLandmarks {
    pub fn new(landmarks: Landmarks) -> Self {
        Self { landmarks }
    }

    /// Load a JSON list of landmarks.
    pub fn from_json_file(path: &Path) -> Result<Self, ProviderError> {
        let src = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Initialization(format!("reading {}: {e}", path.display()))
        })?;
        let landmarks: Landmarks = serde_json::from_str(&src).map_err(|e| {
            ProviderError::Initialization(format!("parsing {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), count = landmarks.len(), "loaded recorded landmarks");
        Ok(Self::new(landmarks))
    }
}

impl LandmarkProvider for RecordedLandmarks {
    fn detect(&mut self, _image: &RgbImage) -> Result<Landmarks, ProviderError> {
        if self.landmarks.is_empty() {
            return Err(ProviderError::NoPoseDetected);
        }
        Ok(self.landmarks.clone())
    }
}
