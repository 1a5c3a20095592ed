//! bodyshape-core: body-shape estimation from a single photo.
//!
//! A pose model locates shoulders and hips, the torso proportions are
//! classified by an ordered threshold rule list, and the resulting body type
//! selects a fixed set of style recommendations.

pub mod advisor;
pub mod classifier;
pub mod measurement;
pub mod photo;
pub mod pipeline;
pub mod pose;
pub mod provider;
pub mod types;

pub use advisor::{Advisor, RecommendationRecord, RecommendationTable};
pub use classifier::{ClassificationResult, Classifier, Thresholds};
pub use measurement::{MeasurementExtractor, Measurements, Ratios};
pub use pipeline::{Analysis, AnalysisError, Analyzer};
pub use pose::{PoseLandmarker, PoseModelConfig};
pub use provider::{LandmarkProvider, RecordedLandmarks};
pub use types::{BodyType, Landmark, LandmarkName, Landmarks};

use std::path::PathBuf;

/// File name of the default pose landmark model.
pub const DEFAULT_MODEL_FILE: &str = "pose_landmark_full.onnx";

/// Directory searched for model files: `$XDG_DATA_HOME/bodyshape/models`,
/// falling back to `~/.local/share/bodyshape/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("bodyshape")
        .join("models")
}
