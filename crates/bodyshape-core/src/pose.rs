//! BlazePose landmark model via ONNX Runtime.
//!
//! Runs the full-body landmark stage on a letterboxed copy of the whole photo.
//! There is no separate person-detection stage, so the subject should fill
//! most of the frame, as in a typical full-length photo.

use crate::provider::{LandmarkProvider, ProviderError};
use crate::types::{Landmark, LandmarkName, Landmarks};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::Path;

// --- Named constants (no magic numbers) ---
const BLAZEPOSE_INPUT_SIZE: usize = 256;
/// 33 body landmarks followed by 6 auxiliary ROI landmarks.
const BLAZEPOSE_TOTAL_LANDMARKS: usize = 39;
/// x, y, z, visibility; presence is optional.
const MIN_VALUES_PER_LANDMARK: usize = 4;
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.5;

/// Output tensor names used by common BlazePose exports.
const LANDMARK_OUTPUT_NAMES: [&str; 2] = ["Identity", "ld_3d"];
const PRESENCE_OUTPUT_NAMES: [&str; 2] = ["Identity_1", "output_poseflag"];

/// Memory layout of the model's image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, as exported from TFLite.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`.
    Nchw,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseModelConfig {
    /// Side of the square model input, in pixels.
    pub input_size: usize,
    pub layout: TensorLayout,
    /// Per-landmark visibility values are raw logits rather than probabilities.
    pub logits: bool,
    /// The pose-presence output is a raw logit. BlazePose exports emit a
    /// probability there.
    pub presence_logits: bool,
    /// Pose presence below this score is reported as "no pose".
    pub min_detection_confidence: f32,
}

impl Default for PoseModelConfig {
    fn default() -> Self {
        Self {
            input_size: BLAZEPOSE_INPUT_SIZE,
            layout: TensorLayout::default(),
            logits: true,
            presence_logits: false,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
        }
    }
}

/// Placement of the resized photo inside the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    new_width: u32,
    new_height: u32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, size: usize) -> Self {
        let size = size as u32;
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            new_width,
            new_height,
            pad_x: (size - new_width) / 2,
            pad_y: (size - new_height) / 2,
        }
    }

    /// Map a point in model input pixels to normalized photo coordinates.
    fn to_normalized(self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.new_width as f32,
            (y - self.pad_y as f32) / self.new_height as f32,
        )
    }
}

/// Which session outputs hold the landmarks and the pose-presence flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputIndices {
    landmarks: usize,
    presence: Option<usize>,
}

/// BlazePose-based landmark provider.
pub struct PoseLandmarker {
    session: Session,
    config: PoseModelConfig,
    outputs: OutputIndices,
}

impl PoseLandmarker {
    /// Load a BlazePose landmark ONNX model from the given path.
    pub fn load(model_path: &Path, config: PoseModelConfig) -> Result<Self, ProviderError> {
        if !model_path.exists() {
            return Err(ProviderError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded pose landmark model"
        );

        if output_names.is_empty() {
            return Err(ProviderError::Initialization(
                "pose model declares no outputs".into(),
            ));
        }

        let outputs = discover_outputs(&output_names);
        tracing::debug!(?outputs, "pose output tensor mapping");

        Ok(Self {
            session,
            config,
            outputs,
        })
    }
}

impl LandmarkProvider for PoseLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<Landmarks, ProviderError> {
        let config = self.config;
        let indices = self.outputs;
        let (input, letterbox) = preprocess(image, config.input_size, config.layout);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        if let Some(presence_idx) = indices.presence {
            let (_, flag) = outputs[presence_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| ProviderError::InferenceFailed(format!("pose presence: {e}")))?;
            pose_present(flag, &config)?;
        }

        let (_, raw) = outputs[indices.landmarks]
            .try_extract_tensor::<f32>()
            .map_err(|e| ProviderError::InferenceFailed(format!("landmarks: {e}")))?;

        decode_landmarks(raw, letterbox, config.logits)
    }
}

/// Gate on the pose-presence output.
fn pose_present(flag: &[f32], config: &PoseModelConfig) -> Result<(), ProviderError> {
    let raw = flag
        .first()
        .copied()
        .ok_or_else(|| ProviderError::InferenceFailed("pose presence tensor is empty".into()))?;
    let score = activate(raw, config.presence_logits);
    if score.is_nan() || score < config.min_detection_confidence {
        tracing::debug!(score, "pose presence below threshold");
        return Err(ProviderError::NoPoseDetected);
    }
    Ok(())
}

/// Letterbox the photo into a `size`×`size` float tensor scaled to [0, 1].
/// Padding is black.
fn preprocess(image: &RgbImage, size: usize, layout: TensorLayout) -> (Array4<f32>, Letterbox) {
    let letterbox = Letterbox::fit(image.width(), image.height(), size);
    let resized = image::imageops::resize(
        image,
        letterbox.new_width,
        letterbox.new_height,
        FilterType::Triangle,
    );

    let mut tensor = match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, size, size, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, size, size)),
    };

    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + letterbox.pad_x) as usize;
        let ty = (y + letterbox.pad_y) as usize;
        for (c, &value) in pixel.0.iter().enumerate() {
            let normalized = value as f32 / 255.0;
            match layout {
                TensorLayout::Nhwc => tensor[[0, ty, tx, c]] = normalized,
                TensorLayout::Nchw => tensor[[0, c, ty, tx]] = normalized,
            }
        }
    }

    (tensor, letterbox)
}

/// Discover output tensor roles by name.
///
/// MediaPipe's TFLite-converted models name the landmark tensor "Identity"
/// and the presence flag "Identity_1"; other exports use "ld_3d" and
/// "output_poseflag". Unrecognized names fall back to positional ordering:
/// landmarks first, presence second.
fn discover_outputs(names: &[String]) -> OutputIndices {
    let find = |candidates: &[&str]| -> Option<usize> {
        names.iter().position(|n| candidates.contains(&n.as_str()))
    };

    match find(&LANDMARK_OUTPUT_NAMES) {
        Some(landmarks) => {
            tracing::info!("pose model: using name-based output tensor mapping");
            OutputIndices {
                landmarks,
                presence: find(&PRESENCE_OUTPUT_NAMES),
            }
        }
        None => {
            tracing::info!(
                ?names,
                "pose model: output names not recognized, using positional mapping [0]=landmarks, [1]=presence"
            );
            OutputIndices {
                landmarks: 0,
                presence: (names.len() > 1).then_some(1),
            }
        }
    }
}

/// Decode the flat landmark tensor into body landmarks.
///
/// Coordinates are in model input pixels; each landmark carries at least
/// x, y, z and visibility.
fn decode_landmarks(raw: &[f32], letterbox: Letterbox, logits: bool) -> Result<Landmarks, ProviderError> {
    let count = [BLAZEPOSE_TOTAL_LANDMARKS, LandmarkName::COUNT]
        .into_iter()
        .find(|&n| raw.len() % n == 0 && raw.len() / n >= MIN_VALUES_PER_LANDMARK)
        .ok_or_else(|| {
            ProviderError::InferenceFailed(format!(
                "landmark tensor has {} values, expected 33 or 39 landmarks × ≥{MIN_VALUES_PER_LANDMARK}",
                raw.len()
            ))
        })?;
    let stride = raw.len() / count;

    let landmarks = LandmarkName::ALL
        .iter()
        .map(|&name| {
            let off = name.index() * stride;
            let (x, y) = letterbox.to_normalized(raw[off], raw[off + 1]);
            Landmark {
                name,
                x,
                y,
                z: raw[off + 2],
                visibility: activate(raw[off + 3], logits),
            }
        })
        .collect();

    Ok(landmarks)
}

/// Convert a raw score to a probability.
fn activate(raw: f32, logits: bool) -> f32 {
    if logits {
        1.0 / (1.0 + (-raw).exp())
    } else {
        raw.clamp(0.0, 1.0)
    }
}
