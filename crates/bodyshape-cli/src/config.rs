use anyhow::{Context, Result};
use bodyshape_core::{PoseModelConfig, Thresholds};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// CLI configuration: defaults, then an optional TOML file, then
/// `BODYSHAPE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the BlazePose landmark ONNX model.
    pub model_path: PathBuf,
    /// Minimum visibility for shoulder and hip landmarks.
    pub min_visibility: f32,
    /// Photos are downscaled so their longest side fits this many pixels.
    pub max_dimension: u32,
    /// Upper bound on one analysis, in seconds; 0 disables the limit.
    pub inference_timeout_secs: u64,
    /// Replacement recommendation table (TOML).
    pub recommendations: Option<PathBuf>,
    pub pose: PoseModelConfig,
    pub thresholds: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: bodyshape_core::default_model_dir().join(bodyshape_core::DEFAULT_MODEL_FILE),
            min_visibility: bodyshape_core::measurement::DEFAULT_MIN_VISIBILITY,
            max_dimension: bodyshape_core::photo::DEFAULT_MAX_DIMENSION,
            inference_timeout_secs: 0,
            recommendations: None,
            pose: PoseModelConfig::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from environment variables, read through `var`.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("BODYSHAPE_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(path) = var("BODYSHAPE_RECOMMENDATIONS") {
            self.recommendations = Some(PathBuf::from(path));
        }
        if let Some(v) = env_parse(&var, "BODYSHAPE_MIN_VISIBILITY") {
            self.min_visibility = v;
        }
        if let Some(v) = env_parse(&var, "BODYSHAPE_MIN_DETECTION_CONFIDENCE") {
            self.pose.min_detection_confidence = v;
        }
        if let Some(v) = env_parse(&var, "BODYSHAPE_MAX_DIMENSION") {
            self.max_dimension = v;
        }
        if let Some(v) = env_parse(&var, "BODYSHAPE_INFERENCE_TIMEOUT_SECS") {
            self.inference_timeout_secs = v;
        }
    }
}

fn env_parse<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment variable");
            None
        }
    }
}
