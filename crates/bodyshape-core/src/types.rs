use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Body points emitted by BlazePose-family landmark models, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkName {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl LandmarkName {
    /// Number of body landmarks in a full pose.
    pub const COUNT: usize = 33;

    pub const ALL: [LandmarkName; Self::COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    /// Map a model output position to its landmark. Positions past the body
    /// points (auxiliary ROI landmarks) return `None`.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LandmarkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single detected body point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: LandmarkName,
    /// Horizontal position, normalized to image width (0–1).
    pub x: f32,
    /// Vertical position, normalized to image height (0–1).
    pub y: f32,
    /// Relative depth as reported by the model; not used for classification.
    #[serde(default)]
    pub z: f32,
    /// Probability that the point is visible in the image (0–1).
    pub visibility: f32,
}

impl Landmark {
    pub fn new(name: LandmarkName, x: f32, y: f32, visibility: f32) -> Self {
        Self { name, x, y, z: 0.0, visibility }
    }

    /// Euclidean distance in the image plane.
    pub fn distance(&self, other: &Landmark) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// The landmark set produced for one image.
///
/// Serialized as a flat list of landmarks; a repeated name keeps the last entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct Landmarks {
    points: BTreeMap<LandmarkName, Landmark>,
}

impl Landmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, landmark: Landmark) {
        self.points.insert(landmark.name, landmark);
    }

    pub fn get(&self, name: LandmarkName) -> Option<&Landmark> {
        self.points.get(&name)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.points.values()
    }
}

impl From<Vec<Landmark>> for Landmarks {
    fn from(list: Vec<Landmark>) -> Self {
        list.into_iter().collect()
    }
}

impl From<Landmarks> for Vec<Landmark> {
    fn from(landmarks: Landmarks) -> Self {
        landmarks.points.into_values().collect()
    }
}

impl FromIterator<Landmark> for Landmarks {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        let mut landmarks = Landmarks::new();
        for landmark in iter {
            landmarks.insert(landmark);
        }
        landmarks
    }
}

/// Body-shape category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    Rectangle,
    Hourglass,
    InvertedTriangle,
    Pear,
    Apple,
}

impl BodyType {
    pub const ALL: [BodyType; 5] = [
        Self::Rectangle,
        Self::Hourglass,
        Self::InvertedTriangle,
        Self::Pear,
        Self::Apple,
    ];

    /// Stable machine label, as used in JSON output and the recommendation table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Hourglass => "hourglass",
            Self::InvertedTriangle => "inverted_triangle",
            Self::Pear => "pear",
            Self::Apple => "apple",
        }
    }

    /// Human-facing name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Rectangle => "Rectangle (I)",
            Self::Hourglass => "Hourglass",
            Self::InvertedTriangle => "Inverted Triangle",
            Self::Pear => "Pear (Triangle)",
            Self::Apple => "Apple (Round)",
        }
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown body type '{0}' (expected one of: rectangle, hourglass, inverted_triangle, pear, apple)")]
pub struct ParseBodyTypeError(String);

impl FromStr for BodyType {
    type Err = ParseBodyTypeError;

    /// Accepts the machine label or the display name, case-insensitively.
    /// Hyphens and spaces are treated as underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let found = BodyType::ALL.into_iter().find(|ty| {
            let display = ty.display_name().to_ascii_lowercase().replace(' ', "_");
            key == ty.as_str() || key == display
        });
        found.ok_or_else(|| ParseBodyTypeError(s.to_string()))
    }
}
