//! Style recommendations per body type.
//!
//! The built-in table is embedded at compile time from
//! `data/recommendations.toml`; a file with the same layout can replace it.

use crate::types::BodyType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const BUILTIN_RECOMMENDATIONS: &str = include_str!("../data/recommendations.toml");

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("failed to read recommendations from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad recommendations TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("recommendations for {body_type} have no {category}")]
    EmptyCategory {
        body_type: BodyType,
        category: &'static str,
    },
}

/// Profile and clothing suggestions for one body type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    /// Short paragraph describing the silhouette.
    pub description: String,
    pub characteristics: Vec<String>,
    /// What the suggestions aim for.
    pub goals: Vec<String>,
    pub tops: Vec<String>,
    pub bottoms: Vec<String>,
    pub dresses: Vec<String>,
    pub accessories: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

impl RecommendationRecord {
    /// Profile lists that must be non-empty, in display order.
    pub fn profile(&self) -> [(&'static str, &[String]); 2] {
        [
            ("characteristics", self.characteristics.as_slice()),
            ("goals", self.goals.as_slice()),
        ]
    }

    /// Category name and items, in display order.
    pub fn categories(&self) -> [(&'static str, &[String]); 4] {
        [
            ("tops", self.tops.as_slice()),
            ("bottoms", self.bottoms.as_slice()),
            ("dresses", self.dresses.as_slice()),
            ("accessories", self.accessories.as_slice()),
        ]
    }
}

/// One record per body type. Every type is a required TOML table, so a
/// parsed table always covers the whole enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationTable {
    rectangle: RecommendationRecord,
    hourglass: RecommendationRecord,
    inverted_triangle: RecommendationRecord,
    pear: RecommendationRecord,
    apple: RecommendationRecord,
}

impl RecommendationTable {
    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self, AdvisorError> {
        Self::from_toml_str(BUILTIN_RECOMMENDATIONS)
    }

    pub fn from_toml_str(src: &str) -> Result<Self, AdvisorError> {
        let table: Self = toml::from_str(src)?;
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, AdvisorError> {
        let src = std::fs::read_to_string(path).map_err(|source| AdvisorError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_toml_str(&src)?;
        tracing::info!(path = %path.display(), "loaded recommendation table");
        Ok(table)
    }

    pub fn get(&self, body_type: BodyType) -> &RecommendationRecord {
        match body_type {
            BodyType::Rectangle => &self.rectangle,
            BodyType::Hourglass => &self.hourglass,
            BodyType::InvertedTriangle => &self.inverted_triangle,
            BodyType::Pear => &self.pear,
            BodyType::Apple => &self.apple,
        }
    }

    fn validate(&self) -> Result<(), AdvisorError> {
        for body_type in BodyType::ALL {
            let record = self.get(body_type);
            if record.description.trim().is_empty() {
                return Err(AdvisorError::EmptyCategory {
                    body_type,
                    category: "description",
                });
            }
            for (category, items) in record.profile().into_iter().chain(record.categories()) {
                if items.iter().all(|item| item.trim().is_empty()) {
                    return Err(AdvisorError::EmptyCategory { body_type, category });
                }
            }
        }
        Ok(())
    }
}

/// Looks up recommendations in a table fixed at construction.
#[derive(Debug, Clone)]
pub struct Advisor {
    table: RecommendationTable,
}

impl Advisor {
    pub fn new(table: RecommendationTable) -> Self {
        Self { table }
    }

    pub fn advise(&self, body_type: BodyType) -> &RecommendationRecord {
        self.table.get(body_type)
    }
}
