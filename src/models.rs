//! Core data types shared across the lookup tools, the extraction client,
//! and the HTTP layer.

use serde::{Deserialize, Serialize};

/// A recipe in a cuisine bucket of the lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeCandidate {
    pub name: String,
    pub ingredients: Vec<String>,
}

impl RecipeCandidate {
    pub fn new(name: &str, ingredients: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            ingredients: ingredients.iter().map(|i| i.to_string()).collect(),
        }
    }
}

/// A candidate recipe scored against the caller's ingredients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub name: String,
    pub matched_count: usize,
    pub ingredients: Vec<String>,
}

/// Estimated nutrition per serving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionRecord {
    pub calories: u32,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

impl NutritionRecord {
    pub fn new(calories: u32, protein: &str, carbs: &str, fat: &str) -> Self {
        Self {
            calories,
            protein: protein.to_string(),
            carbs: carbs.to_string(),
            fat: fat.to_string(),
        }
    }
}

/// Title, author and summary the extraction model produced for an upload.
///
/// `filename` is empty until the upload handler attaches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub title: String,
    pub author: String,
    pub summary: String,
    #[serde(default)]
    pub filename: String,
}

impl ExtractedDocument {
    /// Placeholder returned when the model reply is not the expected JSON.
    pub fn unparseable() -> Self {
        Self {
            title: "Error".to_string(),
            author: "Error".to_string(),
            summary: "Could not parse AI response.".to_string(),
            filename: String::new(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}
