//! Read-only lookup tables behind the cooking tools.
//!
//! The matcher and the nutrition lookup only see the [`RecipeSource`] and
//! [`NutritionSource`] traits, so tests (or a future database-backed table)
//! can substitute their own data without touching the formatting logic.
//! [`RecipeTable::builtin`] and [`NutritionTable::builtin`] hold the small
//! tables the assistant ships with.

use std::collections::HashMap;

use crate::models::{NutritionRecord, RecipeCandidate};

/// Bucket name used literally and as the fallback for unknown cuisines.
pub const ANY_CUISINE: &str = "any";

/// A source of recipe candidates grouped by cuisine.
pub trait RecipeSource: Send + Sync {
    /// Return the recipes stored under an already-normalized cuisine key.
    fn lookup(&self, cuisine_key: &str) -> Option<&[RecipeCandidate]>;
}

/// A source of nutrition records keyed by lowercase dish name.
pub trait NutritionSource: Send + Sync {
    fn lookup(&self, dish_key: &str) -> Option<&NutritionRecord>;
}

/// In-memory recipe table. Recipe order within a bucket is preserved.
#[derive(Debug, Clone, Default)]
pub struct RecipeTable {
    buckets: HashMap<String, Vec<RecipeCandidate>>,
}

impl RecipeTable {
    pub fn from_buckets<I>(buckets: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<RecipeCandidate>)>,
    {
        Self {
            buckets: buckets.into_iter().collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::from_buckets([
            (
                "Italian".to_string(),
                vec![
                    RecipeCandidate::new(
                        "Pasta Carbonara",
                        &["pasta", "eggs", "bacon", "parmesan"],
                    ),
                    RecipeCandidate::new(
                        "Tomato Basil Pasta",
                        &["pasta", "tomato", "garlic", "basil"],
                    ),
                    RecipeCandidate::new("Garlic Pasta", &["pasta", "garlic", "olive oil"]),
                ],
            ),
            (
                "Asian".to_string(),
                vec![
                    RecipeCandidate::new(
                        "Stir Fry",
                        &["soy sauce", "garlic", "ginger", "vegetables"],
                    ),
                    RecipeCandidate::new(
                        "Fried Rice",
                        &["rice", "soy sauce", "eggs", "vegetables"],
                    ),
                    RecipeCandidate::new("Garlic Ginger Shrimp", &["shrimp", "garlic", "ginger"]),
                ],
            ),
            (
                ANY_CUISINE.to_string(),
                vec![
                    RecipeCandidate::new("Vegetable Soup", &["vegetables", "water", "salt"]),
                    RecipeCandidate::new("Eggs Scrambled", &["eggs", "butter", "salt"]),
                    RecipeCandidate::new("Grilled Chicken", &["chicken", "salt", "pepper"]),
                ],
            ),
        ])
    }

    /// Cuisine keys in sorted order.
    pub fn cuisines(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.buckets.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }
}

impl RecipeSource for RecipeTable {
    fn lookup(&self, cuisine_key: &str) -> Option<&[RecipeCandidate]> {
        self.buckets.get(cuisine_key).map(|r| r.as_slice())
    }
}

/// In-memory nutrition table.
#[derive(Debug, Clone, Default)]
pub struct NutritionTable {
    entries: HashMap<String, NutritionRecord>,
}

impl NutritionTable {
    /// Build a table; keys are lowercased on insert.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, NutritionRecord)>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::from_entries([
            ("pasta carbonara".to_string(), NutritionRecord::new(450, "20g", "55g", "18g")),
            ("tomato basil pasta".to_string(), NutritionRecord::new(380, "12g", "65g", "8g")),
            ("stir fry".to_string(), NutritionRecord::new(320, "25g", "35g", "10g")),
            ("fried rice".to_string(), NutritionRecord::new(400, "15g", "50g", "12g")),
            ("vegetable soup".to_string(), NutritionRecord::new(120, "5g", "20g", "2g")),
            ("grilled chicken".to_string(), NutritionRecord::new(280, "40g", "0g", "12g")),
        ])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NutritionSource for NutritionTable {
    fn lookup(&self, dish_key: &str) -> Option<&NutritionRecord> {
        self.entries.get(dish_key)
    }
}
