//! Recipe matching by ingredient overlap.
//!
//! A search resolves a cuisine bucket, counts how many of the caller's
//! ingredients each recipe uses (case-insensitive, whole ingredient names),
//! drops recipes with no overlap and orders the rest by overlap. The
//! [`RecipeSearch`] result renders the plain-text report the chat model and
//! the HTTP API both consume.

use std::fmt;

use crate::catalog::{RecipeSource, ANY_CUISINE};
use crate::models::MatchResult;

/// Outcome of [`search_recipes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeSearch {
    /// At least one recipe matched; sorted by `matched_count`, descending.
    Found(Vec<MatchResult>),
    /// Nothing matched. Carries the request as the caller supplied it.
    NoMatches {
        cuisine: String,
        ingredients: Vec<String>,
    },
}

impl RecipeSearch {
    pub fn matches(&self) -> &[MatchResult] {
        match self {
            RecipeSearch::Found(results) => results,
            RecipeSearch::NoMatches { .. } => &[],
        }
    }
}

impl fmt::Display for RecipeSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeSearch::Found(results) => {
                writeln!(f, "Found {} recipes:", results.len())?;
                for r in results {
                    writeln!(
                        f,
                        "- {} (matches {} ingredients: {})",
                        r.name,
                        r.matched_count,
                        r.ingredients.join(", ")
                    )?;
                }
                Ok(())
            }
            RecipeSearch::NoMatches {
                cuisine,
                ingredients,
            } => write!(
                f,
                "No recipes found with {} cuisine and ingredients: {}",
                cuisine,
                ingredients.join(", ")
            ),
        }
    }
}

/// Normalize a caller-supplied cuisine into a table key.
///
/// `"any"` is kept as is; everything else gets its first character
/// uppercased and the rest lowercased (`"iTALIAN"` → `"Italian"`).
pub fn normalize_cuisine(cuisine: &str) -> String {
    if cuisine == ANY_CUISINE {
        return ANY_CUISINE.to_string();
    }
    let mut chars = cuisine.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Score every recipe of the resolved cuisine bucket against `ingredients`.
///
/// Unknown cuisines fall back to the `"any"` bucket. Never fails.
pub fn search_recipes<S>(
    source: &dyn RecipeSource,
    ingredients: &[S],
    cuisine: &str,
) -> RecipeSearch
where
    S: AsRef<str>,
{
    let key = normalize_cuisine(cuisine);
    let recipes = source
        .lookup(&key)
        .or_else(|| source.lookup(ANY_CUISINE))
        .unwrap_or(&[]);

    let wanted: Vec<String> = ingredients
        .iter()
        .map(|i| i.as_ref().to_lowercase())
        .collect();

    let mut results: Vec<MatchResult> = recipes
        .iter()
        .filter_map(|recipe| {
            let have: Vec<String> = recipe.ingredients.iter().map(|i| i.to_lowercase()).collect();
            let matched_count = wanted.iter().filter(|w| have.contains(w)).count();
            (matched_count > 0).then(|| MatchResult {
                name: recipe.name.clone(),
                matched_count,
                ingredients: recipe.ingredients.clone(),
            })
        })
        .collect();

    if results.is_empty() {
        return RecipeSearch::NoMatches {
            cuisine: cuisine.to_string(),
            ingredients: ingredients.iter().map(|i| i.as_ref().to_string()).collect(),
        };
    }

    // sort_by is stable: equal counts keep table order
    results.sort_by(|a, b| b.matched_count.cmp(&a.matched_count));
    RecipeSearch::Found(results)
}

/// Split a comma-separated ingredient list, trimming and dropping blanks.
pub fn parse_ingredient_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
