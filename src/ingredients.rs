//! Keyword-driven ingredient extraction from free-form recipe text.
//!
//! The text is lowercased and split on whitespace. Every token that looks
//! like a unit or a food keyword is reported together with its neighbours,
//! so `"add 2 cups flour"` yields the phrase `"2 cups flour"`.
//!
//! By default a token is flagged when it *contains* a keyword. Short
//! keywords such as `"g"` or `"oil"` therefore also flag unrelated words
//! (`"bring"`, `"boil"`). [`KeywordMatch::WholeToken`] compares against the
//! token with surrounding punctuation stripped instead.

use std::fmt;

/// Phrases beyond this count are dropped from the report.
pub const MAX_PHRASES: usize = 15;

pub const INGREDIENT_KEYWORDS: &[&str] = &[
    "cup", "tablespoon", "teaspoon", "tbsp", "tsp", "oz", "grams", "g", "ml", "liter", "pound",
    "lb", "kg", "clove", "piece", "slice", "flour", "sugar", "salt", "pepper", "butter", "oil",
    "water", "eggs", "milk", "cheese", "tomato", "garlic", "onion", "potato", "rice", "pasta",
    "bread", "chicken", "beef", "fish", "shrimp", "vegetables", "herbs", "spices", "vanilla",
    "chocolate", "nuts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeywordMatch {
    /// Flag a token if any keyword occurs anywhere inside it.
    #[default]
    Substring,
    /// Flag a token only if it equals a keyword once punctuation is trimmed.
    WholeToken,
}

impl KeywordMatch {
    pub fn from_whole_token(whole_token: bool) -> Self {
        if whole_token {
            KeywordMatch::WholeToken
        } else {
            KeywordMatch::Substring
        }
    }

    fn flags(self, token: &str) -> bool {
        match self {
            KeywordMatch::Substring => INGREDIENT_KEYWORDS.iter().any(|k| token.contains(k)),
            KeywordMatch::WholeToken => {
                let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
                INGREDIENT_KEYWORDS.iter().any(|k| *k == bare)
            }
        }
    }
}

/// Outcome of [`extract_ingredients`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngredientExtraction {
    /// Unique phrases in first-seen order, at most [`MAX_PHRASES`].
    Found(Vec<String>),
    NoneFound,
}

impl IngredientExtraction {
    pub fn phrases(&self) -> &[String] {
        match self {
            IngredientExtraction::Found(p) => p,
            IngredientExtraction::NoneFound => &[],
        }
    }
}

impl fmt::Display for IngredientExtraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngredientExtraction::Found(phrases) => {
                write!(f, "Extracted ingredients:")?;
                for p in phrases {
                    write!(f, "\n- {}", p)?;
                }
                Ok(())
            }
            IngredientExtraction::NoneFound => {
                write!(f, "No ingredients found in the provided text.")
            }
        }
    }
}

/// Extract ingredient phrases with the default substring matching.
pub fn extract_ingredients(text: &str) -> IngredientExtraction {
    extract_ingredients_with(text, KeywordMatch::default())
}

pub fn extract_ingredients_with(text: &str, mode: KeywordMatch) -> IngredientExtraction {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let mut phrases: Vec<String> = Vec::new();
    for (i, word) in words.iter().enumerate() {
        if !mode.flags(word) {
            continue;
        }
        let start = i.saturating_sub(1);
        let end = (i + 2).min(words.len());
        let phrase = words[start..end].join(" ");
        if !phrases.contains(&phrase) {
            phrases.push(phrase);
        }
    }

    if phrases.is_empty() {
        return IngredientExtraction::NoneFound;
    }
    phrases.truncate(MAX_PHRASES);
    IngredientExtraction::Found(phrases)
}
