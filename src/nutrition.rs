//! Nutrition lookup by dish name.

use std::fmt;

use crate::catalog::NutritionSource;
use crate::models::NutritionRecord;

/// Outcome of [`get_nutrition_info`]. Both variants keep the dish name as
/// the caller spelled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NutritionLookup {
    Found {
        dish: String,
        record: NutritionRecord,
    },
    NotAvailable {
        dish: String,
    },
}

impl fmt::Display for NutritionLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NutritionLookup::Found { dish, record } => write!(
                f,
                "Nutrition info for {} (per serving):\n- Calories: {}\n- Protein: {}\n\
                 - Carbs: {}\n- Fat: {}",
                dish, record.calories, record.protein, record.carbs, record.fat
            ),
            NutritionLookup::NotAvailable { dish } => write!(
                f,
                "Nutrition data not available for {}. Please ask about a specific recipe.",
                dish
            ),
        }
    }
}

/// Exact, case-insensitive lookup. No fuzzy matching.
pub fn get_nutrition_info(source: &dyn NutritionSource, dish: &str) -> NutritionLookup {
    match source.lookup(&dish.to_lowercase()) {
        Some(record) => NutritionLookup::Found {
            dish: dish.to_string(),
            record: record.clone(),
        },
        None => NutritionLookup::NotAvailable {
            dish: dish.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NutritionTable;

    #[test]
    fn carbonara_any_case() {
        let table = NutritionTable::builtin();
        for dish in ["Pasta Carbonara", "pasta carbonara", "PASTA CARBONARA"] {
            match get_nutrition_info(&table, dish) {
                NutritionLookup::Found { record, .. } => {
                    assert_eq!(record, NutritionRecord::new(450, "20g", "55g", "18g"));
                }
                other => panic!("expected a record for {dish}, got {other:?}"),
            }
        }
    }

    #[test]
    fn found_report_has_four_lines() {
        let table = NutritionTable::builtin();
        let report = get_nutrition_info(&table, "Grilled Chicken").to_string();
        assert_eq!(
            report,
            "Nutrition info for Grilled Chicken (per serving):\n- Calories: 280\n\
             - Protein: 40g\n- Carbs: 0g\n- Fat: 12g"
        );
    }

    #[test]
    fn unknown_dish_names_it() {
        let table = NutritionTable::builtin();
        let result = get_nutrition_info(&table, "Unknown Dish");
        assert_eq!(
            result.to_string(),
            "Nutrition data not available for Unknown Dish. Please ask about a specific recipe."
        );
    }

    #[test]
    fn no_fuzzy_matching() {
        let table = NutritionTable::builtin();
        assert!(matches!(
            get_nutrition_info(&table, "carbonara"),
            NutritionLookup::NotAvailable { .. }
        ));
        assert!(matches!(
            get_nutrition_info(&table, " stir fry "),
            NutritionLookup::NotAvailable { .. }
        ));
    }
}
