//! Function-calling tools for the cooking agent.
//!
//! The chat model discovers tools through their OpenAI function schemas
//! ([`ToolRegistry::function_specs`]) and asks for them by name; the agent
//! dispatches each call through [`ToolRegistry::call`], which validates the
//! JSON arguments before handing them to [`Tool::execute`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ToolRegistry                 │
//! │  ┌──────────────┐ ┌─────────────┐ ┌────────┐ │
//! │  │search_recipes│ │extract_     │ │get_    │ │
//! │  │              │ │ingredients  │ │nutrit..│ │
//! │  └──────────────┘ └─────────────┘ └────────┘ │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!          ToolContext (recipe + nutrition tables)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use chefdesk::traits::{ToolContext, ToolRegistry};
//!
//! let tools = ToolRegistry::with_builtins();
//! let ctx = ToolContext::builtin();
//! assert_eq!(tools.len(), 3);
//! # let _ = ctx;
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::catalog::{NutritionSource, NutritionTable, RecipeSource, RecipeTable, ANY_CUISINE};
use crate::ingredients::{extract_ingredients_with, KeywordMatch};
use crate::nutrition::get_nutrition_info;
use crate::recipes::search_recipes;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool the chat model can call during a conversation turn.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use chefdesk::traits::{Tool, ToolContext};
///
/// pub struct OvenTemperatureTool;
///
/// #[async_trait]
/// impl Tool for OvenTemperatureTool {
///     fn name(&self) -> &str { "oven_temperature" }
///     fn description(&self) -> &str { "Convert Fahrenheit to Celsius" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({
///             "type": "object",
///             "properties": { "fahrenheit": { "type": "number" } },
///             "required": ["fahrenheit"]
///         })
///     }
///
///     async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
///         let f = params["fahrenheit"].as_f64().unwrap_or(0.0);
///         Ok(json!(format!("{:.0}°C", (f - 32.0) * 5.0 / 9.0)))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Function name the model uses, lowercase with underscores.
    fn name(&self) -> &str;

    /// One-line description the model reads to decide whether to call the tool.
    fn description(&self) -> &str;

    /// OpenAI function-calling JSON Schema for the arguments.
    fn parameters_schema(&self) -> Value;

    /// Execute with validated parameters (always a JSON object).
    ///
    /// String results are passed to the model verbatim; any other value is
    /// serialized to JSON text first.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Data the tools read from. Cheap to clone.
#[derive(Clone)]
pub struct ToolContext {
    recipes: Arc<dyn RecipeSource>,
    nutrition: Arc<dyn NutritionSource>,
    keyword_match: KeywordMatch,
}

impl ToolContext {
    pub fn new(recipes: Arc<dyn RecipeSource>, nutrition: Arc<dyn NutritionSource>) -> Self {
        Self {
            recipes,
            nutrition,
            keyword_match: KeywordMatch::default(),
        }
    }

    /// Context over the built-in recipe and nutrition tables.
    pub fn builtin() -> Self {
        Self::new(
            Arc::new(RecipeTable::builtin()),
            Arc::new(NutritionTable::builtin()),
        )
    }

    pub fn with_keyword_match(mut self, mode: KeywordMatch) -> Self {
        self.keyword_match = mode;
        self
    }

    pub fn recipes(&self) -> &dyn RecipeSource {
        self.recipes.as_ref()
    }

    pub fn nutrition(&self) -> &dyn NutritionSource {
        self.nutrition.as_ref()
    }

    pub fn keyword_match(&self) -> KeywordMatch {
        self.keyword_match
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

pub struct SearchRecipesTool;

#[async_trait]
impl Tool for SearchRecipesTool {
    fn name(&self) -> &str {
        "search_recipes"
    }

    fn description(&self) -> &str {
        "Search for recipes based on available ingredients and cuisine preference."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ingredients": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "List of ingredients to search for"
                },
                "cuisine": {
                    "type": "string",
                    "description": "Cuisine type (optional, e.g., Italian, Asian, Mexican)",
                    "default": ANY_CUISINE
                }
            },
            "required": ["ingredients"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let ingredients: Vec<&str> = params["ingredients"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        let cuisine = params["cuisine"].as_str().unwrap_or(ANY_CUISINE);

        let result = search_recipes(ctx.recipes(), &ingredients, cuisine);
        Ok(Value::String(result.to_string()))
    }
}

pub struct ExtractIngredientsTool;

#[async_trait]
impl Tool for ExtractIngredientsTool {
    fn name(&self) -> &str {
        "extract_ingredients"
    }

    fn description(&self) -> &str {
        "Extract ingredients from a recipe description or text."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "recipe_text": {
                    "type": "string",
                    "description": "The recipe text to extract ingredients from"
                }
            },
            "required": ["recipe_text"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let text = params["recipe_text"].as_str().unwrap_or("");
        let result = extract_ingredients_with(text, ctx.keyword_match());
        Ok(Value::String(result.to_string()))
    }
}

pub struct NutritionInfoTool;

#[async_trait]
impl Tool for NutritionInfoTool {
    fn name(&self) -> &str {
        "get_nutrition_info"
    }

    fn description(&self) -> &str {
        "Get estimated nutritional information for a dish."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dish_name": {
                    "type": "string",
                    "description": "Name of the dish to get nutrition info for"
                }
            },
            "required": ["dish_name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let dish = params["dish_name"].as_str().unwrap_or("");
        let result = get_nutrition_info(ctx.nutrition(), dish);
        Ok(Value::String(result.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Ordered set of tools offered to the chat model.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with `search_recipes`, `extract_ingredients` and
    /// `get_nutrition_info`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchRecipesTool));
        registry.register(Box::new(ExtractIngredientsTool));
        registry.register(Box::new(NutritionInfoTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// The `tools` array of an OpenAI chat completion request.
    pub fn function_specs(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters_schema(),
                    }
                })
            })
            .collect()
    }

    /// Validate `params` against the named tool's schema and execute it.
    pub async fn call(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("no tool registered with name: {}", name))?;
        let params = validate_params(&tool.parameters_schema(), &params)?;
        tool.execute(params, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter Validation
// ═══════════════════════════════════════════════════════════════════════

/// Validate JSON parameters against a tool's schema.
///
/// Checks required fields and top-level types, and injects defaults for
/// missing optional fields. Returns the (possibly enriched) parameters.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            bail!("missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();
    for (prop_name, prop_schema) in &properties {
        match params_obj.get(prop_name) {
            Some(value) => {
                if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
                    let type_ok = match expected {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !type_ok {
                        bail!(
                            "parameter '{}' must be of type '{}', got {}",
                            prop_name,
                            expected,
                            json_type_name(value)
                        );
                    }
                }
            }
            None => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(prop_name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
