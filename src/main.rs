//! # chefdesk CLI
//!
//! Runs the web server, and offers the cooking tools and the PDF summarizer
//! from the command line.
//!
//! ## Usage
//!
//! ```bash
//! chefdesk --config ./config/chefdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chefdesk serve` | Start the HTTP server |
//! | `chefdesk recipes --ingredients a,b` | Search the recipe table |
//! | `chefdesk extract-ingredients "<text>"` | Extract ingredient phrases |
//! | `chefdesk nutrition "<dish>"` | Look up nutrition for a dish |
//! | `chefdesk summarize <file.pdf>` | Summarize a PDF with the extraction model |
//! | `chefdesk chat "<message>"` | Ask the cooking agent one question |
//!
//! Credentials are read from the environment. A `.env` file in the working
//! directory is loaded first.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use chefdesk::agent::{CookingAgent, TIMEOUT_REPLY};
use chefdesk::catalog::{NutritionTable, RecipeTable, ANY_CUISINE};
use chefdesk::config::{self, Config};
use chefdesk::document::{process_document, GeminiClient};
use chefdesk::ingredients::{extract_ingredients_with, KeywordMatch};
use chefdesk::nutrition::get_nutrition_info;
use chefdesk::recipes::{parse_ingredient_list, search_recipes};
use chefdesk::server;
use chefdesk::traits::{ToolContext, ToolRegistry};

/// PDF summarizer and cooking assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/chefdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "chefdesk", version, about = "PDF summarizer and cooking assistant")]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply if it does not exist.
    #[arg(long, global = true, default_value = "./config/chefdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Find recipes that use the given ingredients.
    Recipes {
        /// Comma-separated ingredient list, e.g. `tomato,garlic`.
        #[arg(long)]
        ingredients: String,

        #[arg(long, default_value = ANY_CUISINE)]
        cuisine: String,
    },

    /// Extract ingredient phrases from recipe text.
    ExtractIngredients {
        text: String,

        /// Match keywords against whole words only.
        #[arg(long)]
        whole_token: bool,
    },

    /// Nutrition per serving for a dish.
    Nutrition { dish: String },

    /// Summarize a PDF: title, author and a short summary as JSON.
    Summarize { path: PathBuf },

    /// Send one message to the cooking agent.
    Chat { message: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chefdesk=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Recipes {
            ingredients,
            cuisine,
        } => {
            let list = parse_ingredient_list(&ingredients);
            if list.is_empty() {
                bail!("--ingredients must name at least one ingredient");
            }
            println!("{}", search_recipes(&RecipeTable::builtin(), &list, &cuisine));
        }
        Commands::ExtractIngredients { text, whole_token } => {
            let mode = KeywordMatch::from_whole_token(whole_token || cfg.ingredients.whole_token);
            println!("{}", extract_ingredients_with(&text, mode));
        }
        Commands::Nutrition { dish } => {
            println!("{}", get_nutrition_info(&NutritionTable::builtin(), &dish));
        }
        Commands::Summarize { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            let model = GeminiClient::from_config(&cfg.extraction)?;
            let doc = process_document(&model, &bytes).await?.with_filename(filename);
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Commands::Chat { message } => {
            run_chat(&cfg, &message).await?;
        }
    }

    Ok(())
}

async fn run_chat(cfg: &Config, message: &str) -> anyhow::Result<()> {
    if message.trim().is_empty() {
        bail!("message must not be empty");
    }

    let ctx = ToolContext::builtin()
        .with_keyword_match(KeywordMatch::from_whole_token(cfg.ingredients.whole_token));
    let agent = CookingAgent::from_config(&cfg.chat, Arc::new(ToolRegistry::with_builtins()), ctx)?;

    match tokio::time::timeout(cfg.chat.timeout(), agent.chat(message)).await {
        Ok(reply) => println!("{}", reply),
        Err(_) => bail!(TIMEOUT_REPLY),
    }
    Ok(())
}
