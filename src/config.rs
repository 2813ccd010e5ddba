//! TOML configuration.
//!
//! Every section and field has a default, so a missing config file yields a
//! working setup ([`Config::minimal`]). Credentials never live in the file:
//! each section names the environment variable that holds its secret, and
//! `main` loads a `.env` file before reading them.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [chat]
//! base_url = "https://models.github.ai/inference"
//! model = "openai/gpt-4o"
//! timeout_secs = 30
//!
//! [extraction]
//! model = "gemini-2.5-flash"
//!
//! [storage]
//! container = "pdf-uploads"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingredients: IngredientsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Request body limit for `POST /upload`.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

/// Chat model settings for the cooking agent.
#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Name of the environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Wall-clock limit for one chat turn, enforced by the HTTP handler.
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on the accumulated reply, in characters.
    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,
    /// How many tool-call round trips a single turn may take.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Upper bound on a single stream line and on one tool call's
    /// accumulated arguments, in bytes.
    #[serde(default = "default_max_stream_bytes")]
    pub max_stream_bytes: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            model: default_chat_model(),
            token_env: default_token_env(),
            timeout_secs: default_chat_timeout_secs(),
            max_response_chars: default_max_response_chars(),
            max_tool_rounds: default_max_tool_rounds(),
            max_stream_bytes: default_max_stream_bytes(),
        }
    }
}

impl ChatConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_chat_base_url() -> String {
    "https://models.github.ai/inference".to_string()
}
fn default_chat_model() -> String {
    "openai/gpt-4o".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_chat_timeout_secs() -> u64 {
    30
}
fn default_max_response_chars() -> usize {
    16_000
}
fn default_max_tool_rounds() -> usize {
    5
}
fn default_max_stream_bytes() -> usize {
    1024 * 1024
}

/// Document extraction model settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_extraction_base_url")]
    pub base_url: String,
    #[serde(default = "default_extraction_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: default_extraction_base_url(),
            model: default_extraction_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_extraction_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_extraction_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_connection_env")]
    pub connection_env: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            connection_env: default_connection_env(),
        }
    }
}

fn default_container() -> String {
    "pdf-uploads".to_string()
}
fn default_connection_env() -> String {
    "AZURE_STORAGE_CONN".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngredientsConfig {
    /// Match keywords against whole tokens instead of substrings.
    #[serde(default)]
    pub whole_token: bool,
}

impl Config {
    /// All defaults. Used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Load and validate the config at `path`.
///
/// A missing file is not an error: the defaults are returned instead.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::minimal());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chat.timeout_secs == 0 {
        bail!("chat.timeout_secs must be > 0");
    }
    if config.chat.max_response_chars == 0 {
        bail!("chat.max_response_chars must be > 0");
    }
    if config.chat.max_stream_bytes == 0 {
        bail!("chat.max_stream_bytes must be > 0");
    }
    if config.server.max_upload_bytes == 0 {
        bail!("server.max_upload_bytes must be > 0");
    }
    if config.chat.model.trim().is_empty() {
        bail!("chat.model must not be empty");
    }
    if config.extraction.model.trim().is_empty() {
        bail!("extraction.model must not be empty");
    }
    if config.storage.container.trim().is_empty() {
        bail!("storage.container must not be empty");
    }
    Ok(())
}

/// Read a credential from the environment, treating empty values as unset.
pub fn credential(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config(Path::new("/nonexistent/chefdesk.toml")).unwrap();
        assert_eq!(cfg.chat.timeout_secs, 30);
        assert_eq!(cfg.chat.model, "openai/gpt-4o");
        assert_eq!(cfg.extraction.model, "gemini-2.5-flash");
        assert_eq!(cfg.storage.container, "pdf-uploads");
        assert!(!cfg.ingredients.whole_token);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chat]\ntimeout_secs = 5\n\n[server]\nbind = \"0.0.0.0:9000\"").unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.chat.timeout_secs, 5);
        assert_eq!(cfg.chat.token_env, "GITHUB_TOKEN");
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.storage.connection_env, "AZURE_STORAGE_CONN");
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chat]\ntimeout_secs = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn example_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/chefdesk.example.toml");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chat.max_tool_rounds, 5);
        assert_eq!(cfg.extraction.request_timeout_secs, 120);
        assert_eq!(cfg.chat.max_stream_bytes, 1024 * 1024);
        assert_eq!(cfg.server.max_upload_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn empty_container_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\ncontainer = \"\"").unwrap();

        assert!(load_config(file.path()).is_err());
    }
}
