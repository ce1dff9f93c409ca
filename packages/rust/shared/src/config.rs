//! Application configuration for apiscout.
//!
//! User config lives at `~/.apiscout/apiscout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ApiScoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "apiscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".apiscout";

/// Default system prompt for the LLM extractor.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a security analyst who finds API endpoints \
(HTTP, WebSocket, GraphQL) in JavaScript code. Respond with exactly one JSON document of \
the form {\"endpoints\": [{\"path\", \"method\", \"confidence\", \"usage_context\", \
\"line_number\", \"auth\": {\"required\", \"type\", \"location\"}}]} and nothing else. \
Line numbers are 1-based and relative to the code chunk you are given.";

/// Default analysis prompt template. `{context}` and `{code_chunk}` are
/// substituted per window before dispatch.
const DEFAULT_ANALYSIS_PROMPT: &str = "Surrounding context from the same file:\n\
{context}\n\n\
Identify every API endpoint referenced in the following JavaScript chunk. \
Report template-literal paths verbatim, including interpolation placeholders.\n\n\
{code_chunk}";

// ---------------------------------------------------------------------------
// Config structs (matching apiscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings for the LLM extractor.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Extractor enable/disable flags.
    #[serde(default)]
    pub extractors: ExtractorsConfig,

    /// Prompt templates for the LLM extractor.
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Window size in lines.
    #[serde(default = "default_window_size")]
    pub window_size: u32,

    /// Lines shared between consecutive windows.
    #[serde(default = "default_overlap")]
    pub overlap: u32,

    /// Maximum concurrent outstanding LLM invocations.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-invocation timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a failed (extractor, window) invocation.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            overlap: default_overlap(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

fn default_window_size() -> u32 {
    200
}
fn default_overlap() -> u32 {
    40
}
fn default_concurrency() -> u32 {
    4
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_retries() -> u32 {
    1
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenRouter-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model ID to use for semantic analysis.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-3.5-sonnet".into()
}

/// `[extractors]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorsConfig {
    /// Enable the deterministic regex extractor.
    #[serde(default = "default_true")]
    pub regex: bool,

    /// Enable the semantic LLM extractor.
    #[serde(default = "default_true")]
    pub llm: bool,
}

impl Default for ExtractorsConfig {
    fn default() -> Self {
        Self {
            regex: true,
            llm: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[prompts]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// System prompt sent with every LLM request.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Analysis prompt template with `{context}` and `{code_chunk}`
    /// placeholders.
    #[serde(default = "default_analysis_prompt")]
    pub analysis_prompt: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            analysis_prompt: default_analysis_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_analysis_prompt() -> String {
    DEFAULT_ANALYSIS_PROMPT.into()
}

// ---------------------------------------------------------------------------
// Analyze config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime analysis configuration — merged from config file + CLI flags
/// and validated before any extraction begins.
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    /// Window size in lines.
    pub window_size: u32,
    /// Lines shared between consecutive windows.
    pub overlap: u32,
    /// Maximum concurrent outstanding LLM invocations.
    pub concurrency: u32,
    /// Per-invocation timeout.
    pub timeout: Duration,
    /// Retries after a failed invocation.
    pub retries: u32,
    /// Optional run-level deadline. When it expires, in-flight work is
    /// abandoned and the inventory is assembled from whatever was collected.
    pub run_timeout: Option<Duration>,
}

impl From<&AppConfig> for AnalyzeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            window_size: config.defaults.window_size,
            overlap: config.defaults.overlap,
            concurrency: config.defaults.concurrency,
            timeout: Duration::from_secs(config.defaults.timeout_secs),
            retries: config.defaults.retries,
            run_timeout: None,
        }
    }
}

impl AnalyzeConfig {
    /// Validate all parameters. Called by the analysis facade before any
    /// window is produced.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(ApiScoutError::config("window_size must be positive"));
        }
        if self.overlap >= self.window_size {
            return Err(ApiScoutError::config(format!(
                "overlap ({}) must be smaller than window_size ({})",
                self.overlap, self.window_size
            )));
        }
        if self.concurrency == 0 {
            return Err(ApiScoutError::config("concurrency must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(ApiScoutError::config("timeout must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.apiscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ApiScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.apiscout/apiscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ApiScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ApiScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ApiScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ApiScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ApiScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(ApiScoutError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable,\n\
             or disable the LLM extractor with --no-llm."
        ))),
    }
}
