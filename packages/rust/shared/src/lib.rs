//! Shared types, error model, and configuration for apiscout.
//!
//! This crate is the foundation depended on by all other apiscout crates.
//! It provides:
//! - [`ApiScoutError`] — the unified error type
//! - Domain types ([`RawCandidate`], [`Endpoint`], [`AnalysisReport`])
//! - Configuration ([`AppConfig`], [`AnalyzeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalyzeConfig, AppConfig, DefaultsConfig, ExtractorsConfig, OpenRouterConfig, PromptsConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{ApiScoutError, Result};
pub use types::{
    AnalysisReport, AuthInfo, Endpoint, FailureRecord, METHOD_UNKNOWN, Occurrence, RawCandidate,
    Summary,
};
