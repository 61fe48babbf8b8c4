//! Shared types, error model, and configuration for leadscout.
//!
//! This crate is the foundation depended on by all other leadscout crates.
//! It provides:
//! - [`LeadscoutError`]: the unified error type
//! - Signal types ([`NewsArticle`], [`ScrapedPage`], [`SourceBundle`])
//! - Configuration ([`AppConfig`], [`CompanyTarget`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompanyTarget, CrmConfig, DefaultsConfig, LedgerBackend, LedgerConfig, LlmConfig,
    MailConfig, NewsConfig, SearchConfig, TaxonomyConfig, config_dir, config_file_path, env_value,
    expand_home, init_config, load_config, load_config_from, validate_credentials,
};
pub use error::{LeadscoutError, Result};
pub use types::{NewsArticle, ScrapedPage, SourceBundle, dedup_articles};
