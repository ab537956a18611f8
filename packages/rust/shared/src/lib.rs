//! Shared types, error model, and configuration for Newsloom.
//!
//! This crate is the foundation depended on by all other Newsloom crates.
//! It provides:
//! - [`NewsloomError`] — the unified error type
//! - Domain types ([`Article`], [`ArticleId`], [`SummaryResult`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CloudConfig, DatabaseConfig, LocalConfig, ProviderKind, ProviderSelection,
    WorkerConfig, config_dir, config_file_path, expand_home, init_config, load_config,
    load_config_from,
};
pub use error::{NewsloomError, Result};
pub use types::{Article, ArticleId, EMBEDDING_DIM, SUMMARY_FAILED_SENTINEL, SummaryResult};
