//! Shared types, error model, and configuration for docdigest.
//!
//! This crate is the foundation depended on by all other docdigest crates.
//! It provides:
//! - [`DigestError`]: the unified error type
//! - Domain types ([`SourceDocument`], [`Segment`])
//! - Configuration ([`AppConfig`], [`SplitConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, OllamaConfig, SplitConfig, TikaConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_endpoints,
};
pub use error::{DigestError, Result};
pub use types::{Segment, SourceDocument};
