//! Shared types, error model, and configuration for contractsync.
//!
//! This crate is the foundation depended on by all other contractsync crates.
//! It provides:
//! - [`ContractSyncError`] — the unified error type
//! - Domain types ([`RawContract`], [`EnrichedRecord`], [`PageResponse`])
//! - Configuration ([`AppConfig`], config loading)
//! - [`ProgressReporter`] — the observability handle threaded through a run

pub mod config;
pub mod error;
pub mod progress;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, EnrichmentConfig, PathsConfig, RetryConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ContractSyncError, Result};
pub use progress::{ProgressReporter, SilentProgress};
pub use types::{
    DetailFields, EnrichedRecord, Payload, PageResponse, RAW_FIELDS, REQUIRED_FIELDS,
    RawContract,
};
