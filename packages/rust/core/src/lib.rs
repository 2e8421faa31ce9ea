//! Core pipeline orchestration for contractsync.
//!
//! This crate ties the API client, record store, and enrichment together
//! into end-to-end workflows: incremental sync ([`sync_contracts`]), cleaning
//! ([`clean`]), export, and the full [`run`].

pub mod clean;
pub mod export;
pub mod ingest;
pub mod pipeline;

pub use clean::{clean, parse_date, validate_columns};
pub use export::{EXPORT_COLUMNS, export_csv};
pub use ingest::{IngestOutcome, IngestReport, StoreStatus, check_status, sync_contracts};
pub use pipeline::{RunConfig, RunSummary, run};
