//! Detail-page enrichment for cleaned contract tables.
//!
//! This crate provides:
//! - [`extract`] — title-matched `<input>` field extraction
//! - [`Enricher`] — bounded-concurrency lookup and merge by row index

pub mod extract;
pub mod pipeline;

pub use extract::{DetailField, extract_detail_fields, extract_field};
pub use pipeline::{
    DetailClient, DetailJob, DetailResult, Enricher, EnrichmentReport, collect_jobs, merge,
};
