//! Network access for contractsync.
//!
//! This crate provides:
//! - [`retry`] — fixed-delay retry for transient network failures
//! - [`ContractsApi`] — the sequential, paginated contracts API client

pub mod client;
pub mod retry;

pub use client::{ContractsApi, PageData, USER_AGENT, build_client};
pub use retry::{RetryPolicy, Retrying, Transient};
