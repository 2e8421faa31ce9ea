//! End-to-end run: sync → load → clean → enrich → export.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use contractsync_enrich::{DetailClient, Enricher, EnrichmentReport};
use contractsync_fetch::{ContractsApi, RetryPolicy};
use contractsync_shared::{AppConfig, ProgressReporter, RAW_FIELDS, Result};
use contractsync_storage::{RawTable, RecordStore};

use crate::clean::clean;
use crate::export::export_csv;
use crate::ingest::{IngestReport, sync_contracts};

/// Configuration for [`run`].
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Resolved settings (file + CLI overrides).
    pub settings: AppConfig,
    /// Export cleaned rows without detail-page lookups.
    pub skip_enrich: bool,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ingest: IngestReport,
    /// Rows that survived cleaning.
    pub rows_cleaned: usize,
    /// Enrichment counters (all zero when enrichment was skipped).
    pub enrichment: EnrichmentReport,
    /// Path of the exported CSV.
    pub output_path: PathBuf,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Run the full pipeline.
///
/// 1. Sync the record store with the API
/// 2. Load and clean the stored rows
/// 3. Enrich rows that carry a detail link
/// 4. Export the table
///
/// Only a column mismatch in the store (or an I/O failure) stops the run.
#[instrument(skip_all, fields(raw = %config.settings.paths.raw_csv.display()))]
pub async fn run(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<RunSummary> {
    let start = Instant::now();
    let settings = &config.settings;
    let retry = RetryPolicy::from(&settings.retry);

    // --- Phase 1: Ingest ---
    let api = ContractsApi::new(&settings.api, retry.clone())?;
    let store = RecordStore::new(&settings.paths.raw_csv);
    let ingest = sync_contracts(&api, &store, progress).await?;

    // --- Phase 2: Clean ---
    progress.phase("Cleaning records");
    let table = if store.exists() {
        store.load()?
    } else {
        warn!(path = %store.path().display(), "record store missing, exporting empty table");
        RawTable {
            columns: RAW_FIELDS.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    };
    let mut records = clean(&table)?;
    let rows_cleaned = records.len();

    // --- Phase 3: Enrich ---
    let enrichment = if config.skip_enrich {
        info!("enrichment skipped");
        EnrichmentReport {
            rows: rows_cleaned,
            ..Default::default()
        }
    } else {
        progress.phase("Enriching from detail pages");
        let client = DetailClient::new(&settings.enrichment, retry)?;
        Enricher::new(client, settings.enrichment.workers)
            .enrich(&mut records, progress)
            .await
    };

    // --- Phase 4: Export ---
    progress.phase("Exporting");
    let output_path = settings.paths.output_csv.clone();
    export_csv(&records, &output_path)?;

    let elapsed = start.elapsed();
    info!(
        rows = rows_cleaned,
        enriched = enrichment.enriched,
        output = %output_path.display(),
        elapsed_ms = elapsed.as_millis() as u64,
        "run complete"
    );

    Ok(RunSummary {
        ingest,
        rows_cleaned,
        enrichment,
        output_path,
        elapsed,
    })
}
