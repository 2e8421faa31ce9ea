//! Concurrent detail-page enrichment.
//!
//! A run moves through four steps: rows with a detail link are turned into
//! jobs ([`collect_jobs`]), jobs are dispatched to a bounded pool of tasks
//! ([`Enricher::dispatch`]), results are collected in completion order, and
//! finally written back by row index ([`merge`]).
//!
//! Workers never touch the table. Each one returns a [`DetailResult`], and
//! the merge runs single-threaded after every task has finished. A failing
//! row degrades to empty fields for that row only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use contractsync_fetch::{RetryPolicy, build_client};
use contractsync_shared::{
    ContractSyncError, DetailFields, EnrichedRecord, EnrichmentConfig, ProgressReporter, Result,
};

use crate::extract::extract_detail_fields;

// ---------------------------------------------------------------------------
// Jobs and results
// ---------------------------------------------------------------------------

/// One row to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailJob {
    /// Position of the row in the table.
    pub index: usize,
    /// Detail-page URL.
    pub link: String,
}

/// Fields found for one row, keyed by its original position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailResult {
    pub index: usize,
    pub fields: DetailFields,
}

impl DetailResult {
    fn empty(index: usize) -> Self {
        Self {
            index,
            fields: DetailFields::default(),
        }
    }
}

/// Summary of one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Rows in the table.
    pub rows: usize,
    /// Rows with a detail link, i.e. tasks dispatched.
    pub dispatched: usize,
    /// Dispatched rows that came back with at least one field.
    pub enriched: usize,
}

/// Rows with a non-empty detail link. Rows without one are left out entirely.
pub fn collect_jobs(table: &[EnrichedRecord]) -> Vec<DetailJob> {
    table
        .iter()
        .enumerate()
        .filter(|(_, row)| !row.fpds_link.trim().is_empty())
        .map(|(index, row)| DetailJob {
            index,
            link: row.fpds_link.trim().to_string(),
        })
        .collect()
}

/// Write results back into the table by row index.
///
/// Rows without a result keep their current values. Applying the same
/// results again leaves the table unchanged.
pub fn merge(table: &mut [EnrichedRecord], results: &[DetailResult]) {
    for result in results {
        match table.get_mut(result.index) {
            Some(row) => row.apply(&result.fields),
            None => warn!(row = result.index, rows = table.len(), "result for unknown row"),
        }
    }
}

// ---------------------------------------------------------------------------
// Detail client
// ---------------------------------------------------------------------------

/// Raw detail-page response.
#[derive(Debug, Clone)]
struct DetailPage {
    ok: bool,
    status: u16,
    body: String,
}

/// Fetches detail pages and extracts their classification fields.
pub struct DetailClient {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl DetailClient {
    /// Create a client from the `[enrichment]` config section.
    pub fn new(config: &EnrichmentConfig, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            timeout: config.timeout(),
            retry,
        })
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch one detail page (with retry) and extract its fields.
    pub async fn lookup(&self, link: &str) -> Result<DetailFields> {
        let url = Url::parse(link)
            .map_err(|e| ContractSyncError::Enrichment(format!("invalid link '{link}': {e}")))?;

        let client = self.client.clone();
        let timeout = self.timeout;
        let fetch = self.retry.wrap("detail_page", move |url: Url| {
            get_detail_page(client.clone(), url, timeout)
        });

        let page = fetch.call(url).await.ok_or_else(|| {
            ContractSyncError::Enrichment(format!("{link}: no response after retries"))
        })?;

        if !page.ok {
            return Err(ContractSyncError::Enrichment(format!(
                "{link}: HTTP {}",
                page.status
            )));
        }

        Ok(extract_detail_fields(&page.body))
    }
}

async fn get_detail_page(client: Client, url: Url, timeout: Duration) -> reqwest::Result<DetailPage> {
    let response = client
        .get(url)
        .header(CONTENT_TYPE, "application/json")
        .timeout(timeout)
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await?;

    Ok(DetailPage {
        ok: status.is_success(),
        status: status.as_u16(),
        body,
    })
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Runs detail lookups for a table under a fixed worker limit.
pub struct Enricher {
    client: Arc<DetailClient>,
    workers: usize,
}

impl Enricher {
    pub fn new(client: DetailClient, workers: usize) -> Self {
        Self {
            client: Arc::new(client),
            workers: workers.max(1),
        }
    }

    /// Look up every row with a detail link and merge the results in place.
    #[instrument(skip_all, fields(rows = table.len(), workers = self.workers))]
    pub async fn enrich(
        &self,
        table: &mut [EnrichedRecord],
        progress: &dyn ProgressReporter,
    ) -> EnrichmentReport {
        let jobs = collect_jobs(table);
        let mut report = EnrichmentReport {
            rows: table.len(),
            dispatched: jobs.len(),
            enriched: 0,
        };

        if jobs.is_empty() {
            info!("no detail links found, skipping enrichment");
            return report;
        }

        info!(links = jobs.len(), "dispatching detail lookups");
        let results = self.dispatch(jobs, progress).await;

        report.enriched = results.iter().filter(|r| !r.fields.is_empty()).count();
        merge(table, &results);

        info!(
            dispatched = report.dispatched,
            enriched = report.enriched,
            "enrichment merged"
        );
        report
    }

    /// Run one task per job and collect results as they complete.
    ///
    /// Every job yields exactly one result; failures and aborted tasks come
    /// back as empty fields.
    pub async fn dispatch(
        &self,
        jobs: Vec<DetailJob>,
        progress: &dyn ProgressReporter,
    ) -> Vec<DetailResult> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let mut task_rows = HashMap::with_capacity(jobs.len());

        for job in jobs {
            let client = Arc::clone(&self.client);
            let sem = Arc::clone(&semaphore);
            let index = job.index;

            let handle = tasks.spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return DetailResult::empty(job.index);
                };

                match client.lookup(&job.link).await {
                    Ok(fields) => {
                        debug!(row = job.index, "row enriched");
                        DetailResult {
                            index: job.index,
                            fields,
                        }
                    }
                    Err(e) => {
                        warn!(row = job.index, error = %e, "detail lookup failed");
                        DetailResult::empty(job.index)
                    }
                }
            });
            task_rows.insert(handle.id(), index);
        }

        let total = task_rows.len();
        let mut results = Vec::with_capacity(total);

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(e) => match task_rows.get(&e.id()) {
                    Some(&index) => {
                        error!(row = index, error = %e, "enrichment task aborted");
                        results.push(DetailResult::empty(index));
                    }
                    None => error!(error = %e, "enrichment task aborted"),
                },
            }
            progress.row_enriched(results.len(), total);
        }

        results
    }
}
