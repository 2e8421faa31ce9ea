//! Incremental ingestion: bring the local record store in line with the API.
//!
//! The only checkpoint is the store's row count. When it equals the remote
//! total nothing is fetched; otherwise the store is purged and every page is
//! fetched again from page 1. There is no per-page resume.

use std::pin::pin;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use contractsync_fetch::{ContractsApi, PageData};
use contractsync_shared::{ProgressReporter, RawContract, Result};
use contractsync_storage::RecordStore;

/// What a sync did to the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Local count already matched the remote total; no pages were fetched.
    UpToDate,
    /// The store was purged and rebuilt from the API.
    Refreshed {
        /// Pages requested, `ceil(total / page_size)`.
        pages_requested: u32,
        /// Pages that yielded nothing after retries and were skipped.
        failed_pages: u32,
        /// Records appended during this run.
        records_written: u64,
    },
}

/// Result of [`sync_contracts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Total reported by the API (0 when it could not be resolved).
    pub remote_total: u64,
    /// Rows in the store before the sync.
    pub local_before: u64,
    pub outcome: IngestOutcome,
}

/// Remote total and local row count, without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatus {
    pub remote_total: u64,
    pub local_count: u64,
}

impl StoreStatus {
    /// Whether a sync would be a no-op.
    pub fn is_current(&self) -> bool {
        self.remote_total == self.local_count
    }
}

/// Compare the store against the API using only the one-item total request.
#[instrument(skip_all)]
pub async fn check_status(api: &ContractsApi, store: &RecordStore) -> Result<StoreStatus> {
    let remote_total = api.resolve_total_count().await;
    let local_count = store.count()?;
    Ok(StoreStatus {
        remote_total,
        local_count,
    })
}

/// Sync the record store with the contracts API.
///
/// Lost pages are skipped: the run then holds fewer rows than the remote
/// total, and the next sync detects the mismatch and starts over.
#[instrument(skip_all, fields(store = %store.path().display()))]
pub async fn sync_contracts(
    api: &ContractsApi,
    store: &RecordStore,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    progress.phase("Resolving remote total");
    let remote_total = api.resolve_total_count().await;
    let local_before = store.count()?;

    if remote_total == local_before {
        info!(total = remote_total, "already up to date");
        return Ok(IngestReport {
            remote_total,
            local_before,
            outcome: IngestOutcome::UpToDate,
        });
    }

    if remote_total == 0 {
        warn!(local_before, "remote total is 0, local store will be emptied");
    }

    info!(remote_total, local_before, "record count mismatch, refreshing store");
    store.purge()?;

    let pages_requested = api.page_count(remote_total);
    progress.phase("Fetching contract pages");

    let mut pages = pin!(api.iter_pages(pages_requested));
    let mut page = 0u32;
    let mut failed_pages = 0u32;
    let mut records_written = 0u64;

    while let Some(data) = pages.next().await {
        page += 1;
        match data {
            Some(data) => {
                let batch = page_contracts(&data);
                records_written += store.append(&batch)? as u64;
                debug!(page, records = batch.len(), "page stored");
            }
            None => failed_pages += 1,
        }
        progress.page_done(page, pages_requested, records_written);
    }

    if failed_pages > 0 {
        warn!(
            failed_pages,
            records_written, remote_total, "some pages were lost, store is incomplete"
        );
    }
    info!(pages_requested, records_written, "sync finished");

    Ok(IngestReport {
        remote_total,
        local_before,
        outcome: IngestOutcome::Refreshed {
            pages_requested,
            failed_pages,
            records_written,
        },
    })
}

/// Sanitized contracts under `result.contracts`. A page without that list
/// contributes nothing.
fn page_contracts(data: &PageData) -> Vec<RawContract> {
    match data
        .get("result")
        .and_then(|result| result.get("contracts"))
        .and_then(Value::as_array)
    {
        Some(items) => items.iter().map(RawContract::sanitize).collect(),
        None => {
            warn!("page has no result.contracts list");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use contractsync_fetch::RetryPolicy;
    use contractsync_shared::{ApiConfig, SilentProgress};
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_store() -> (RecordStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("cs_ingest_{}", Uuid::now_v7()));
        (RecordStore::new(dir.join("raw.csv")), dir)
    }

    fn api_for(server: &MockServer) -> ContractsApi {
        let config = ApiConfig {
            endpoint: format!("{}/savings/contracts", server.uri()),
            page_size: 100,
            ..ApiConfig::default()
        };
        let retry = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        ContractsApi::new(&config, retry)
            .unwrap()
            .with_timeout(Duration::from_millis(200))
    }

    fn page(start: usize, count: usize, total: u64) -> Value {
        let contracts: Vec<Value> = (start..start + count)
            .map(|i| {
                json!({
                    "piid": format!("P{i:04}"),
                    "agency": "GSA",
                    "vendor": "ACME",
                    "value": 1000 + i,
                    "description": "services",
                    "fpds_status": "TERMINATED",
                    "fpds_link": "",
                    "deleted_date": "2/14/2025",
                    "savings": 10.5,
                    "extra": "dropped",
                })
            })
            .collect();
        json!({ "success": true, "result": { "contracts": contracts }, "meta": { "total_results": total } })
    }

    async fn mount_total(server: &MockServer, total: u64, expected: u64) {
        Mock::given(method("GET"))
            .and(query_param("per_page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0, 1, total)))
            .expect(expected)
            .mount(server)
            .await;
    }

    async fn mount_page(server: &MockServer, number: u32, response: ResponseTemplate, expected: u64) {
        Mock::given(method("GET"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", number.to_string()))
            .respond_with(response)
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn lost_page_is_skipped_and_rerun_starts_over() {
        let server = MockServer::start().await;
        let (store, dir) = test_store();

        mount_total(&server, 250, 2).await;
        mount_page(&server, 1, ResponseTemplate::new(200).set_body_json(page(0, 100, 250)), 2).await;
        mount_page(
            &server,
            2,
            ResponseTemplate::new(200)
                .set_body_json(page(100, 100, 250))
                .set_delay(Duration::from_secs(2)),
            6,
        )
        .await;
        mount_page(&server, 3, ResponseTemplate::new(200).set_body_json(page(200, 50, 250)), 2).await;

        let api = api_for(&server);

        let first = sync_contracts(&api, &store, &SilentProgress).await.unwrap();
        assert_eq!(first.remote_total, 250);
        assert_eq!(first.local_before, 0);
        assert_eq!(
            first.outcome,
            IngestOutcome::Refreshed {
                pages_requested: 3,
                failed_pages: 1,
                records_written: 150,
            }
        );
        assert_eq!(store.count().unwrap(), 150);

        // 150 != 250: the whole store is rebuilt, page 2 is not fetched alone.
        let second = sync_contracts(&api, &store, &SilentProgress).await.unwrap();
        assert_eq!(second.local_before, 150);
        assert!(matches!(
            second.outcome,
            IngestOutcome::Refreshed {
                pages_requested: 3,
                records_written: 150,
                ..
            }
        ));
        assert_eq!(store.count().unwrap(), 150);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn matching_count_fetches_no_pages() {
        let server = MockServer::start().await;
        let (store, dir) = test_store();

        let seed: Vec<RawContract> = page(0, 3, 3)["result"]["contracts"]
            .as_array()
            .unwrap()
            .iter()
            .map(RawContract::sanitize)
            .collect();
        store.append(&seed).unwrap();

        mount_total(&server, 3, 1).await;
        Mock::given(method("GET"))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0, 3, 3)))
            .expect(0)
            .mount(&server)
            .await;

        let report = sync_contracts(&api_for(&server), &store, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.outcome, IngestOutcome::UpToDate);
        assert_eq!(store.count().unwrap(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn sanitized_rows_keep_declared_fields() {
        let server = MockServer::start().await;
        let (store, dir) = test_store();

        mount_total(&server, 2, 1).await;
        mount_page(&server, 1, ResponseTemplate::new(200).set_body_json(page(0, 2, 2)), 1).await;

        sync_contracts(&api_for(&server), &store, &SilentProgress)
            .await
            .unwrap();

        let table = store.load().unwrap();
        assert!(!table.columns.iter().any(|c| c == "extra"));
        let piid = table.column_index("piid").unwrap();
        assert_eq!(table.rows[0][piid], "P0000");
        assert_eq!(table.rows[1][piid], "P0001");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unresolvable_total_empties_store() {
        let server = MockServer::start().await;
        let (store, dir) = test_store();

        store
            .append(&[RawContract {
                piid: Some("OLD".into()),
                ..Default::default()
            }])
            .unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .expect(1)
            .mount(&server)
            .await;

        let report = sync_contracts(&api_for(&server), &store, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.remote_total, 0);
        assert_eq!(
            report.outcome,
            IngestOutcome::Refreshed {
                pages_requested: 0,
                failed_pages: 0,
                records_written: 0,
            }
        );
        assert!(!store.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn status_makes_only_the_total_request() {
        let server = MockServer::start().await;
        let (store, _dir) = test_store();

        mount_total(&server, 42, 1).await;

        let status = check_status(&api_for(&server), &store).await.unwrap();
        assert_eq!(status.remote_total, 42);
        assert_eq!(status.local_count, 0);
        assert!(!status.is_current());
    }

    #[test]
    fn page_without_contract_list_is_empty() {
        let data = json!({ "result": {} });
        let data = data.as_object().unwrap().clone();
        assert!(page_contracts(&data).is_empty());
    }
}
