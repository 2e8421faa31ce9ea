//! Paginated client for the savings contracts API.
//!
//! Pages are requested strictly one at a time, in order, sorted by descending
//! savings. A run that loses pages therefore still holds the highest-value
//! contracts first.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use url::Url;

use contractsync_shared::{ApiConfig, ContractSyncError, PageResponse, Payload, Result};

use crate::retry::RetryPolicy;

/// User-Agent string for API and detail-page requests.
pub const USER_AGENT: &str = concat!("contractsync/", env!("CARGO_PKG_VERSION"));

/// JSON object body of one API page.
pub type PageData = Map<String, Value>;

/// Client for the contracts endpoint.
pub struct ContractsApi {
    client: Client,
    endpoint: Url,
    page_size: u32,
    sort_by: String,
    sort_order: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ContractsApi {
    /// Create a client from the `[api]` config section.
    pub fn new(config: &ApiConfig, retry: RetryPolicy) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ContractSyncError::config(format!("invalid endpoint '{}': {e}", config.endpoint))
        })?;

        let client = build_client()?;

        Ok(Self {
            client,
            endpoint,
            page_size: config.page_size.max(1),
            sort_by: config.sort_by.clone(),
            sort_order: config.sort_order.clone(),
            timeout: config.timeout(),
            retry,
        })
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of pages needed to cover `total` records.
    pub fn page_count(&self, total: u64) -> u32 {
        let pages = total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Ask the API how many records it holds, using a one-item request.
    ///
    /// Returns 0 when the request fails or the body is not a JSON object.
    #[instrument(skip_all)]
    pub async fn resolve_total_count(&self) -> u64 {
        let data = match self.fetch_page(1, 1).await.and_then(PageResponse::into_data) {
            Some(data) => data,
            None => {
                warn!("failed to get total results count from API");
                return 0;
            }
        };

        let total = data
            .get("meta")
            .and_then(|meta| meta.get("total_results"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        info!(total, "API reports total results");
        total
    }

    /// Fetch a single page, retrying transient failures.
    ///
    /// `None` means every attempt failed at the network level. HTTP error
    /// statuses and non-JSON bodies still produce a response envelope.
    pub async fn fetch_page(&self, page: u32, per_page: u32) -> Option<PageResponse> {
        self.retry
            .run("contracts_api", move || self.request(page, per_page))
            .await
    }

    /// Lazily fetch pages `1..=total_pages` in order, one request in flight.
    ///
    /// Yields exactly `total_pages` items: the page body, or `None` when the
    /// page could not be fetched or was not a JSON object.
    pub fn iter_pages(&self, total_pages: u32) -> impl Stream<Item = Option<PageData>> + '_ {
        stream::iter(1..=total_pages).then(move |page| async move {
            let data = self
                .fetch_page(page, self.page_size)
                .await
                .and_then(PageResponse::into_data);
            if data.is_none() {
                warn!(page, "failed to fetch page");
            }
            data
        })
    }

    async fn request(&self, page: u32, per_page: u32) -> reqwest::Result<PageResponse> {
        let query = [
            ("sort_by", self.sort_by.clone()),
            ("sort_order", self.sort_order.clone()),
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];

        let response = self
            .client
            .get(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect::<BTreeMap<_, _>>();
        let body = response.text().await?;

        Ok(PageResponse {
            ok: status.is_success(),
            status: status.as_u16(),
            payload: Payload::decode(&body),
            headers,
        })
    }
}

/// Build a reqwest client with appropriate settings.
///
/// Timeouts are applied per request so API and detail-page calls can differ.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| ContractSyncError::Network(format!("failed to build HTTP client: {e}")))
}
