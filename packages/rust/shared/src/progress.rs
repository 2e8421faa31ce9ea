//! Progress reporting handle passed down through the pipeline.

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each API page is handled (fetched or skipped).
    fn page_done(&self, page: u32, total_pages: u32, records_so_far: u64);
    /// Called as detail-page lookups complete.
    fn row_enriched(&self, done: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_done(&self, _page: u32, _total_pages: u32, _records_so_far: u64) {}
    fn row_enriched(&self, _done: usize, _total: usize) {}
}
