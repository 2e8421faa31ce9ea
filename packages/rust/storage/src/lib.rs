//! Append-only CSV store for raw contract records.
//!
//! The [`RecordStore`] is the only persisted state of a sync: its row count is
//! compared against the API total to decide whether a refresh is needed.
//!
//! **Access rules:**
//! - Single writer (the ingestion controller); no locking.
//! - Rows are appended page by page and flushed immediately, so a crash leaves
//!   the pages written so far on disk. Recovery is purge-and-refetch.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use contractsync_shared::{ContractSyncError, RAW_FIELDS, RawContract, Result};

/// Column names and string cells of the store, as read back for cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Header row, in file order.
    pub columns: Vec<String>,
    /// Data rows. Rows may be shorter than the header.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Position of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Handle to the record file at a fixed path.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Number of data rows, excluding the header. 0 when the file is missing.
    ///
    /// Quoted fields spanning several lines count as one row.
    pub fn count(&self) -> Result<u64> {
        if !self.exists() {
            tracing::debug!(path = %self.path.display(), "record store not found");
            return Ok(0);
        }

        let mut reader = self.reader()?;
        let mut count = 0u64;
        for record in reader.records() {
            record.map_err(|e| self.storage_error(e))?;
            count += 1;
        }
        Ok(count)
    }

    /// Delete the record file. Returns whether anything was removed.
    pub fn purge(&self) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path).map_err(|e| ContractSyncError::io(&self.path, e))?;
        tracing::info!(path = %self.path.display(), "purged record store");
        Ok(true)
    }

    /// Append a batch of records, writing the header first if the file is new.
    ///
    /// The batch is flushed before returning.
    pub fn append(&self, records: &[RawContract]) -> Result<usize> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ContractSyncError::io(parent, e))?;
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ContractSyncError::io(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer
                .write_record(RAW_FIELDS)
                .map_err(|e| self.storage_error(e))?;
        }

        for record in records {
            writer.serialize(record).map_err(|e| self.storage_error(e))?;
        }

        writer
            .flush()
            .map_err(|e| ContractSyncError::io(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), rows = records.len(), "appended records");
        Ok(records.len())
    }

    /// Read the whole store as strings.
    pub fn load(&self) -> Result<RawTable> {
        let mut reader = self.reader()?;

        let columns = reader
            .headers()
            .map_err(|e| self.storage_error(e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| self.storage_error(e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(RawTable { columns, rows })
    }

    fn reader(&self) -> Result<csv::Reader<std::fs::File>> {
        csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| self.storage_error(e))
    }

    fn storage_error(&self, e: csv::Error) -> ContractSyncError {
        ContractSyncError::Storage(format!("{}: {e}", self.path.display()))
    }
}
