//! Cleaning: raw store rows to typed, renamed [`EnrichedRecord`]s.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument};

use contractsync_shared::{ContractSyncError, EnrichedRecord, RAW_FIELDS, REQUIRED_FIELDS, Result};
use contractsync_storage::RawTable;

/// Placeholder link the API uses when a contract has no detail page.
const PLACEHOLDER_LINK: &str = "https://fpds.gov";

/// Check that the store's columns are exactly the declared field set.
///
/// Order does not matter, but each column must appear once. On mismatch the
/// error lists every column present on only one side, labelled with where it
/// came from, followed by any repeated column.
pub fn validate_columns(columns: &[String]) -> Result<()> {
    let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
    for column in columns {
        *occurrences.entry(column.as_str()).or_default() += 1;
    }
    let found: BTreeSet<&str> = occurrences.keys().copied().collect();
    let expected: BTreeSet<&str> = RAW_FIELDS.into_iter().collect();

    let duplicates: Vec<&str> = occurrences
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(column, _)| *column)
        .collect();

    if found == expected && duplicates.is_empty() {
        return Ok(());
    }

    let mismatches: Vec<String> = found
        .difference(&expected)
        .map(|c| format!("from store: {c}"))
        .chain(expected.difference(&found).map(|c| format!("from schema: {c}")))
        .chain(duplicates.iter().map(|c| format!("duplicate: {c}")))
        .collect();

    Err(ContractSyncError::validation(format!(
        "column mismatch: {}",
        mismatches.join(", ")
    )))
}

/// Validate, rename, filter, and coerce the raw table.
///
/// Rows missing any required field are dropped. A required numeric field
/// that does not parse counts as missing. An unparseable deletion date is
/// kept as absent.
#[instrument(skip_all, fields(rows = table.rows.len()))]
pub fn clean(table: &RawTable) -> Result<Vec<EnrichedRecord>> {
    validate_columns(&table.columns)?;

    let columns = Columns::locate(table)?;
    let mut records = Vec::with_capacity(table.rows.len());

    for (line, row) in table.rows.iter().enumerate() {
        match columns.record(row) {
            Some(record) => records.push(record),
            None => debug!(row = line, "dropping row with missing required field"),
        }
    }

    info!(
        kept = records.len(),
        dropped = table.rows.len() - records.len(),
        "cleaned records"
    );
    Ok(records)
}

/// Column positions of each raw field.
struct Columns {
    piid: usize,
    agency: usize,
    vendor: usize,
    value: usize,
    description: usize,
    fpds_status: usize,
    fpds_link: usize,
    deleted_date: usize,
    savings: usize,
    /// Positions of [`REQUIRED_FIELDS`].
    required: Vec<usize>,
}

impl Columns {
    fn locate(table: &RawTable) -> Result<Self> {
        let index = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| ContractSyncError::validation(format!("missing column {name}")))
        };

        let required = REQUIRED_FIELDS
            .iter()
            .map(|name| index(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            piid: index("piid")?,
            agency: index("agency")?,
            vendor: index("vendor")?,
            value: index("value")?,
            description: index("description")?,
            fpds_status: index("fpds_status")?,
            fpds_link: index("fpds_link")?,
            deleted_date: index("deleted_date")?,
            savings: index("savings")?,
            required,
        })
    }

    fn record(&self, row: &[String]) -> Option<EnrichedRecord> {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");

        if self.required.iter().any(|&idx| cell(idx).is_empty()) {
            return None;
        }

        let value = cell(self.value).parse::<f64>().ok()?;
        let savings = cell(self.savings).parse::<f64>().ok()?;

        let link = cell(self.fpds_link);
        let link = if link == PLACEHOLDER_LINK { "" } else { link };

        Some(EnrichedRecord {
            piid: cell(self.piid).to_string(),
            buying_org_1: cell(self.agency).to_string(),
            incumbent: cell(self.vendor).to_string(),
            description: cell(self.description).to_string(),
            status: cell(self.fpds_status).to_string(),
            total_contract_value: value,
            savings,
            deleted_on: parse_date(cell(self.deleted_date)),
            fpds_link: link.to_string(),
            ..Default::default()
        })
    }
}

/// Parse a deletion date in any of the formats the API has been seen to use.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(text, "%m/%d/%Y").ok()
}
