//! Flat CSV export of the enriched table.

use std::path::Path;

use tracing::info;

use contractsync_shared::{ContractSyncError, EnrichedRecord, Result};

/// Export column order.
pub const EXPORT_COLUMNS: [&str; 13] = [
    "PIID",
    "Buying Org 1",
    "Buying Org 2",
    "Buying Org 3",
    "NAICS",
    "PSC",
    "Incumbent",
    "Description",
    "Status",
    "Total Contract Value (TCV)",
    "Savings",
    "Deleted On",
    "FPDS Link",
];

/// Write `records` to `path`, replacing any existing file.
///
/// The header is always written, even for an empty table.
pub fn export_csv(records: &[EnrichedRecord], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ContractSyncError::io(parent, e))?;
    }

    let storage_error =
        |e: csv::Error| ContractSyncError::Storage(format!("{}: {e}", path.display()));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(storage_error)?;

    writer.write_record(EXPORT_COLUMNS).map_err(storage_error)?;
    for record in records {
        writer.serialize(record).map_err(storage_error)?;
    }
    writer.flush().map_err(|e| ContractSyncError::io(path, e))?;

    info!(path = %path.display(), rows = records.len(), "exported records");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn record() -> EnrichedRecord {
        EnrichedRecord {
            piid: "A1".into(),
            buying_org_1: "GSA".into(),
            buying_org_2: "FAS".into(),
            naics: "541611".into(),
            description: "Consulting, advisory".into(),
            total_contract_value: 1250000.0,
            savings: 99.5,
            deleted_on: NaiveDate::from_ymd_opt(2025, 2, 14),
            fpds_link: "https://www.fpds.gov/x".into(),
            ..Default::default()
        }
    }

    #[test]
    fn writes_curated_header_and_money_columns() {
        let dir = std::env::temp_dir().join(format!("cs_export_{}", Uuid::now_v7()));
        let path = dir.join("out").join("contracts.csv");

        let mut undated = record();
        undated.piid = "A2".into();
        undated.deleted_on = None;

        assert_eq!(export_csv(&[record(), undated], &path).unwrap(), 2);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(header, EXPORT_COLUMNS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "A1");
        assert_eq!(&rows[0][2], "FAS");
        assert_eq!(&rows[0][7], "Consulting, advisory");
        assert_eq!(&rows[0][9], "1250000.00");
        assert_eq!(&rows[0][10], "99.50");
        assert_eq!(&rows[0][11], "2025-02-14");
        assert_eq!(&rows[1][11], "");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_table_still_has_header() {
        let dir = std::env::temp_dir().join(format!("cs_export_{}", Uuid::now_v7()));
        let path = dir.join("empty.csv");

        export_csv(&[], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), EXPORT_COLUMNS.join(","));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
