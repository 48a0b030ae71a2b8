//! # Catalog CSV Parser
//!
//! Turns the raw satellite catalog table into [`CatalogRow`]s. Only the two
//! columns the engine needs are read; every other column is ignored.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::catalog::CatalogRow;
use crate::error::{TleError, TleResult};

/// Column holding the stable object identifier.
pub const ID_COLUMN: &str = "NORAD_CAT_ID";
/// Column holding the decay date; empty for live objects.
pub const DECAY_COLUMN: &str = "DECAY_DATE";
const DECAY_FORMAT: &str = "%Y-%m-%d";

/// Parses a full catalog table.
///
/// Rows with a malformed id or decay date are skipped with a warning. A
/// missing column, an unreadable table or a duplicate id fails the whole parse.
pub fn parse_catalog(raw: &[u8]) -> TleResult<Vec<CatalogRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(raw);

    let headers = reader
        .headers()
        .map_err(|e| TleError::CatalogParse(format!("unreadable header: {e}")))?
        .clone();
    let id_idx = column_index(&headers, ID_COLUMN)?;
    let decay_idx = column_index(&headers, DECAY_COLUMN)?;

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| TleError::CatalogParse(e.to_string()))?;
        // +2: one for the header, one for 1-based numbering.
        let row_no = line + 2;

        let raw_id = record.get(id_idx).unwrap_or_default();
        let Ok(object_id) = raw_id.parse::<u32>() else {
            log::debug!("Skipping catalog row {}: invalid {} '{}'", row_no, ID_COLUMN, raw_id);
            skipped += 1;
            continue;
        };

        let raw_decay = record.get(decay_idx).unwrap_or_default();
        let decay_date = if raw_decay.is_empty() {
            None
        } else {
            match NaiveDate::parse_from_str(raw_decay, DECAY_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    log::debug!(
                        "Skipping catalog row {}: invalid {} '{}'",
                        row_no,
                        DECAY_COLUMN,
                        raw_decay
                    );
                    skipped += 1;
                    continue;
                }
            }
        };

        if !seen.insert(object_id) {
            return Err(TleError::CatalogParse(format!(
                "row {row_no}: duplicate {ID_COLUMN} {object_id}"
            )));
        }

        rows.push(CatalogRow {
            object_id,
            decay_date,
        });
    }

    if skipped > 0 {
        log::warn!("Catalog parsed with {} malformed rows skipped", skipped);
    }
    Ok(rows)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> TleResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| TleError::CatalogParse(format!("missing column {name}")))
}
