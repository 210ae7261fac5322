//! Roster sheet adapter
//!
//! Reads the roster sheet into positional rows (one header row skipped) and
//! writes non-deleted records back out as a fixed-column table, overwriting
//! any previous file of the same name. The per-session sheet
//! (`<key>_Master.csv`) is preferred over the shared master on read and is
//! always the write target, so a resumed session picks up its own state.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::store::Participant;
use crate::Result;

use super::COLUMNS;

/// Pick the sheet to populate from: the per-session file if one exists,
/// otherwise the shared master, otherwise nothing.
pub fn resolve_read_path(config: &Config, session_key: &str) -> Option<PathBuf> {
    let session_sheet = config.session_roster_path(session_key);
    if session_sheet.exists() {
        return Some(session_sheet);
    }
    let master = config.roster_path();
    if master.exists() {
        return Some(master);
    }
    None
}

/// Read all data rows from a sheet as positional cell arrays, skipping the
/// header row. Short rows are padded by the store on insert.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(rows)
}

/// Write non-deleted records as a fixed-column sheet. Overwrites.
pub fn write_sheet(path: &Path, entries: &[Participant]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(COLUMNS)?;

    let mut written = 0usize;
    for entry in entries.iter().filter(|e| !e.deleted) {
        writer.write_record(row_for(entry))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// One output row. `AT_EVENT`/`IS_NEW` are `"1"` or a single space so
/// spreadsheet tools keep the cells string-typed.
pub(super) fn row_for(entry: &Participant) -> [String; 8] {
    let marker = |b: bool| if b { "1".to_string() } else { " ".to_string() };
    [
        entry.id.clone(),
        entry.last.clone(),
        entry.first.clone(),
        entry.year.clone(),
        entry.major.clone(),
        entry.email.clone(),
        marker(entry.registered),
        marker(entry.is_new),
    ]
}
