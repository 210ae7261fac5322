//! Flat CSV export adapter
//!
//! Same fixed columns as the sheet adapter, written to the per-session
//! export file. Write-only; the sheet adapter owns the read side.

use std::path::Path;

use crate::store::Participant;
use crate::Result;

use super::{sheet, COLUMNS};

/// Write non-deleted records as a flat CSV. Overwrites.
pub fn write_export(path: &Path, entries: &[Participant]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(COLUMNS)?;

    let mut written = 0usize;
    for entry in entries.iter().filter(|e| !e.deleted) {
        writer.write_record(sheet::row_for(entry))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
