//! Persistence adapters and export orchestration
//!
//! Three swappable sinks consume roster snapshots: the relational backing
//! store, the roster sheet file, and a flat CSV export. Every adapter
//! completes exactly once through its `Result` and mutates nothing in the
//! store except the per-record sync flags, which are reported back row by
//! row.

use serde_json::json;
use tracing::info;

use crate::db;
use crate::{AppState, Error, Result};

pub mod flat_csv;
pub mod relational;
pub mod sheet;

/// Fixed column set shared by the sheet and flat CSV adapters.
pub const COLUMNS: [&str; 8] = [
    "ID", "LAST", "FIRST", "YEAR", "MAJOR", "EMAIL", "AT_EVENT", "IS_NEW",
];

/// Export destinations.
///
/// Parsed from the original command tokens (`excel`, `csv`, `mysql`), which
/// are kept for interface compatibility with existing clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Roster sheet file
    Sheet,
    /// Flat per-session CSV
    FlatCsv,
    /// Relational backing store
    Relational,
}

impl ExportFormat {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "excel" | "sheet" => Some(Self::Sheet),
            "csv" => Some(Self::FlatCsv),
            "mysql" | "db" => Some(Self::Relational),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sheet => "sheet",
            Self::FlatCsv => "csv",
            Self::Relational => "db",
        }
    }
}

/// Run one export.
///
/// Mirrors the session roster to the remote aggregation service first when a
/// connection is up (never queued: an offline server must not be flooded
/// with buffered export payloads when it comes back).
pub async fn run(state: &AppState, format: ExportFormat) -> Result<()> {
    if state.sync.is_connected() {
        let snapshot = state.roster.read().await.snapshot();
        let attendance = match &state.db {
            Some(pool) => db::attendance::fetch_all(pool).await.unwrap_or_default(),
            None => Vec::new(),
        };
        let name = state.session.read().await.name().to_string();
        state
            .sync
            .send(
                "eventdata",
                json!({
                    "students": snapshot,
                    "attendance": attendance,
                    "eventname": name,
                }),
            )
            .await;
        info!("Synced roster and attendance snapshot with the aggregation server");
    }

    let session_key = state.session.read().await.key().to_string();

    match format {
        ExportFormat::Sheet => {
            let snapshot = state.roster.read().await.snapshot();
            let path = state.config.session_roster_path(&session_key);
            let written = sheet::write_sheet(&path, &snapshot)?;
            info!("Sheet export complete: {} rows -> {}", written, path.display());
            Ok(())
        }
        ExportFormat::FlatCsv => {
            let snapshot = state.roster.read().await.snapshot();
            let path = state.config.export_path(&session_key);
            let written = flat_csv::write_export(&path, &snapshot)?;
            info!("CSV export complete: {} rows -> {}", written, path.display());
            Ok(())
        }
        ExportFormat::Relational => {
            let pool = state.db.as_ref().ok_or_else(|| {
                Error::Config("Backing store unavailable; use the sheet or csv export".to_string())
            })?;
            let report = relational::sync_to_store(pool, state).await?;
            info!(
                "Store sync complete: {} participants, {} attendance rows ({} row failures)",
                report.participants_inserted, report.attendance_inserted, report.rows_failed
            );
            Ok(())
        }
    }
}
