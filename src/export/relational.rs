//! Relational adapter: roster -> backing store
//!
//! On first use against an empty participants table every record is
//! bulk-inserted; afterwards only records not yet marked as stored go in.
//! Attendance rows are inserted for records registered this session whose
//! row is not yet stored. Row-level failures are logged and skipped without
//! aborting the batch; each successful insert reports back and flips that
//! record's sync flag.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db;
use crate::{AppState, Result};

/// Outcome summary of one sync run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub participants_inserted: usize,
    pub attendance_inserted: usize,
    pub rows_failed: usize,
}

/// Push roster state into the backing store.
///
/// Works on a snapshot; a check-in racing the sync is picked up by the next
/// run. Indices into the snapshot remain valid in the live roster (entries
/// are append-only), which is how per-row outcomes are reported back.
pub async fn sync_to_store(pool: &SqlitePool, state: &AppState) -> Result<SyncReport> {
    let snapshot = state.roster.read().await.snapshot();
    let session_key = state.session.read().await.key().to_string();

    let mut report = SyncReport::default();

    let backing_empty = db::participants::count(pool).await? == 0;
    if backing_empty && !snapshot.is_empty() {
        info!("Backing store is empty; bulk-inserting {} records", snapshot.len());
    }

    for (idx, entry) in snapshot.iter().enumerate() {
        if entry.in_backing_store {
            continue;
        }

        match db::participants::insert(pool, entry, &session_key).await {
            Ok(()) => {
                state.roster.write().await.mark_in_backing_store(idx);
                report.participants_inserted += 1;
            }
            Err(e) => {
                warn!("Skipping participant row {}: {}", entry.id, e);
                report.rows_failed += 1;
            }
        }
    }

    for (idx, entry) in snapshot.iter().enumerate() {
        if !entry.registered || entry.in_session_table || entry.deleted {
            continue;
        }

        match db::attendance::insert(pool, &entry.id, &session_key, entry.is_new).await {
            Ok(()) => {
                state.roster.write().await.mark_in_session_table(idx);
                report.attendance_inserted += 1;
            }
            Err(e) => {
                warn!("Skipping attendance row {}: {}", entry.id, e);
                report.rows_failed += 1;
            }
        }
    }

    // Keep the session totals current so later runs can average them
    let stats = state.roster.read().await.stats();
    db::sessions::update_totals(pool, &session_key, stats.registered, stats.registered_new)
        .await?;

    Ok(report)
}
