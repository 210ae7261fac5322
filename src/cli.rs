//! Command-line scanner input
//!
//! A barcode scanner behaves like a keyboard that types an id and presses
//! Enter, so stdin is consumed line by line. `/export/<excel|csv>` runs the
//! matching export; any other non-empty line is treated as a scanned
//! identifier and checked in.

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::events::AppEvent;
use crate::export::{self, ExportFormat};
use crate::store::CheckIn;
use crate::AppState;

/// Spawn the stdin scanner loop.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            handle_line(&state, line.trim()).await;
        }
    })
}

async fn handle_line(state: &AppState, line: &str) {
    if line.is_empty() {
        return;
    }

    if let Some(token) = line.strip_prefix("/export/") {
        match ExportFormat::parse(token) {
            Some(format) => match export::run(state, format).await {
                Ok(()) => info!("Export '{}' complete", format.as_str()),
                Err(e) => warn!("There was an error exporting the data: {}", e),
            },
            None => warn!("Unknown export type '{}'", token),
        }
        return;
    }

    if line.starts_with('/') {
        warn!("Unknown command '{}'", line);
        return;
    }

    scan(state, line).await;
}

async fn scan(state: &AppState, id: &str) {
    let outcome = {
        let mut roster = state.roster.write().await;
        if !roster.is_populated() && roster.is_empty() {
            info!("The roster must be loaded before ids can be processed.");
            return;
        }
        let outcome = roster.check_in(id);
        match outcome {
            CheckIn::Registered(idx) | CheckIn::AlreadyRegistered(idx) => {
                if let Some(entry) = roster.get(idx) {
                    if matches!(outcome, CheckIn::Registered(_)) {
                        info!("Welcome back, {} {}!", entry.first, entry.last);
                    } else {
                        info!("{} {} is already checked in.", entry.first, entry.last);
                    }
                }
            }
            CheckIn::NotFound => {
                warn!(
                    "Id '{}' does not exist. Use the web client (http://{}:{}/) to add new entries.",
                    id, state.config.host, state.config.port
                );
            }
        }
        outcome
    };

    if matches!(outcome, CheckIn::Registered(_)) {
        state.bus.emit_lossy(AppEvent::ParticipantRegistered {
            id: id.to_string(),
            is_new: false,
            timestamp: Utc::now(),
        });
    }
}
