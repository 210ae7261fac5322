//! rollcall - event check-in and attendance tracking
//!
//! Reads the roster from the SQLite backing store (falling back to the
//! roster sheet), serves the check-in HTTP front door and the stdin scanner,
//! autosaves on a timer, and mirrors session data to a remote aggregation
//! server when one is configured.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use rollcall::config::Config;
use rollcall::db;
use rollcall::events::{AppEvent, EventBus, RosterSource};
use rollcall::export::{self, ExportFormat};
use rollcall::session::{self, Session};
use rollcall::store::Roster;
use rollcall::sync::{SendOutcome, SyncClient, SyncConfig};
use rollcall::{autosave, build_router, cli, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting rollcall v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = Arc::new(Config::load()?);
    std::fs::create_dir_all(&config.data_dir)?;

    let mut session = Session::identify(config.session_override.as_deref());
    info!("Current session key: {}", session.key());

    let roster = Arc::new(RwLock::new(Roster::new()));
    let bus = EventBus::new(128);

    // Backing store, with documented fallback to the sheet source
    let db = match db::init_database(&config.database_path()).await {
        Ok(pool) => {
            info!("✓ Connected to backing store");
            Some(pool)
        }
        Err(e) => {
            warn!(
                "Backing store unavailable ({}); using the roster sheet to populate instead",
                e
            );
            None
        }
    };

    // Populate the roster: stored rows when the backing store has data, the
    // roster sheet otherwise. An empty store populated from the sheet is
    // bulk-exported right after startup.
    let mut source = RosterSource::Empty;
    let mut bulk_export_needed = false;

    if let Some(pool) = &db {
        let stored = db::participants::fetch_all_ordered(pool).await?;
        if stored.is_empty() {
            info!("No data found in the backing store; trying the roster sheet");
            if populate_from_sheet(&config, session.key(), &roster).await? > 0 {
                source = RosterSource::Sheet;
                bulk_export_needed = true;
            }
        } else {
            let mut guard = roster.write().await;
            for row in stored {
                guard.add_stored(row);
            }
            guard.set_populated();
            info!("Populated roster with {} stored participants", guard.len());
            source = RosterSource::Store;
        }

        // All session-scoped operations depend on the session row; a
        // failure here is unrecoverable.
        if let Err(e) = session.ensure_persisted(pool, &roster).await {
            error!("FATAL: could not record session '{}': {}", session.key(), e);
            return Err(e.into());
        }
    } else if populate_from_sheet(&config, session.key(), &roster).await? > 0 {
        source = RosterSource::Sheet;
    }

    let sync = match &config.sync_addr {
        Some(addr) => SyncClient::connect(
            SyncConfig {
                addr: addr.clone(),
                retry_attempts: config.sync_retry_attempts,
                retry_delay: config.sync_retry_delay,
            },
            bus.clone(),
        ),
        None => {
            info!("Remote sync disabled (no sync address configured)");
            SyncClient::disabled()
        }
    };

    let state = AppState::new(
        Arc::clone(&config),
        Arc::clone(&roster),
        Arc::new(RwLock::new(session)),
        db,
        bus.clone(),
        sync.clone(),
    );

    // First-run bulk export of sheet data into the empty backing store
    let mut save_method = if state.db.is_some() {
        ExportFormat::Relational
    } else {
        ExportFormat::Sheet
    };
    if bulk_export_needed {
        match export::run(&state, ExportFormat::Relational).await {
            Ok(()) => info!("All roster entries exported to the backing store"),
            Err(e) => {
                warn!(
                    "An error occurred populating the empty backing store: {}; autosaving to the sheet instead",
                    e
                );
                save_method = ExportFormat::Sheet;
            }
        }
    }

    bus.emit_lossy(AppEvent::RosterReady {
        source,
        timestamp: chrono::Utc::now(),
    });

    autosave::spawn(state.clone(), save_method);
    cli::spawn(state.clone());
    spawn_event_loop(state.clone());
    send_session_metadata(&state).await;

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("rollcall listening on http://{}:{}", config.host, config.port);
    info!("Health check: http://{}:{}/health", config.host, config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Load the roster sheet (per-session file preferred) into the store.
/// Returns the number of rows loaded; 0 when no sheet exists.
async fn populate_from_sheet(
    config: &Config,
    session_key: &str,
    roster: &RwLock<Roster>,
) -> Result<usize> {
    let Some(path) = export::sheet::resolve_read_path(config, session_key) else {
        warn!("No roster sheet present; starting with an empty roster");
        return Ok(0);
    };

    let rows = export::sheet::read_rows(&path)?;
    let mut guard = roster.write().await;
    for row in &rows {
        guard.add_sheet_row(row);
    }
    guard.set_populated();
    info!(
        "Populated roster with {} rows from sheet {}",
        rows.len(),
        path.display()
    );
    Ok(rows.len())
}

/// Push session metadata to the aggregation server. Queued until the first
/// logical connection; dropped silently once the client has given up.
async fn send_session_metadata(state: &AppState) {
    let session = state.session.read().await;
    let payload = json!({
        "eventId": session.key(),
        "eventName": session.name(),
        "semester": session::current_semester(),
        "year": session::current_year(),
    });
    drop(session);

    let sync = state.sync.clone();
    tokio::spawn(async move {
        if sync.send("eventmetadata", payload).await == SendOutcome::Sent {
            info!("Synced session metadata with the aggregation server");
        }
    });
}

/// React to inbound sync events: push the attendance digest on connect and
/// the full dataset on request.
fn spawn_event_loop(state: AppState) -> JoinHandle<()> {
    use tokio::sync::broadcast::error::RecvError;

    tokio::spawn(async move {
        let mut rx = state.bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(AppEvent::RemoteConnected { client_id }) => {
                    info!("Registered with aggregation server as client '{}'", client_id);
                    send_attendance_digest(&state).await;
                }
                Ok(AppEvent::AttendanceRequested) => {
                    info!("Attendance data requested by the aggregation server; sending");
                    send_attendance_data(&state).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event loop lagged; skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn send_attendance_digest(state: &AppState) {
    let Some(pool) = &state.db else { return };
    match db::attendance::fetch_all(pool).await {
        Ok(rows) => {
            let digest = db::attendance::digest(&rows);
            let outcome = state
                .sync
                .send(
                    "eventdata",
                    json!({ "attendanceHash": { "digest": digest, "total": rows.len() } }),
                )
                .await;
            if outcome == SendOutcome::Sent {
                info!("Synced attendance digest with the aggregation server");
            }
        }
        Err(e) => warn!("Could not read attendance rows for digest: {}", e),
    }
}

async fn send_attendance_data(state: &AppState) {
    let Some(pool) = &state.db else { return };
    match db::attendance::fetch_all(pool).await {
        Ok(rows) => {
            state
                .sync
                .send("attendancedata", json!({ "attendanceData": rows }))
                .await;
        }
        Err(e) => warn!("Could not read attendance rows: {}", e),
    }
}
