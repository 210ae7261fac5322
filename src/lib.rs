//! # rollcall library
//!
//! Event check-in and attendance tracking: an in-memory roster record store
//! behind a local HTTP front door and a stdin scanner, persisted through a
//! SQLite backing store and sheet/CSV exports, with a best-effort sync
//! client mirroring session data to a remote aggregation service.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod autosave;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod export;
pub mod session;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};

use events::EventBus;
use session::Session;
use store::Roster;
use sync::SyncClient;

/// Application state shared across HTTP handlers and background tasks
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The single shared mutable resource; everything else is a connection
    /// or file owned by its adapter
    pub roster: Arc<RwLock<Roster>>,
    pub session: Arc<RwLock<Session>>,
    /// None when the backing store was unavailable at startup (sheet mode)
    pub db: Option<SqlitePool>,
    pub bus: EventBus,
    pub sync: SyncClient,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        roster: Arc<RwLock<Roster>>,
        session: Arc<RwLock<Session>>,
        db: Option<SqlitePool>,
        bus: EventBus,
        sync: SyncClient,
    ) -> Self {
        Self {
            config,
            roster,
            session,
            db,
            bus,
            sync,
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/register", post(api::check_in))
        .route("/register/new", post(api::register_new))
        .route("/command", post(api::run_command))
        .route("/", get(api::serve_index))
        .merge(api::health_routes())
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
