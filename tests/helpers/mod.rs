//! Shared test helpers

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use rollcall::config::Config;
use rollcall::events::EventBus;
use rollcall::session::Session;
use rollcall::store::Roster;
use rollcall::sync::SyncClient;
use rollcall::AppState;

/// Fixed session key so tests never depend on the wall clock
pub const TEST_SESSION_KEY: &str = "3_10_2016";

/// App state over an in-memory backing store and a disabled sync client.
pub async fn state_with_store(data_dir: PathBuf) -> AppState {
    let pool = rollcall::db::memory_pool().await;
    build_state(data_dir, Some(pool)).await
}

/// App state without a backing store (sheet mode).
pub async fn state_without_store(data_dir: PathBuf) -> AppState {
    build_state(data_dir, None).await
}

pub async fn build_state(data_dir: PathBuf, db: Option<sqlx::SqlitePool>) -> AppState {
    let config = Config {
        data_dir,
        ..Config::default()
    };

    AppState::new(
        Arc::new(config),
        Arc::new(RwLock::new(Roster::new())),
        Arc::new(RwLock::new(Session::identify(Some(TEST_SESSION_KEY)))),
        db,
        EventBus::new(16),
        SyncClient::disabled(),
    )
}

/// Positional sheet row in the adapter's column order.
pub fn sheet_row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}
