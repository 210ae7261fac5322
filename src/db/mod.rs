//! SQLite backing store
//!
//! Pool initialization plus one query module per table. The schema is
//! created idempotently at startup; an unreachable or uncreatable database
//! is reported to the caller, which falls back to the sheet source.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

use crate::Result;

pub mod attendance;
pub mod participants;
pub mod sessions;

pub use attendance::AttendanceRow;
pub use sessions::SessionRow;

/// Open (creating if needed) the database file and ensure the schema exists.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL keeps readers (stats queries) unblocked during autosave writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables if they do not exist. Safe to call repeatedly.
///
/// Split out from [`init_database`] so tests can run it against in-memory
/// pools.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_participants_table(pool).await?;
    create_attendance_table(pool).await?;
    create_sessions_table(pool).await?;
    Ok(())
}

async fn create_participants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            student_id TEXT PRIMARY KEY,
            last TEXT NOT NULL DEFAULT '',
            first TEXT NOT NULL DEFAULT '',
            year TEXT NOT NULL DEFAULT '',
            major TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            date_added TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_attendance_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            student_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            is_new INTEGER NOT NULL DEFAULT 0,
            UNIQUE (student_id, session_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            semester TEXT NOT NULL DEFAULT '',
            year INTEGER NOT NULL DEFAULT 0,
            total INTEGER NOT NULL DEFAULT 0,
            total_new INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// In-memory pool for tests. Pinned to one connection so every query sees
/// the same memory database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    init_schema(&pool).await.expect("schema");
    pool
}
