//! Sessions table operations
//!
//! One row per event/session, keyed by the `M_D_YYYY` session key. Totals
//! are refreshed during relational sync so later runs can average them.

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::Result;

/// One session row.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRow {
    pub session_id: String,
    pub name: String,
    pub semester: String,
    pub year: i32,
    pub total: i64,
    pub total_new: i64,
}

/// Create the session row if it does not exist yet. Idempotent.
pub async fn create_if_missing(
    pool: &SqlitePool,
    session_id: &str,
    name: &str,
    semester: &str,
    year: i32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO sessions (session_id, name, semester, year)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(name)
    .bind(semester)
    .bind(year)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<SessionRow>> {
    let rows = sqlx::query(
        "SELECT session_id, name, semester, year, total, total_new FROM sessions",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SessionRow {
            session_id: row.get("session_id"),
            name: row.get("name"),
            semester: row.get("semester"),
            year: row.get::<i64, _>("year") as i32,
            total: row.get("total"),
            total_new: row.get("total_new"),
        })
        .collect())
}

pub async fn update_name(pool: &SqlitePool, session_id: &str, name: &str) -> Result<()> {
    sqlx::query("UPDATE sessions SET name = ? WHERE session_id = ?")
        .bind(name)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Refresh this session's attendance totals after a relational sync.
pub async fn update_totals(
    pool: &SqlitePool,
    session_id: &str,
    total: u32,
    total_new: u32,
) -> Result<()> {
    sqlx::query("UPDATE sessions SET total = ?, total_new = ? WHERE session_id = ?")
        .bind(total as i64)
        .bind(total_new as i64)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}
