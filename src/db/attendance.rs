//! Attendance table operations
//!
//! One row per participant per session. The (student_id, session_id)
//! uniqueness guard makes re-inserting during a resumed session a no-op
//! instead of a duplicate.

use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::Result;

/// One attendance row, as stored and as sent to the aggregation server.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRow {
    pub student_id: String,
    pub session_id: String,
    pub is_new: bool,
}

pub async fn insert(
    pool: &SqlitePool,
    student_id: &str,
    session_id: &str,
    is_new: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO attendance (student_id, session_id, is_new)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(session_id)
    .bind(is_new as i64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn rows_for_session(pool: &SqlitePool, session_id: &str) -> Result<Vec<AttendanceRow>> {
    let rows = sqlx::query(
        "SELECT student_id, session_id, is_new FROM attendance WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_from).collect())
}

/// Every attendance row across all sessions, ordered for stable digests.
pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<AttendanceRow>> {
    let rows = sqlx::query(
        "SELECT student_id, session_id, is_new FROM attendance ORDER BY student_id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_from).collect())
}

/// Remove one participant's attendance row for a session (record deletion).
pub async fn delete_row(pool: &SqlitePool, session_id: &str, student_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM attendance WHERE session_id = ? AND student_id = ?")
        .bind(session_id)
        .bind(student_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Cheap change-detection digest over the full attendance dataset, sent to
/// the aggregation server when a connection is established.
pub fn digest(rows: &[AttendanceRow]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        hasher.update(row.student_id.as_bytes());
        hasher.update(row.session_id.as_bytes());
        hasher.update([row.is_new as u8]);
    }
    hasher.update(rows.len().to_le_bytes());
    hex::encode(hasher.finalize())
}

fn row_from(row: &sqlx::sqlite::SqliteRow) -> AttendanceRow {
    AttendanceRow {
        student_id: row.get("student_id"),
        session_id: row.get("session_id"),
        is_new: row.get::<i64, _>("is_new") != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_is_idempotent_per_session() {
        let pool = crate::db::memory_pool().await;
        insert(&pool, "00123", "1_1_2026", true).await.unwrap();
        insert(&pool, "00123", "1_1_2026", true).await.unwrap();
        insert(&pool, "00123", "1_8_2026", false).await.unwrap();

        let rows = rows_for_session(&pool, "1_1_2026").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_new);

        let all = fetch_all(&pool).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn digest_changes_with_content() {
        let a = vec![AttendanceRow {
            student_id: "00123".into(),
            session_id: "1_1_2026".into(),
            is_new: true,
        }];
        let mut b = a.clone();
        b[0].is_new = false;

        assert_ne!(digest(&a), digest(&b));
        assert_eq!(digest(&a), digest(&a));
    }
}
