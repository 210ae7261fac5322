//! Participant table operations

use sqlx::{Row, SqlitePool};

use crate::store::{Participant, StoredParticipant};
use crate::Result;

/// Insert one participant row. `date_added` is the session key of the run
/// that first stored the record.
pub async fn insert(pool: &SqlitePool, entry: &Participant, date_added: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO participants (student_id, last, first, year, major, email, date_added)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.last)
    .bind(&entry.first)
    .bind(&entry.year)
    .bind(&entry.major)
    .bind(&entry.email)
    .bind(date_added)
    .execute(pool)
    .await?;
    Ok(())
}

/// All participants ordered by last name, the population order of the
/// original roster.
pub async fn fetch_all_ordered(pool: &SqlitePool) -> Result<Vec<StoredParticipant>> {
    let rows = sqlx::query(
        "SELECT student_id, last, first, year, major, email FROM participants ORDER BY last ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| StoredParticipant {
            id: row.get("student_id"),
            last: row.get("last"),
            first: row.get("first"),
            year: row.get("year"),
            major: row.get("major"),
            email: row.get("email"),
        })
        .collect())
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
        .fetch_one(pool)
        .await?;
    Ok(n)
}
