//! Session/event context
//!
//! Identifies the current session by a date-derived key (`M_D_YYYY`), tracks
//! its human-readable name and persistence state, and owns the historical
//! attendance averages computed from prior sessions.
//!
//! The context is created once at process start and lives for the process
//! lifetime; it is recorded into the backing store lazily, on first
//! successful connection.

use chrono::{Datelike, Local};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::db::{self, SessionRow};
use crate::store::Roster;
use crate::Result;

/// The current session: key, label, and historical aggregates.
#[derive(Debug, Clone)]
pub struct Session {
    key: String,
    name: String,
    created_in_store: bool,
    /// Average attendance across prior sessions
    pub average: f64,
    /// Average first-ever attendee count across prior sessions
    pub average_new: f64,
}

impl Session {
    /// Build the session context from the current date, or from a
    /// caller-supplied override key.
    ///
    /// Invalid overrides are ignored with a warning, not an error.
    pub fn identify(override_key: Option<&str>) -> Self {
        let key = match override_key {
            Some(k) if is_valid_key(k) => {
                info!("Forcing session key override; storing records under '{}'", k);
                k.to_string()
            }
            Some(k) => {
                warn!(
                    "Ignoring session key override '{}': expected M_D_YYYY format",
                    k
                );
                todays_key()
            }
            None => todays_key(),
        };

        Self {
            name: key.clone(),
            key,
            created_in_store: false,
            average: 0.0,
            average_new: 0.0,
        }
    }

    /// Date-derived partition key for persistence adapters.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Human label; defaults to the key until renamed.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Whether the session row has been created in the backing store.
    pub fn created_in_store(&self) -> bool {
        self.created_in_store
    }

    /// Idempotently create the session row, then re-synchronize in-memory
    /// registration state from any attendance rows already stored for this
    /// key (resuming a session after a restart), recover a previously
    /// assigned name, and refresh historical averages.
    ///
    /// A failure creating the session row is unrecoverable for the caller:
    /// every session-scoped operation depends on it.
    pub async fn ensure_persisted(
        &mut self,
        pool: &sqlx::SqlitePool,
        roster: &RwLock<Roster>,
    ) -> Result<()> {
        if !self.created_in_store {
            db::sessions::create_if_missing(
                pool,
                &self.key,
                &self.name,
                current_semester(),
                current_year(),
            )
            .await?;
            self.created_in_store = true;
            info!("Session '{}' recorded in the sessions table", self.key);
        }

        // Restore registration flags from attendance rows stored by an
        // earlier run of the same session.
        let rows = db::attendance::rows_for_session(pool, &self.key).await?;
        if !rows.is_empty() {
            let mut roster = roster.write().await;
            let mut restored = 0usize;
            for row in &rows {
                if let Some(idx) = roster.find_by_id(&row.student_id) {
                    if row.is_new {
                        roster.register_new_existing(idx);
                    } else {
                        roster.register(idx, true);
                    }
                    restored += 1;
                }
            }
            info!(
                "Restored {} of {} attendance rows for session '{}'",
                restored,
                rows.len(),
                self.key
            );
        }

        let sessions = db::sessions::fetch_all(pool).await?;
        if let Some(row) = sessions.iter().find(|r| r.session_id == self.key) {
            if !row.name.is_empty() && row.name != self.name {
                info!("Recovering previous session name '{}'", row.name);
                self.name = row.name.clone();
            }
        }

        let (average, average_new) = historical_averages(&sessions, &self.key);
        self.average = average;
        self.average_new = average_new;

        Ok(())
    }

    /// Rename the session and propagate the change to the backing store.
    pub async fn rename(&mut self, pool: &sqlx::SqlitePool, new_name: &str) -> Result<()> {
        self.name = new_name.to_string();
        db::sessions::update_name(pool, &self.key, new_name).await?;
        info!("Renamed session '{}' to '{}'", self.key, self.name);
        Ok(())
    }
}

/// Average registered / newly-registered counts across all sessions except
/// the current one.
///
/// With 0 or 1 total session rows there is nothing prior to average over and
/// the result is 0, never NaN or infinity.
pub fn historical_averages(rows: &[SessionRow], current_key: &str) -> (f64, f64) {
    if rows.len() <= 1 {
        return (0.0, 0.0);
    }

    let mut total = 0i64;
    let mut total_new = 0i64;
    for row in rows.iter().filter(|r| r.session_id != current_key) {
        total += row.total;
        total_new += row.total_new;
    }

    let prior = (rows.len() - 1) as f64;
    (total as f64 / prior, total_new as f64 / prior)
}

/// `M_D_YYYY` key for today's date.
pub fn todays_key() -> String {
    let now = Local::now();
    format!("{}_{}_{}", now.month(), now.day(), now.year())
}

/// Validate a caller-supplied session key override: one or two digits, an
/// underscore, one or two digits, an underscore, exactly four digits.
pub fn is_valid_key(key: &str) -> bool {
    let parts: Vec<&str> = key.split('_').collect();
    if parts.len() != 3 {
        return false;
    }
    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    numeric(parts[0])
        && parts[0].len() <= 2
        && numeric(parts[1])
        && parts[1].len() <= 2
        && numeric(parts[2])
        && parts[2].len() == 4
}

/// Academic semester for the current date: Jan-Jun spring, Jul-Aug summer,
/// Sep-Dec fall.
pub fn current_semester() -> &'static str {
    semester_for_month(Local::now().month())
}

pub fn semester_for_month(month: u32) -> &'static str {
    match month {
        1..=6 => "spring",
        7..=8 => "summer",
        _ => "fall",
    }
}

pub fn current_year() -> i32 {
    Local::now().year()
}
