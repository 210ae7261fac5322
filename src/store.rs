//! In-memory roster record store
//!
//! Owns the participant collection for the running process. Every other
//! component (persistence adapters, sync client, front door) works against
//! read snapshots of this store and reports durable-write outcomes back so
//! the sync flags can be updated here.
//!
//! Mutations are synchronous; callers hold the store's lock for the duration
//! of a single operation and never across an await point.

use serde::Serialize;
use thiserror::Error;

/// One participant entry.
///
/// `id` is assigned exactly once, at creation, and never mutated. Ids are
/// externally issued and not guaranteed unique: scans of badly printed
/// barcodes produce leading-zero variants (`123` vs `00123`), which the
/// check-in path compensates for.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub id: String,
    pub first: String,
    pub last: String,
    pub year: String,
    pub major: String,
    pub email: String,
    /// Lifetime count of check-ins
    pub visits: u32,
    /// Checked in during the current session
    pub registered: bool,
    /// First-ever appearance of this participant
    pub is_new: bool,
    /// Soft-delete marker; deleted entries are excluded from exports but
    /// retained in memory
    pub deleted: bool,
    /// A persistence adapter has durably stored this participant
    pub in_backing_store: bool,
    /// This session's attendance row for this participant has been stored
    pub in_session_table: bool,
}

impl Participant {
    /// Value of one searchable field.
    fn field(&self, f: Field) -> &str {
        match f {
            Field::Id => &self.id,
            Field::First => &self.first,
            Field::Last => &self.last,
            Field::Year => &self.year,
            Field::Major => &self.major,
            Field::Email => &self.email,
        }
    }
}

/// Field set for creating a brand-new participant from the front door.
#[derive(Debug, Clone, Default)]
pub struct NewParticipant {
    pub id: String,
    pub first: String,
    pub last: String,
    pub year: String,
    pub major: String,
    pub email: String,
}

/// Keyed row loaded from the relational backing store.
#[derive(Debug, Clone)]
pub struct StoredParticipant {
    pub id: String,
    pub first: String,
    pub last: String,
    pub year: String,
    pub major: String,
    pub email: String,
}

/// Searchable participant fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    First,
    Last,
    Year,
    Major,
    Email,
}

/// Lookup criteria for [`Roster::find`].
///
/// `Fields` constraints are AND-combined equality; `Any` tests one scalar
/// against every searchable field, OR-combined. Matching is case-sensitive.
#[derive(Debug, Clone)]
pub enum Query<'a> {
    /// Equality on the id field (the common case)
    Id(&'a str),
    /// AND-combined field equality constraints
    Fields(&'a [(Field, &'a str)]),
    /// OR-combined scalar match over id/first/last/year/major/email
    Any(&'a str),
}

/// Outcome of a front-door check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckIn {
    /// Id (and its leading-zero variant) matched nothing
    NotFound,
    /// Fresh registration for this session
    Registered(usize),
    /// Entry was already registered this session; nothing changed
    AlreadyRegistered(usize),
}

/// Mutating-operation failures.
///
/// Lookups never produce these; absent ids yield empty result sets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("The entry with id {0} has already been deleted")]
    AlreadyDeleted(String),
    #[error("No entry was passed for deletion")]
    NoEntry,
}

/// Aggregate counters kept alongside the entries.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreStats {
    /// Participants registered this session
    pub registered: u32,
    /// First-ever participants registered this session
    pub registered_new: u32,
    /// Soft-deleted entries
    pub deleted: u32,
}

/// The roster: participant entries plus per-session registration state.
///
/// Entries are append-only; an index handed out by `find`/`add` stays valid
/// for the process lifetime, which is what lets adapters report row outcomes
/// by index after working on a snapshot.
#[derive(Debug, Default)]
pub struct Roster {
    entries: Vec<Participant>,
    /// Indices of entries registered this session, in registration order
    recent: Vec<usize>,
    /// Subset of `recent` that are first-ever appearances
    recent_new: Vec<usize>,
    stats: StoreStats,
    populated: bool,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a participant from a positional sheet row:
    /// `[ID, LAST, FIRST, YEAR, MAJOR, EMAIL, AT_EVENT, IS_NEW]`.
    ///
    /// Missing trailing cells are treated as empty. An `AT_EVENT` cell of
    /// `"1"` marks the entry registered and counts toward the registered
    /// total (resuming a session from a previously exported sheet).
    ///
    /// No duplicate check is performed; callers pre-check with [`find`].
    ///
    /// [`find`]: Roster::find
    pub fn add_sheet_row(&mut self, cells: &[String]) -> usize {
        let cell = |i: usize| cells.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        let flag = |i: usize| cells.get(i).map(|s| s.trim() == "1").unwrap_or(false);

        let registered = flag(6);
        let entry = Participant {
            id: cell(0),
            last: cell(1),
            first: cell(2),
            year: cell(3),
            major: cell(4),
            email: cell(5),
            visits: 0,
            registered,
            is_new: flag(7),
            deleted: false,
            in_backing_store: false,
            in_session_table: false,
        };

        self.entries.push(entry);
        let idx = self.entries.len() - 1;
        if registered {
            self.stats.registered += 1;
            self.recent.push(idx);
        }
        idx
    }

    /// Insert a participant loaded from the relational backing store.
    pub fn add_stored(&mut self, row: StoredParticipant) -> usize {
        self.entries.push(Participant {
            id: row.id,
            first: row.first,
            last: row.last,
            year: row.year,
            major: row.major,
            email: row.email,
            visits: 0,
            registered: false,
            is_new: false,
            deleted: false,
            in_backing_store: true,
            in_session_table: false,
        });
        self.entries.len() - 1
    }

    pub fn get(&self, idx: usize) -> Option<&Participant> {
        self.entries.get(idx)
    }

    /// Total number of entries, including soft-deleted ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries registered this session (the `size("registered")`
    /// mode of the original interface).
    pub fn registered_count(&self) -> u32 {
        self.stats.registered
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Whether an external source has populated the roster.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn set_populated(&mut self) {
        self.populated = true;
    }

    /// Linear-scan lookup. Returns indices of all matching entries; an
    /// unknown id yields an empty vec, never an error.
    pub fn find(&self, query: &Query) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, p)| match query {
                Query::Id(id) => p.id == *id,
                Query::Fields(constraints) => {
                    constraints.iter().all(|(f, v)| p.field(*f) == *v)
                }
                Query::Any(term) => {
                    p.id == *term
                        || p.first == *term
                        || p.last == *term
                        || p.year == *term
                        || p.major == *term
                        || p.email == *term
                }
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// First entry matching the id, if any.
    pub fn find_by_id(&self, id: &str) -> Option<usize> {
        self.find(&Query::Id(id)).into_iter().next()
    }

    /// Front-door check-in by scanned id.
    ///
    /// Falls back to the `00`-prefixed variant when the raw id is unknown
    /// (scanners drop leading zeros on some badge formats). A fresh
    /// registration bumps the entry's lifetime visit count; repeat scans in
    /// the same session change nothing.
    pub fn check_in(&mut self, id: &str) -> CheckIn {
        let idx = match self.find_by_id(id) {
            Some(idx) => idx,
            None => {
                let padded = format!("00{}", id);
                match self.find_by_id(&padded) {
                    Some(idx) => idx,
                    None => return CheckIn::NotFound,
                }
            }
        };

        if self.entries[idx].registered {
            return CheckIn::AlreadyRegistered(idx);
        }

        self.entries[idx].visits += 1;
        self.register(idx, false);
        CheckIn::Registered(idx)
    }

    /// Mark an entry as registered for this session and append it to the
    /// recently-registered list.
    ///
    /// Idempotent in both the flag and the counter: registering an entry
    /// twice leaves `registered == true`, does not re-append it, and does
    /// not re-increment the registered total. Returns whether this call
    /// performed the registration.
    ///
    /// `in_session_table` records that the attendance row for this entry is
    /// already durably stored (restore-from-backing-store path).
    pub fn register(&mut self, idx: usize, in_session_table: bool) -> bool {
        let entry = match self.entries.get_mut(idx) {
            Some(e) => e,
            None => return false,
        };

        if in_session_table {
            entry.in_session_table = true;
        }

        if entry.registered {
            return false;
        }

        entry.registered = true;
        self.recent.push(idx);
        self.stats.registered += 1;
        true
    }

    /// Insert and register a first-ever participant.
    pub fn register_new(&mut self, fields: NewParticipant) -> usize {
        self.entries.push(Participant {
            id: fields.id,
            first: fields.first,
            last: fields.last,
            year: fields.year,
            major: fields.major,
            email: fields.email,
            visits: 1,
            registered: false,
            is_new: true,
            deleted: false,
            in_backing_store: false,
            in_session_table: false,
        });
        let idx = self.entries.len() - 1;
        self.register(idx, false);
        self.recent_new.push(idx);
        self.stats.registered_new += 1;
        idx
    }

    /// Register an existing entry as this session's new registrant without
    /// re-inserting it (restoring a resumed session whose attendance row is
    /// already in the backing store).
    pub fn register_new_existing(&mut self, idx: usize) {
        if !self.register(idx, true) {
            return;
        }
        if let Some(entry) = self.entries.get_mut(idx) {
            entry.is_new = true;
        }
        self.recent_new.push(idx);
        self.stats.registered_new += 1;
    }

    /// Soft-delete an entry.
    ///
    /// Fails with [`StoreError::AlreadyDeleted`] on a second deletion and
    /// [`StoreError::NoEntry`] when no target is supplied; counters are
    /// untouched on failure.
    pub fn remove(&mut self, idx: Option<usize>) -> Result<(), StoreError> {
        let idx = idx.ok_or(StoreError::NoEntry)?;
        let entry = self.entries.get_mut(idx).ok_or(StoreError::NoEntry)?;

        if entry.deleted {
            return Err(StoreError::AlreadyDeleted(entry.id.clone()));
        }

        entry.deleted = true;
        if entry.registered {
            self.stats.registered = self.stats.registered.saturating_sub(1);
        }
        self.stats.deleted += 1;
        Ok(())
    }

    /// First non-deleted entry of the recently-registered list.
    pub fn recent_first(&self) -> Option<usize> {
        self.recent
            .iter()
            .copied()
            .find(|&i| !self.entries[i].deleted)
    }

    /// Last non-deleted entry of the recently-registered list.
    pub fn recent_last(&self) -> Option<usize> {
        self.recent
            .iter()
            .rev()
            .copied()
            .find(|&i| !self.entries[i].deleted)
    }

    /// Clone of every entry, for adapters to work on outside the lock.
    pub fn snapshot(&self) -> Vec<Participant> {
        self.entries.clone()
    }

    /// Report that an adapter durably stored this participant.
    pub fn mark_in_backing_store(&mut self, idx: usize) {
        if let Some(entry) = self.entries.get_mut(idx) {
            entry.in_backing_store = true;
        }
    }

    /// Report that an adapter stored this session's attendance row.
    pub fn mark_in_session_table(&mut self, idx: usize) {
        if let Some(entry) = self.entries.get_mut(idx) {
            entry.in_session_table = true;
        }
    }

    /// Flag every entry as present in the backing store (population from the
    /// store itself).
    pub fn mark_all_in_backing_store(&mut self) {
        for entry in &mut self.entries {
            entry.in_backing_store = true;
        }
    }
}
