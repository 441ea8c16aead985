//! Student record store: keyed reads/writes plus push subscriptions.
//!
//! Every successful write bumps the feed version and sends each live
//! subscriber a complete snapshot. Consumers keep only the newest snapshot
//! they have seen; nothing is merged.

use crate::model::{Branch, NewStudent, StudentRecord, Year};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("student not found: {0}")]
    NotFound(String),
    #[error("student already exists: {0}")]
    AlreadyExists(String),
    #[error("record key {key} does not match record id {id}")]
    KeyMismatch { key: String, id: String },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::AlreadyExists(_) => "already_exists",
            StoreError::KeyMismatch { .. } => "bad_params",
            StoreError::Unavailable(_) => "unavailable",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Branch/section membership; `None` means "All". Used by both
/// `CollectionFilter` and `RankCriteria`.
pub fn in_group(branch: Option<Branch>, section: Option<&str>, r: &StudentRecord) -> bool {
    branch.map(|b| r.branch == b).unwrap_or(true)
        && section.map(|s| r.section == s).unwrap_or(true)
}

/// Optional predicate for collection reads and subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionFilter {
    pub branch: Option<Branch>,
    pub section: Option<String>,
}

impl CollectionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, r: &StudentRecord) -> bool {
        in_group(self.branch, self.section.as_deref(), r)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub version: u64,
    pub data: T,
}

pub type CollectionSnapshot = Snapshot<Vec<StudentRecord>>;
pub type RecordSnapshot = Snapshot<Option<StudentRecord>>;

/// The operations the grade core needs from a record store.
pub trait RecordStore {
    fn get(&self, key: &str) -> Result<StudentRecord, StoreError>;
    fn list(&self, filter: &CollectionFilter) -> Result<Vec<StudentRecord>, StoreError>;
    fn put(&self, key: &str, record: &StudentRecord) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn subscribe_collection(
        &self,
        filter: CollectionFilter,
    ) -> Result<Subscription<Vec<StudentRecord>>, StoreError>;
    fn subscribe_key(&self, key: &str) -> Result<Subscription<Option<StudentRecord>>, StoreError>;
}

enum Sink {
    Collection {
        filter: CollectionFilter,
        tx: Sender<CollectionSnapshot>,
    },
    Record {
        key: String,
        tx: Sender<RecordSnapshot>,
    },
}

#[derive(Default)]
struct FeedInner {
    version: u64,
    next_id: u64,
    sinks: HashMap<u64, Sink>,
}

/// Fan-out point for store changes. Cloning shares the same subscribers.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<Mutex<FeedInner>>,
}

fn lock(inner: &Mutex<FeedInner>) -> MutexGuard<'_, FeedInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        lock(&self.inner).version
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).sinks.len()
    }

    fn register(&self, sink: Sink) -> u64 {
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner.sinks.insert(id, sink);
        id
    }

    /// Sends a fresh snapshot of `all` to every subscriber under a new
    /// version. Subscribers whose receiving side is gone are dropped.
    pub fn publish(&self, all: &[StudentRecord]) -> u64 {
        let mut inner = lock(&self.inner);
        inner.version += 1;
        let version = inner.version;
        inner.sinks.retain(|_, sink| match sink {
            Sink::Collection { filter, tx } => tx
                .send(Snapshot {
                    version,
                    data: all.iter().filter(|r| filter.matches(r)).cloned().collect(),
                })
                .is_ok(),
            Sink::Record { key, tx } => tx
                .send(Snapshot {
                    version,
                    data: all.iter().find(|r| &r.id == key).cloned(),
                })
                .is_ok(),
        });
        version
    }

    fn subscribe_collection(
        &self,
        filter: CollectionFilter,
        current: &[StudentRecord],
    ) -> Subscription<Vec<StudentRecord>> {
        let (tx, rx) = mpsc::channel();
        let initial = Snapshot {
            version: self.version(),
            data: current.iter().filter(|r| filter.matches(r)).cloned().collect(),
        };
        // The receiver is alive in this scope, so the send cannot fail.
        let _ = tx.send(initial);
        let id = self.register(Sink::Collection { filter, tx });
        Subscription {
            id,
            feed: Arc::downgrade(&self.inner),
            rx,
        }
    }

    fn subscribe_key(&self, key: &str, current: Option<StudentRecord>) -> Subscription<Option<StudentRecord>> {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(Snapshot {
            version: self.version(),
            data: current,
        });
        let id = self.register(Sink::Record {
            key: key.to_string(),
            tx,
        });
        Subscription {
            id,
            feed: Arc::downgrade(&self.inner),
            rx,
        }
    }
}

/// Live stream of snapshots. Dropping the handle (or calling `cancel`)
/// removes it from the feed.
pub struct Subscription<T> {
    id: u64,
    feed: Weak<Mutex<FeedInner>>,
    rx: Receiver<Snapshot<T>>,
}

impl<T> Subscription<T> {
    /// Drains everything pending and returns only the newest snapshot.
    pub fn latest(&self) -> Option<Snapshot<T>> {
        self.rx.try_iter().last()
    }

    #[cfg(test)]
    pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.feed.upgrade() {
            lock(&inner).sinks.remove(&self.id);
        }
    }
}

/// SQLite-backed store over an open workspace connection.
pub struct SqliteRecordStore<'a> {
    conn: &'a Connection,
    feed: &'a ChangeFeed,
}

const SELECT_STUDENT: &str = "SELECT id, name, branch, section, year, marks, password_set, created_at, updated_at
     FROM students";

struct StudentRow {
    id: String,
    name: String,
    branch: String,
    section: String,
    year: String,
    marks: String,
    password_set: bool,
    created_at: String,
    updated_at: Option<String>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        branch: row.get(2)?,
        section: row.get(3)?,
        year: row.get(4)?,
        marks: row.get(5)?,
        password_set: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn into_record(row: StudentRow) -> Result<StudentRecord, StoreError> {
    let corrupt = |what: &str| StoreError::Unavailable(format!("corrupt {} for student {}", what, row.id));
    let branch = Branch::parse(&row.branch).ok_or_else(|| corrupt("branch"))?;
    let year = Year::parse(&row.year).ok_or_else(|| corrupt("year"))?;
    let marks: Vec<i64> = serde_json::from_str(&row.marks).map_err(|_| corrupt("marks"))?;
    let updated_at = row.updated_at.unwrap_or_else(|| row.created_at.clone());
    Ok(StudentRecord::restore(
        NewStudent {
            id: row.id,
            name: row.name,
            branch,
            section: row.section,
            year,
            marks,
        },
        row.password_set,
        row.created_at,
        updated_at,
    ))
}

impl<'a> SqliteRecordStore<'a> {
    pub fn new(conn: &'a Connection, feed: &'a ChangeFeed) -> Self {
        Self { conn, feed }
    }

    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY id", SELECT_STUDENT))?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_record).collect()
    }

    fn find(&self, key: &str) -> Result<Option<StudentRecord>, StoreError> {
        let row = self
            .conn
            .query_row(&format!("{} WHERE id = ?", SELECT_STUDENT), [key], read_row)
            .optional()?;
        row.map(into_record).transpose()
    }

    fn notify(&self) {
        match self.load_all() {
            Ok(all) => {
                let version = self.feed.publish(&all);
                tracing::debug!(version, records = all.len(), "published student snapshot");
            }
            Err(e) => {
                // The write is committed; subscribers keep their last view.
                tracing::warn!(error = %e, "failed to load snapshot after write");
            }
        }
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn get(&self, key: &str) -> Result<StudentRecord, StoreError> {
        self.find(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn list(&self, filter: &CollectionFilter) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    fn put(&self, key: &str, record: &StudentRecord) -> Result<(), StoreError> {
        if record.id != key {
            return Err(StoreError::KeyMismatch {
                key: key.to_string(),
                id: record.id.clone(),
            });
        }
        let marks = serde_json::to_string(record.marks())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO students(
               id, name, branch, section, year, marks, total, cgpa, grade,
               password_set, created_at, updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               branch = excluded.branch,
               section = excluded.section,
               year = excluded.year,
               marks = excluded.marks,
               total = excluded.total,
               cgpa = excluded.cgpa,
               grade = excluded.grade,
               password_set = excluded.password_set,
               updated_at = excluded.updated_at",
            rusqlite::params![
                record.id,
                record.name,
                record.branch.code(),
                record.section,
                record.year.as_str(),
                marks,
                record.total(),
                record.cgpa(),
                record.grade().as_str(),
                record.password_set as i64,
                record.created_at,
                record.updated_at,
            ],
        )?;
        tracing::info!(student_id = %key, "student record written");
        self.notify();
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM students WHERE id = ?", [key])?;
        if changed == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        tracing::info!(student_id = %key, "student record deleted");
        self.notify();
        Ok(())
    }

    fn subscribe_collection(
        &self,
        filter: CollectionFilter,
    ) -> Result<Subscription<Vec<StudentRecord>>, StoreError> {
        let current = self.load_all()?;
        Ok(self.feed.subscribe_collection(filter, &current))
    }

    fn subscribe_key(&self, key: &str) -> Result<Subscription<Option<StudentRecord>>, StoreError> {
        let current = self.find(key)?;
        Ok(self.feed.subscribe_key(key, current))
    }
}
