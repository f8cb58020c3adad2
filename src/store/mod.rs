//! The Log Store contract.
//!
//! The queue engine never talks to a concrete backend; it is handed something
//! implementing [`LogStore`]: a fixed-capacity, insertion-ordered, wraparound
//! log per named queue, with a tailing read cursor and an atomic
//! compare-and-set update. Those three primitives are the entire surface the
//! claim protocol is built from.

pub mod memory;

pub use memory::MemoryLogStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{JobId, JobRecord, NewJob, Status};

/// Shape of a named log, as reported by the store.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    /// Whether the log is bounded and insertion-ordered with wraparound
    /// eviction. The claim protocol requires this.
    pub bounded: bool,

    /// Capacity in bytes. Meaningless when `bounded` is false.
    pub capacity_bytes: u64,
}

/// An update to apply to a stored job. Unset fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<Status>,
    pub started: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
}

impl JobPatch {
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.started = Some(at);
        self
    }

    pub fn done(mut self, at: DateTime<Utc>) -> Self {
        self.done = Some(at);
        self
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("log not found: {0}")]
    NotFound(String),

    #[error("log already exists: {0}")]
    AlreadyExists(String),

    #[error("no record {id} in log {log}")]
    MissingRecord { log: String, id: JobId },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A read cursor over one log, filtered by status, in insertion order.
///
/// `next` waits a bounded window for new matching appends before returning
/// `Ok(None)`. `None` is legitimate exhaustion, not an error: the store may
/// invalidate tailing cursors when no matching records remain, and callers
/// reopen.
#[async_trait]
pub trait TailCursor: Send {
    async fn next(&mut self) -> Result<Option<JobRecord>, StoreError>;
}

/// Storage collaborator for one or more named job logs.
///
/// `conditional_update` is the only cross-consumer synchronization primitive
/// in the system: it applies the patch iff the record's current status equals
/// `expected`, atomically, and reports a mismatch as `None`. No caller may
/// mutate a record's status outside this discipline.
#[async_trait]
pub trait LogStore: Send + Sync + 'static {
    type Cursor: TailCursor;

    async fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create a bounded ordered log. Fails if the name is taken; capacity
    /// cannot be changed afterwards.
    async fn create_bounded(&self, name: &str, capacity_bytes: u64) -> Result<(), StoreError>;

    async fn options(&self, name: &str) -> Result<LogOptions, StoreError>;

    /// Append a record, assigning its id. Oldest records are evicted when the
    /// capacity would be exceeded.
    async fn append(&self, name: &str, job: NewJob) -> Result<JobRecord, StoreError>;

    /// Open a tailing cursor over records whose status matches `filter`.
    async fn tailing_read(&self, name: &str, filter: Status) -> Result<Self::Cursor, StoreError>;

    /// Compare-and-set: apply `patch` iff the record's status is still
    /// `expected`. Returns the updated record, or `None` when the guard did
    /// not match (including a record that was evicted meanwhile).
    async fn conditional_update(
        &self,
        name: &str,
        id: JobId,
        expected: Status,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, StoreError>;

    /// Unconditional update of an existing record.
    async fn update(&self, name: &str, id: JobId, patch: JobPatch) -> Result<(), StoreError>;

    /// Number of records whose status matches `filter`.
    async fn count(&self, name: &str, filter: Status) -> Result<u64, StoreError>;

    /// Remove the log and everything in it.
    async fn drop_log(&self, name: &str) -> Result<(), StoreError>;
}
