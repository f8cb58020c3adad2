//! In-memory log store.
//!
//! Implements the full [`LogStore`] contract in-process: insertion-ordered
//! records with wraparound eviction, tailing cursors that wake on append, and
//! compare-and-set under a single mutex. The primary test backend, also
//! usable as a real single-process queue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};

use super::{JobPatch, LogOptions, LogStore, StoreError, TailCursor};
use crate::model::{JobId, JobRecord, NewJob, Status};

const DEFAULT_AWAIT_WINDOW: Duration = Duration::from_millis(250);

type Shared = Arc<Mutex<HashMap<String, LogState>>>;

/// Shared in-memory store. Clones are handles onto the same logs, so
/// concurrent consumers across tasks coordinate through one state.
#[derive(Clone)]
pub struct MemoryLogStore {
    inner: Shared,
    await_window: Duration,
}

struct LogState {
    options: LogOptions,
    records: VecDeque<StoredJob>,
    next_seq: u64,
    bytes_used: u64,
    /// Bumped on every append and update; tailing cursors wait on it.
    changed: watch::Sender<u64>,
}

struct StoredJob {
    seq: u64,
    /// Accounted size is fixed at append; patches do not re-measure.
    size: u64,
    record: JobRecord,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            await_window: DEFAULT_AWAIT_WINDOW,
        }
    }

    /// How long a tailing cursor waits for a new matching append before
    /// signalling exhaustion.
    pub fn with_await_window(window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            await_window: window,
        }
    }

    /// Create a plain unordered, unbounded log. Not part of the [`LogStore`]
    /// contract; exists so validation against misshapen storage is testable.
    pub fn create_unbounded(&self, name: &str) -> Result<(), StoreError> {
        let mut logs = lock(&self.inner)?;
        if logs.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        logs.insert(name.to_string(), LogState::new(false, 0));
        Ok(())
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogState {
    fn new(bounded: bool, capacity_bytes: u64) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            options: LogOptions {
                bounded,
                capacity_bytes,
            },
            records: VecDeque::new(),
            next_seq: 0,
            bytes_used: 0,
            changed,
        }
    }

    fn find_mut(&mut self, id: JobId) -> Option<&mut StoredJob> {
        self.records.iter_mut().find(|s| s.record.id == id)
    }

    fn bump(&self) {
        self.changed.send_modify(|v| *v += 1);
    }
}

fn lock(inner: &Shared) -> Result<MutexGuard<'_, HashMap<String, LogState>>, StoreError> {
    inner
        .lock()
        .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
}

fn get_log<'a>(
    logs: &'a mut MutexGuard<'_, HashMap<String, LogState>>,
    name: &str,
) -> Result<&'a mut LogState, StoreError> {
    logs.get_mut(name)
        .ok_or_else(|| StoreError::NotFound(name.to_string()))
}

fn apply_patch(record: &mut JobRecord, patch: &JobPatch) {
    if let Some(status) = patch.status {
        record.status = status;
    }
    if let Some(at) = patch.started {
        record.ts.started = Some(at);
    }
    if let Some(at) = patch.done {
        record.ts.done = Some(at);
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    type Cursor = MemoryTailCursor;

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.inner)?.contains_key(name))
    }

    async fn create_bounded(&self, name: &str, capacity_bytes: u64) -> Result<(), StoreError> {
        let mut logs = lock(&self.inner)?;
        if logs.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        logs.insert(name.to_string(), LogState::new(true, capacity_bytes));
        Ok(())
    }

    async fn options(&self, name: &str) -> Result<LogOptions, StoreError> {
        let mut logs = lock(&self.inner)?;
        Ok(get_log(&mut logs, name)?.options)
    }

    async fn append(&self, name: &str, job: NewJob) -> Result<JobRecord, StoreError> {
        let mut logs = lock(&self.inner)?;
        let log = get_log(&mut logs, name)?;

        let record = JobRecord {
            id: JobId::new(),
            status: job.status,
            ts: job.ts,
            payload: job.payload,
        };
        let size = serde_json::to_vec(&record)
            .map_err(|e| StoreError::Unavailable(format!("unencodable record: {e}")))?
            .len() as u64;

        if log.options.bounded {
            // Wraparound: discard oldest until the new record fits. A record
            // larger than the whole log still lands, alone.
            while log.bytes_used + size > log.options.capacity_bytes {
                let Some(evicted) = log.records.pop_front() else {
                    break;
                };
                log.bytes_used -= evicted.size;
            }
        }

        log.records.push_back(StoredJob {
            seq: log.next_seq,
            size,
            record: record.clone(),
        });
        log.next_seq += 1;
        log.bytes_used += size;
        log.bump();

        Ok(record)
    }

    async fn tailing_read(&self, name: &str, filter: Status) -> Result<Self::Cursor, StoreError> {
        let mut logs = lock(&self.inner)?;
        let log = get_log(&mut logs, name)?;
        Ok(MemoryTailCursor {
            inner: Arc::clone(&self.inner),
            name: name.to_string(),
            filter,
            last_seq: None,
            changed: log.changed.subscribe(),
            await_window: self.await_window,
        })
    }

    async fn conditional_update(
        &self,
        name: &str,
        id: JobId,
        expected: Status,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, StoreError> {
        let mut logs = lock(&self.inner)?;
        let log = get_log(&mut logs, name)?;

        // A record evicted between read and claim is a failed guard, not an
        // error: the caller moves on to the next candidate.
        let Some(stored) = log.find_mut(id) else {
            return Ok(None);
        };
        if stored.record.status != expected {
            return Ok(None);
        }

        apply_patch(&mut stored.record, &patch);
        let updated = stored.record.clone();
        log.bump();
        Ok(Some(updated))
    }

    async fn update(&self, name: &str, id: JobId, patch: JobPatch) -> Result<(), StoreError> {
        let mut logs = lock(&self.inner)?;
        let log = get_log(&mut logs, name)?;

        let Some(stored) = log.find_mut(id) else {
            return Err(StoreError::MissingRecord {
                log: name.to_string(),
                id,
            });
        };
        apply_patch(&mut stored.record, &patch);
        log.bump();
        Ok(())
    }

    async fn count(&self, name: &str, filter: Status) -> Result<u64, StoreError> {
        let mut logs = lock(&self.inner)?;
        let log = get_log(&mut logs, name)?;
        Ok(log
            .records
            .iter()
            .filter(|s| s.record.status == filter)
            .count() as u64)
    }

    async fn drop_log(&self, name: &str) -> Result<(), StoreError> {
        let mut logs = lock(&self.inner)?;
        logs.remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

/// Tailing cursor over one log. Remembers the last sequence number it
/// yielded; survives eviction of records it has already passed.
pub struct MemoryTailCursor {
    inner: Shared,
    name: String,
    filter: Status,
    last_seq: Option<u64>,
    changed: watch::Receiver<u64>,
    await_window: Duration,
}

#[async_trait]
impl TailCursor for MemoryTailCursor {
    async fn next(&mut self) -> Result<Option<JobRecord>, StoreError> {
        let deadline = Instant::now() + self.await_window;
        loop {
            {
                let mut logs = lock(&self.inner)?;
                let log = get_log(&mut logs, &self.name)?;

                // Mark the change counter seen while holding the store lock:
                // appends also run under it, so anything committed after this
                // point re-wakes `changed()` below.
                self.changed.borrow_and_update();

                let found = log.records.iter().find(|s| {
                    self.last_seq.is_none_or(|seen| s.seq > seen)
                        && s.record.status == self.filter
                });
                if let Some(stored) = found {
                    self.last_seq = Some(stored.seq);
                    return Ok(Some(stored.record.clone()));
                }
            }

            match timeout_at(deadline, self.changed.changed()).await {
                // Something changed; rescan.
                Ok(Ok(())) => continue,
                // Log dropped out from under us; report exhaustion and let
                // the reopen path surface the missing log.
                Ok(Err(_)) => return Ok(None),
                // Await window elapsed with no matching append.
                Err(_) => return Ok(None),
            }
        }
    }
}
