//! Core data model.
//!
//! A job is a unit of work flowing through the queue. It has a store-assigned
//! identity, an opaque payload, and a small monotonic lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Job Record
// ---------------------------------------------------------------------------

/// A job as stored in the backing log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique identifier, assigned by the store at append. Immutable.
    pub id: JobId,

    /// Current lifecycle status.
    pub status: Status,

    /// Lifecycle timestamps.
    pub ts: Timestamps,

    /// Caller-supplied data. The engine never interprets this.
    pub payload: serde_json::Value,
}

/// Newtype for job IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Published, waiting for a consumer.
    Waiting,
    /// Claimed by exactly one consumer, processing in progress.
    Working,
    /// Finished. Terminal.
    Done,
}

impl Status {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Waiting, Working)
                | (Working, Done)
                | (Waiting, Done) // one-shot claim dequeues directly
        )
    }

    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Waiting => "waiting",
            Status::Working => "working",
            Status::Done => "done",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Lifecycle timestamps. `started` and `done` stay unset until the
/// corresponding transition happens, so `created <= started <= done`
/// holds whenever the later fields exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamps {
    /// Set at publish.
    pub created: DateTime<Utc>,

    /// Set when a consumer claims the job.
    pub started: Option<DateTime<Utc>>,

    /// Set when the job finishes.
    pub done: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Fresh timestamps for a job created now.
    pub fn created_now() -> Self {
        Self {
            created: Utc::now(),
            started: None,
            done: None,
        }
    }
}

// ---------------------------------------------------------------------------
// New Job
// ---------------------------------------------------------------------------

/// What `publish` hands the store. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub status: Status,
    pub ts: Timestamps,
    pub payload: serde_json::Value,
}

impl NewJob {
    /// A waiting job created now, carrying `payload`.
    pub fn waiting(payload: serde_json::Value) -> Self {
        Self {
            status: Status::Waiting,
            ts: Timestamps::created_now(),
            payload,
        }
    }
}
