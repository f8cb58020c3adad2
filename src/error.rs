//! Error types for tailq.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing log already exists. Capacity parameters are immutable
    /// after creation, so provisioning never reconfigures.
    #[error("queue already provisioned: {0}")]
    AlreadyProvisioned(String),

    /// The backing store is not a bounded, insertion-ordered log. The claim
    /// protocol depends on tailing-cursor and eviction guarantees and refuses
    /// to run without them.
    #[error("queue {0} is not backed by a bounded ordered log")]
    NotBounded(String),

    /// No waiting job available for a one-shot claim.
    #[error("no waiting job in queue")]
    Empty,

    /// Appending the job to the log failed.
    #[error("publish failed: {0}")]
    Publish(#[source] StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, QueueError>;
