//! Queue engine. The public API for publishing and claiming jobs.
//!
//! Owns the job lifecycle and the claim protocol over an injected
//! [`LogStore`]. The store's conditional update is the only synchronization
//! point across consumers; the engine itself holds no locks.

use chrono::Utc;
use opentelemetry::KeyValue;

use crate::config::QueueConfig;
use crate::consume::Consumer;
use crate::error::{QueueError, Result};
use crate::model::{JobRecord, NewJob, Status};
use crate::store::{JobPatch, LogStore, StoreError, TailCursor};
use crate::telemetry::metrics;
use crate::wait::{FixedDelay, WaitPolicy};

/// A handle onto one named queue. Cheap to clone when the store handle is;
/// clones coordinate through the store, not through each other.
#[derive(Clone)]
pub struct JobQueue<S> {
    store: S,
    name: String,
    capacity_bytes: u64,
}

impl<S: LogStore> JobQueue<S> {
    /// Attach to the named queue, provisioning the backing bounded log if it
    /// does not exist yet.
    pub async fn open(store: S, config: QueueConfig) -> Result<Self> {
        let queue = Self {
            store,
            name: config.name,
            capacity_bytes: config.capacity_bytes,
        };
        if !queue.store.exists(&queue.name).await? {
            queue.provision().await?;
        }
        Ok(queue)
    }

    /// Create the backing log. Fails with [`QueueError::AlreadyProvisioned`]
    /// when it already exists, whatever its shape: capped-log parameters are
    /// immutable after creation, so provisioning never reconfigures.
    pub async fn provision(&self) -> Result<()> {
        tracing::info!(
            queue = %self.name,
            capacity_bytes = self.capacity_bytes,
            "creating backing log"
        );
        match self
            .store
            .create_bounded(&self.name, self.capacity_bytes)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists(_)) => {
                Err(QueueError::AlreadyProvisioned(self.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Whether the backing store really is a bounded ordered log. Advisory;
    /// the claim paths re-check on entry and refuse on their own.
    pub async fn is_valid(&self) -> Result<bool> {
        Ok(self.store.options(&self.name).await?.bounded)
    }

    async fn ensure_valid(&self) -> Result<()> {
        if self.is_valid().await? {
            Ok(())
        } else {
            Err(QueueError::NotBounded(self.name.clone()))
        }
    }

    /// Publish a job. It enters the queue as Waiting with `created` stamped
    /// now; `started`/`done` stay unset until the matching transitions.
    pub async fn publish(&self, payload: serde_json::Value) -> Result<JobRecord> {
        let record = self
            .store
            .append(&self.name, NewJob::waiting(payload))
            .await
            .map_err(QueueError::Publish)?;

        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", self.name.clone()),
                KeyValue::new("operation", "publish"),
            ],
        );
        tracing::debug!(queue = %self.name, job = %record.id, "job published");
        Ok(record)
    }

    /// One-shot claim: dequeue the first waiting job straight to Done,
    /// stamping `started` and `done`. A candidate lost to a concurrent
    /// consumer is skipped for the next one on the same cursor. Fails with
    /// [`QueueError::Empty`] when no waiting job is left.
    pub async fn next(&self) -> Result<JobRecord> {
        self.ensure_valid().await?;

        let mut cursor = self.store.tailing_read(&self.name, Status::Waiting).await?;
        while let Some(candidate) = cursor.next().await? {
            let now = Utc::now();
            let claimed = self
                .store
                .conditional_update(
                    &self.name,
                    candidate.id,
                    Status::Waiting,
                    JobPatch::default()
                        .status(Status::Done)
                        .started(now)
                        .done(now),
                )
                .await?;

            match claimed {
                Some(record) => {
                    metrics::queue_operations().add(
                        1,
                        &[
                            KeyValue::new("queue", self.name.clone()),
                            KeyValue::new("operation", "claim"),
                        ],
                    );
                    metrics::state_transitions().add(
                        1,
                        &[KeyValue::new("from", "waiting"), KeyValue::new("to", "done")],
                    );
                    return Ok(record);
                }
                None => {
                    tracing::debug!(queue = %self.name, job = %candidate.id, "lost claim race");
                    metrics::queue_operations().add(
                        1,
                        &[
                            KeyValue::new("queue", self.name.clone()),
                            KeyValue::new("operation", "claim_race"),
                        ],
                    );
                }
            }
        }

        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", self.name.clone()),
                KeyValue::new("operation", "claim_empty"),
            ],
        );
        Err(QueueError::Empty)
    }

    /// Streaming consumption with the default wait strategy.
    pub async fn consume(&self) -> Result<Consumer<'_, S, FixedDelay>> {
        self.consume_with(FixedDelay::default()).await
    }

    /// Streaming consumption. The policy decides, on each empty poll, whether
    /// to keep waiting or end the stream.
    pub async fn consume_with<P: WaitPolicy>(&self, policy: P) -> Result<Consumer<'_, S, P>> {
        self.ensure_valid().await?;
        Ok(Consumer::new(self, policy))
    }

    /// Number of jobs currently waiting. Advisory only: not atomic with
    /// respect to concurrent claims.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.store.count(&self.name, Status::Waiting).await?)
    }

    /// Drop the backing log and every record in it, whatever their status.
    /// Irreversible; the queue must be re-provisioned before further use.
    pub async fn clear(&self) -> Result<()> {
        self.store.drop_log(&self.name).await?;
        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", self.name.clone()),
                KeyValue::new("operation", "drop"),
            ],
        );
        tracing::info!(queue = %self.name, "backing log dropped");
        Ok(())
    }
}
