//! Streaming consumption.
//!
//! [`Consumer`] is the claim loop as an explicit cursor object: `next` claims
//! and yields one job, and the following `next` (or an explicit `complete`)
//! marks the yielded job Done. Between the two calls the caller processes the
//! job; processing time never blocks other consumers, which coordinate only
//! through the store's conditional update.

use chrono::Utc;
use opentelemetry::KeyValue;

use crate::error::Result;
use crate::model::{JobId, JobRecord, Status};
use crate::queue::JobQueue;
use crate::store::{JobPatch, LogStore, TailCursor};
use crate::telemetry::metrics;
use crate::wait::WaitPolicy;

/// A streaming claim cursor over one queue.
///
/// Built by [`JobQueue::consume`] / [`JobQueue::consume_with`]. Runs until
/// its wait policy ends the stream or a store error surfaces.
pub struct Consumer<'q, S: LogStore, P> {
    queue: &'q JobQueue<S>,
    policy: P,
    cursor: Option<S::Cursor>,
    in_flight: Option<JobId>,
}

impl<'q, S: LogStore, P: WaitPolicy> Consumer<'q, S, P> {
    pub(crate) fn new(queue: &'q JobQueue<S>, policy: P) -> Self {
        Self {
            queue,
            policy,
            cursor: None,
            in_flight: None,
        }
    }

    /// Claim and yield the next waiting job.
    ///
    /// The previously yielded job, if not already completed, is marked Done
    /// first: completion rides on resumption. Candidates lost to another
    /// consumer are skipped without surfacing anything; only the consumer
    /// whose conditional update succeeds ever sees the job. Returns
    /// `Ok(None)` once the wait policy ends the stream.
    pub async fn next(&mut self) -> Result<Option<JobRecord>> {
        self.finish_in_flight().await?;

        loop {
            match self.next_candidate().await? {
                Some(candidate) => {
                    let claimed = self
                        .queue
                        .store()
                        .conditional_update(
                            self.queue.name(),
                            candidate.id,
                            Status::Waiting,
                            JobPatch::default()
                                .status(Status::Working)
                                .started(Utc::now()),
                        )
                        .await?;

                    match claimed {
                        Some(record) => {
                            metrics::queue_operations().add(
                                1,
                                &[
                                    KeyValue::new("queue", self.queue.name().to_string()),
                                    KeyValue::new("operation", "claim"),
                                ],
                            );
                            metrics::state_transitions().add(
                                1,
                                &[
                                    KeyValue::new("from", "waiting"),
                                    KeyValue::new("to", "working"),
                                ],
                            );
                            self.in_flight = Some(record.id);
                            return Ok(Some(record));
                        }
                        None => {
                            tracing::debug!(
                                queue = %self.queue.name(),
                                job = %candidate.id,
                                "lost claim race"
                            );
                            metrics::queue_operations().add(
                                1,
                                &[
                                    KeyValue::new("queue", self.queue.name().to_string()),
                                    KeyValue::new("operation", "claim_race"),
                                ],
                            );
                        }
                    }
                }
                None => {
                    // The store may invalidate a tailing cursor once no
                    // matching records remain; reopen on the next pass
                    // instead of surfacing the exhaustion.
                    self.cursor = None;
                    if !self.policy.wait().await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Mark the currently yielded job Done now, without waiting for the next
    /// `next` call. Idempotent: a second call, or a following `next`, is a
    /// no-op for this job.
    pub async fn complete(&mut self) -> Result<()> {
        self.finish_in_flight().await
    }

    /// Read the next Waiting candidate, opening the tailing cursor if the
    /// previous one was dropped. `None` means the cursor exhausted.
    async fn next_candidate(&mut self) -> Result<Option<JobRecord>> {
        if self.cursor.is_none() {
            let opened = self
                .queue
                .store()
                .tailing_read(self.queue.name(), Status::Waiting)
                .await?;
            self.cursor = Some(opened);
        }
        match self.cursor.as_mut() {
            Some(cursor) => Ok(cursor.next().await?),
            None => Ok(None),
        }
    }

    async fn finish_in_flight(&mut self) -> Result<()> {
        let Some(id) = self.in_flight.take() else {
            return Ok(());
        };

        // Sole ownership was established by the claim, so no guard is needed.
        self.queue
            .store()
            .update(
                self.queue.name(),
                id,
                JobPatch::default().status(Status::Done).done(Utc::now()),
            )
            .await?;

        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", self.queue.name().to_string()),
                KeyValue::new("operation", "complete"),
            ],
        );
        metrics::state_transitions().add(
            1,
            &[KeyValue::new("from", "working"), KeyValue::new("to", "done")],
        );
        Ok(())
    }
}
