//! Metric instrument factories for tailq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"tailq"` meter.

use opentelemetry::metrics::{Counter, Meter};

/// Returns the shared meter for tailq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("tailq")
}

/// Counter: queue-level operations.
/// Labels: `queue`, `operation`
/// ("publish" | "claim" | "claim_race" | "claim_empty" | "complete" | "drop").
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("tailq.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: job status transitions.
/// Labels: `from`, `to`.
pub fn state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("tailq.job.state_transitions")
        .with_description("Number of job status transitions")
        .build()
}
