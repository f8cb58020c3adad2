//! Typed queue configuration.
//!
//! Builder for programmatic use, `from_env` for deployments: loads once at
//! startup, fails fast if the queue name is missing.

use crate::error::{QueueError, Result};

/// Default backing-log capacity in bytes.
pub const DEFAULT_CAPACITY_BYTES: u64 = 100_000;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Name of the queue and of its backing log.
    pub name: String,
    /// Capacity of the backing log in bytes. Immutable once provisioned.
    pub capacity_bytes: u64,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
        }
    }

    pub fn capacity_bytes(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `TAILQ_QUEUE` is required. `TAILQ_CAPACITY_BYTES` is optional and
    /// falls back to [`DEFAULT_CAPACITY_BYTES`].
    pub fn from_env() -> Result<Self> {
        let name = required_var("TAILQ_QUEUE")?;
        let capacity_bytes = match std::env::var("TAILQ_CAPACITY_BYTES") {
            Ok(raw) => raw.parse().map_err(|_| {
                QueueError::Config(format!(
                    "TAILQ_CAPACITY_BYTES must be an integer number of bytes, got {raw:?}"
                ))
            })?,
            Err(_) => DEFAULT_CAPACITY_BYTES,
        };
        Ok(Self {
            name,
            capacity_bytes,
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| QueueError::Config(format!("required environment variable {name} is not set")))
}
