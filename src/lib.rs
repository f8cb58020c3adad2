//! # tailq
//!
//! Durable FIFO-ish work queue over a bounded, insertion-ordered, tailable
//! log store.
//!
//! Producers publish job documents; concurrent consumers claim them through
//! the store's atomic conditional update, which guarantees at most one active
//! consumer per job. The storage backend is an injected [`store::LogStore`];
//! an in-memory implementation ships for tests and single-process use.

pub mod config;
pub mod consume;
pub mod error;
pub mod model;
pub mod queue;
pub mod store;
pub mod telemetry;
pub mod wait;
