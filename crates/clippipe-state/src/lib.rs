#![deny(unreachable_patterns)]
//! Advisory job state store and progress bridge.
//!
//! This crate provides:
//! - The Redis-backed KV store holding one `JobRecord` per job
//! - Best-effort progress reporting through the `ProgressSink` trait
//!
//! The store is advisory: the authoritative terminal status lives with the
//! front-end. Workers log and continue when the store is unavailable — the
//! pipeline's correctness never depends on the KV.

pub mod error;
pub mod progress;
pub mod store;

pub use error::{StateError, StateResult};
pub use progress::{NoopProgress, ProgressSink, ProgressStage, StateProgress};
pub use store::{StateConfig, StateStore};
