//! Durable job record store.
//!
//! Jobs live in memory behind an async mutex and are written out as one
//! JSON snapshot after every change. Each `update` is a single
//! lock, mutate, persist, unlock cycle, so concurrent pipelines never lose
//! each other's writes.

pub mod config;
pub mod error;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::JobStore;
