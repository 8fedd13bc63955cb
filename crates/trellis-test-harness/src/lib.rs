//! Test infrastructure for Trellis
//!
//! Provides reusable mocks and helpers for index-level testing:
//! shared-state storage, I/O failure injection, deterministic vector
//! generators, and a brute-force oracle for recall baselines.

pub mod failing_storage;
pub mod helpers;
pub mod shared_state;

pub use failing_storage::FailingStorage;
pub use helpers::{exact_knn, seeded_vectors, test_config};
pub use shared_state::{MockStorage, SharedState};
