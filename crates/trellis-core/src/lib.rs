//! Trellis Core - storage-agnostic HNSW approximate nearest neighbor search
//!
//! This crate implements the core functionality of Trellis:
//! - Vector math and distance metrics
//! - The layered HNSW graph algorithm (insert, knn search)
//! - The `TrellisStorage` trait every backend implements
//!
//! # Architecture
//!
//! This crate follows a strict separation of business logic and I/O. It
//! defines the storage trait but never imports an I/O primitive; all
//! external interaction occurs through injected trait implementations, and
//! any storage call may suspend. Concrete backends live in
//! `trellis-storage`.

pub mod error;
pub mod index;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, TrellisError, TrellisResult};
pub use index::distance::DistanceCalculator;
pub use index::hnsw::HnswIndex;
pub use index::queue::Candidate;
pub use storage::{LayerNode, StorageError, StorageResult, TrellisStorage};
pub use types::config::{Distance, HnswConfig};
pub use types::point::{Metadata, PointId, Vector};
pub use types::query::KnnResult;
