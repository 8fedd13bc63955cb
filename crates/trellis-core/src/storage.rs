//! Storage abstraction layer
//!
//! This module defines the `TrellisStorage` trait that abstracts all graph
//! and point state. The index uses this trait without knowing the underlying
//! storage medium, and every call may suspend - backends can be remote.
//!
//! # Implementations
//!
//! - `MemStorage` (trellis-storage): in-memory maps for testing and ephemeral use
//! - `DiskStorage` (trellis-storage): one JSON record per key via tokio::fs
//!
//! # Batching
//!
//! The batch operations (`get_points`, `get_neighbors`, `upsert_neighbors`)
//! exist so backends can amortize round-trips. The index prefers them
//! whenever it already knows the full id set. A batch call is atomic from
//! the caller's perspective: either every key succeeds or the call fails.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::point::{Metadata, PointId, Vector};

/// Storage operation errors
///
/// All errors are explicit - storage operations never silently fail.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Point not found: {id}")]
    PointNotFound { id: PointId },

    #[error("Adjacency not found: layer {layer}, point {id}")]
    NeighborNotFound { layer: usize, id: PointId },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Convenience type alias for storage results
pub type StorageResult<T> = Result<T, StorageError>;

/// Adjacency of one point on one layer
///
/// Maps neighbor id to the cached distance between the two points. The
/// cached value is written when the edge is created and is authoritative
/// for ordering decisions during pruning, even if a recomputation would
/// drift by a rounding error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerNode {
    /// Neighbor id -> distance between the two endpoints
    pub neighbors: FxHashMap<PointId, f32>,
}

impl LayerNode {
    /// Create an empty adjacency record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update an edge to `id` with its cached distance
    pub fn insert(&mut self, id: PointId, distance: f32) {
        self.neighbors.insert(id, distance);
    }

    /// Remove the edge to `id`, if present
    pub fn remove(&mut self, id: PointId) {
        self.neighbors.remove(&id);
    }

    /// Whether an edge to `id` exists
    pub fn contains(&self, id: PointId) -> bool {
        self.neighbors.contains_key(&id)
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Whether the record has no edges
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Iterate over `(neighbor, distance)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (PointId, f32)> + '_ {
        self.neighbors.iter().map(|(&id, &d)| (id, d))
    }

    /// Iterate over neighbor ids
    pub fn ids(&self) -> impl Iterator<Item = PointId> + '_ {
        self.neighbors.keys().copied()
    }
}

/// Recommended key namespace for byte-oriented backends
///
/// Backends that store raw key-value pairs (files, remote KV) are free to
/// choose their own layout; this is the conventional one.
pub mod keys {
    use crate::types::point::PointId;

    /// Entry point id
    pub const EP: &str = "ep";
    /// Point counter (datasize)
    pub const POINT_COUNT: &str = "points";
    /// Layer counter (num_layers)
    pub const LAYER_COUNT: &str = "layers";

    /// Key for a point's vector
    pub fn point(id: PointId) -> String {
        format!("point:{id}")
    }

    /// Key for a point's adjacency on one layer
    pub fn neighbor(layer: usize, id: PointId) -> String {
        format!("neighbor:{layer}:{id}")
    }

    /// Key for a point's metadata blob
    pub fn metadata(id: PointId) -> String {
        format!("metadata:{id}")
    }
}

/// Abstract storage interface
///
/// All graph state - points, per-layer adjacency, metadata, and the three
/// scalar counters (entry point, layer count, point count) - lives behind
/// this trait. Every operation is fallible and may suspend.
///
/// # Counters
///
/// - entry point: id of the node on the topmost layer, absent when empty
/// - `num_layers`: one more than the highest occupied layer index
/// - `datasize`: number of points stored; `new_point` assigns the next id
///
/// # Single writer
///
/// `new_point` and `new_neighbor` read-modify-write the counters and are
/// not safe under concurrent writers. Callers serialize inserts.
#[async_trait]
pub trait TrellisStorage: Send + Sync + 'static {
    /// Current entry point, or `None` when the index is empty
    async fn get_ep(&self) -> StorageResult<Option<PointId>>;

    /// Overwrite the entry point
    async fn set_ep(&self, id: PointId) -> StorageResult<()>;

    /// Number of occupied layers; zero when empty
    async fn get_num_layers(&self) -> StorageResult<usize>;

    /// Number of points stored; zero when empty
    async fn get_datasize(&self) -> StorageResult<usize>;

    /// Fetch one point's vector; fails with `PointNotFound` if unknown
    async fn get_point(&self, id: PointId) -> StorageResult<Vector>;

    /// Batched point fetch, in the order of `ids`; fails if any id is unknown
    async fn get_points(&self, ids: &[PointId]) -> StorageResult<Vec<Vector>>;

    /// Persist a new point, assign it the next dense id, and bump datasize
    async fn new_point(&self, vector: Vector) -> StorageResult<PointId>;

    /// Fetch one adjacency record; fails with `NeighborNotFound` if absent
    async fn get_neighbor(&self, layer: usize, id: PointId) -> StorageResult<LayerNode>;

    /// Batched adjacency fetch; fails if any record is absent
    async fn get_neighbors(
        &self,
        layer: usize,
        ids: &[PointId],
    ) -> StorageResult<FxHashMap<PointId, LayerNode>>;

    /// Replace one adjacency record
    async fn upsert_neighbor(&self, layer: usize, id: PointId, node: LayerNode)
        -> StorageResult<()>;

    /// Batched adjacency replace
    async fn upsert_neighbors(
        &self,
        layer: usize,
        nodes: FxHashMap<PointId, LayerNode>,
    ) -> StorageResult<()>;

    /// Create empty adjacency records for `id` at layers `0..=top_layer`
    /// and raise the layer counter to `max(num_layers, top_layer + 1)`.
    ///
    /// Called exactly once per insert, so the counter grows by the level
    /// delta rather than once per occupied layer.
    async fn new_neighbor(&self, id: PointId, top_layer: usize) -> StorageResult<()>;

    /// Fetch a point's metadata; `None` when the point has none
    async fn get_metadata(&self, id: PointId) -> StorageResult<Option<Metadata>>;

    /// Batched metadata fetch, in the order of `ids`
    async fn get_metadatas(&self, ids: &[PointId]) -> StorageResult<Vec<Option<Metadata>>>;

    /// Persist a metadata blob for `id`
    async fn set_metadata(&self, id: PointId, metadata: Metadata) -> StorageResult<()>;
}
