//! Point primitives
//!
//! A point is a dense vector of `f32` coordinates identified by a
//! monotonically increasing integer id assigned at insertion time.

/// Unique identifier for a point
///
/// Ids are dense: the storage backend assigns `0, 1, 2, ...` in insertion
/// order, so every id below the current datasize resolves to a point.
pub type PointId = u64;

/// High-dimensional vector data
///
/// Stored as f32 for balance between precision and memory efficiency.
pub type Vector = Vec<f32>;

/// Opaque per-point payload
///
/// The index never inspects metadata; it is stored and returned verbatim.
/// Backends choose the on-wire encoding.
pub type Metadata = serde_json::Value;
