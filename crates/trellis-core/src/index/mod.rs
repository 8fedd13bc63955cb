//! HNSW index: distance kernels, search queues, and the layered graph

pub mod distance;
pub mod hnsw;
pub mod queue;
