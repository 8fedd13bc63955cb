//! In-memory storage implementation
//!
//! `MemStorage` keeps the whole graph in typed maps behind `RwLock`s.
//! Perfect for testing and ephemeral indexes; all data is lost when the
//! instance is dropped.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use trellis_core::{
    LayerNode, Metadata, PointId, StorageError, StorageResult, TrellisStorage, Vector,
};

/// In-memory storage backend
///
/// Point ids are indexes into a dense vector, so `datasize` falls out of
/// `points.len()` and `num_layers` out of `layers.len()`.
///
/// # Usage
///
/// ```ignore
/// use trellis_storage::MemStorage;
/// use trellis_core::TrellisStorage;
///
/// let storage = MemStorage::new();
/// let id = storage.new_point(vec![0.1, 0.2]).await.unwrap();
/// assert_eq!(storage.get_point(id).await.unwrap(), vec![0.1, 0.2]);
/// ```
#[derive(Debug, Default)]
pub struct MemStorage {
    points: RwLock<Vec<Vector>>,
    layers: RwLock<Vec<FxHashMap<PointId, LayerNode>>>,
    metadata: RwLock<HashMap<PointId, Metadata>>,
    ep: RwLock<Option<PointId>>,
}

impl MemStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids present on a layer (introspection for invariant checks)
    pub fn ids_at_layer(&self, layer: usize) -> Vec<PointId> {
        self.layers
            .read()
            .unwrap()
            .get(layer)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Clear all data
    pub fn clear(&self) {
        self.points.write().unwrap().clear();
        self.layers.write().unwrap().clear();
        self.metadata.write().unwrap().clear();
        *self.ep.write().unwrap() = None;
    }

    fn poisoned(e: impl std::fmt::Display) -> StorageError {
        StorageError::Io {
            message: format!("Lock poisoned: {}", e),
        }
    }
}

#[async_trait]
impl TrellisStorage for MemStorage {
    async fn get_ep(&self) -> StorageResult<Option<PointId>> {
        Ok(*self.ep.read().map_err(Self::poisoned)?)
    }

    async fn set_ep(&self, id: PointId) -> StorageResult<()> {
        *self.ep.write().map_err(Self::poisoned)? = Some(id);
        Ok(())
    }

    async fn get_num_layers(&self) -> StorageResult<usize> {
        Ok(self.layers.read().map_err(Self::poisoned)?.len())
    }

    async fn get_datasize(&self) -> StorageResult<usize> {
        Ok(self.points.read().map_err(Self::poisoned)?.len())
    }

    async fn get_point(&self, id: PointId) -> StorageResult<Vector> {
        let points = self.points.read().map_err(Self::poisoned)?;
        points
            .get(id as usize)
            .cloned()
            .ok_or(StorageError::PointNotFound { id })
    }

    async fn get_points(&self, ids: &[PointId]) -> StorageResult<Vec<Vector>> {
        let points = self.points.read().map_err(Self::poisoned)?;
        ids.iter()
            .map(|&id| {
                points
                    .get(id as usize)
                    .cloned()
                    .ok_or(StorageError::PointNotFound { id })
            })
            .collect()
    }

    async fn new_point(&self, vector: Vector) -> StorageResult<PointId> {
        let mut points = self.points.write().map_err(Self::poisoned)?;
        let id = points.len() as PointId;
        points.push(vector);
        Ok(id)
    }

    async fn get_neighbor(&self, layer: usize, id: PointId) -> StorageResult<LayerNode> {
        let layers = self.layers.read().map_err(Self::poisoned)?;
        layers
            .get(layer)
            .and_then(|m| m.get(&id))
            .cloned()
            .ok_or(StorageError::NeighborNotFound { layer, id })
    }

    async fn get_neighbors(
        &self,
        layer: usize,
        ids: &[PointId],
    ) -> StorageResult<FxHashMap<PointId, LayerNode>> {
        let layers = self.layers.read().map_err(Self::poisoned)?;
        ids.iter()
            .map(|&id| {
                layers
                    .get(layer)
                    .and_then(|m| m.get(&id))
                    .cloned()
                    .map(|node| (id, node))
                    .ok_or(StorageError::NeighborNotFound { layer, id })
            })
            .collect()
    }

    async fn upsert_neighbor(
        &self,
        layer: usize,
        id: PointId,
        node: LayerNode,
    ) -> StorageResult<()> {
        let mut layers = self.layers.write().map_err(Self::poisoned)?;
        if layers.len() <= layer {
            layers.resize_with(layer + 1, FxHashMap::default);
        }
        layers[layer].insert(id, node);
        Ok(())
    }

    async fn upsert_neighbors(
        &self,
        layer: usize,
        nodes: FxHashMap<PointId, LayerNode>,
    ) -> StorageResult<()> {
        let mut layers = self.layers.write().map_err(Self::poisoned)?;
        if layers.len() <= layer {
            layers.resize_with(layer + 1, FxHashMap::default);
        }
        layers[layer].extend(nodes);
        Ok(())
    }

    async fn new_neighbor(&self, id: PointId, top_layer: usize) -> StorageResult<()> {
        let mut layers = self.layers.write().map_err(Self::poisoned)?;
        if layers.len() <= top_layer {
            layers.resize_with(top_layer + 1, FxHashMap::default);
        }
        for layer in layers.iter_mut().take(top_layer + 1) {
            layer.entry(id).or_default();
        }
        Ok(())
    }

    async fn get_metadata(&self, id: PointId) -> StorageResult<Option<Metadata>> {
        Ok(self.metadata.read().map_err(Self::poisoned)?.get(&id).cloned())
    }

    async fn get_metadatas(&self, ids: &[PointId]) -> StorageResult<Vec<Option<Metadata>>> {
        let metadata = self.metadata.read().map_err(Self::poisoned)?;
        Ok(ids.iter().map(|id| metadata.get(id).cloned()).collect())
    }

    async fn set_metadata(&self, id: PointId, metadata: Metadata) -> StorageResult<()> {
        self.metadata
            .write()
            .map_err(Self::poisoned)?
            .insert(id, metadata);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_storage_is_empty() {
        let storage = MemStorage::new();
        assert_eq!(storage.get_datasize().await.unwrap(), 0);
        assert_eq!(storage.get_num_layers().await.unwrap(), 0);
        assert!(storage.get_ep().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_point_assigns_dense_ids() {
        let storage = MemStorage::new();
        assert_eq!(storage.new_point(vec![0.0]).await.unwrap(), 0);
        assert_eq!(storage.new_point(vec![1.0]).await.unwrap(), 1);
        assert_eq!(storage.new_point(vec![2.0]).await.unwrap(), 2);
        assert_eq!(storage.get_datasize().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_point_not_found_error() {
        let storage = MemStorage::new();
        match storage.get_point(999).await {
            Err(StorageError::PointNotFound { id }) => assert_eq!(id, 999),
            other => panic!("Expected PointNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_points_fails_on_any_unknown() {
        let storage = MemStorage::new();
        storage.new_point(vec![0.0]).await.unwrap();

        assert!(storage.get_points(&[0]).await.is_ok());
        assert!(storage.get_points(&[0, 5]).await.is_err());
    }

    #[tokio::test]
    async fn test_new_neighbor_seeds_all_layers() {
        let storage = MemStorage::new();
        storage.new_neighbor(0, 2).await.unwrap();

        assert_eq!(storage.get_num_layers().await.unwrap(), 3);
        for layer in 0..3 {
            let node = storage.get_neighbor(layer, 0).await.unwrap();
            assert!(node.is_empty());
            assert_eq!(storage.ids_at_layer(layer), vec![0]);
        }
        assert!(storage.ids_at_layer(3).is_empty());
    }

    #[tokio::test]
    async fn test_new_neighbor_never_shrinks_layers() {
        let storage = MemStorage::new();
        storage.new_neighbor(0, 3).await.unwrap();
        storage.new_neighbor(1, 0).await.unwrap();

        assert_eq!(storage.get_num_layers().await.unwrap(), 4);
        assert!(storage.get_neighbor(0, 1).await.is_ok());
        // The lower node does not exist above its own top layer
        assert!(storage.get_neighbor(1, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_replaces_adjacency() {
        let storage = MemStorage::new();
        storage.new_neighbor(0, 0).await.unwrap();

        let mut node = LayerNode::new();
        node.insert(7, 0.5);
        storage.upsert_neighbor(0, 0, node).await.unwrap();
        assert_eq!(storage.get_neighbor(0, 0).await.unwrap().len(), 1);

        let replacement = LayerNode::new();
        storage.upsert_neighbor(0, 0, replacement).await.unwrap();
        assert!(storage.get_neighbor(0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_neighbors_batch() {
        let storage = MemStorage::new();

        let mut nodes: FxHashMap<PointId, LayerNode> = FxHashMap::default();
        for id in 0..4u64 {
            let mut node = LayerNode::new();
            node.insert((id + 1) % 4, 0.1);
            nodes.insert(id, node);
        }
        storage.upsert_neighbors(0, nodes).await.unwrap();

        for id in 0..4u64 {
            assert_eq!(storage.get_neighbor(0, id).await.unwrap().len(), 1);
        }
        let fetched = storage.get_neighbors(0, &[0, 1, 2, 3]).await.unwrap();
        assert_eq!(fetched.len(), 4);
    }

    #[tokio::test]
    async fn test_metadata_roundtrip() {
        let storage = MemStorage::new();

        assert!(storage.get_metadata(0).await.unwrap().is_none());

        storage
            .set_metadata(0, serde_json::json!({"tag": "a"}))
            .await
            .unwrap();
        assert_eq!(
            storage.get_metadata(0).await.unwrap(),
            Some(serde_json::json!({"tag": "a"}))
        );

        let batch = storage.get_metadatas(&[0, 1]).await.unwrap();
        assert!(batch[0].is_some());
        assert!(batch[1].is_none());
    }

    #[tokio::test]
    async fn test_entry_point_overwrite() {
        let storage = MemStorage::new();
        storage.set_ep(0).await.unwrap();
        storage.set_ep(5).await.unwrap();
        assert_eq!(storage.get_ep().await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_clear() {
        let storage = MemStorage::new();
        storage.new_point(vec![0.0]).await.unwrap();
        storage.new_neighbor(0, 1).await.unwrap();
        storage.set_ep(0).await.unwrap();

        storage.clear();

        assert_eq!(storage.get_datasize().await.unwrap(), 0);
        assert_eq!(storage.get_num_layers().await.unwrap(), 0);
        assert!(storage.get_ep().await.unwrap().is_none());
    }
}
