//! Shared storage state that survives handle drops
//!
//! Every `MockStorage` cloned from one `SharedState` sees the same maps,
//! so tests can hold a handle for inspection while the index owns another.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;
use trellis_core::{
    LayerNode, Metadata, PointId, StorageError, StorageResult, TrellisStorage, Vector,
};

/// Shared storage state backed by Arc pointers
#[derive(Clone, Default)]
pub struct SharedState {
    pub points: Arc<RwLock<Vec<Vector>>>,
    pub layers: Arc<RwLock<Vec<FxHashMap<PointId, LayerNode>>>>,
    pub metadata: Arc<RwLock<HashMap<PointId, Metadata>>>,
    pub ep: Arc<RwLock<Option<PointId>>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockStorage sharing this state
    pub fn storage(&self) -> MockStorage {
        MockStorage {
            state: self.clone(),
        }
    }

    /// Ids present on a layer (for invariant checks)
    pub fn ids_at_layer(&self, layer: usize) -> Vec<PointId> {
        self.layers
            .read()
            .unwrap()
            .get(layer)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Adjacency snapshot of a whole layer
    pub fn layer_snapshot(&self, layer: usize) -> FxHashMap<PointId, LayerNode> {
        self.layers
            .read()
            .unwrap()
            .get(layer)
            .cloned()
            .unwrap_or_default()
    }
}

/// Mock storage backed by shared Arc state
pub struct MockStorage {
    state: SharedState,
}

#[async_trait::async_trait]
impl TrellisStorage for MockStorage {
    async fn get_ep(&self) -> StorageResult<Option<PointId>> {
        Ok(*self.state.ep.read().unwrap())
    }

    async fn set_ep(&self, id: PointId) -> StorageResult<()> {
        *self.state.ep.write().unwrap() = Some(id);
        Ok(())
    }

    async fn get_num_layers(&self) -> StorageResult<usize> {
        Ok(self.state.layers.read().unwrap().len())
    }

    async fn get_datasize(&self) -> StorageResult<usize> {
        Ok(self.state.points.read().unwrap().len())
    }

    async fn get_point(&self, id: PointId) -> StorageResult<Vector> {
        self.state
            .points
            .read()
            .unwrap()
            .get(id as usize)
            .cloned()
            .ok_or(StorageError::PointNotFound { id })
    }

    async fn get_points(&self, ids: &[PointId]) -> StorageResult<Vec<Vector>> {
        let points = self.state.points.read().unwrap();
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
        let mut points = self.state.points.write().unwrap();
        let id = points.len() as PointId;
        points.push(vector);
        Ok(id)
    }

    async fn get_neighbor(&self, layer: usize, id: PointId) -> StorageResult<LayerNode> {
        self.state
            .layers
            .read()
            .unwrap()
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
        let layers = self.state.layers.read().unwrap();
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
        let mut layers = self.state.layers.write().unwrap();
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
        let mut layers = self.state.layers.write().unwrap();
        if layers.len() <= layer {
            layers.resize_with(layer + 1, FxHashMap::default);
        }
        layers[layer].extend(nodes);
        Ok(())
    }

    async fn new_neighbor(&self, id: PointId, top_layer: usize) -> StorageResult<()> {
        let mut layers = self.state.layers.write().unwrap();
        if layers.len() <= top_layer {
            layers.resize_with(top_layer + 1, FxHashMap::default);
        }
        for layer in layers.iter_mut().take(top_layer + 1) {
            layer.entry(id).or_default();
        }
        Ok(())
    }

    async fn get_metadata(&self, id: PointId) -> StorageResult<Option<Metadata>> {
        Ok(self.state.metadata.read().unwrap().get(&id).cloned())
    }

    async fn get_metadatas(&self, ids: &[PointId]) -> StorageResult<Vec<Option<Metadata>>> {
        let metadata = self.state.metadata.read().unwrap();
        Ok(ids.iter().map(|id| metadata.get(id).cloned()).collect())
    }

    async fn set_metadata(&self, id: PointId, metadata: Metadata) -> StorageResult<()> {
        self.state.metadata.write().unwrap().insert(id, metadata);
        Ok(())
    }
}
