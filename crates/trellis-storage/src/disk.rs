//! Disk-based storage implementation
//!
//! `DiskStorage` persists one JSON record per key under a directory tree,
//! using the conventional key namespace from `trellis_core::storage::keys`
//! with `:` mapped to a path separator (`neighbor:0:5` becomes
//! `neighbor/0/5`). Data survives process restarts.
//!
//! Counter updates are read-modify-write files; like every backend, this
//! one assumes a single writer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use trellis_core::storage::keys;
use trellis_core::{
    LayerNode, Metadata, PointId, StorageError, StorageResult, TrellisStorage, Vector,
};

/// Disk-backed storage using `tokio::fs`
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Open (and create if missing) a storage directory
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(Self::io)?;
        Ok(Self { root })
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io(e: impl std::fmt::Display) -> StorageError {
        StorageError::Io {
            message: e.to_string(),
        }
    }

    fn corrupt(e: impl std::fmt::Display) -> StorageError {
        StorageError::Serialization {
            message: e.to_string(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key.replace(':', "/"))
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match fs::read(self.path(key)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(Self::corrupt),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io(e)),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(Self::io)?;
        }
        let bytes = serde_json::to_vec(value).map_err(Self::corrupt)?;
        fs::write(path, bytes).await.map_err(Self::io)
    }
}

#[async_trait]
impl TrellisStorage for DiskStorage {
    async fn get_ep(&self) -> StorageResult<Option<PointId>> {
        self.read(keys::EP).await
    }

    async fn set_ep(&self, id: PointId) -> StorageResult<()> {
        self.write(keys::EP, &id).await
    }

    async fn get_num_layers(&self) -> StorageResult<usize> {
        Ok(self.read(keys::LAYER_COUNT).await?.unwrap_or(0))
    }

    async fn get_datasize(&self) -> StorageResult<usize> {
        Ok(self.read(keys::POINT_COUNT).await?.unwrap_or(0))
    }

    async fn get_point(&self, id: PointId) -> StorageResult<Vector> {
        self.read(&keys::point(id))
            .await?
            .ok_or(StorageError::PointNotFound { id })
    }

    async fn get_points(&self, ids: &[PointId]) -> StorageResult<Vec<Vector>> {
        let mut vectors = Vec::with_capacity(ids.len());
        for &id in ids {
            vectors.push(self.get_point(id).await?);
        }
        Ok(vectors)
    }

    async fn new_point(&self, vector: Vector) -> StorageResult<PointId> {
        let datasize = self.get_datasize().await?;
        let id = datasize as PointId;
        self.write(&keys::point(id), &vector).await?;
        self.write(keys::POINT_COUNT, &(datasize + 1)).await?;
        Ok(id)
    }

    async fn get_neighbor(&self, layer: usize, id: PointId) -> StorageResult<LayerNode> {
        self.read(&keys::neighbor(layer, id))
            .await?
            .ok_or(StorageError::NeighborNotFound { layer, id })
    }

    async fn get_neighbors(
        &self,
        layer: usize,
        ids: &[PointId],
    ) -> StorageResult<FxHashMap<PointId, LayerNode>> {
        let mut nodes = FxHashMap::default();
        for &id in ids {
            nodes.insert(id, self.get_neighbor(layer, id).await?);
        }
        Ok(nodes)
    }

    async fn upsert_neighbor(
        &self,
        layer: usize,
        id: PointId,
        node: LayerNode,
    ) -> StorageResult<()> {
        self.write(&keys::neighbor(layer, id), &node).await
    }

    async fn upsert_neighbors(
        &self,
        layer: usize,
        nodes: FxHashMap<PointId, LayerNode>,
    ) -> StorageResult<()> {
        for (id, node) in nodes {
            self.write(&keys::neighbor(layer, id), &node).await?;
        }
        Ok(())
    }

    async fn new_neighbor(&self, id: PointId, top_layer: usize) -> StorageResult<()> {
        for layer in 0..=top_layer {
            let key = keys::neighbor(layer, id);
            if self.read::<LayerNode>(&key).await?.is_none() {
                self.write(&key, &LayerNode::new()).await?;
            }
        }
        let num_layers = self.get_num_layers().await?;
        if top_layer + 1 > num_layers {
            self.write(keys::LAYER_COUNT, &(top_layer + 1)).await?;
        }
        Ok(())
    }

    async fn get_metadata(&self, id: PointId) -> StorageResult<Option<Metadata>> {
        self.read(&keys::metadata(id)).await
    }

    async fn get_metadatas(&self, ids: &[PointId]) -> StorageResult<Vec<Option<Metadata>>> {
        let mut metadatas = Vec::with_capacity(ids.len());
        for &id in ids {
            metadatas.push(self.get_metadata(id).await?);
        }
        Ok(metadatas)
    }

    async fn set_metadata(&self, id: PointId, metadata: Metadata) -> StorageResult<()> {
        self.write(&keys::metadata(id), &metadata).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_counters() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).await.unwrap();

        assert_eq!(storage.get_datasize().await.unwrap(), 0);
        assert_eq!(storage.get_num_layers().await.unwrap(), 0);
        assert!(storage.get_ep().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_point_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).await.unwrap();

        let id = storage.new_point(vec![0.25, -1.0]).await.unwrap();
        assert_eq!(id, 0);
        assert_eq!(storage.get_point(0).await.unwrap(), vec![0.25, -1.0]);
        assert_eq!(storage.get_datasize().await.unwrap(), 1);

        match storage.get_point(9).await {
            Err(StorageError::PointNotFound { id }) => assert_eq!(id, 9),
            other => panic!("Expected PointNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_neighbor_records_nest_by_layer() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).await.unwrap();

        storage.new_neighbor(0, 1).await.unwrap();
        assert_eq!(storage.get_num_layers().await.unwrap(), 2);

        let mut node = LayerNode::new();
        node.insert(3, 0.75);
        storage.upsert_neighbor(1, 0, node.clone()).await.unwrap();
        assert_eq!(storage.get_neighbor(1, 0).await.unwrap(), node);

        // Layer 0 record is untouched
        assert!(storage.get_neighbor(0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_neighbor_keeps_existing_adjacency() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).await.unwrap();

        let mut node = LayerNode::new();
        node.insert(9, 0.1);
        storage.upsert_neighbor(0, 0, node.clone()).await.unwrap();

        // Ensuring records must not wipe what is already there
        storage.new_neighbor(0, 0).await.unwrap();
        assert_eq!(storage.get_neighbor(0, 0).await.unwrap(), node);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let storage = DiskStorage::open(dir.path()).await.unwrap();
            storage.new_point(vec![1.0]).await.unwrap();
            storage.new_neighbor(0, 0).await.unwrap();
            storage.set_ep(0).await.unwrap();
            storage
                .set_metadata(0, serde_json::json!({"tag": "persisted"}))
                .await
                .unwrap();
        }

        let reopened = DiskStorage::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get_datasize().await.unwrap(), 1);
        assert_eq!(reopened.get_ep().await.unwrap(), Some(0));
        assert_eq!(
            reopened.get_metadata(0).await.unwrap(),
            Some(serde_json::json!({"tag": "persisted"}))
        );
    }
}
