//! Storage with configurable failure injection for partial-write testing

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use trellis_core::{
    LayerNode, Metadata, PointId, StorageError, StorageResult, TrellisStorage, Vector,
};

use crate::shared_state::{MockStorage, SharedState};

/// Storage that delegates to MockStorage but can inject failures
///
/// Set `*_fail_at` to a call count to trigger an I/O error on that call.
/// Set to 0 to disable failure (default). Use `clear_failures()` to reset.
pub struct FailingStorage {
    inner: MockStorage,
    /// Fail new_point on this call number (0 = never)
    pub new_point_fail_at: Arc<AtomicU64>,
    /// Fail upsert_neighbors on this call number (0 = never)
    pub upsert_neighbors_fail_at: Arc<AtomicU64>,
    /// Fail set_metadata on this call number (0 = never)
    pub set_metadata_fail_at: Arc<AtomicU64>,
    /// Fail set_ep on this call number (0 = never)
    pub set_ep_fail_at: Arc<AtomicU64>,
    new_point_count: Arc<AtomicU64>,
    upsert_neighbors_count: Arc<AtomicU64>,
    set_metadata_count: Arc<AtomicU64>,
    set_ep_count: Arc<AtomicU64>,
}

impl FailingStorage {
    pub fn new(state: &SharedState) -> Self {
        Self {
            inner: state.storage(),
            new_point_fail_at: Arc::new(AtomicU64::new(0)),
            upsert_neighbors_fail_at: Arc::new(AtomicU64::new(0)),
            set_metadata_fail_at: Arc::new(AtomicU64::new(0)),
            set_ep_fail_at: Arc::new(AtomicU64::new(0)),
            new_point_count: Arc::new(AtomicU64::new(0)),
            upsert_neighbors_count: Arc::new(AtomicU64::new(0)),
            set_metadata_count: Arc::new(AtomicU64::new(0)),
            set_ep_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn clear_failures(&self) {
        self.new_point_fail_at.store(0, Ordering::SeqCst);
        self.upsert_neighbors_fail_at.store(0, Ordering::SeqCst);
        self.set_metadata_fail_at.store(0, Ordering::SeqCst);
        self.set_ep_fail_at.store(0, Ordering::SeqCst);
    }

    fn should_fail(counter: &AtomicU64, fail_at: &AtomicU64) -> bool {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let target = fail_at.load(Ordering::SeqCst);
        target != 0 && count >= target
    }
}

#[async_trait::async_trait]
impl TrellisStorage for FailingStorage {
    async fn get_ep(&self) -> StorageResult<Option<PointId>> {
        self.inner.get_ep().await
    }

    async fn set_ep(&self, id: PointId) -> StorageResult<()> {
        if Self::should_fail(&self.set_ep_count, &self.set_ep_fail_at) {
            return Err(StorageError::Io {
                message: "Injected set_ep failure".into(),
            });
        }
        self.inner.set_ep(id).await
    }

    async fn get_num_layers(&self) -> StorageResult<usize> {
        self.inner.get_num_layers().await
    }

    async fn get_datasize(&self) -> StorageResult<usize> {
        self.inner.get_datasize().await
    }

    async fn get_point(&self, id: PointId) -> StorageResult<Vector> {
        self.inner.get_point(id).await
    }

    async fn get_points(&self, ids: &[PointId]) -> StorageResult<Vec<Vector>> {
        self.inner.get_points(ids).await
    }

    async fn new_point(&self, vector: Vector) -> StorageResult<PointId> {
        if Self::should_fail(&self.new_point_count, &self.new_point_fail_at) {
            return Err(StorageError::Io {
                message: "Injected new_point failure".into(),
            });
        }
        self.inner.new_point(vector).await
    }

    async fn get_neighbor(&self, layer: usize, id: PointId) -> StorageResult<LayerNode> {
        self.inner.get_neighbor(layer, id).await
    }

    async fn get_neighbors(
        &self,
        layer: usize,
        ids: &[PointId],
    ) -> StorageResult<FxHashMap<PointId, LayerNode>> {
        self.inner.get_neighbors(layer, ids).await
    }

    async fn upsert_neighbor(
        &self,
        layer: usize,
        id: PointId,
        node: LayerNode,
    ) -> StorageResult<()> {
        self.inner.upsert_neighbor(layer, id, node).await
    }

    async fn upsert_neighbors(
        &self,
        layer: usize,
        nodes: FxHashMap<PointId, LayerNode>,
    ) -> StorageResult<()> {
        if Self::should_fail(&self.upsert_neighbors_count, &self.upsert_neighbors_fail_at) {
            return Err(StorageError::Io {
                message: "Injected upsert_neighbors failure".into(),
            });
        }
        self.inner.upsert_neighbors(layer, nodes).await
    }

    async fn new_neighbor(&self, id: PointId, top_layer: usize) -> StorageResult<()> {
        self.inner.new_neighbor(id, top_layer).await
    }

    async fn get_metadata(&self, id: PointId) -> StorageResult<Option<Metadata>> {
        self.inner.get_metadata(id).await
    }

    async fn get_metadatas(&self, ids: &[PointId]) -> StorageResult<Vec<Option<Metadata>>> {
        self.inner.get_metadatas(ids).await
    }

    async fn set_metadata(&self, id: PointId, metadata: Metadata) -> StorageResult<()> {
        if Self::should_fail(&self.set_metadata_count, &self.set_metadata_fail_at) {
            return Err(StorageError::Io {
                message: "Injected set_metadata failure".into(),
            });
        }
        self.inner.set_metadata(id, metadata).await
    }
}
