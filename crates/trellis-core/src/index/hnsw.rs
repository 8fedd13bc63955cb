//! HNSW (Hierarchical Navigable Small World) index implementation
//!
//! This implements the algorithm from the paper:
//! "Efficient and robust approximate nearest neighbor search using Hierarchical
//! Navigable Small World graphs" by Yu. A. Malkov, D. A. Yashunin
//!
//! # Architecture
//!
//! The index owns no graph state. Points, per-layer adjacency, metadata and
//! the scalar counters all live behind the [`TrellisStorage`] trait, and
//! every traversal step suspends on storage. Pure computation (distances,
//! heap operations, neighbor selection) never does I/O.
//!
//! Each `search_layer` iteration issues one adjacency fetch for the popped
//! candidate and one batched point fetch for its unvisited neighbors, so a
//! remote backend pays a bounded number of round-trips per hop.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{TrellisError, TrellisResult};
use crate::index::distance::DistanceCalculator;
use crate::index::queue::{Candidate, MaxResults, MinCandidates};
use crate::storage::{LayerNode, TrellisStorage};
use crate::types::config::{Distance, HnswConfig};
use crate::types::point::{Metadata, PointId, Vector};
use crate::types::query::KnnResult;

/// Hard ceiling on the drawn level (prevents runaway in edge cases)
const MAX_LEVEL: usize = 16;

/// Seedable level generator
///
/// A linear congruential generator drives the geometric level distribution
/// `level = floor(-ln(u) * ml)` with `u` uniform in `(0, 1]`. This is the
/// only source of non-determinism in the index; fixing the seed fixes the
/// whole graph for a given insert order.
#[derive(Debug, Clone)]
struct LevelGenerator {
    state: u64,
    ml: f64,
}

impl LevelGenerator {
    fn new(seed: u64, ml: f64) -> Self {
        Self { state: seed, ml }
    }

    fn next_level(&mut self) -> usize {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        // Top 31 bits, shifted into (0, 1] so ln never sees zero
        let u = ((self.state >> 33) + 1) as f64 / (1u64 << 31) as f64;
        let level = (-u.ln() * self.ml).floor() as usize;
        level.min(MAX_LEVEL)
    }
}

/// Diversity-aware neighbor selection (simple variant of Algorithm 4)
///
/// Walks the candidates closest-first and admits one only if it is strictly
/// closer to the reference than to every already-admitted neighbor. This
/// spreads edges across directions instead of clustering them, which is
/// what keeps the small-world graph navigable.
///
/// `candidates` carry their distance to the reference; `vectors` must hold
/// the coordinates of every candidate for the pairwise checks.
fn select_diverse(
    distance: &DistanceCalculator,
    candidates: &[Candidate],
    vectors: &FxHashMap<PointId, Vector>,
    m: usize,
) -> Vec<Candidate> {
    let mut ordered = candidates.to_vec();
    ordered.sort();

    let mut selected: Vec<Candidate> = Vec::with_capacity(m);
    for candidate in ordered {
        if selected.len() >= m {
            break;
        }
        let vector = match vectors.get(&candidate.id) {
            Some(v) => v,
            None => continue,
        };
        let diverse = selected.iter().all(|kept| match vectors.get(&kept.id) {
            Some(kept_vector) => candidate.distance < distance.calculate(vector, kept_vector),
            None => true,
        });
        if diverse {
            selected.push(candidate);
        }
    }
    selected
}

/// HNSW index over an abstract storage backend
///
/// # Usage
///
/// ```ignore
/// let storage = MemStorage::new();
/// let mut index = HnswIndex::new(storage, HnswConfig::standard(16, 50, 200), Distance::Cosine)?;
///
/// let id = index.insert(vec![0.1, 0.2, 0.3], None).await?;
/// let hits = index.knn_search(&[0.1, 0.2, 0.3], 10).await?;
/// ```
///
/// `insert` takes `&mut self`: the counters behind the storage contract are
/// read-modify-write, so writers must be serialized. Searches take `&self`
/// and never mutate.
pub struct HnswIndex<S> {
    storage: S,
    config: HnswConfig,
    distance: DistanceCalculator,
    levels: LevelGenerator,
}

impl<S: TrellisStorage> HnswIndex<S> {
    /// Create a new index over `storage`
    ///
    /// Validates the configuration; the metric is fixed for the lifetime of
    /// the index.
    pub fn new(storage: S, config: HnswConfig, metric: Distance) -> TrellisResult<Self> {
        config.validate()?;
        let levels = LevelGenerator::new(42, config.ml);
        Ok(Self {
            storage,
            config,
            distance: DistanceCalculator::new(metric),
            levels,
        })
    }

    /// Set the level-generator seed (for reproducible graphs)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.levels.state = seed;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Access the underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Number of points inserted so far
    pub async fn datasize(&self) -> TrellisResult<usize> {
        Ok(self.storage.get_datasize().await?)
    }

    /// Number of occupied layers
    pub async fn num_layers(&self) -> TrellisResult<usize> {
        Ok(self.storage.get_num_layers().await?)
    }

    /// Whether the index holds no points
    pub async fn is_empty(&self) -> TrellisResult<bool> {
        Ok(self.storage.get_datasize().await? == 0)
    }

    /// Insert a point with optional metadata, returning its assigned id
    ///
    /// Fails on storage errors and on dimension mismatch against the
    /// existing graph. A failure mid-insert can leave the new point with a
    /// partially constructed adjacency; its neighbor sets are either empty
    /// or valid per layer, and later searches remain safe.
    pub async fn insert(
        &mut self,
        vector: Vector,
        metadata: Option<Metadata>,
    ) -> TrellisResult<PointId> {
        let ep = self.storage.get_ep().await?;
        let num_layers = self.storage.get_num_layers().await?;

        // First point: nothing to link against, it becomes the entry point.
        let ep_id = match ep {
            Some(id) => id,
            None => {
                let idx = self.storage.new_point(vector).await?;
                let level = self.levels.next_level();
                self.storage.new_neighbor(idx, level).await?;
                self.storage.set_ep(idx).await?;
                if let Some(meta) = metadata {
                    self.storage.set_metadata(idx, meta).await?;
                }
                debug!(id = idx, level, "inserted first point");
                return Ok(idx);
            }
        };

        let ep_vector = self.storage.get_point(ep_id).await?;
        self.check_dims(ep_vector.len(), vector.len())?;

        let idx = self.storage.new_point(vector.clone()).await?;
        let level = self.levels.next_level();
        self.storage.new_neighbor(idx, level).await?;

        let top = num_layers.saturating_sub(1);
        let mut best = Candidate::new(ep_id, self.distance.calculate(&vector, &ep_vector));

        // Greedy descent through the layers the new node does not occupy
        if top > level {
            best = self.greedy_descent(&vector, best, top, level + 1).await?;
        }

        // Link the node into every layer it occupies, top-down
        for layer in (0..=top.min(level)).rev() {
            let found = self
                .search_layer(&vector, &[best], self.config.ef_construction, layer)
                .await?;

            let found_ids: Vec<PointId> = found.iter().map(|c| c.id).collect();
            let mut vectors = self.fetch_vectors(&found_ids).await?;
            let chosen = select_diverse(&self.distance, &found, &vectors, self.config.m);

            self.link_layer(idx, &vector, layer, &chosen, &mut vectors)
                .await?;

            if let Some(&closest) = found.first() {
                best = closest;
            }
        }

        // A node above the old top layer becomes the new entry point
        if level > top {
            self.storage.set_ep(idx).await?;
        }

        if let Some(meta) = metadata {
            self.storage.set_metadata(idx, meta).await?;
        }

        debug!(id = idx, level, "inserted point");
        Ok(idx)
    }

    /// Search for the `k` nearest neighbors of `query`
    ///
    /// Returns up to `k` results sorted ascending by distance, with each
    /// point's metadata attached. An empty index yields an empty list.
    pub async fn knn_search(&self, query: &[f32], k: usize) -> TrellisResult<Vec<KnnResult>> {
        let ep_id = match self.storage.get_ep().await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        let num_layers = self.storage.get_num_layers().await?;

        let ep_vector = self.storage.get_point(ep_id).await?;
        self.check_dims(ep_vector.len(), query.len())?;

        let mut best = Candidate::new(ep_id, self.distance.calculate(query, &ep_vector));
        let top = num_layers.saturating_sub(1);
        if top >= 1 {
            best = self.greedy_descent(query, best, top, 1).await?;
        }

        let ef = self.config.ef.max(k);
        let found = self.search_layer(query, &[best], ef, 0).await?;

        let top_k: Vec<Candidate> = found.into_iter().take(k).collect();
        let ids: Vec<PointId> = top_k.iter().map(|c| c.id).collect();
        let metadatas = self.storage.get_metadatas(&ids).await?;

        debug!(k, returned = top_k.len(), "knn search");
        Ok(top_k
            .into_iter()
            .zip(metadatas)
            .map(|(c, metadata)| KnnResult {
                id: c.id,
                distance: c.distance,
                metadata,
            })
            .collect())
    }

    /// Fetch a stored vector and its metadata
    pub async fn get_vector(&self, id: PointId) -> TrellisResult<(Vector, Option<Metadata>)> {
        let vector = self.storage.get_point(id).await?;
        let metadata = self.storage.get_metadata(id).await?;
        Ok((vector, metadata))
    }

    // --- Private methods ---

    fn check_dims(&self, expected: usize, actual: usize) -> TrellisResult<()> {
        if expected != actual {
            return Err(TrellisError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    async fn fetch_vectors(
        &self,
        ids: &[PointId],
    ) -> TrellisResult<FxHashMap<PointId, Vector>> {
        let vectors = self.storage.get_points(ids).await?;
        Ok(ids.iter().copied().zip(vectors).collect())
    }

    /// Greedy walk from `from` down to `down_to`, one nearest neighbor per layer
    async fn greedy_descent(
        &self,
        query: &[f32],
        mut best: Candidate,
        from: usize,
        down_to: usize,
    ) -> TrellisResult<Candidate> {
        for layer in (down_to..=from).rev() {
            let found = self.search_layer(query, &[best], 1, layer).await?;
            if let Some(&closest) = found.first() {
                best = closest;
            }
        }
        Ok(best)
    }

    /// Best-first beam search of a single layer
    ///
    /// Entry points arrive with their distances to `query` precomputed.
    /// Returns up to `ef` candidates sorted closest-first. With `ef = 1`
    /// the bound alone reduces this to a greedy walk.
    async fn search_layer(
        &self,
        query: &[f32],
        entry: &[Candidate],
        ef: usize,
        layer: usize,
    ) -> TrellisResult<Vec<Candidate>> {
        let mut visited: FxHashSet<PointId> = entry.iter().map(|c| c.id).collect();
        let mut candidates = MinCandidates::new();
        let mut results = MaxResults::new(ef);

        for &start in entry {
            candidates.push(start);
            results.push(start);
        }

        while let Some(current) = candidates.pop() {
            // The frontier only gets farther once the beam is full and the
            // closest open candidate is past the worst retained result.
            if let Some(farthest) = results.farthest() {
                if current.distance > farthest.distance && results.is_full() {
                    break;
                }
            }

            let adjacency = self.storage.get_neighbor(layer, current.id).await?;
            let unvisited: Vec<PointId> =
                adjacency.ids().filter(|&n| visited.insert(n)).collect();
            if unvisited.is_empty() {
                continue;
            }

            let vectors = self.storage.get_points(&unvisited).await?;
            for (&id, vector) in unvisited.iter().zip(&vectors) {
                let d = self.distance.calculate(query, vector);
                let admit = !results.is_full()
                    || results.farthest().map_or(true, |f| d < f.distance);
                if admit {
                    let candidate = Candidate::new(id, d);
                    candidates.push(candidate);
                    results.push(candidate);
                }
            }
        }

        Ok(results.into_sorted_vec())
    }

    /// Wire `idx` into one layer: bidirectional edges to `chosen`, then
    /// prune any neighbor that overflowed its per-layer cap
    ///
    /// All mutations accumulate in a local map and flush in a single
    /// batched `upsert_neighbors` call. Pruned edges are removed from both
    /// endpoints so edges stay bidirectional.
    async fn link_layer(
        &self,
        idx: PointId,
        vector: &[f32],
        layer: usize,
        chosen: &[Candidate],
        vectors: &mut FxHashMap<PointId, Vector>,
    ) -> TrellisResult<()> {
        let cap = if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m_max
        };

        let chosen_ids: Vec<PointId> = chosen.iter().map(|c| c.id).collect();
        let mut updates = self.storage.get_neighbors(layer, &chosen_ids).await?;

        let mut own = LayerNode::new();
        for c in chosen {
            own.insert(c.id, c.distance);
            if let Some(node) = updates.get_mut(&c.id) {
                node.insert(idx, c.distance);
            }
        }
        vectors.insert(idx, vector.to_vec());

        // Selection over an overflowing neighbor needs the coordinates of
        // its whole adjacency; gather everything missing in one fetch.
        let mut missing: FxHashSet<PointId> = FxHashSet::default();
        for id in &chosen_ids {
            if let Some(node) = updates.get(id) {
                if node.len() > cap {
                    missing.extend(node.ids().filter(|n| !vectors.contains_key(n)));
                }
            }
        }
        if !missing.is_empty() {
            let ids: Vec<PointId> = missing.into_iter().collect();
            let fetched = self.storage.get_points(&ids).await?;
            for (id, v) in ids.into_iter().zip(fetched) {
                vectors.insert(id, v);
            }
        }

        // (removed neighbor, pruned owner) pairs whose back-edges must go
        let mut dropped: Vec<(PointId, PointId)> = Vec::new();
        for &owner in &chosen_ids {
            let node = match updates.get(&owner) {
                Some(n) => n,
                None => continue,
            };
            if node.len() <= cap {
                continue;
            }

            // Cached distances are authoritative for ordering here
            let cands: Vec<Candidate> = node
                .iter()
                .map(|(id, d)| Candidate::new(id, d))
                .collect();
            let kept = select_diverse(&self.distance, &cands, vectors, cap);
            let kept_ids: FxHashSet<PointId> = kept.iter().map(|c| c.id).collect();

            for removed in node.ids().filter(|n| !kept_ids.contains(n)) {
                dropped.push((removed, owner));
            }

            let mut pruned = LayerNode::new();
            for c in &kept {
                pruned.insert(c.id, c.distance);
            }
            updates.insert(owner, pruned);
        }

        if !dropped.is_empty() {
            let counterparts: Vec<PointId> = dropped
                .iter()
                .map(|&(removed, _)| removed)
                .filter(|&removed| removed != idx && !updates.contains_key(&removed))
                .collect::<FxHashSet<_>>()
                .into_iter()
                .collect();
            if !counterparts.is_empty() {
                let fetched = self.storage.get_neighbors(layer, &counterparts).await?;
                updates.extend(fetched);
            }
            for (removed, owner) in dropped {
                if removed == idx {
                    own.remove(owner);
                } else if let Some(node) = updates.get_mut(&removed) {
                    node.remove(owner);
                }
            }
        }

        updates.insert(idx, own);
        self.storage.upsert_neighbors(layer, updates).await?;
        Ok(())
    }
}
