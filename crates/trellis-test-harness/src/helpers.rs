//! Helper functions for index-level tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trellis_core::{Distance, DistanceCalculator, HnswConfig, PointId, Vector};

/// Config used by most index tests
pub fn test_config() -> HnswConfig {
    HnswConfig::standard(16, 50, 100)
}

/// Generate `n` seeded random unit vectors of dimension `dim`
///
/// Coordinates are drawn uniformly from [-1, 1) and the vector is
/// normalized, so cosine and euclidean orderings agree.
pub fn seeded_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vector> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let mut v: Vector = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut v {
                    *x /= norm;
                }
            }
            v
        })
        .collect()
}

/// Brute-force K nearest neighbors over a slice of vectors
///
/// Ground truth for recall tests: scans every vector, sorts by
/// `(distance, id)` and returns the first `k`.
pub fn exact_knn(
    vectors: &[Vector],
    query: &[f32],
    k: usize,
    metric: Distance,
) -> Vec<(PointId, f32)> {
    let calc = DistanceCalculator::new(metric);
    let mut scored: Vec<(PointId, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(id, v)| (id as PointId, calc.calculate(query, v)))
        .collect();
    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}
