//! Distance calculation functions for vector similarity
//!
//! All distance functions return a value where lower = more similar,
//! making them suitable for min-heap priority queues. The algorithm uses
//! distances for ordering only; no triangle inequality is assumed.

use crate::types::config::Distance;

/// Accumulator lanes per kernel loop iteration
const LANES: usize = 4;

/// Distance calculator for vectors
///
/// Resolves the configured metric once at index construction.
pub struct DistanceCalculator {
    metric: Distance,
}

impl DistanceCalculator {
    /// Create a new distance calculator
    pub fn new(metric: Distance) -> Self {
        Self { metric }
    }

    /// Calculate distance between two vectors
    ///
    /// Returns a value where lower = more similar. Operands must have equal
    /// length; the index validates dimensions once per operation before the
    /// hot path.
    #[inline]
    pub fn calculate(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Vector dimension mismatch");

        match self.metric {
            Distance::Cosine => cosine_distance(a, b),
            Distance::Euclid => euclidean_distance(a, b),
            Distance::Dot => dot_distance(a, b),
        }
    }

    /// Get the metric type
    pub fn metric(&self) -> Distance {
        self.metric
    }
}

/// Cosine distance: 1 - cosine_similarity
///
/// Range: [0, 2] where 0 = identical, 1 = orthogonal, 2 = opposite.
/// A zero-norm operand yields 1.0.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = [0.0f32; LANES];
    let mut norm_left = [0.0f32; LANES];
    let mut norm_right = [0.0f32; LANES];

    let mut lhs = a.chunks_exact(LANES);
    let mut rhs = b.chunks_exact(LANES);
    for (xs, ys) in lhs.by_ref().zip(rhs.by_ref()) {
        for lane in 0..LANES {
            let (x, y) = (xs[lane], ys[lane]);
            dot[lane] += x * y;
            norm_left[lane] += x * x;
            norm_right[lane] += y * y;
        }
    }

    let mut dot: f32 = dot.iter().sum();
    let mut norm_left: f32 = norm_left.iter().sum();
    let mut norm_right: f32 = norm_right.iter().sum();
    for (x, y) in lhs.remainder().iter().zip(rhs.remainder()) {
        dot += x * y;
        norm_left += x * x;
        norm_right += y * y;
    }

    let scale = (norm_left * norm_right).sqrt();
    if scale == 0.0 {
        return 1.0;
    }

    1.0 - dot / scale
}

/// Euclidean distance (L2)
///
/// Range: [0, ∞) where 0 = identical
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = [0.0f32; LANES];

    let mut lhs = a.chunks_exact(LANES);
    let mut rhs = b.chunks_exact(LANES);
    for (xs, ys) in lhs.by_ref().zip(rhs.by_ref()) {
        for lane in 0..LANES {
            let delta = xs[lane] - ys[lane];
            acc[lane] += delta * delta;
        }
    }

    let mut sum: f32 = acc.iter().sum();
    for (x, y) in lhs.remainder().iter().zip(rhs.remainder()) {
        let delta = x - y;
        sum += delta * delta;
    }

    sum.sqrt()
}

/// Dot product distance: -dot_product
///
/// Negated so lower = more similar (higher dot product = more similar).
/// Range: (-∞, ∞)
#[inline]
pub fn dot_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = [0.0f32; LANES];

    let mut lhs = a.chunks_exact(LANES);
    let mut rhs = b.chunks_exact(LANES);
    for (xs, ys) in lhs.by_ref().zip(rhs.by_ref()) {
        for lane in 0..LANES {
            acc[lane] += xs[lane] * ys[lane];
        }
    }

    let mut dot: f32 = acc.iter().sum();
    for (x, y) in lhs.remainder().iter().zip(rhs.remainder()) {
        dot += x * y;
    }

    -dot
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        // Parallel vectors at different scales are identical under cosine
        let short = vec![2.0, 3.0, 1.0];
        let long = vec![8.0, 12.0, 4.0];
        assert!(approx_eq(cosine_distance(&short, &long), 0.0));

        // And flipping one of them lands at the far end of the range
        let flipped: Vec<f32> = long.iter().map(|x| -x).collect();
        assert!(approx_eq(cosine_distance(&short, &flipped), 2.0));
    }

    #[test]
    fn test_cosine_known_angle() {
        // cos of the angle between [1,0] and [3,4] is 3/5
        let d = cosine_distance(&[1.0, 0.0], &[3.0, 4.0]);
        assert!(approx_eq(d, 1.0 - 0.6), "got {}", d);
    }

    #[test]
    fn test_cosine_perpendicular_midpoint() {
        // Orthogonal operands sit exactly in the middle of the range
        let d = cosine_distance(&[0.0, 0.0, 5.0], &[0.0, 2.0, 0.0]);
        assert!(approx_eq(d, 1.0), "got {}", d);
    }

    #[test]
    fn test_cosine_zero_norm_operand() {
        let zero = vec![0.0; 6];
        let probe = vec![0.5; 6];
        assert!(approx_eq(cosine_distance(&zero, &probe), 1.0));
        assert!(approx_eq(cosine_distance(&probe, &zero), 1.0));
        assert!(approx_eq(cosine_distance(&zero, &zero), 1.0));
    }

    #[test]
    fn test_euclid_quadruple() {
        // 2-3-6-7 is a Pythagorean quadruple
        let d = euclidean_distance(&[0.0, 0.0, 0.0], &[2.0, 3.0, 6.0]);
        assert!(approx_eq(d, 7.0), "got {}", d);
    }

    #[test]
    fn test_euclid_translation_invariance() {
        let a = vec![1.5, -2.0, 0.25, 4.0, 1.0];
        let b = vec![0.5, 1.0, -0.75, 2.0, 3.0];
        let shifted_a: Vec<f32> = a.iter().map(|x| x + 10.0).collect();
        let shifted_b: Vec<f32> = b.iter().map(|x| x + 10.0).collect();

        assert!(approx_eq(
            euclidean_distance(&a, &b),
            euclidean_distance(&shifted_a, &shifted_b)
        ));
    }

    #[test]
    fn test_euclid_symmetry_and_identity() {
        let a = vec![0.3, -1.2, 2.5, 0.0, 0.7, 1.1, -0.4];
        let b = vec![1.0, 0.8, -0.5, 2.2, -1.6, 0.0, 0.9];

        assert!(approx_eq(euclidean_distance(&a, &b), euclidean_distance(&b, &a)));
        assert!(approx_eq(euclidean_distance(&a, &a), 0.0));
    }

    #[test]
    fn test_dot_sign_tracks_alignment() {
        // Aligned pairs score negative (better), opposed pairs positive
        let up = vec![0.0, 1.0, 0.0];
        let mostly_up = vec![0.1, 2.0, 0.1];
        let down = vec![0.0, -1.0, 0.0];

        assert!(dot_distance(&up, &mostly_up) < 0.0);
        assert!(dot_distance(&up, &down) > 0.0);
        assert!(approx_eq(dot_distance(&up, &down), 1.0));
    }

    #[test]
    fn test_dot_hand_computed() {
        // -(0.5*2 + 3*(-1) + 1*4) = -2
        let d = dot_distance(&[0.5, 3.0, 1.0], &[2.0, -1.0, 4.0]);
        assert!(approx_eq(d, -2.0), "got {}", d);
    }

    #[test]
    fn test_nearest_of_three_per_metric() {
        let query = vec![1.0, 1.0, 0.0, 0.0];
        let near = vec![1.1, 0.9, 0.0, 0.1];
        let mid = vec![0.0, 1.0, 1.0, 0.0];
        let far = vec![-1.0, -1.0, 0.5, 0.0];

        for metric in [Distance::Cosine, Distance::Euclid, Distance::Dot] {
            let calc = DistanceCalculator::new(metric);
            let d_near = calc.calculate(&query, &near);
            let d_mid = calc.calculate(&query, &mid);
            let d_far = calc.calculate(&query, &far);
            assert!(
                d_near < d_mid && d_mid < d_far,
                "ranking violated for {:?}: {} {} {}",
                metric,
                d_near,
                d_mid,
                d_far
            );
        }
    }

    #[test]
    fn test_calculator_reports_metric() {
        let calc = DistanceCalculator::new(Distance::Euclid);
        assert_eq!(calc.metric(), Distance::Euclid);
    }

    #[test]
    fn test_lane_kernels_match_naive() {
        // The lane-accumulator kernels must agree with a straightforward
        // loop, including on lengths that exercise the remainder path.
        // Tolerance is relative: summation order differs between the two.
        fn rel_eq(got: f32, want: f32) -> bool {
            (got - want).abs() <= 1e-4 * (1.0 + want.abs())
        }

        for dim in [1, 3, 4, 7, 16, 33] {
            let a: Vec<f32> = (0..dim).map(|i| (i as f32) * 0.3 - 1.0).collect();
            let b: Vec<f32> = (0..dim).map(|i| ((i * 2) as f32) * 0.1 + 0.5).collect();

            let naive_dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
            assert!(rel_eq(dot_distance(&a, &b), -naive_dot), "dim {}", dim);

            let naive_l2: f32 = a
                .iter()
                .zip(&b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            assert!(rel_eq(euclidean_distance(&a, &b), naive_l2), "dim {}", dim);

            let naive_na: f32 = a.iter().map(|x| x * x).sum();
            let naive_nb: f32 = b.iter().map(|y| y * y).sum();
            let naive_cos = 1.0 - naive_dot / (naive_na * naive_nb).sqrt();
            assert!(rel_eq(cosine_distance(&a, &b), naive_cos), "dim {}", dim);
        }
    }
}
