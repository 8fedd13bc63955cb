//! Index configuration types
//!
//! All HNSW parameters are explicit. Graph quality is highly sensitive to
//! them, and implicit defaults lead to production surprises, so there is no
//! `Default` implementation; use [`HnswConfig::standard`] to derive the
//! paper-recommended values from `m`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Distance metric for vector similarity
///
/// Determines how similarity between vectors is calculated. One metric is
/// resolved at index construction; metrics are never mixed within an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Cosine distance (1 - cosine similarity)
    ///
    /// Range: [0, 2] where 0 = identical, 2 = opposite
    /// Best for: normalized embeddings, text similarity
    Cosine,

    /// Euclidean distance (L2 norm)
    ///
    /// Range: [0, ∞) where 0 = identical
    /// Best for: spatial data, image embeddings
    Euclid,

    /// Dot product (inner product), negated so lower = more similar
    ///
    /// Range: (-∞, ∞)
    /// Best for: maximum inner product search (MIPS)
    Dot,
}

/// HNSW index configuration
///
/// # Parameter Guide
///
/// | Parameter | Typical Range | Effect |
/// |-----------|--------------|--------|
/// | `m` | 5-48 | Target neighbors per node; higher = better recall, more memory |
/// | `m_max` | m | Hard cap per node in layers 1+ |
/// | `m_max0` | 2*m | Hard cap per node in layer 0 |
/// | `ml` | 1/ln(m) | Level distribution |
/// | `ef` | 10-500 | Search queue size (quality vs speed) |
/// | `ef_construction` | 100-800 | Build quality (one-time cost) |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Target neighbor count per node per layer above 0
    pub m: usize,

    /// Hard cap on connections per node in layers 1+
    ///
    /// Enforced during post-insert pruning.
    pub m_max: usize,

    /// Hard cap on connections per node in layer 0
    ///
    /// Paper recommendation: 2 * m. Layer 0 benefits from more connections
    /// since every search ends there.
    pub m_max0: usize,

    /// Level distribution multiplier
    ///
    /// Formula: 1 / ln(m). Controls the probability of assigning nodes to
    /// higher layers.
    pub ml: f64,

    /// Search queue size during queries
    ///
    /// Raised to `k` automatically when a query asks for more results.
    pub ef: usize,

    /// Search queue size during index construction
    ///
    /// Higher = better graph quality, slower insertion.
    pub ef_construction: usize,
}

impl HnswConfig {
    /// Build a config from `m` with the paper-recommended derived values:
    /// `m_max = m`, `m_max0 = 2 * m`, `ml = 1 / ln(m)`.
    pub fn standard(m: usize, ef: usize, ef_construction: usize) -> Self {
        Self {
            m,
            m_max: m,
            m_max0: 2 * m,
            ml: Self::recommended_ml(m),
            ef,
            ef_construction,
        }
    }

    /// Validate configuration parameters
    ///
    /// Returns an error if any parameter is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.m < 2 {
            return Err(ConfigError::InvalidParameter {
                name: "m",
                message: "must be >= 2".into(),
            });
        }

        if self.m_max < self.m {
            return Err(ConfigError::InvalidParameter {
                name: "m_max",
                message: format!("must be >= m ({})", self.m),
            });
        }

        if self.m_max0 < self.m_max {
            return Err(ConfigError::InvalidParameter {
                name: "m_max0",
                message: format!("must be >= m_max ({})", self.m_max),
            });
        }

        if !self.ml.is_finite() || self.ml <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "ml",
                message: "must be a positive finite number".into(),
            });
        }

        if self.ef < 1 {
            return Err(ConfigError::InvalidParameter {
                name: "ef",
                message: "must be >= 1".into(),
            });
        }

        if self.ef_construction < 1 {
            return Err(ConfigError::InvalidParameter {
                name: "ef_construction",
                message: "must be >= 1".into(),
            });
        }

        Ok(())
    }

    /// Calculate the recommended ml value for a given m
    ///
    /// Formula: 1 / ln(m)
    pub fn recommended_ml(m: usize) -> f64 {
        1.0 / (m as f64).ln()
    }
}
