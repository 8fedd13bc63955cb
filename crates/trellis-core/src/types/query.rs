//! Query result types

use serde::{Deserialize, Serialize};

use crate::types::point::{Metadata, PointId};

/// Single K-nearest-neighbor match
///
/// Carries the raw distance under the index's configured metric; callers
/// wanting a similarity convert it themselves (e.g. `1.0 - distance` for
/// cosine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnResult {
    /// Point ID
    pub id: PointId,

    /// Distance to the query (lower = more similar)
    pub distance: f32,

    /// Metadata stored with the point, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl KnnResult {
    /// Create a result without metadata
    pub fn new(id: PointId, distance: f32) -> Self {
        Self {
            id,
            distance,
            metadata: None,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_skipped_when_absent() {
        let encoded = serde_json::to_string(&KnnResult::new(3, 0.25)).unwrap();
        assert_eq!(encoded, r#"{"id":3,"distance":0.25}"#);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let result = KnnResult::new(1, 0.5).with_metadata(serde_json::json!({"tag": "a"}));
        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: KnnResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.metadata, result.metadata);
    }
}
