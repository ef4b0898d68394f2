//! Embedding vector operations (spec.md §2 row C "Embedding Service").

use serde::{Deserialize, Serialize};

/// A fixed-dimension embedding vector produced by the embedding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    /// The embedding data as a vector of f32 values.
    pub data: Vec<f32>,
    /// Identifier of the model that produced this embedding.
    pub model_id: String,
    /// Number of dimensions (must match `data.len()`).
    pub dimensions: usize,
}

impl EmbeddingVector {
    pub fn new(data: Vec<f32>, model_id: impl Into<String>) -> Self {
        let dimensions = data.len();
        Self {
            data,
            model_id: model_id.into(),
            dimensions,
        }
    }

    /// Cosine similarity; `None` if dimensions mismatch.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> Option<f32> {
        if self.dimensions != other.dimensions {
            return None;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let norm_a = norm_a.sqrt();
        let norm_b = norm_b.sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return Some(0.0);
        }
        Some(dot / (norm_a * norm_b))
    }

    pub fn is_valid(&self) -> bool {
        self.dimensions > 0 && self.data.len() == self.dimensions
    }
}
