//! Embedding service trait and vector utilities.
//!
//! Defines the [`EmbeddingService`] collaborator that all embedding
//! backends implement, plus pure helpers for vector serialization and
//! similarity computation.
//!
//! Concrete services (OpenAI, Gemini) live in the `firstfix` app crate,
//! which is also where provider response-shape differences are absorbed.

use anyhow::Result;
use async_trait::async_trait;

/// Batch text embedding.
///
/// Implementations return exactly one slot per input, in input order.
/// A `None` slot means the provider produced no vector for that text;
/// callers drop such items rather than failing the batch.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;

    /// Longest input, in characters, the service accepts.
    fn max_input_chars(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>>;
}

/// Embed a single query text, returning `None` when no vector comes back.
pub async fn embed_one(service: &dyn EmbeddingService, text: &str) -> Result<Option<Vec<f32>>> {
    let mut out = service.embed_batch(&[text.to_string()]).await?;
    Ok(out.pop().flatten())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use firstfix_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance, `1 - cosine_similarity`, in `[0.0, 2.0]`.
///
/// This is the distance every [`VectorStore`](crate::store::VectorStore)
/// reports, so `max(0, 1 - distance)` recovers a clamped similarity.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl EmbeddingService for Fixed {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn max_input_chars(&self) -> usize {
            100
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
            Ok(texts
                .iter()
                .map(|t| (!t.is_empty()).then(|| vec![t.len() as f32]))
                .collect())
        }
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_distance_range() {
        let v = [1.0, 2.0, 3.0];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        // Similarity recovered from distance is clamped at zero.
        let sim = (1.0 - cosine_distance(&[1.0, 0.0], &[-1.0, 0.0])).clamp(0.0, 1.0);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_embed_one() {
        assert_eq!(embed_one(&Fixed, "abc").await.unwrap(), Some(vec![3.0]));
        assert_eq!(embed_one(&Fixed, "").await.unwrap(), None);
    }
}
