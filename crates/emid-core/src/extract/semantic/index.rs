//! In-memory similarity index over chunk embeddings.

use ndarray::{Array1, Array2, Axis};

use crate::error::LlmError;

/// Chunks with their unit-normalised embeddings, one row per chunk.
pub struct ChunkIndex {
    chunks: Vec<String>,
    vectors: Array2<f32>,
}

impl ChunkIndex {
    /// Build an index. Every embedding must have the same non-zero dimension.
    pub fn build(chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<Self, LlmError> {
        if chunks.len() != embeddings.len() {
            return Err(LlmError::InvalidEmbedding(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dim = embeddings.first().map(Vec::len).unwrap_or(0);
        if dim == 0 && !chunks.is_empty() {
            return Err(LlmError::InvalidEmbedding("zero-dimensional embedding".into()));
        }

        let mut flat = Vec::with_capacity(chunks.len() * dim);
        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dim {
                return Err(LlmError::InvalidEmbedding(format!(
                    "embedding {} has dimension {}, expected {}",
                    i,
                    embedding.len(),
                    dim
                )));
            }
            flat.extend(normalized(embedding));
        }

        let vectors = Array2::from_shape_vec((chunks.len(), dim), flat)
            .map_err(|e| LlmError::InvalidEmbedding(e.to_string()))?;

        Ok(Self { chunks, vectors })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `k` chunks most similar to `query`, best first. Ties keep chunk
    /// order.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<&str>, LlmError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.vectors.len_of(Axis(1)) {
            return Err(LlmError::InvalidEmbedding(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.vectors.len_of(Axis(1))
            )));
        }

        let query = Array1::from_vec(normalized(query));
        let scores = self.vectors.dot(&query);

        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(i, _)| self.chunks[i].as_str())
            .collect())
    }
}

fn normalized(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn index() -> ChunkIndex {
        ChunkIndex::build(
            vec!["north".into(), "east".into(), "north-east".into()],
            vec![vec![0.0, 2.0], vec![3.0, 0.0], vec![1.0, 1.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_top_k_ranks_by_cosine() {
        let index = index();
        let hits = index.top_k(&[0.1, 1.0], 2).unwrap();
        assert_eq!(hits, vec!["north", "north-east"]);
    }

    #[test]
    fn test_top_k_is_capped_by_size() {
        assert_eq!(index().top_k(&[1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = ChunkIndex::build(vec!["a".into(), "b".into()], vec![vec![1.0], vec![1.0, 2.0]]);
        assert!(matches!(err, Err(LlmError::InvalidEmbedding(_))));

        assert!(index().top_k(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_count_mismatch() {
        let err = ChunkIndex::build(vec!["a".into()], vec![]);
        assert!(matches!(err, Err(LlmError::InvalidEmbedding(_))));
    }
}
