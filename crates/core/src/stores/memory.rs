use crate::traits::VectorStore;
use crate::{DocumentChunk, RetrievalOptions, ScoredChunk, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredRow {
    chunk: DocumentChunk,
    embedding: Vec<f32>,
}

/// Process-local vector table with cosine similarity. Matches the filter the
/// same way the hosted match function does: every key in the filter object must
/// be present in the row metadata with an equal value.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<StoredRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

fn metadata_contains(metadata: &Value, filter: &Value) -> bool {
    match filter.as_object() {
        Some(required) => required
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected)),
        None => true,
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn add_rows(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut rows = self.rows.write().await;
        let expected = rows
            .first()
            .map(|row| row.embedding.len())
            .or_else(|| embeddings.first().map(Vec::len));
        if let Some(expected) = expected {
            if let Some(bad) = embeddings.iter().find(|embedding| embedding.len() != expected) {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        rows.extend(chunks.iter().zip(embeddings).map(|(chunk, embedding)| StoredRow {
            chunk: chunk.clone(),
            embedding: embedding.clone(),
        }));
        Ok(())
    }

    async fn match_rows(
        &self,
        query_vector: &[f32],
        options: &RetrievalOptions,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let rows = self.rows.read().await;
        if let Some(existing) = rows.first() {
            if existing.embedding.len() != query_vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: existing.embedding.len(),
                    actual: query_vector.len(),
                });
            }
        }

        let mut scored = rows
            .iter()
            .filter(|row| metadata_contains(&row.chunk.metadata, &options.filter))
            .map(|row| ScoredChunk {
                chunk: row.chunk.clone(),
                similarity: cosine_similarity(&row.embedding, query_vector),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
        scored.truncate(options.top_k);
        Ok(scored)
    }
}
