use crate::traits::{EmbeddingModel, Retriever, VectorStore};
use crate::{DocumentChunk, RetrievalOptions, ScoredChunk, StoreError};
use async_trait::async_trait;
use tracing::{debug, info};

/// Embeds text on the way in and on the way out of a vector table.
pub struct EmbeddingStore<E, S>
where
    E: EmbeddingModel,
    S: VectorStore,
{
    embedder: E,
    store: S,
    options: RetrievalOptions,
}

impl<E, S> EmbeddingStore<E, S>
where
    E: EmbeddingModel,
    S: VectorStore,
{
    pub fn new(embedder: E, store: S, options: RetrievalOptions) -> Self {
        Self {
            embedder,
            store,
            options,
        }
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    pub fn vector_store(&self) -> &S {
        &self.store
    }

    /// Embeds and persists every chunk. Returns the number of rows written;
    /// an empty slice writes nothing and makes no remote call.
    pub async fn store(&self, chunks: &[DocumentChunk]) -> Result<usize, StoreError> {
        if chunks.is_empty() {
            debug!("no chunks to store");
            return Ok(0);
        }

        let texts = chunks
            .iter()
            .map(|chunk| chunk.page_content.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_documents(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        self.store.add_rows(chunks, &embeddings).await?;
        info!(chunk_count = chunks.len(), "stored embedded chunks");
        Ok(chunks.len())
    }

    /// Similarity search by query text, highest similarity first.
    pub async fn retrieve_scored(&self, query: &str) -> Result<Vec<ScoredChunk>, StoreError> {
        let query_vector = self.embedder.embed_query(query).await?;
        let hits = self.store.match_rows(&query_vector, &self.options).await?;
        let ranked = rank_hits(hits, &self.options);

        debug!(hits = ranked.len(), top_k = self.options.top_k, "retrieved chunks");
        Ok(ranked)
    }
}

/// Applies the similarity threshold, re-sorts descending and caps at `top_k`
/// regardless of what the backend returned.
fn rank_hits(mut hits: Vec<ScoredChunk>, options: &RetrievalOptions) -> Vec<ScoredChunk> {
    if let Some(threshold) = options.score_threshold {
        hits.retain(|hit| hit.similarity >= threshold);
    }
    hits.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
    hits.truncate(options.top_k);
    hits
}

#[async_trait]
impl<E, S> Retriever for EmbeddingStore<E, S>
where
    E: EmbeddingModel,
    S: VectorStore,
{
    async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        Ok(self
            .retrieve_scored(query)
            .await?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect())
    }
}
