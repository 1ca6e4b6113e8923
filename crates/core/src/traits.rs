use crate::{DocumentChunk, ModelError, RetrievalOptions, ScoredChunk, StoreError};
use async_trait::async_trait;

/// Turns text into vectors. Queries and documents are separate calls because
/// providers batch document inputs.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_query(text).await?);
        }
        Ok(embeddings)
    }
}

/// Prompt in, text out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add_rows(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError>;

    /// Rows ordered by similarity, highest first.
    async fn match_rows(
        &self,
        query_vector: &[f32],
        options: &RetrievalOptions,
    ) -> Result<Vec<ScoredChunk>, StoreError>;
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>, StoreError>;
}
