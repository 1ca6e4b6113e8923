use crate::config::SupabaseConfig;
use crate::traits::VectorStore;
use crate::{DocumentChunk, RetrievalOptions, ScoredChunk, StoreError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

const BACKEND: &str = "supabase";
const INSERT_BATCH_SIZE: usize = 500;

/// Vector table behind Supabase's PostgREST API. Rows are `{content,
/// embedding, metadata}`; similarity search goes through an RPC function that
/// takes `{query_embedding, match_count, filter}`.
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    key: String,
    table_name: String,
    query_name: String,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    content: String,
    #[serde(default)]
    metadata: Value,
    similarity: f32,
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Request("supabase url is not configured".to_string()))?;
        let key = config
            .key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| StoreError::Request("supabase key is not configured".to_string()))?;
        let base = Url::parse(url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", base.as_str().trim_end_matches('/')),
            key,
            table_name: config.table_name.clone(),
            query_name: config.query_name.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("content-type", "application/json")
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("{status}: {body}"),
        })
    }
}

fn insert_rows(chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Vec<Value> {
    chunks
        .iter()
        .zip(embeddings.iter())
        .map(|(chunk, embedding)| {
            json!({
                "content": chunk.page_content,
                "embedding": embedding,
                "metadata": chunk.metadata,
            })
        })
        .collect()
}

fn match_body(query_vector: &[f32], options: &RetrievalOptions) -> Value {
    json!({
        "query_embedding": query_vector,
        "match_count": options.top_k,
        "filter": options.filter,
    })
}

#[async_trait]
impl VectorStore for SupabaseStore {
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

        let rows = insert_rows(chunks, embeddings);
        for batch in rows.chunks(INSERT_BATCH_SIZE) {
            debug!(table = %self.table_name, rows = batch.len(), "inserting rows");
            let request = self
                .client
                .post(format!("{}/{}", self.rest_url, self.table_name))
                .header("prefer", "return=minimal")
                .json(batch);

            let response = self.authorized(request).send().await?;
            Self::check(response).await?;
        }

        Ok(())
    }

    async fn match_rows(
        &self,
        query_vector: &[f32],
        options: &RetrievalOptions,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let request = self
            .client
            .post(format!("{}/rpc/{}", self.rest_url, self.query_name))
            .json(&match_body(query_vector, options));

        let response = Self::check(self.authorized(request).send().await?).await?;
        let rows: Vec<MatchRow> = response.json().await?;

        Ok(rows
            .into_iter()
            .map(|row| ScoredChunk {
                chunk: DocumentChunk::new(row.content, row.metadata),
                similarity: row.similarity,
            })
            .collect())
    }
}
