use crate::config::OpenAiConfig;
use crate::traits::EmbeddingModel;
use crate::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT: usize = 128;
const OPENAI_BATCH_SIZE: usize = 512;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible `/embeddings` client.
pub struct OpenAiEmbeddings {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ModelError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ModelError::MissingApiKey("openai embeddings".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.as_str().trim_end_matches('/')),
            api_key,
            model: config.embedding_model.clone(),
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let inputs = request_inputs(batch);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: &inputs,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                provider: "openai embeddings".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        order_embeddings(parsed.data, batch.len())
    }
}

/// Newlines are sent as spaces; they degrade ada embeddings.
fn request_inputs(batch: &[String]) -> Vec<String> {
    batch.iter().map(|text| text.replace('\n', " ")).collect()
}

fn order_embeddings(mut rows: Vec<EmbeddingRow>, expected: usize) -> Result<Vec<Vec<f32>>, ModelError> {
    if rows.len() != expected {
        return Err(ModelError::MalformedResponse {
            provider: "openai embeddings".to_string(),
            details: format!("expected {expected} embeddings, got {}", rows.len()),
        });
    }

    rows.sort_by_key(|row| row.index);
    Ok(rows.into_iter().map(|row| row.embedding).collect())
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| ModelError::MalformedResponse {
            provider: "openai embeddings".to_string(),
            details: "empty embedding list".to_string(),
        })
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(OPENAI_BATCH_SIZE) {
            debug!(model = %self.model, batch_len = batch.len(), "embedding batch");
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(embeddings)
    }
}

/// Local hashing embedder over character trigrams. Deterministic and
/// dependency free, used by the offline mode.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingModel for CharacterNgramEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(self.embed(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_inputs_flatten_newlines() {
        let inputs = request_inputs(&["What are the\nNABH fire\n\nrules?".to_string()]);
        assert_eq!(inputs, vec!["What are the NABH fire  rules?".to_string()]);
    }

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Hand hygiene compliance audit");
        let second = embedder.embed("Hand hygiene compliance audit");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed("abc");
        assert_eq!(vector.len(), 32);
    }

    #[tokio::test]
    async fn document_embeddings_match_query_embeddings() -> Result<(), ModelError> {
        let embedder = CharacterNgramEmbedder::default();
        let texts = vec!["blood transfusion".to_string(), "fire safety".to_string()];

        let documents = embedder.embed_documents(&texts).await?;

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1], embedder.embed_query("fire safety").await?);
        Ok(())
    }

    #[test]
    fn provider_rows_are_reordered_by_index() -> Result<(), ModelError> {
        let rows = vec![
            EmbeddingRow {
                index: 1,
                embedding: vec![1.0],
            },
            EmbeddingRow {
                index: 0,
                embedding: vec![0.0],
            },
        ];

        let ordered = order_embeddings(rows, 2)?;
        assert_eq!(ordered, vec![vec![0.0], vec![1.0]]);
        Ok(())
    }

    #[test]
    fn short_provider_response_is_malformed() {
        let result = order_embeddings(Vec::new(), 1);
        assert!(matches!(result, Err(ModelError::MalformedResponse { .. })));
    }

    #[test]
    fn openai_embeddings_require_an_api_key() {
        let config = OpenAiConfig {
            api_key: None,
            ..OpenAiConfig::default()
        };
        assert!(matches!(
            OpenAiEmbeddings::new(&config),
            Err(ModelError::MissingApiKey(_))
        ));
    }
}
