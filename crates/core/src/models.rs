use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn label(self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Bot => "Bot",
        }
    }
}

/// One turn of a chat session. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Sender::Bot, text)
    }
}

/// A cleaned page of a source document, ready to embed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Value,
}

impl DocumentChunk {
    pub fn new(page_content: impl Into<String>, metadata: Value) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    pub fn char_len(&self) -> usize {
        self.page_content.chars().count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub similarity: f32,
}

/// Result of the ingestion entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionOutcome {
    pub success: bool,
    pub message: String,
    pub chunks_stored: usize,
}

impl IngestionOutcome {
    pub fn stored(chunks_stored: usize) -> Self {
        let message = if chunks_stored == 0 {
            "no chunks survived cleaning; nothing to store".to_string()
        } else {
            "Embeddings created and stored successfully".to_string()
        };

        Self {
            success: true,
            message,
            chunks_stored,
        }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            chunks_stored: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub score_threshold: Option<f32>,
    pub filter: Value,
}

fn empty_filter() -> Value {
    Value::Object(Default::default())
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            score_threshold: None,
            filter: empty_filter(),
        }
    }
}
