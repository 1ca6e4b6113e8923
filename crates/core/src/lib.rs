pub mod cleaner;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod store;
pub mod stores;
pub mod traits;

pub use cleaner::{normalize_whitespace, TextCleaner};
pub use completion::OpenAiChat;
pub use config::AppConfig;
pub use conversation::format_conv_history;
pub use embeddings::{CharacterNgramEmbedder, OpenAiEmbeddings, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ConfigError, IngestError, ModelError, PipelineError, StoreError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{discover_pdf_files, ingest_document, DocumentLoader, DocumentSource};
pub use models::{
    ChatMessage, DocumentChunk, IngestionOutcome, RetrievalOptions, ScoredChunk, Sender,
};
pub use pipeline::{combine_documents, AnswerPipeline, PipelineOutput, PipelineStage, FALLBACK_RESPONSE};
pub use prompt::PromptTemplate;
pub use session::ChatSession;
pub use store::EmbeddingStore;
pub use stores::{InMemoryStore, SupabaseStore};
pub use traits::{CompletionModel, EmbeddingModel, Retriever, VectorStore};
