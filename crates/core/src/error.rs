use crate::pipeline::PipelineStage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetching {url} returned {status}")]
    Fetch { url: String, status: u16 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("store request failed: {0}")]
    Request(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] ModelError),

    #[error("embedding dimension {actual} does not match {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {provider}: {details}")]
    MalformedResponse { provider: String, details: String },

    #[error("missing api key for {0}")]
    MissingApiKey(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("prompt template has no value for placeholder `{0}`")]
    Template(String),

    #[error("standalone question rewrite failed: {0}")]
    Rewrite(#[source] ModelError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] StoreError),

    #[error("answer generation failed: {0}")]
    Answer(#[source] ModelError),

    #[error("{stage} stage timed out after {seconds}s")]
    Timeout { stage: PipelineStage, seconds: u64 },
}

impl PipelineError {
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::Template(_) => None,
            PipelineError::Rewrite(_) => Some(PipelineStage::Rewrite),
            PipelineError::Retrieval(_) => Some(PipelineStage::Retrieval),
            PipelineError::Answer(_) => Some(PipelineStage::Answer),
            PipelineError::Timeout { stage, .. } => Some(*stage),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid url for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid value for {field}: {details}")]
    InvalidValue { field: &'static str, details: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
