use crate::cleaner::TextCleaner;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::store::EmbeddingStore;
use crate::traits::{EmbeddingModel, VectorStore};
use crate::{DocumentChunk, IngestError, IngestionOutcome};
use reqwest::Client;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;
use walkdir::WalkDir;

pub const DEFAULT_MIN_CHUNK_CHARS: usize = 20;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the knowledge-base PDF comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Url(Url),
    /// Every `*.pdf` below the folder, in sorted path order.
    Directory(PathBuf),
}

impl DocumentSource {
    /// `http(s)://` strings become URLs, existing directories become
    /// directory sources, anything else is treated as a file path.
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IngestError::InvalidArgument("document source is empty".to_string()));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|error| IngestError::InvalidArgument(format!("{trimmed}: {error}")))?;
            return Ok(Self::Url(url));
        }

        let path = PathBuf::from(trimmed);
        if path.is_dir() {
            Ok(Self::Directory(path))
        } else {
            Ok(Self::File(path))
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) | Self::Directory(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Fetches a PDF, splits it into pages, cleans every page and keeps the pages
/// whose cleaned text is longer than `min_chunk_chars`.
pub struct DocumentLoader<X = LopdfExtractor>
where
    X: PdfExtractor,
{
    extractor: X,
    cleaner: TextCleaner,
    http: Client,
    min_chunk_chars: usize,
}

impl DocumentLoader<LopdfExtractor> {
    pub fn new(min_chunk_chars: usize, fetch_timeout: Duration) -> Result<Self, IngestError> {
        Self::with_extractor(LopdfExtractor, min_chunk_chars, fetch_timeout)
    }
}

impl<X> DocumentLoader<X>
where
    X: PdfExtractor,
{
    /// `fetch_timeout` bounds every HTTP download, connect through body.
    pub fn with_extractor(
        extractor: X,
        min_chunk_chars: usize,
        fetch_timeout: Duration,
    ) -> Result<Self, IngestError> {
        let http = Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self {
            extractor,
            cleaner: TextCleaner::new()?,
            http,
            min_chunk_chars,
        })
    }

    pub fn cleaner(&self) -> &TextCleaner {
        &self.cleaner
    }

    pub async fn load(&self, source: &DocumentSource) -> Result<Vec<DocumentChunk>, IngestError> {
        match source {
            DocumentSource::File(path) => {
                let bytes = tokio::fs::read(path).await?;
                self.chunks_from_bytes(&bytes, &path.to_string_lossy())
            }
            DocumentSource::Url(url) => {
                let bytes = self.fetch(url).await?;
                self.chunks_from_bytes(&bytes, url.as_str())
            }
            DocumentSource::Directory(folder) => {
                let files = discover_pdf_files(folder);
                if files.is_empty() {
                    return Err(IngestError::InvalidArgument(format!(
                        "no pdf files found in {}",
                        folder.display()
                    )));
                }

                let mut chunks = Vec::new();
                for path in files {
                    let bytes = tokio::fs::read(&path).await?;
                    chunks.extend(self.chunks_from_bytes(&bytes, &path.to_string_lossy())?);
                }
                Ok(chunks)
            }
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, IngestError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Extract, clean and filter one PDF held in memory.
    pub fn chunks_from_bytes(&self, bytes: &[u8], origin: &str) -> Result<Vec<DocumentChunk>, IngestError> {
        let pages = self.extractor.extract_pages(bytes, origin)?;
        let checksum = digest_bytes(bytes);
        let total_pages = pages.len();

        let mut chunks = Vec::new();
        let mut dropped = 0usize;
        for page in pages {
            let cleaned = self.cleaner.clean(&page.text);
            if cleaned.chars().count() <= self.min_chunk_chars {
                dropped += 1;
                continue;
            }

            chunks.push(DocumentChunk::new(
                cleaned,
                json!({
                    "source": origin,
                    "checksum": checksum,
                    "pdf": { "totalPages": total_pages },
                    "loc": { "pageNumber": page.number },
                }),
            ));
        }

        if dropped > 0 {
            warn!(source = %origin, dropped, kept = chunks.len(), "dropped short pages");
        }
        Ok(chunks)
    }
}

/// Ingestion entry point: load → clean → embed → store. Never fails; the
/// outcome reports success or the error message.
pub async fn ingest_document<X, E, S>(
    loader: &DocumentLoader<X>,
    store: &EmbeddingStore<E, S>,
    source: &DocumentSource,
) -> IngestionOutcome
where
    X: PdfExtractor,
    E: EmbeddingModel,
    S: VectorStore,
{
    let result = async {
        let chunks = loader.load(source).await?;
        info!(source = %source, chunk_count = chunks.len(), "loaded document chunks");
        let stored = store.store(&chunks).await?;
        Ok::<_, IngestError>(stored)
    }
    .await;

    match result {
        Ok(stored) => IngestionOutcome::stored(stored),
        Err(err) => {
            error!(source = %source, error = %err, "ingestion failed");
            IngestionOutcome::failed(err)
        }
    }
}
