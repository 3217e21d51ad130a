use crate::chunking::Chunker;
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::models::Chunk;
use crate::store::{ChunkSource, VectorStore};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if has_pdf_extension(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Which extraction stage produced a document's chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    Structured,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub chunks: Vec<Chunk>,
    pub path: ExtractionPath,
}

/// Extraction, chunking and storage of one document at a time.
#[derive(Clone)]
pub struct IngestionEngine {
    extractor: Arc<dyn PdfExtractor>,
    chunker: Arc<Chunker>,
}

impl IngestionEngine {
    pub fn new(extractor: Arc<dyn PdfExtractor>, chunker: Chunker) -> Self {
        Self {
            extractor,
            chunker: Arc::new(chunker),
        }
    }

    /// Two-stage pipeline: structured pages first, then the permissive fallback
    /// when the structured stage yields no usable chunks.
    pub fn process_document(&self, file_path: &Path) -> Result<ProcessedDocument, IngestError> {
        let chunks = match self.extractor.extract_pages(file_path) {
            Ok(pages) => self.chunker.split_pages(&pages),
            Err(error) => {
                warn!(path = %file_path.display(), %error, "structured extraction failed");
                Vec::new()
            }
        };

        if !chunks.is_empty() {
            return Ok(ProcessedDocument {
                chunks,
                path: ExtractionPath::Structured,
            });
        }

        info!(path = %file_path.display(), "structured extraction yielded nothing, trying fallback");
        let fallback_text = self.extractor.extract_fallback_text(file_path);
        if fallback_text.trim().is_empty() {
            return Err(IngestError::EmptyDocument);
        }

        let chunks = self.chunker.split_text(&fallback_text);
        if chunks.is_empty() {
            return Err(IngestError::EmptyDocument);
        }

        Ok(ProcessedDocument {
            chunks,
            path: ExtractionPath::Fallback,
        })
    }

    /// Extracts and chunks `file_path` on the blocking pool, then stores every chunk in one batch.
    pub async fn ingest(
        &self,
        store: &dyn VectorStore,
        file_path: &Path,
        source_name: &str,
    ) -> Result<usize, IngestError> {
        let engine = self.clone();
        let owned_path = file_path.to_path_buf();
        let (document_id, processed) = tokio::task::spawn_blocking(move || {
            let document_id = digest_file(&owned_path)?;
            let processed = engine.process_document(&owned_path)?;
            Ok::<_, IngestError>((document_id, processed))
        })
        .await
        .map_err(|error| IngestError::Task(error.to_string()))??;

        let origin = ChunkSource {
            document_id: &document_id,
            source: source_name,
        };
        let ids = store.add_chunks(origin, &processed.chunks).await?;

        info!(
            source = source_name,
            chunks = ids.len(),
            extraction = ?processed.path,
            "document ingested"
        );
        Ok(ids.len())
    }

    /// Ingests each file in turn; a file that fails is recorded and skipped.
    pub async fn ingest_best_effort(
        &self,
        store: &dyn VectorStore,
        files: &[PathBuf],
    ) -> IngestionReport {
        let mut report = IngestionReport::default();

        for path in files {
            let source_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string();

            match self.ingest(store, path, &source_name).await {
                Ok(stored) => {
                    report.chunks_stored += stored;
                    report.ingested_files += 1;
                }
                Err(error) => report.skipped_files.push(SkippedPdf {
                    path: path.clone(),
                    reason: error.to_string(),
                }),
            }
        }

        report
    }
}

#[derive(Debug)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub chunks_stored: usize,
    pub ingested_files: usize,
    pub skipped_files: Vec<SkippedPdf>,
}
