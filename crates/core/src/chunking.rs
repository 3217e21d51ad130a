use crate::error::IngestError;
use crate::extractor::PageText;
use crate::models::{Chunk, IngestionOptions};
use text_splitter::{Characters, ChunkConfig, TextSplitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&IngestionOptions::default())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits text into overlapping character-bounded chunks, preferring paragraph,
/// line, sentence and word boundaries before cutting inside a word.
pub struct Chunker {
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        if config.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max chunk size must be positive".to_string(),
            ));
        }
        if config.overlap_chars >= config.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                config.overlap_chars, config.max_chars
            )));
        }

        let chunk_config = ChunkConfig::new(config.max_chars)
            .with_overlap(config.overlap_chars)
            .map_err(|error| IngestError::InvalidChunkConfig(error.to_string()))?;

        Ok(Self {
            splitter: TextSplitter::new(chunk_config),
        })
    }

    /// Splits each page on its own so no chunk straddles a page break.
    pub fn split_pages(&self, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            self.push_chunks(&page.text, Some(page.number), &mut chunks);
        }
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        self.push_chunks(text, None, &mut chunks);
        chunks
    }

    fn push_chunks(&self, text: &str, page: Option<u32>, target: &mut Vec<Chunk>) {
        for (offset, piece) in self.splitter.chunk_indices(text) {
            if piece.trim().is_empty() {
                continue;
            }
            target.push(Chunk {
                chunk_index: target.len() as u64,
                page,
                offset,
                text: piece.to_string(),
            });
        }
    }
}
