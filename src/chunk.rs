//! Size-bounded text chunker with overlap.
//!
//! Splits extracted document text into [`Chunk`]s no longer than a
//! configured byte budget, carrying a fixed-size overlap between
//! consecutive chunks so retrieval never loses context at a cut point.
//! Cuts prefer paragraph, line, sentence, then word boundaries before
//! falling back to a hard cut; all cuts land on UTF-8 character
//! boundaries.

use tracing::warn;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Split-point candidates, tried largest boundary first. The separator
/// stays with the preceding chunk.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Text chunker with configurable size, overlap, and caps.
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
    max_input_bytes: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            max_chunks: config.max_chunks_per_document,
            max_input_bytes: config.max_input_chars,
        }
    }

    /// Split text into overlapping chunks attributed to `source_name`.
    /// Returns chunks with contiguous indices starting at 0 and
    /// `total_chunks` filled in. Empty or whitespace-only input yields an
    /// empty vector, which callers treat as "nothing to index".
    pub fn split(&self, text: &str, source_name: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut text = text;
        if text.len() > self.max_input_bytes {
            let mut cut = self.max_input_bytes;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            warn!(
                "input for {} is {} bytes, truncating to {}",
                source_name,
                text.len(),
                cut
            );
            text = &text[..cut];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < text.len() {
            if chunks.len() >= self.max_chunks {
                warn!(
                    "chunk cap ({}) reached for {}, dropping remaining text",
                    self.max_chunks, source_name
                );
                break;
            }

            let break_at = if start + self.chunk_size >= text.len() {
                text.len()
            } else {
                let mut end = start + self.chunk_size;
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                self.find_break(text, start, end)
            };

            chunks.push(make_chunk(
                source_name,
                chunks.len() as i64,
                &text[start..break_at],
            ));

            if break_at == text.len() {
                break;
            }

            // Step back by the overlap so the next chunk repeats the tail
            // of this one.
            let mut next = break_at.saturating_sub(self.overlap);
            while next > 0 && !text.is_char_boundary(next) {
                next -= 1;
            }
            if next <= start {
                next = break_at;
            }
            start = next;
        }

        let total = chunks.len() as i64;
        for chunk in &mut chunks {
            chunk.total_chunks = total;
        }
        chunks
    }

    /// Pick the cut position inside `text[start..end]`, preferring the
    /// largest separator. A candidate must sit past the overlap so the
    /// next window always advances.
    fn find_break(&self, text: &str, start: usize, end: usize) -> usize {
        let window = &text[start..end];
        for sep in SEPARATORS {
            if let Some(pos) = window.rfind(sep) {
                let cut = pos + sep.len();
                if cut > self.overlap {
                    return start + cut;
                }
            }
        }
        end
    }
}

fn make_chunk(source_name: &str, index: i64, content: &str) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        source_name: source_name.to_string(),
        chunk_index: index,
        total_chunks: 0,
        content: content.to_string(),
    }
}
