//! Core data models used throughout Unidesk.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the training and question-answering pipeline.

use chrono::{DateTime, Utc};

/// Raw text pulled from a source file, before chunking.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_name: String,
    pub raw_text: String,
    pub extracted_at: DateTime<Utc>,
}

/// A bounded segment of a document's text, the unit of indexing.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub source_name: String,
    pub chunk_index: i64,
    pub total_chunks: i64,
    pub content: String,
}

/// A chunk ranked against a query, highest similarity first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub content: String,
    pub source_name: String,
    pub chunk_index: i64,
    pub score: f32,
}

/// Per-file result of a batch training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub source_name: String,
    pub trained: bool,
}

/// Best-effort index counters, zero-valued when the index is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    pub total_documents: i64,
    pub total_chunks_estimate: i64,
}

/// One question/response exchange kept in the conversation window.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// Summary row for a trained source, as listed by the CLI.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source_name: String,
    pub chunk_count: i64,
    pub extracted_at: i64,
}
