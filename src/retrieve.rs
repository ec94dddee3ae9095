use tracing::debug;

use crate::index::VectorIndex;
use crate::models::ScoredChunk;

/// Fetches the chunks most relevant to a question.
///
/// Blank questions short-circuit to an empty result without touching the
/// index; everything else passes straight through to the index search.
pub async fn retrieve(index: &VectorIndex, question: &str, k: usize) -> Vec<ScoredChunk> {
    let question = question.trim();
    if question.is_empty() {
        debug!("retrieval skipped: blank question");
        return Vec::new();
    }
    index.search(question, k).await
}
