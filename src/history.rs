use std::collections::VecDeque;

use chrono::Utc;
use tracing::debug;

use crate::models::ConversationTurn;

const HISTORY_CAPACITY: usize = 10;

/// Sliding window over the most recent exchanges of one session.
///
/// Purely in-memory; nothing here survives the process. Older turns fall
/// off the front once the window is full.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn, evicting the oldest when the window is full.
    pub fn record(&mut self, question: &str, response: &str) {
        if self.turns.len() == HISTORY_CAPACITY {
            self.turns.pop_front();
        }
        self.turns.push_back(ConversationTurn {
            question: question.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Recorded turns, oldest first.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        debug!("conversation history cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_insertion_order() {
        let mut history = ConversationHistory::new();
        history.record("primeira", "resposta um");
        history.record("segunda", "resposta dois");

        let turns = history.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].question, "primeira");
        assert_eq!(turns[1].question, "segunda");
    }

    #[test]
    fn test_keeps_only_the_ten_most_recent() {
        let mut history = ConversationHistory::new();
        for i in 0..15 {
            history.record(&format!("pergunta {}", i), "resposta");
        }

        let turns = history.turns();
        assert_eq!(turns.len(), 10);
        assert_eq!(turns[0].question, "pergunta 5");
        assert_eq!(turns[9].question, "pergunta 14");
    }

    #[test]
    fn test_clear_resets_to_empty() {
        let mut history = ConversationHistory::new();
        history.record("pergunta", "resposta");
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }
}
