//! Chat history types

use serde::{Deserialize, Serialize};

/// Message role for chat-style generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message sent to a generation provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One completed question/answer exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Append-only, session-scoped list of turns (oldest first)
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Prior turns as `(question, answer)` pairs, oldest first
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.turns
            .iter()
            .map(|t| (t.question.clone(), t.answer.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_oldest_first() {
        let mut history = ChatHistory::new();
        history.push(ChatTurn::new("Who approves leave?", "Your manager."));
        history.push(ChatTurn::new("How many days?", "Twenty."));

        assert_eq!(
            history.pairs(),
            vec![
                ("Who approves leave?".to_string(), "Your manager.".to_string()),
                ("How many days?".to_string(), "Twenty.".to_string()),
            ]
        );

        history.clear();
        assert!(history.pairs().is_empty());
    }
}
