use chrono::Utc;

use crate::models::{ContentUnit, Role, Turn};

/// Append-only log of conversation turns.
///
/// Turn ids are assigned here and increase monotonically; turns are never
/// edited or removed once appended.
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    next_id: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: Role, content: Vec<ContentUnit>) -> Turn {
        self.next_id += 1;
        let turn = Turn {
            id: self.next_id,
            role,
            content,
            created_at: Utc::now(),
        };
        tracing::debug!(turn_id = turn.id, role = ?turn.role, "Appending turn");
        self.turns.push(turn.clone());
        turn
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
