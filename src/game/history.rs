use std::collections::VecDeque;

use serde::Serialize;

use crate::oracle::MoveResult;

/// Board state captured right before a half-move was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub fen: String,
    pub last_move: Option<MoveResult>,
    pub ply: u32,
}

/// Bounded ring of recent positions. The oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct MoveHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl MoveHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Drops the last `half_moves` entries and returns the state from before
    /// the earliest of them. `None` (and no change) if the ring is too short.
    pub fn rewind(&mut self, half_moves: usize) -> Option<HistoryEntry> {
        if half_moves == 0 || self.entries.len() < half_moves {
            return None;
        }
        let mut restored = None;
        for _ in 0..half_moves {
            restored = self.entries.pop_back();
        }
        restored
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
