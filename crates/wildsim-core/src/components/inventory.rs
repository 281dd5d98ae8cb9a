//! Contained inventory owned by a single piece.

use serde::{Deserialize, Serialize};

use super::KindId;

/// Items held by a piece, stored by kind only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<KindId>,
    /// Maximum number of items; zero means unlimited
    pub capacity: usize,
}

impl Inventory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_full(&self) -> bool {
        self.capacity != 0 && self.items.len() >= self.capacity
    }

    /// Add an item. Returns false when full.
    pub fn add(&mut self, kind: KindId) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push(kind);
        true
    }

    pub fn contains_any_of(&self, kinds: &[KindId]) -> bool {
        self.items.iter().any(|item| kinds.contains(item))
    }

    /// Take out the first held item whose kind is in `kinds`.
    pub fn remove_first_of_kind(&mut self, kinds: &[KindId]) -> Option<KindId> {
        let index = self.items.iter().position(|item| kinds.contains(item))?;
        Some(self.items.remove(index))
    }

    /// Empty the inventory, returning everything it held in order.
    pub fn drain(&mut self) -> Vec<KindId> {
        std::mem::take(&mut self.items)
    }
}
