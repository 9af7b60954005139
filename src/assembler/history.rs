//! Bounded append-only history

use std::collections::VecDeque;

/// Order-preserving buffer holding at most `cap` items.
///
/// Items are appended at the tail. When an append pushes the length past the
/// cap, the surplus is removed from the head in one splice.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> HistoryBuffer<T> {
    /// Create an empty buffer; a zero cap is raised to one.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { items: VecDeque::with_capacity(cap.min(1024)), cap }
    }

    /// Append `item`, trimming the oldest entries when over capacity.
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        self.trim();
    }

    /// Append several items in order, trimming once at the end.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
        self.trim();
    }

    fn trim(&mut self) {
        if self.items.len() > self.cap {
            let surplus = self.items.len() - self.cap;
            self.items.drain(..surplus);
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recent item.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
