//! Bounded set of admitted frame identifiers

use std::collections::BTreeSet;

/// Outcome of recording a frame identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recorded {
    /// Already present, nothing changed
    Duplicate,
    /// Added; `evicted` is the identifier dropped to stay within capacity
    New { evicted: Option<u32> },
}

/// Frame identifiers seen by one queue, capped at `capacity` entries.
///
/// On overflow the numerically smallest identifier is evicted, which is not
/// necessarily the least recently inserted one. Upstream overall frame
/// identifiers only grow within a session, so smallest and oldest coincide
/// there; after a counter restart the freshly inserted small values are
/// evicted first.
#[derive(Debug, Clone)]
pub(crate) struct SeenFrameIds {
    ids: BTreeSet<u32>,
    capacity: usize,
}

impl SeenFrameIds {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { ids: BTreeSet::new(), capacity: capacity.max(1) }
    }

    pub(crate) fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub(crate) fn record(&mut self, id: u32) -> Recorded {
        if !self.ids.insert(id) {
            return Recorded::Duplicate;
        }
        let evicted = if self.ids.len() > self.capacity { self.ids.pop_first() } else { None };
        Recorded::New { evicted }
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
    }
}
