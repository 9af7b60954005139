//! Per-packet-type admission queues.
//!
//! A [`PacketQueue`] buffers the packets of one category between the
//! transport and the assembler. Its [`AdmissionPolicy`] decides whether a
//! packet whose frame identifier was already admitted is dropped:
//!
//! - pulled batches overlap (each poll returns the server's whole buffer), so
//!   the pull transport uses [`AdmissionPolicy::DedupByFrameId`]
//! - the push stream delivers every frame once, so it can use
//!   [`AdmissionPolicy::AlwaysAdmit`]
//!
//! Admissions are announced on a `watch` channel; any number of observers can
//! [`subscribe`](PacketQueue::subscribe) at any time and the queue does not
//! care whether anyone is listening.

mod frame_ids;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

use crate::config::MAX_SAVED_FRAME_NUMBERS;
use crate::types::RawPacket;
use frame_ids::{Recorded, SeenFrameIds};

/// Whether a queue rejects repeated frame identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum AdmissionPolicy {
    /// Enqueue every arrival
    AlwaysAdmit,
    /// Drop packets whose frame identifier was admitted before
    #[default]
    DedupByFrameId,
}

/// What [`PacketQueue::reset`] clears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ResetScope {
    /// Pending packets only; seen frame identifiers survive
    #[default]
    Pending,
    /// Pending packets and seen frame identifiers
    PendingAndSeen,
}

/// Outcome of [`PacketQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Duplicate,
}

/// Counters for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub admitted: u64,
    pub duplicates_dropped: u64,
    pub frame_ids_evicted: u64,
}

/// FIFO of admitted packets for one packet type.
#[derive(Debug)]
pub struct PacketQueue {
    name: String,
    policy: AdmissionPolicy,
    reset_scope: ResetScope,
    pending: VecDeque<Arc<RawPacket>>,
    seen: SeenFrameIds,
    stats: QueueStats,
    admissions: watch::Sender<u64>,
}

impl PacketQueue {
    /// Create a queue keeping at most [`MAX_SAVED_FRAME_NUMBERS`] seen identifiers.
    pub fn new(name: impl Into<String>, policy: AdmissionPolicy, reset_scope: ResetScope) -> Self {
        Self::with_frame_id_capacity(name, policy, reset_scope, MAX_SAVED_FRAME_NUMBERS)
    }

    /// Create a queue with a custom seen-identifier capacity.
    pub fn with_frame_id_capacity(
        name: impl Into<String>,
        policy: AdmissionPolicy,
        reset_scope: ResetScope,
        capacity: usize,
    ) -> Self {
        let (admissions, _) = watch::channel(0);
        Self {
            name: name.into(),
            policy,
            reset_scope,
            pending: VecDeque::new(),
            seen: SeenFrameIds::new(capacity),
            stats: QueueStats::default(),
            admissions,
        }
    }

    /// Admit `packet` unless its frame identifier was seen before.
    ///
    /// Under [`AdmissionPolicy::AlwaysAdmit`] every packet is admitted.
    pub fn enqueue(&mut self, packet: Arc<RawPacket>) -> Admission {
        if self.policy == AdmissionPolicy::DedupByFrameId {
            let frame = packet.frame_identifier();
            match self.seen.record(frame) {
                Recorded::Duplicate => {
                    self.stats.duplicates_dropped += 1;
                    trace!(queue = %self.name, frame, "Dropped duplicate frame");
                    return Admission::Duplicate;
                }
                Recorded::New { evicted: Some(oldest) } => {
                    self.stats.frame_ids_evicted += 1;
                    trace!(queue = %self.name, evicted = oldest, "Evicted smallest frame id");
                }
                Recorded::New { evicted: None } => {}
            }
        }

        self.pending.push_back(packet);
        self.stats.admitted += 1;
        self.admissions.send_modify(|count| *count += 1);
        Admission::Admitted
    }

    /// Remove and return the oldest admitted packet, `None` when empty.
    pub fn dequeue(&mut self) -> Option<Arc<RawPacket>> {
        self.pending.pop_front()
    }

    /// Clear pending packets, and seen identifiers when the scope says so.
    pub fn reset(&mut self) {
        self.pending.clear();
        if self.reset_scope == ResetScope::PendingAndSeen {
            self.seen.clear();
        }
    }

    /// Observe admissions. The value is the number of packets admitted so far.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.admissions.subscribe()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of remembered frame identifiers.
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Whether `frame` is currently remembered as admitted.
    pub fn has_seen(&self, frame: u32) -> bool {
        self.seen.contains(frame)
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PacketHeader, PacketId};
    use proptest::prelude::*;

    fn packet(frame: u32) -> Arc<RawPacket> {
        Arc::new(RawPacket::new(PacketHeader::new(PacketId::CarTelemetry, frame, 0)))
    }

    fn dedup_queue() -> PacketQueue {
        PacketQueue::new("CarTelemetryData", AdmissionPolicy::DedupByFrameId, ResetScope::Pending)
    }

    fn drain(queue: &mut PacketQueue) -> Vec<u32> {
        std::iter::from_fn(|| queue.dequeue()).map(|p| p.frame_identifier()).collect()
    }

    #[test]
    fn duplicate_frames_are_dropped() {
        let mut queue = dedup_queue();
        assert_eq!(queue.enqueue(packet(1)), Admission::Admitted);
        assert_eq!(queue.enqueue(packet(2)), Admission::Admitted);
        assert_eq!(queue.enqueue(packet(1)), Admission::Duplicate);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().duplicates_dropped, 1);
    }

    #[test]
    fn always_admit_keeps_repeats() {
        let mut queue =
            PacketQueue::new("CarTelemetryData", AdmissionPolicy::AlwaysAdmit, ResetScope::Pending);
        queue.enqueue(packet(7));
        queue.enqueue(packet(7));
        assert_eq!(drain(&mut queue), vec![7, 7]);
        assert_eq!(queue.seen_len(), 0);
    }

    #[test]
    fn empty_dequeue_returns_none_without_side_effects() {
        let mut queue = dedup_queue();
        queue.enqueue(packet(1));
        queue.dequeue();
        let before = queue.stats();

        assert!(queue.dequeue().is_none());
        assert!(queue.dequeue().is_none());
        assert_eq!(queue.stats(), before);
        assert!(queue.is_empty());
        assert!(queue.has_seen(1));
    }

    #[test]
    fn fifo_order_skips_rejected_duplicates() {
        let mut queue = dedup_queue();
        for frame in [5, 6, 5, 7, 6, 8] {
            queue.enqueue(packet(frame));
        }
        assert_eq!(drain(&mut queue), vec![5, 6, 7, 8]);
    }

    #[test]
    fn overflow_evicts_numerically_smallest_frame() {
        let mut queue = dedup_queue();
        // Arrival order 100, 3, 200..262 fills the set with 64 ids
        queue.enqueue(packet(100));
        queue.enqueue(packet(3));
        for frame in 200..262 {
            queue.enqueue(packet(frame));
        }
        assert_eq!(queue.seen_len(), MAX_SAVED_FRAME_NUMBERS);

        queue.enqueue(packet(300));
        assert_eq!(queue.seen_len(), MAX_SAVED_FRAME_NUMBERS);
        assert_eq!(queue.stats().frame_ids_evicted, 1);

        // 100 arrived first but survives; 3 is gone and would be admitted again
        assert!(queue.has_seen(100));
        assert!(!queue.has_seen(3));
        assert_eq!(queue.enqueue(packet(100)), Admission::Duplicate);
        assert_eq!(queue.enqueue(packet(3)), Admission::Admitted);
    }

    #[test]
    fn reset_scope_controls_seen_ids() {
        let mut queue = dedup_queue();
        queue.enqueue(packet(1));
        queue.reset();
        assert!(queue.is_empty());
        assert_eq!(queue.enqueue(packet(1)), Admission::Duplicate);

        let mut strict = PacketQueue::new(
            "CarTelemetryData",
            AdmissionPolicy::DedupByFrameId,
            ResetScope::PendingAndSeen,
        );
        strict.enqueue(packet(1));
        strict.reset();
        assert_eq!(strict.seen_len(), 0);
        assert_eq!(strict.enqueue(packet(1)), Admission::Admitted);
    }

    #[test]
    fn admissions_are_observable() {
        let mut queue = dedup_queue();
        queue.enqueue(packet(1));

        let mut observer = queue.subscribe();
        assert_eq!(*observer.borrow_and_update(), 1);

        queue.enqueue(packet(1));
        assert!(!observer.has_changed().unwrap());

        queue.enqueue(packet(2));
        assert!(observer.has_changed().unwrap());
        assert_eq!(*observer.borrow_and_update(), 2);
    }

    proptest! {
        #[test]
        fn dedup_and_capacity_invariants(frames in prop::collection::vec(0u32..200, 0..400)) {
            let mut queue = dedup_queue();
            let mut admitted = Vec::new();
            for frame in frames {
                if queue.enqueue(packet(frame)) == Admission::Admitted {
                    admitted.push(frame);
                }
                prop_assert!(queue.seen_len() <= MAX_SAVED_FRAME_NUMBERS);
            }

            let drained = drain(&mut queue);
            prop_assert_eq!(&drained, &admitted);

            // Without eviction no frame id can be admitted twice
            if queue.stats().frame_ids_evicted == 0 {
                let mut unique = drained.clone();
                unique.sort_unstable();
                unique.dedup();
                prop_assert_eq!(unique.len(), drained.len());
            }
        }

        #[test]
        fn increasing_frames_are_never_readmitted(
            start in 0u32..1000,
            steps in prop::collection::vec(0u32..3, 1..300),
        ) {
            // Monotonic identifiers with repeats, like overlapping poll windows
            let mut queue = dedup_queue();
            let mut frame = start;
            for step in steps {
                frame += step;
                queue.enqueue(packet(frame));
                queue.enqueue(packet(frame));
            }
            let drained = drain(&mut queue);
            prop_assert!(drained.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
