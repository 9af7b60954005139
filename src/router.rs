//! Dispatch of packets to per-type queues

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::PACKET_BACKUP_COUNT;
use crate::queue::{Admission, AdmissionPolicy, PacketQueue, QueueStats, ResetScope};
use crate::types::{PacketId, RawPacket};
use crate::{Result, TelemetryError};

/// Which car's record a queue projects out of each packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SubjectSelector {
    /// `Header.PlayerCarIndex`
    #[default]
    Player,
    /// `Header.SecondaryPlayerCarIndex` (split screen)
    SecondaryPlayer,
    /// A fixed car index
    Index(u8),
}

impl SubjectSelector {
    /// Resolve the record index for `packet`.
    pub fn index_for(self, packet: &RawPacket) -> usize {
        match self {
            SubjectSelector::Player => packet.subject_index(),
            SubjectSelector::SecondaryPlayer => packet.header.secondary_player_car_index as usize,
            SubjectSelector::Index(index) => index as usize,
        }
    }
}

/// Static binding of one queue to one packet type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDescriptor {
    /// Packet type the queue accepts
    pub packet_id: PacketId,
    /// Body field projected out of accepted packets; also names the history
    pub record_field: String,
    #[serde(default)]
    pub policy: AdmissionPolicy,
    #[serde(default)]
    pub reset_scope: ResetScope,
    /// Maximum length of the history fed by this queue
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    #[serde(default)]
    pub subject: SubjectSelector,
}

fn default_history_cap() -> usize {
    PACKET_BACKUP_COUNT
}

impl QueueDescriptor {
    /// Deduplicating descriptor with the default history cap.
    pub fn new(packet_id: PacketId, record_field: impl Into<String>) -> Self {
        Self {
            packet_id,
            record_field: record_field.into(),
            policy: AdmissionPolicy::default(),
            reset_scope: ResetScope::default(),
            history_cap: PACKET_BACKUP_COUNT,
            subject: SubjectSelector::default(),
        }
    }

    pub fn with_policy(mut self, policy: AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_reset_scope(mut self, reset_scope: ResetScope) -> Self {
        self.reset_scope = reset_scope;
        self
    }

    pub fn with_history_cap(mut self, history_cap: usize) -> Self {
        self.history_cap = history_cap;
        self
    }

    pub fn with_subject(mut self, subject: SubjectSelector) -> Self {
        self.subject = subject;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.record_field.is_empty() {
            return Err(TelemetryError::invalid_config(format!(
                "queue for {} has an empty record field",
                self.packet_id
            )));
        }
        if self.history_cap == 0 {
            return Err(TelemetryError::invalid_config(format!(
                "history cap of '{}' must be positive",
                self.record_field
            )));
        }
        Ok(())
    }
}

/// Result of routing one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No queue accepts this packet type
    Unrouted,
    /// Delivered to `matched` queues, `admitted` of which kept it
    Delivered { matched: usize, admitted: usize },
}

/// Owns one queue per descriptor and dispatches packets by type id.
#[derive(Debug)]
pub struct PacketRouter {
    slots: Vec<(QueueDescriptor, PacketQueue)>,
}

impl PacketRouter {
    /// Build queues for `descriptors`. Record fields must be unique.
    pub fn new(descriptors: impl IntoIterator<Item = QueueDescriptor>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut slots = Vec::new();
        for descriptor in descriptors {
            descriptor.validate()?;
            if !names.insert(descriptor.record_field.clone()) {
                return Err(TelemetryError::invalid_config(format!(
                    "record field '{}' is registered twice",
                    descriptor.record_field
                )));
            }
            let queue = PacketQueue::new(
                descriptor.record_field.clone(),
                descriptor.policy,
                descriptor.reset_scope,
            );
            debug!(
                packet = %descriptor.packet_id,
                field = %descriptor.record_field,
                policy = ?descriptor.policy,
                "Registered queue"
            );
            slots.push((descriptor, queue));
        }
        Ok(Self { slots })
    }

    /// Enqueue `packet` into every queue registered for its type id.
    pub fn route(&mut self, packet: RawPacket) -> RouteOutcome {
        let type_id = packet.type_id();
        let packet = Arc::new(packet);
        let mut matched = 0;
        let mut admitted = 0;

        for (descriptor, queue) in &mut self.slots {
            if descriptor.packet_id.as_u8() != type_id {
                continue;
            }
            matched += 1;
            if queue.enqueue(Arc::clone(&packet)) == Admission::Admitted {
                admitted += 1;
            }
        }

        if matched == 0 {
            trace!(type_id, frame = packet.frame_identifier(), "No queue for packet type");
            return RouteOutcome::Unrouted;
        }
        RouteOutcome::Delivered { matched, admitted }
    }

    /// Route a batch in order; returns the number of admissions.
    pub fn route_all(&mut self, packets: impl IntoIterator<Item = RawPacket>) -> usize {
        packets
            .into_iter()
            .map(|packet| match self.route(packet) {
                RouteOutcome::Delivered { admitted, .. } => admitted,
                RouteOutcome::Unrouted => 0,
            })
            .sum()
    }

    /// Dequeue everything pending, queue by queue, as `(slot, packet)` pairs.
    pub fn drain(&mut self) -> Vec<(usize, Arc<RawPacket>)> {
        let mut drained = Vec::new();
        for (slot, (_, queue)) in self.slots.iter_mut().enumerate() {
            while let Some(packet) = queue.dequeue() {
                drained.push((slot, packet));
            }
        }
        drained
    }

    /// Reset every queue.
    pub fn reset(&mut self) {
        for (_, queue) in &mut self.slots {
            queue.reset();
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &QueueDescriptor> {
        self.slots.iter().map(|(descriptor, _)| descriptor)
    }

    pub fn queues(&self) -> impl Iterator<Item = &PacketQueue> {
        self.slots.iter().map(|(_, queue)| queue)
    }

    /// Queue registered under `record_field`.
    pub fn queue(&self, record_field: &str) -> Option<&PacketQueue> {
        self.queues().find(|queue| queue.name() == record_field)
    }

    pub fn queue_mut(&mut self, record_field: &str) -> Option<&mut PacketQueue> {
        self.slots.iter_mut().map(|(_, queue)| queue).find(|queue| queue.name() == record_field)
    }

    /// Per-queue counters keyed by record field.
    pub fn stats(&self) -> Vec<(String, QueueStats)> {
        self.queues().map(|queue| (queue.name().to_string(), queue.stats())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PacketHeader;

    fn packet(id: PacketId, frame: u32) -> RawPacket {
        RawPacket::new(PacketHeader::new(id, frame, 0))
    }

    fn telemetry_and_status() -> PacketRouter {
        PacketRouter::new([
            QueueDescriptor::new(PacketId::CarTelemetry, "CarTelemetryData"),
            QueueDescriptor::new(PacketId::CarStatus, "CarStatusData"),
        ])
        .unwrap()
    }

    #[test]
    fn routes_only_to_matching_queue() {
        let mut router = telemetry_and_status();
        let outcome = router.route(packet(PacketId::CarTelemetry, 1));

        assert_eq!(outcome, RouteOutcome::Delivered { matched: 1, admitted: 1 });
        assert_eq!(router.queue("CarTelemetryData").unwrap().len(), 1);
        assert!(router.queue("CarStatusData").unwrap().is_empty());
    }

    #[test]
    fn unmatched_packets_are_ignored() {
        let mut router = telemetry_and_status();
        assert_eq!(router.route(packet(PacketId::Motion, 1)), RouteOutcome::Unrouted);

        let mut unknown = packet(PacketId::Motion, 2);
        unknown.header.packet_id = 42;
        assert_eq!(router.route(unknown), RouteOutcome::Unrouted);
        assert!(router.drain().is_empty());
    }

    #[test]
    fn several_queues_may_share_a_type() {
        let mut router = PacketRouter::new([
            QueueDescriptor::new(PacketId::CarTelemetry, "CarTelemetryData"),
            QueueDescriptor::new(PacketId::CarTelemetry, "Rival")
                .with_subject(SubjectSelector::Index(3)),
        ])
        .unwrap();

        let outcome = router.route(packet(PacketId::CarTelemetry, 9));
        assert_eq!(outcome, RouteOutcome::Delivered { matched: 2, admitted: 2 });

        let drained = router.drain();
        assert_eq!(drained.len(), 2);
        assert!(Arc::ptr_eq(&drained[0].1, &drained[1].1));
    }

    #[test]
    fn route_all_counts_admissions() {
        let mut router = telemetry_and_status();
        let admitted = router.route_all([
            packet(PacketId::CarTelemetry, 1),
            packet(PacketId::CarTelemetry, 1),
            packet(PacketId::CarStatus, 1),
            packet(PacketId::Event, 1),
        ]);
        assert_eq!(admitted, 2);
    }

    #[test]
    fn rejects_duplicate_record_fields() {
        let err = PacketRouter::new([
            QueueDescriptor::new(PacketId::CarTelemetry, "CarTelemetryData"),
            QueueDescriptor::new(PacketId::CarStatus, "CarTelemetryData"),
        ])
        .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_zero_history_cap() {
        let err = PacketRouter::new([
            QueueDescriptor::new(PacketId::CarTelemetry, "CarTelemetryData").with_history_cap(0)
        ])
        .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidConfig { .. }));
    }

    #[test]
    fn reset_clears_all_queues() {
        let mut router = telemetry_and_status();
        router.route(packet(PacketId::CarTelemetry, 1));
        router.route(packet(PacketId::CarStatus, 1));
        router.reset();
        assert!(router.queues().all(PacketQueue::is_empty));
    }

    #[test]
    fn subject_selection() {
        let mut header = PacketHeader::new(PacketId::CarTelemetry, 1, 4);
        header.secondary_player_car_index = 9;
        let packet = RawPacket::new(header);

        assert_eq!(SubjectSelector::Player.index_for(&packet), 4);
        assert_eq!(SubjectSelector::SecondaryPlayer.index_for(&packet), 9);
        assert_eq!(SubjectSelector::Index(2).index_for(&packet), 2);
    }
}
