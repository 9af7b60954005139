//! Projection of queued packets into per-subject histories.
//!
//! For every drained packet the [`FrameAssembler`] picks the record of the
//! tracked car out of `Body[record_field]` and appends it to that queue's
//! [`HistoryBuffer`]. Presentation never touches the buffers; it reads
//! immutable [`HistorySnapshot`]s instead.

mod history;

pub use history::HistoryBuffer;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::router::{QueueDescriptor, SubjectSelector};
use crate::types::{PacketId, RawPacket};
use crate::{Result, TelemetryError};

/// Immutable copy of one history.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub name: String,
    pub packet_id: PacketId,
    pub records: Arc<[Value]>,
}

/// Immutable copy of every history, as handed to presentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    version: u64,
    histories: Vec<History>,
}

impl HistorySnapshot {
    /// Increases with every published snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn histories(&self) -> &[History] {
        &self.histories
    }

    pub fn get(&self, name: &str) -> Option<&History> {
        self.histories.iter().find(|history| history.name == name)
    }

    /// Records of history `name`, oldest first; empty when unknown.
    pub fn records(&self, name: &str) -> &[Value] {
        self.get(name).map(|history| &history.records[..]).unwrap_or_default()
    }

    /// Most recent record of history `name`.
    pub fn latest(&self, name: &str) -> Option<&Value> {
        self.records(name).last()
    }

    /// Decode history `name` into typed records.
    pub fn records_as<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        self.records(name)
            .iter()
            .map(|record| {
                T::deserialize(record).map_err(|e| TelemetryError::parse(format!("'{name}' record"), e))
            })
            .collect()
    }

    /// Total records across all histories.
    pub fn total_records(&self) -> usize {
        self.histories.iter().map(|history| history.records.len()).sum()
    }
}

/// Counters for the assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub appended: u64,
    pub dropped: u64,
}

#[derive(Debug)]
struct Slot {
    name: String,
    packet_id: PacketId,
    subject: SubjectSelector,
    history: HistoryBuffer<Value>,
}

/// Owns one history per queue descriptor; the only writer of histories.
#[derive(Debug)]
pub struct FrameAssembler {
    slots: Vec<Slot>,
    version: u64,
    stats: AssemblerStats,
}

impl FrameAssembler {
    /// One history per descriptor, in descriptor order.
    pub fn new<'a>(descriptors: impl IntoIterator<Item = &'a QueueDescriptor>) -> Self {
        let slots = descriptors
            .into_iter()
            .map(|descriptor| Slot {
                name: descriptor.record_field.clone(),
                packet_id: descriptor.packet_id,
                subject: descriptor.subject,
                history: HistoryBuffer::new(descriptor.history_cap),
            })
            .collect();
        Self { slots, version: 0, stats: AssemblerStats::default() }
    }

    /// Append the subject's record of `packet` to the history of `slot`.
    pub fn assemble(&mut self, slot: usize, packet: &RawPacket) -> Result<()> {
        let slot = self.slots.get_mut(slot).ok_or_else(|| {
            TelemetryError::invalid_config(format!("no history registered for slot {slot}"))
        })?;
        let index = slot.subject.index_for(packet);
        let record = packet.record(&slot.name, index)?;
        slot.history.push(record.clone());
        self.stats.appended += 1;
        Ok(())
    }

    /// Assemble a drained batch, dropping and logging frames that fail.
    ///
    /// Returns the number of records appended.
    pub fn assemble_all(
        &mut self,
        drained: impl IntoIterator<Item = (usize, Arc<RawPacket>)>,
    ) -> usize {
        let mut appended = 0;
        for (slot, packet) in drained {
            match self.assemble(slot, &packet) {
                Ok(()) => appended += 1,
                Err(e) => {
                    self.stats.dropped += 1;
                    warn!(
                        frame = packet.frame_identifier(),
                        type_id = packet.type_id(),
                        "Dropping frame: {}",
                        e
                    );
                }
            }
        }
        if appended > 0 {
            trace!(appended, "Assembled records");
        }
        appended
    }

    /// Copy the current histories into a new snapshot with the next version.
    pub fn snapshot(&mut self) -> HistorySnapshot {
        self.version += 1;
        HistorySnapshot {
            version: self.version,
            histories: self
                .slots
                .iter()
                .map(|slot| History {
                    name: slot.name.clone(),
                    packet_id: slot.packet_id,
                    records: slot.history.iter().cloned().collect(),
                })
                .collect(),
        }
    }

    /// Live history `name`.
    pub fn history(&self, name: &str) -> Option<&HistoryBuffer<Value>> {
        self.slots.iter().find(|slot| slot.name == name).map(|slot| &slot.history)
    }

    /// Empty every history.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.history.clear();
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }
}
