//! Decoded telemetry packets as delivered by the live endpoint

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::PacketId;
use crate::{Result, TelemetryError};

/// Secondary player index reported when there is no split-screen player.
pub const NO_SECONDARY_PLAYER: u8 = 255;

fn no_secondary_player() -> u8 {
    NO_SECONDARY_PLAYER
}

/// Packet header fields needed to key and route a packet.
///
/// Only `PacketId`, `OverallFrameIdentifier` and `PlayerCarIndex` are
/// required; the rest are carried when the server includes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketHeader {
    #[serde(default)]
    pub packet_format: u16,
    #[serde(default)]
    pub game_year: u8,
    pub packet_id: u8,
    #[serde(default, rename = "SessionUID")]
    pub session_uid: u64,
    #[serde(default)]
    pub session_time: f32,
    /// Per-session frame counter, goes back after flashbacks
    #[serde(default)]
    pub frame_identifier: u32,
    /// Frame counter that never goes back; the deduplication key
    pub overall_frame_identifier: u32,
    pub player_car_index: u8,
    #[serde(default = "no_secondary_player")]
    pub secondary_player_car_index: u8,
}

impl PacketHeader {
    /// Minimal header for a packet of the given category.
    pub fn new(packet_id: PacketId, overall_frame_identifier: u32, player_car_index: u8) -> Self {
        Self {
            packet_format: 0,
            game_year: 0,
            packet_id: packet_id.as_u8(),
            session_uid: 0,
            session_time: 0.0,
            frame_identifier: overall_frame_identifier,
            overall_frame_identifier,
            player_car_index,
            secondary_player_car_index: NO_SECONDARY_PLAYER,
        }
    }
}

/// One packet from the telemetry source.
///
/// `body` maps a category name (for example `CarTelemetryData`) to the
/// per-car record array. Bodies may carry scalar fields next to the arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawPacket {
    pub header: PacketHeader,
    #[serde(default)]
    pub body: Map<String, Value>,
}

impl RawPacket {
    /// Create a packet with an empty body.
    pub fn new(header: PacketHeader) -> Self {
        Self { header, body: Map::new() }
    }

    /// Attach a per-subject record array under `field`.
    pub fn with_records(mut self, field: impl Into<String>, records: Vec<Value>) -> Self {
        self.body.insert(field.into(), Value::Array(records));
        self
    }

    /// Raw type identifier.
    pub fn type_id(&self) -> u8 {
        self.header.packet_id
    }

    /// Known packet category, if the id is one.
    pub fn packet_id(&self) -> Option<PacketId> {
        PacketId::try_from(self.header.packet_id).ok()
    }

    /// Deduplication key.
    pub fn frame_identifier(&self) -> u32 {
        self.header.overall_frame_identifier
    }

    /// Index of the player's own car.
    pub fn subject_index(&self) -> usize {
        self.header.player_car_index as usize
    }

    /// Records stored under `field`.
    pub fn records(&self, field: &str) -> Result<&[Value]> {
        match self.body.get(field) {
            Some(Value::Array(records)) => Ok(records),
            Some(other) => Err(TelemetryError::parse(
                format!("body field '{field}'"),
                format!("expected record array, found {}", json_kind(other)),
            )),
            None => Err(TelemetryError::FieldNotFound { field: field.to_string() }),
        }
    }

    /// The record of subject `index` under `field`.
    pub fn record(&self, field: &str, index: usize) -> Result<&Value> {
        let records = self.records(field)?;
        records.get(index).ok_or_else(|| TelemetryError::SubjectOutOfRange {
            field: field.to_string(),
            index,
            len: records.len(),
        })
    }

    /// Decode one packet from a JSON message.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| TelemetryError::parse("live packet", e))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Response of one pull from the live endpoint.
///
/// One field per packet category, each holding the packets the server still
/// buffers. Consecutive polls return overlapping windows. A category the server
/// has not filled yet may be `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveBatch {
    categories: BTreeMap<String, Option<Vec<RawPacket>>>,
}

impl LiveBatch {
    /// Number of packets across all categories.
    pub fn len(&self) -> usize {
        self.categories.values().flatten().map(Vec::len).sum()
    }

    /// Whether the batch holds no packets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packets of one category, in server order.
    pub fn category(&self, name: &str) -> &[RawPacket] {
        self.categories.get(name).and_then(Option::as_deref).unwrap_or_default()
    }

    /// Flatten into one packet list; order within a category is preserved.
    pub fn into_packets(self) -> Vec<RawPacket> {
        self.categories.into_values().flatten().flatten().collect()
    }
}

impl FromIterator<(String, Vec<RawPacket>)> for LiveBatch {
    fn from_iter<I: IntoIterator<Item = (String, Vec<RawPacket>)>>(iter: I) -> Self {
        Self { categories: iter.into_iter().map(|(name, packets)| (name, Some(packets))).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_server_packet() {
        let text = r#"{
            "Header": {
                "PacketFormat": 2023, "GameYear": 23, "PacketId": 6,
                "SessionUID": 1234, "SessionTime": 12.5, "FrameIdentifier": 40,
                "OverallFrameIdentifier": 41, "PlayerCarIndex": 1,
                "SecondaryPlayerCarIndex": 255
            },
            "Body": {
                "CarTelemetryData": [{"Speed": 100}, {"Speed": 280}],
                "MfdPanelIndex": 255
            }
        }"#;

        let packet = RawPacket::from_json(text).unwrap();
        assert_eq!(packet.packet_id(), Some(PacketId::CarTelemetry));
        assert_eq!(packet.frame_identifier(), 41);
        assert_eq!(packet.subject_index(), 1);
        assert_eq!(packet.header.session_uid, 1234);
        assert_eq!(packet.record("CarTelemetryData", 1).unwrap(), &json!({"Speed": 280}));
    }

    #[test]
    fn optional_header_fields_default() {
        let text = r#"{"Header": {"PacketId": 0, "OverallFrameIdentifier": 3, "PlayerCarIndex": 0}}"#;
        let packet = RawPacket::from_json(text).unwrap();
        assert_eq!(packet.header.secondary_player_car_index, NO_SECONDARY_PLAYER);
        assert!(packet.body.is_empty());
    }

    #[test]
    fn missing_header_is_a_parse_error() {
        let err = RawPacket::from_json(r#"{"Body": {}}"#).unwrap_err();
        assert!(matches!(err, TelemetryError::Parse { .. }));
    }

    #[test]
    fn record_lookup_failures() {
        let packet = RawPacket::new(PacketHeader::new(PacketId::CarStatus, 1, 5))
            .with_records("CarStatusData", vec![json!({}), json!({})]);

        assert!(matches!(
            packet.record("CarTelemetryData", 0),
            Err(TelemetryError::FieldNotFound { .. })
        ));
        assert!(matches!(
            packet.record("CarStatusData", 5),
            Err(TelemetryError::SubjectOutOfRange { index: 5, len: 2, .. })
        ));

        let mut scalar = packet.clone();
        scalar.body.insert("CarStatusData".into(), json!(3));
        assert!(matches!(scalar.records("CarStatusData"), Err(TelemetryError::Parse { .. })));
    }

    #[test]
    fn live_batch_tolerates_null_categories() {
        let text = r#"{
            "CarTelemetryDataPackets": [
                {"Header": {"PacketId": 6, "OverallFrameIdentifier": 1, "PlayerCarIndex": 0}},
                {"Header": {"PacketId": 6, "OverallFrameIdentifier": 2, "PlayerCarIndex": 0}}
            ],
            "CarMotionDataPackets": null
        }"#;
        let batch: LiveBatch = serde_json::from_str(text).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.category("CarMotionDataPackets").is_empty());

        let frames: Vec<u32> =
            batch.into_packets().iter().map(RawPacket::frame_identifier).collect();
        assert_eq!(frames, vec![1, 2]);
    }
}
