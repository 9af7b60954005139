//! Core data types flowing through the ingestion pipeline.
//!
//! - [`RawPacket`] is one decoded packet: a [`PacketHeader`] used for routing
//!   and deduplication plus a body of per-car record arrays
//! - [`LiveBatch`] is the response of one pull from the live endpoint
//! - [`PacketId`] names the packet categories
//! - [`CarTelemetryData`] and [`CarMotionData`] are typed views of the records
//!   the dashboard renders
//! - [`UpdateRate`] controls how often snapshot subscribers are woken
//!
//! ## Usage Example
//!
//! ```rust
//! use paddock::types::{PacketHeader, PacketId, RawPacket};
//! use serde_json::json;
//!
//! let packet = RawPacket::new(PacketHeader::new(PacketId::CarTelemetry, 1042, 0))
//!     .with_records("CarTelemetryData", vec![json!({ "Speed": 301 })]);
//!
//! let mine = packet.record("CarTelemetryData", packet.subject_index()).unwrap();
//! assert_eq!(mine["Speed"], 301);
//! ```

mod packet;
mod packet_id;
mod records;
mod update_rate;

pub use packet::{LiveBatch, NO_SECONDARY_PLAYER, PacketHeader, RawPacket};
pub use packet_id::PacketId;
pub use records::{
    CAR_MOTION_FIELD, CAR_TELEMETRY_FIELD, CarMotionData, CarTelemetryData, WheelArray,
};
pub use update_rate::UpdateRate;
