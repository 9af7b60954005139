//! Test utilities: packet builders and scripted transports
//!
//! Shared by the unit tests and the benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;

use crate::Result;
use crate::transport::{Transport, TransportMode};
use crate::types::{PacketHeader, PacketId, RawPacket};

/// Cars per packet, as sent by the game.
pub const CARS_PER_PACKET: usize = 22;

fn telemetry_record(speed: u16) -> Value {
    json!({
        "Speed": speed, "Throttle": 1.0, "Steer": 0.0, "Brake": 0.0,
        "Clutch": 0, "Gear": 6, "EngineRPM": 10500, "DRS": 0,
        "RevLightsPercent": 60, "RevLightsBitValue": 1023,
        "BrakesTemperature": [400, 400, 420, 420],
        "TyresSurfaceTemperature": [95, 95, 98, 98],
        "TyresInnerTemperature": [100, 100, 101, 101],
        "EngineTemperature": 110,
        "TyresPressure": [22.5, 22.5, 23.0, 23.0],
        "SurfaceType": [0, 0, 0, 0]
    })
}

/// Car telemetry packet where the player's car drives at `speed` and every
/// other car at zero.
pub fn telemetry_packet(frame: u32, player: u8, speed: u16) -> RawPacket {
    let records = (0..CARS_PER_PACKET)
        .map(|car| telemetry_record(if car == player as usize { speed } else { 0 }))
        .collect();
    RawPacket::new(PacketHeader::new(PacketId::CarTelemetry, frame, player))
        .with_records("CarTelemetryData", records)
}

/// Motion packet where the player's car is at `x` on the world X axis.
pub fn motion_packet(frame: u32, player: u8, x: f32) -> RawPacket {
    let records = (0..CARS_PER_PACKET)
        .map(|car| {
            let x = if car == player as usize { x } else { 0.0 };
            json!({ "WorldPositionX": x, "WorldPositionY": 0.0, "WorldPositionZ": 0.0 })
        })
        .collect();
    RawPacket::new(PacketHeader::new(PacketId::Motion, frame, player))
        .with_records("CarMotionData", records)
}

/// Write `lines` to a temporary JSON-lines recording.
#[cfg(test)]
pub fn write_recording(lines: &[String]) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().expect("create temp recording");
    for line in lines {
        writeln!(file, "{line}").expect("write temp recording");
    }
    file.flush().expect("flush temp recording");
    file
}

/// Transport yielding scripted batches, then end of stream.
pub struct VecTransport {
    batches: VecDeque<Result<Vec<RawPacket>>>,
}

impl VecTransport {
    pub fn new(batches: Vec<Vec<RawPacket>>) -> Self {
        Self::scripted(batches.into_iter().map(Ok).collect())
    }

    /// Batches and failures in the given order.
    pub fn scripted(batches: Vec<Result<Vec<RawPacket>>>) -> Self {
        Self { batches: batches.into() }
    }
}

#[async_trait]
impl Transport for VecTransport {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawPacket>>> {
        tokio::task::yield_now().await;
        self.batches.pop_front().transpose()
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Replay
    }
}
