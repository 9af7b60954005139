//! Packet category identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a telemetry packet, taken from `Header.PacketId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum PacketId {
    Motion = 0,
    Session = 1,
    LapData = 2,
    Event = 3,
    Participants = 4,
    CarSetups = 5,
    CarTelemetry = 6,
    CarStatus = 7,
    FinalClassification = 8,
    LobbyInfo = 9,
    CarDamage = 10,
    SessionHistory = 11,
    TyreSets = 12,
    MotionEx = 13,
}

impl PacketId {
    /// Every known packet category in id order.
    pub const ALL: [PacketId; 14] = [
        PacketId::Motion,
        PacketId::Session,
        PacketId::LapData,
        PacketId::Event,
        PacketId::Participants,
        PacketId::CarSetups,
        PacketId::CarTelemetry,
        PacketId::CarStatus,
        PacketId::FinalClassification,
        PacketId::LobbyInfo,
        PacketId::CarDamage,
        PacketId::SessionHistory,
        PacketId::TyreSets,
        PacketId::MotionEx,
    ];

    /// Raw wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human readable category name.
    pub fn name(self) -> &'static str {
        match self {
            PacketId::Motion => "Motion",
            PacketId::Session => "Session",
            PacketId::LapData => "LapData",
            PacketId::Event => "Event",
            PacketId::Participants => "Participants",
            PacketId::CarSetups => "CarSetups",
            PacketId::CarTelemetry => "CarTelemetry",
            PacketId::CarStatus => "CarStatus",
            PacketId::FinalClassification => "FinalClassification",
            PacketId::LobbyInfo => "LobbyInfo",
            PacketId::CarDamage => "CarDamage",
            PacketId::SessionHistory => "SessionHistory",
            PacketId::TyreSets => "TyreSets",
            PacketId::MotionEx => "MotionEx",
        }
    }
}

impl TryFrom<u8> for PacketId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PacketId::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("unknown packet id {value}"))
    }
}

impl From<PacketId> for u8 {
    fn from(id: PacketId) -> Self {
        id.as_u8()
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
