//! Typed per-car records for the categories the dashboard renders.
//!
//! Field names follow the JSON the telemetry server emits, so these can be
//! decoded straight out of a [`HistorySnapshot`](crate::HistorySnapshot) with
//! `records_as`.

use serde::{Deserialize, Serialize};

/// Wheel order used by every four-element array: RL, RR, FL, FR.
pub type WheelArray<T> = [T; 4];

/// Body field holding per-car telemetry records.
pub const CAR_TELEMETRY_FIELD: &str = "CarTelemetryData";

/// Body field holding per-car motion records.
pub const CAR_MOTION_FIELD: &str = "CarMotionData";

/// Per-car telemetry (packet id 6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "PascalCase")]
pub struct CarTelemetryData {
    /// km/h
    pub speed: u16,
    /// 0.0 to 1.0
    pub throttle: f32,
    /// -1.0 (full lock left) to 1.0 (full lock right)
    pub steer: f32,
    /// 0.0 to 1.0
    pub brake: f32,
    /// 0 to 100
    pub clutch: u8,
    /// 1-8, N=0, R=-1
    pub gear: i8,
    #[serde(rename = "EngineRPM")]
    pub engine_rpm: u16,
    #[serde(rename = "DRS")]
    pub drs: u8,
    pub rev_lights_percent: u8,
    pub rev_lights_bit_value: u16,
    /// Celsius
    pub brakes_temperature: WheelArray<u16>,
    /// Celsius
    pub tyres_surface_temperature: WheelArray<u8>,
    /// Celsius
    pub tyres_inner_temperature: WheelArray<u8>,
    /// Celsius
    pub engine_temperature: u16,
    /// PSI
    pub tyres_pressure: WheelArray<f32>,
    pub surface_type: WheelArray<u8>,
}

impl CarTelemetryData {
    pub fn drs_open(&self) -> bool {
        self.drs == 1
    }

    /// Gear as shown on a steering wheel display.
    pub fn gear_label(&self) -> String {
        match self.gear {
            -1 => "R".to_string(),
            0 => "N".to_string(),
            g => g.to_string(),
        }
    }
}

/// Per-car motion (packet id 0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "PascalCase")]
pub struct CarMotionData {
    pub world_position_x: f32,
    pub world_position_y: f32,
    pub world_position_z: f32,
    pub world_velocity_x: f32,
    pub world_velocity_y: f32,
    pub world_velocity_z: f32,
    pub world_forward_dir_x: i16,
    pub world_forward_dir_y: i16,
    pub world_forward_dir_z: i16,
    pub world_right_dir_x: i16,
    pub world_right_dir_y: i16,
    pub world_right_dir_z: i16,
    pub g_force_lateral: f32,
    pub g_force_longitudinal: f32,
    pub g_force_vertical: f32,
    /// Radians
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl CarMotionData {
    /// World-space speed in m/s.
    pub fn speed(&self) -> f32 {
        let (x, y, z) = (self.world_velocity_x, self.world_velocity_y, self.world_velocity_z);
        (x * x + y * y + z * z).sqrt()
    }
}
