//! Pipeline and transport configuration.
//!
//! Everything here derives `serde` so a host application can load it from
//! whatever configuration format it already uses. The crate itself reads no
//! configuration files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::queue::AdmissionPolicy;
use crate::router::QueueDescriptor;
use crate::types::{CAR_MOTION_FIELD, CAR_TELEMETRY_FIELD, PacketId};
use crate::{Result, TelemetryError};

/// Seen frame identifiers remembered per deduplicating queue.
pub const MAX_SAVED_FRAME_NUMBERS: usize = 64;

/// Default history length.
pub const PACKET_BACKUP_COUNT: usize = 500;

/// Period of the pull transport.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Period of interval-driven draining.
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(8);

/// Port of the telemetry server's API.
pub const API_SERVER_PORT: u16 = 8000;

/// Path of the live endpoint, for both pull and push.
pub const LIVE_PATH: &str = "/api/live";

/// When the assembler drains the queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainCadence {
    /// As soon as a queue announces an admission
    #[default]
    OnAdmission,
    /// On a fixed tick
    Interval(Duration),
}

/// Queue layout and drain behaviour of a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub descriptors: Vec<QueueDescriptor>,
    #[serde(default)]
    pub drain: DrainCadence,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::polling()
    }
}

impl PipelineConfig {
    /// Queues for the dashboard's categories under one admission policy.
    pub fn with_policy(policy: AdmissionPolicy) -> Self {
        Self {
            descriptors: vec![
                QueueDescriptor::new(PacketId::CarTelemetry, CAR_TELEMETRY_FIELD).with_policy(policy),
                QueueDescriptor::new(PacketId::Motion, CAR_MOTION_FIELD).with_policy(policy),
            ],
            drain: DrainCadence::default(),
        }
    }

    /// Layout for the pull transport: polls return overlapping windows.
    pub fn polling() -> Self {
        Self::with_policy(AdmissionPolicy::DedupByFrameId)
    }

    /// Layout for the push transport: each frame arrives once.
    pub fn streaming() -> Self {
        Self::with_policy(AdmissionPolicy::AlwaysAdmit)
    }

    /// Replace the queue layout.
    pub fn with_descriptors(mut self, descriptors: Vec<QueueDescriptor>) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn with_drain(mut self, drain: DrainCadence) -> Self {
        self.drain = drain;
        self
    }

    /// Apply one history cap to every queue.
    pub fn with_history_cap(mut self, cap: usize) -> Self {
        for descriptor in &mut self.descriptors {
            descriptor.history_cap = cap;
        }
        self
    }
}

/// Location of the telemetry server's live endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Endpoint on the default API port.
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), port: API_SERVER_PORT }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `http://host:port/api/live`
    pub fn http_url(&self) -> Result<Url> {
        self.url("http")
    }

    /// `ws://host:port/api/live`
    pub fn ws_url(&self) -> Result<Url> {
        self.url("ws")
    }

    fn url(&self, scheme: &str) -> Result<Url> {
        let raw = format!("{scheme}://{}:{}{LIVE_PATH}", self.host, self.port);
        Url::parse(&raw).map_err(|e| TelemetryError::invalid_config(format!("{raw}: {e}")))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost")
    }
}

/// Pull transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    pub url: Url,
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl PollConfig {
    pub fn new(url: Url) -> Self {
        Self { url, interval: POLL_INTERVAL, request_timeout: Duration::from_secs(2) }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Reconnect behaviour of the push transport.
///
/// Delays double from `initial_delay` up to `max_delay`. `max_attempts` counts
/// consecutive failed reconnects; `None` retries forever and `Some(0)` never
/// reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// A dead connection stays dead.
    pub fn never() -> Self {
        Self { max_attempts: Some(0), ..Self::default() }
    }

    /// Whether reconnect attempt number `attempt` (1-based) is allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1 << shift).min(self.max_delay)
    }
}

/// Push transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub url: Url,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl StreamConfig {
    pub fn new(url: Url) -> Self {
        Self { url, reconnect: ReconnectPolicy::default() }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Replay transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub path: PathBuf,
    /// Packets per second at speed 1.0
    pub rate_hz: f64,
    pub speed: f64,
}

impl ReplayConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), rate_hz: 60.0, speed: 1.0 }
    }

    pub fn with_rate(mut self, rate_hz: f64) -> Self {
        self.rate_hz = rate_hz;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}
