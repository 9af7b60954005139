//! Replay transport for recorded sessions

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::config::ReplayConfig;
use crate::transport::{Transport, TransportMode};
use crate::types::RawPacket;
use crate::{Result, TelemetryError};

/// Plays back a JSON-lines recording, one packet per line, at a fixed rate.
///
/// Recordings are written by [`PacketRecorder`](super::PacketRecorder). Blank
/// lines are skipped; a line that is not a packet fails that cycle only and
/// playback continues with the next line.
pub struct ReplayTransport {
    path: PathBuf,
    /// Non-blank lines with their 1-based line numbers
    lines: Vec<(usize, String)>,
    position: usize,
    rate_hz: f64,
    speed: f64,
    interval: Option<Interval>,
}

impl ReplayTransport {
    pub fn new(config: ReplayConfig) -> Result<Self> {
        if !(config.rate_hz.is_finite() && config.rate_hz > 0.0) {
            return Err(TelemetryError::invalid_config(format!(
                "replay rate must be positive, got {}",
                config.rate_hz
            )));
        }

        let text = std::fs::read_to_string(&config.path)
            .map_err(|e| TelemetryError::file_error(config.path.clone(), e))?;
        let lines: Vec<(usize, String)> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| (index + 1, line.to_string()))
            .collect();

        info!(
            "Opened recording {}: {} packets at {}Hz",
            config.path.display(),
            lines.len(),
            config.rate_hz
        );

        Ok(Self {
            path: config.path,
            lines,
            position: 0,
            rate_hz: config.rate_hz,
            speed: config.speed.clamp(0.1, 10.0),
            interval: None,
        })
    }

    /// Open `path` at the default rate.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(ReplayConfig::new(path.as_ref()))
    }

    /// Set playback speed, clamped to 0.1x..10x.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
        self.interval = None;
        debug!("Playback speed set to {}x", self.speed);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_packets(&self) -> usize {
        self.lines.len()
    }

    /// Packets handed out so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// File line number of the next packet, `None` at end of recording.
    pub fn current_line(&self) -> Option<usize> {
        self.lines.get(self.position).map(|(line_number, _)| *line_number)
    }

    /// Playback time in seconds at normal speed.
    pub fn current_time(&self) -> f64 {
        self.position as f64 / self.rate_hz
    }

    /// Length of the recording in seconds at normal speed.
    pub fn duration(&self) -> f64 {
        self.lines.len() as f64 / self.rate_hz
    }

    /// Start over from the first packet.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Never shorter than 1ms, whatever the rate.
    fn frame_interval(&self) -> Duration {
        let seconds = 1.0 / (self.rate_hz * self.speed);
        Duration::try_from_secs_f64(seconds)
            .unwrap_or(Duration::ZERO)
            .max(Duration::from_millis(1))
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawPacket>>> {
        if self.position >= self.lines.len() {
            debug!("Reached end of recording");
            return Ok(None);
        }

        let period = self.frame_interval();
        let timer = self.interval.get_or_insert_with(|| {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        timer.tick().await;

        let (line_number, line) = &self.lines[self.position];
        self.position += 1;

        let packet: RawPacket = serde_json::from_str(line)
            .map_err(|e| TelemetryError::parse(format!("recording line {line_number}"), e))?;

        trace!(
            "Packet {}/{}: frame={}",
            self.position,
            self.lines.len(),
            packet.frame_identifier()
        );
        Ok(Some(vec![packet]))
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Replay
    }
}
