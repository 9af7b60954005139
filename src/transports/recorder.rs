//! Recording of live packets for later replay

use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::transport::{Transport, TransportMode};
use crate::types::RawPacket;
use crate::{Result, TelemetryError};

/// Appends packets to a JSON-lines file readable by
/// [`ReplayTransport`](super::ReplayTransport).
pub struct PacketRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl PacketRecorder {
    /// Create (or truncate) the recording at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| TelemetryError::file_error(path.clone(), e))?;
        info!("Recording packets to {}", path.display());
        Ok(Self { path, writer: BufWriter::new(file), written: 0 })
    }

    pub fn record(&mut self, packet: &RawPacket) -> Result<()> {
        serde_json::to_writer(&mut self.writer, packet)
            .map_err(|e| TelemetryError::parse("recorded packet", e))?;
        self.writer.write_all(b"\n").map_err(|e| self.file_error(e))?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| self.file_error(e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Packets written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Record everything `transport` yields.
    pub fn wrap<T: Transport>(self, transport: T) -> Recording<T> {
        Recording { inner: transport, recorder: self }
    }

    fn file_error(&self, source: std::io::Error) -> TelemetryError {
        TelemetryError::file_error(self.path.clone(), source)
    }
}

/// A transport whose batches are also written to a [`PacketRecorder`].
///
/// Recording failures are logged and never fail the batch.
pub struct Recording<T> {
    inner: T,
    recorder: PacketRecorder,
}

impl<T> Recording<T> {
    pub fn recorder(&self) -> &PacketRecorder {
        &self.recorder
    }

    pub fn into_parts(self) -> (T, PacketRecorder) {
        (self.inner, self.recorder)
    }
}

#[async_trait]
impl<T: Transport> Transport for Recording<T> {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawPacket>>> {
        let batch = self.inner.next_batch().await?;
        if let Some(packets) = &batch {
            for packet in packets {
                if let Err(e) = self.recorder.record(packet) {
                    warn!("Failed to record packet: {}", e);
                }
            }
        }
        Ok(batch)
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.recorder.flush() {
            warn!("Failed to flush recording: {}", e);
        }
        info!("Recorded {} packets to {}", self.recorder.written(), self.recorder.path().display());
        self.inner.close().await
    }

    fn mode(&self) -> TransportMode {
        self.inner.mode()
    }
}
