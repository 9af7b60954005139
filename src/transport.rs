//! Transport trait for packet sources

use std::fmt;

use crate::Result;
use crate::types::RawPacket;

/// Which kind of source a transport reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Periodic request/response pull
    Poll,
    /// Persistent push connection
    Stream,
    /// Recorded dataset
    Replay,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportMode::Poll => "poll",
            TransportMode::Stream => "stream",
            TransportMode::Replay => "replay",
        })
    }
}

/// Source of telemetry packets.
///
/// Transports pace themselves (poll timer, socket reads, replay clock) so the
/// driver can simply call [`next_batch`](Transport::next_batch) in a loop.
/// Nothing is opened before the first call.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Wait for the next packets.
    ///
    /// Returns:
    /// - `Ok(Some(batch))` - packets received this cycle (possibly none)
    /// - `Ok(None)` - the source is finished for good
    /// - `Err(e)` - this cycle failed; the next call retries
    async fn next_batch(&mut self) -> Result<Option<Vec<RawPacket>>>;

    /// Release the underlying connection. Called once when the pipeline is
    /// torn down; the default does nothing.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn mode(&self) -> TransportMode;
}
