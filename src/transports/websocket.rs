//! Push transport: one persistent WebSocket connection

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::transport::{Transport, TransportMode};
use crate::types::RawPacket;
use crate::{Result, TelemetryError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives one JSON packet per WebSocket message.
///
/// The connection is opened on the first [`next_batch`](Transport::next_batch)
/// call. When it closes or fails, the [`ReconnectPolicy`](crate::ReconnectPolicy)
/// decides whether and when to dial again; once the policy gives up the
/// transport reports end of stream.
pub struct StreamTransport {
    config: StreamConfig,
    socket: Option<Socket>,
    /// Consecutive failed connects or dropped connections; reset by the
    /// first message on a connection
    failures: u32,
    connections: u64,
}

impl StreamTransport {
    pub fn new(config: StreamConfig) -> Self {
        Self { config, socket: None, failures: 0, connections: 0 }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Connections opened so far.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn connect(&mut self) -> Result<Option<()>> {
        if self.failures > 0 {
            let attempt = self.failures;
            if !self.config.reconnect.allows(attempt) {
                info!(url = %self.config.url, "Live connection is dead, not reconnecting");
                return Ok(None);
            }
            let delay = self.config.reconnect.delay_for(attempt);
            debug!(attempt, ?delay, "Reconnecting to live endpoint");
            tokio::time::sleep(delay).await;
        }

        match connect_async(self.config.url.as_str()).await {
            Ok((socket, _)) => {
                self.connections += 1;
                info!(url = %self.config.url, "Live data subscription successful");
                self.socket = Some(socket);
                Ok(Some(()))
            }
            Err(e) => {
                self.failures += 1;
                Err(TelemetryError::connection_failed_with_source(
                    format!("could not connect to {}", self.config.url),
                    Box::new(e),
                ))
            }
        }
    }

    fn decode(bytes: &[u8]) -> Result<Option<Vec<RawPacket>>> {
        let packet: RawPacket = serde_json::from_slice(bytes)
            .map_err(|e| TelemetryError::parse("live message", e))?;
        trace!(frame = packet.frame_identifier(), type_id = packet.type_id(), "Received packet");
        Ok(Some(vec![packet]))
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawPacket>>> {
        loop {
            let Some(socket) = self.socket.as_mut() else {
                if self.connect().await?.is_none() {
                    return Ok(None);
                }
                continue;
            };

            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.failures = 0;
                    return Self::decode(text.as_bytes());
                }
                Some(Ok(Message::Binary(bytes))) => {
                    self.failures = 0;
                    return Self::decode(&bytes);
                }
                Some(Ok(Message::Close(frame))) => {
                    match frame {
                        Some(frame) => info!(
                            code = %frame.code,
                            reason = %frame.reason,
                            "Live connection closed by server"
                        ),
                        None => info!("Live connection closed by server"),
                    }
                    self.socket = None;
                    self.failures += 1;
                }
                // Pings are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Live connection error: {}", e);
                    self.socket = None;
                    self.failures += 1;
                    return Err(e.into());
                }
                None => {
                    info!("Live connection ended");
                    self.socket = None;
                    self.failures += 1;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut socket) = self.socket.take() {
            debug!("Closing live connection");
            socket.close(None).await?;
            // Drain until the server acknowledges the close
            while let Some(Ok(_)) = socket.next().await {}
        }
        Ok(())
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Stream
    }
}
