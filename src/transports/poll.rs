//! Pull transport: periodic GET of the live endpoint

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::config::PollConfig;
use crate::transport::{Transport, TransportMode};
use crate::types::{LiveBatch, RawPacket};
use crate::{Result, TelemetryError};

/// Polls the live endpoint on a fixed timer.
///
/// Every response carries the server's whole packet buffer, so consecutive
/// batches overlap; pair this transport with deduplicating queues.
pub struct PollTransport {
    client: reqwest::Client,
    config: PollConfig,
    /// Created on first use so construction does not need a runtime
    interval: Option<Interval>,
    polls: u64,
}

impl PollTransport {
    pub fn new(config: PollConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        debug!(url = %config.url, interval = ?config.interval, "Created poll transport");
        Ok(Self { client, config, interval: None, polls: 0 })
    }

    /// Issue one request without waiting for the timer.
    pub async fn poll_once(&mut self) -> Result<LiveBatch> {
        self.polls += 1;
        let url = self.config.url.clone();

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                TelemetryError::Timeout { duration: self.config.request_timeout }
            } else {
                TelemetryError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Http { url: url.to_string(), status: status.as_u16() });
        }

        let body = response.bytes().await?;
        let batch: LiveBatch = serde_json::from_slice(&body)
            .map_err(|e| TelemetryError::parse("live response body", e))?;

        trace!(poll = self.polls, packets = batch.len(), "Polled live endpoint");
        Ok(batch)
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Requests issued so far.
    pub fn polls(&self) -> u64 {
        self.polls
    }
}

#[async_trait]
impl Transport for PollTransport {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawPacket>>> {
        let period = self.config.interval.max(Duration::from_millis(1));
        let timer = self.interval.get_or_insert_with(|| {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        timer.tick().await;

        let batch = self.poll_once().await?;
        Ok(Some(batch.into_packets()))
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Poll
    }
}
