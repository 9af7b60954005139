//! Pipeline owning the router, queues and histories of one dashboard.

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::Result;
use crate::assembler::{FrameAssembler, HistorySnapshot};
use crate::config::{DrainCadence, PipelineConfig};
use crate::driver::{Driver, DriverHandle, assemble_pending};
use crate::queue::QueueStats;
use crate::router::{PacketRouter, QueueDescriptor, RouteOutcome};
use crate::stream::ThrottleExt;
use crate::transport::{Transport, TransportMode};
use crate::types::{RawPacket, UpdateRate};

#[cfg(test)]
mod tests;

/// Ingestion pipeline: transport → router → queues → assembler → snapshots.
///
/// A pipeline runs at most one transport at a time. Snapshot subscribers
/// may come and go at any time.
///
/// ```rust,no_run
/// use paddock::{Pipeline, PipelineConfig, PollTransport, UpdateRate};
/// use paddock::config::{Endpoint, PollConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> paddock::Result<()> {
/// let url = Endpoint::new("localhost").http_url()?;
/// let mut pipeline = Pipeline::new(PipelineConfig::polling())?;
/// pipeline.subscribe(PollTransport::new(PollConfig::new(url))?);
///
/// let mut updates = pipeline.history_updates(UpdateRate::Max(30));
/// while let Some(snapshot) = updates.next().await {
///     println!("{} telemetry records", snapshot.records("CarTelemetryData").len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    router: Arc<Mutex<PacketRouter>>,
    assembler: Arc<Mutex<FrameAssembler>>,
    snapshots: watch::Sender<Arc<HistorySnapshot>>,
    drain: DrainCadence,
    driver: Option<DriverHandle>,
    mode: Option<TransportMode>,
}

impl Pipeline {
    /// Build the queues and histories for `config`. Nothing runs until
    /// [`subscribe`](Self::subscribe).
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let router = PacketRouter::new(config.descriptors.clone())?;
        let mut assembler = FrameAssembler::new(&config.descriptors);
        let (snapshots, _) = watch::channel(Arc::new(assembler.snapshot()));

        info!(queues = config.descriptors.len(), drain = ?config.drain, "Pipeline created");

        Ok(Self {
            router: Arc::new(Mutex::new(router)),
            assembler: Arc::new(Mutex::new(assembler)),
            snapshots,
            drain: config.drain,
            driver: None,
            mode: None,
        })
    }

    /// Start ingesting from `transport`.
    ///
    /// Returns `false` and drops `transport` unstarted while another
    /// transport is running. After [`teardown`](Self::teardown) a new
    /// transport may be subscribed. Must be called from within a Tokio runtime.
    pub fn subscribe<T: Transport>(&mut self, transport: T) -> bool {
        if let Some(mode) = self.mode {
            debug!(%mode, "Already subscribed, ignoring transport");
            return false;
        }

        let mode = transport.mode();
        info!(%mode, "Subscribing to live data");
        self.driver = Some(Driver::spawn(
            transport,
            Arc::clone(&self.router),
            Arc::clone(&self.assembler),
            self.snapshots.clone(),
            self.drain,
        ));
        self.mode = Some(mode);
        true
    }

    /// Whether a transport is running.
    pub fn is_subscribed(&self) -> bool {
        self.driver.is_some()
    }

    /// Mode of the subscribed transport.
    pub fn transport_mode(&self) -> Option<TransportMode> {
        self.mode
    }

    /// Stop the ingest and assemble tasks. Safe to call repeatedly, or
    /// without ever subscribing. Queues and histories are kept.
    pub fn teardown(&mut self) {
        if let Some(driver) = self.driver.take() {
            info!("Tearing down pipeline");
            driver.cancel.cancel();
        }
        self.mode = None;
    }

    /// Empty every queue and history, then publish the empty snapshot.
    ///
    /// Whether queues also forget seen frame ids follows each descriptor's
    /// reset scope.
    pub fn reset(&self) {
        let mut router = self.router.lock();
        router.reset();
        let mut assembler = self.assembler.lock();
        assembler.clear();
        self.snapshots.send_replace(Arc::new(assembler.snapshot()));
        debug!("Pipeline reset");
    }

    /// Snapshot stream: yields the current snapshot immediately, then every
    /// publication. `UpdateRate::Max(hz)` emits at most `hz` times a second,
    /// latest wins.
    pub fn history_updates(
        &self,
        rate: UpdateRate,
    ) -> impl Stream<Item = Arc<HistorySnapshot>> + Send + 'static {
        let updates = WatchStream::new(self.snapshots.subscribe());
        match rate.throttle_interval() {
            None => updates.boxed(),
            Some(period) => updates.throttle(period).boxed(),
        }
    }

    /// Most recently published snapshot.
    pub fn current_history(&self) -> Arc<HistorySnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Route `packet` as if the transport had delivered it.
    pub fn route(&self, packet: RawPacket) -> RouteOutcome {
        self.router.lock().route(packet)
    }

    /// Assemble whatever is pending now instead of waiting for the
    /// drain cadence. Returns the number of records appended.
    pub fn flush(&self) -> usize {
        assemble_pending(&self.router, &self.assembler, &self.snapshots)
    }

    /// Per-queue counters keyed by record field.
    pub fn queue_stats(&self) -> Vec<(String, QueueStats)> {
        self.router.lock().stats()
    }

    pub fn descriptors(&self) -> Vec<QueueDescriptor> {
        self.router.lock().descriptors().cloned().collect()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        debug!("Dropping pipeline");
        self.teardown();
    }
}
