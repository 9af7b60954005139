//! Live racing telemetry ingestion for dashboards.
//!
//! Paddock pulls (HTTP polling) or receives (WebSocket push) packets from a
//! telemetry server, routes them by packet type into bounded deduplicating
//! queues, and assembles the records of the car a dashboard follows into
//! capped histories. Presentation code subscribes to immutable snapshots of
//! those histories.
//!
//! # Features
//!
//! - **Interchangeable transports**: polling, WebSocket push, and replay of
//!   recorded sessions behind one [`Transport`] trait
//! - **Frame deduplication**: overlapping poll windows are admitted once
//! - **Bounded memory**: capped seen-id sets and history buffers
//! - **Rate control**: snapshot streams throttled with latest-wins semantics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use paddock::{Paddock, UpdateRate, CarTelemetryData};
//! use paddock::config::Endpoint;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Paddock::stream(Endpoint::new("localhost").ws_url()?)?;
//!     let mut updates = pipeline.history_updates(UpdateRate::Max(30));
//!
//!     while let Some(snapshot) = updates.next().await {
//!         let telemetry = snapshot.records_as::<CarTelemetryData>("CarTelemetryData")?;
//!         if let Some(latest) = telemetry.last() {
//!             println!("Speed: {} km/h, gear {}", latest.speed, latest.gear_label());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Ingestion stages
pub mod assembler;
pub mod queue;
pub mod router;

// Runtime
pub mod driver;
pub mod pipeline;
pub mod stream;
pub mod transport;
pub mod transports;

// Core exports
pub use error::*;
pub use types::*;

pub use assembler::{FrameAssembler, HistoryBuffer, HistorySnapshot};
pub use config::{DrainCadence, PipelineConfig, ReconnectPolicy};
pub use pipeline::Pipeline;
pub use queue::{AdmissionPolicy, PacketQueue, ResetScope};
pub use router::{PacketRouter, QueueDescriptor, SubjectSelector};
pub use transport::{Transport, TransportMode};
pub use transports::{PacketRecorder, PollTransport, ReplayTransport, StreamTransport};

use config::{PollConfig, ReplayConfig, StreamConfig};
use url::Url;

/// Unified entry point for subscribed pipelines.
///
/// Each constructor builds a [`Pipeline`] with the queue layout suited to its
/// transport and starts ingesting immediately. Must be called from within a
/// Tokio runtime.
///
/// # Examples
///
/// ## Polling
/// ```rust,no_run
/// use paddock::Paddock;
/// use paddock::config::Endpoint;
///
/// #[tokio::main]
/// async fn main() -> paddock::Result<()> {
///     let pipeline = Paddock::poll(Endpoint::new("localhost").http_url()?)?;
///     // Use pipeline...
///     Ok(())
/// }
/// ```
///
/// ## Replay
/// ```rust,no_run
/// use paddock::Paddock;
///
/// #[tokio::main]
/// async fn main() -> paddock::Result<()> {
///     let pipeline = Paddock::replay("session.jsonl")?;
///     // Use pipeline...
///     Ok(())
/// }
/// ```
pub struct Paddock;

impl Paddock {
    /// Poll `url` at the default interval.
    ///
    /// Repeated polls return overlapping windows, so every queue
    /// deduplicates by frame identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn poll(url: Url) -> Result<Pipeline> {
        let transport = PollTransport::new(PollConfig::new(url))?;
        Self::subscribed(PipelineConfig::polling(), transport)
    }

    /// Subscribe to the WebSocket at `url`, reconnecting with backoff.
    ///
    /// The connection is opened by the ingest task, so an unreachable
    /// server shows up in the logs rather than as an error here.
    pub fn stream(url: Url) -> Result<Pipeline> {
        Self::subscribed(PipelineConfig::streaming(), StreamTransport::new(StreamConfig::new(url)))
    }

    /// Replay a JSON-lines recording at the default rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn replay<P: Into<std::path::PathBuf>>(path: P) -> Result<Pipeline> {
        let transport = ReplayTransport::new(ReplayConfig::new(path))?;
        Self::subscribed(PipelineConfig::streaming(), transport)
    }

    fn subscribed<T: Transport>(config: PipelineConfig, transport: T) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new(config)?;
        pipeline.subscribe(transport);
        Ok(pipeline)
    }
}
