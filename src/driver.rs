//! Driver spawns and manages the ingest and assemble tasks

use futures::StreamExt;
use futures::stream::select_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::assembler::{FrameAssembler, HistorySnapshot};
use crate::config::DrainCadence;
use crate::router::PacketRouter;
use crate::transport::Transport;

/// How long a cancelled transport gets to close cleanly.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Consecutive failures between repeated error logs.
const FAILURE_LOG_EVERY: u32 = 50;

/// Handles to the tasks of one subscription
pub struct DriverHandle {
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Ingest task; yields the number of batches read
    pub ingest: JoinHandle<u64>,
    /// Assemble task
    pub assemble: JoinHandle<()>,
}

/// Driver spawns and manages the pipeline's tasks
///
/// The ingest task owns the transport and routes every batch into the queues.
/// The assemble task drains the queues into the histories and publishes
/// snapshots. Neither holds a lock across an await point.
pub struct Driver;

impl Driver {
    /// Spawn ingest and assemble tasks for `transport`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<T>(
        transport: T,
        router: Arc<Mutex<PacketRouter>>,
        assembler: Arc<Mutex<FrameAssembler>>,
        snapshots: watch::Sender<Arc<HistorySnapshot>>,
        drain: DrainCadence,
    ) -> DriverHandle
    where
        T: Transport,
    {
        let cancel = CancellationToken::new();

        // Subscribe before ingest starts so no admission goes unannounced
        let admissions: Vec<_> = router.lock().queues().map(|queue| queue.subscribe()).collect();

        let assemble = tokio::spawn(Self::assemble_task(
            Arc::clone(&router),
            assembler,
            snapshots,
            drain,
            admissions,
            cancel.clone(),
        ));
        let ingest = tokio::spawn(Self::ingest_task(transport, router, cancel.clone()));

        DriverHandle { cancel, ingest, assemble }
    }

    /// Ingest task - reads batches and routes them into the queues
    async fn ingest_task<T>(
        mut transport: T,
        router: Arc<Mutex<PacketRouter>>,
        cancel: CancellationToken,
    ) -> u64
    where
        T: Transport,
    {
        let mode = transport.mode();
        info!(%mode, "Ingest task started");
        let mut batches = 0u64;
        let mut failures = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Ingest cancelled");
                    break;
                }
                result = transport.next_batch() => result,
            };

            match result {
                Ok(Some(batch)) => {
                    batches += 1;
                    if failures > 0 {
                        info!(failures, "Transport recovered");
                        failures = 0;
                    }
                    let received = batch.len();
                    let admitted = router.lock().route_all(batch);
                    trace!(batch = batches, received, admitted, "Routed batch");
                }
                Ok(None) => {
                    info!("Transport ended after {} batches", batches);
                    break;
                }
                Err(e) => {
                    failures += 1;
                    if failures == 1 {
                        warn!(%mode, "Transport error: {}", e);
                    } else if failures % FAILURE_LOG_EVERY == 0 {
                        error!(%mode, failures, "Transport still failing: {}", e);
                    } else {
                        debug!(failures, "Transport error: {}", e);
                    }
                }
            }
        }

        match tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await {
            Ok(Ok(())) => debug!("Transport closed"),
            Ok(Err(e)) => warn!("Transport close failed: {}", e),
            Err(_) => warn!("Transport close timed out after {:?}", CLOSE_TIMEOUT),
        }

        info!("Ingest task ended ({} batches)", batches);
        batches
    }

    /// Assemble task - drains the queues whenever the cadence fires
    async fn assemble_task(
        router: Arc<Mutex<PacketRouter>>,
        assembler: Arc<Mutex<FrameAssembler>>,
        snapshots: watch::Sender<Arc<HistorySnapshot>>,
        drain: DrainCadence,
        admissions: Vec<watch::Receiver<u64>>,
        cancel: CancellationToken,
    ) {
        debug!(?drain, "Assemble task started");

        match drain {
            DrainCadence::OnAdmission => {
                let mut wakeups = select_all(admissions.into_iter().map(WatchStream::from_changes));
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        wakeup = wakeups.next() => {
                            if wakeup.is_none() {
                                debug!("All queues dropped");
                                break;
                            }
                            assemble_pending(&router, &assembler, &snapshots);
                        }
                    }
                }
            }
            DrainCadence::Interval(period) => {
                let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            assemble_pending(&router, &assembler, &snapshots);
                        }
                    }
                }
            }
        }

        debug!("Assemble task ended");
    }
}

/// Drain every queue into the histories, publishing a snapshot when at least
/// one record was appended. Returns the number of records appended.
///
/// The router lock is held until the histories are updated so a concurrent
/// reset cannot interleave with a drain.
pub(crate) fn assemble_pending(
    router: &Mutex<PacketRouter>,
    assembler: &Mutex<FrameAssembler>,
    snapshots: &watch::Sender<Arc<HistorySnapshot>>,
) -> usize {
    let mut router = router.lock();
    let drained = router.drain();
    if drained.is_empty() {
        return 0;
    }

    let mut assembler = assembler.lock();
    let appended = assembler.assemble_all(drained);
    if appended > 0 {
        let snapshot = assembler.snapshot();
        trace!(version = snapshot.version(), appended, "Publishing snapshot");
        snapshots.send_replace(Arc::new(snapshot));
    }
    appended
}
