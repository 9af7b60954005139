//! End-to-end tests for the pipeline
//!
//! These run scripted transports through the real driver tasks and observe
//! the published snapshots.

use super::*;
use crate::config::PACKET_BACKUP_COUNT;
use crate::queue::{AdmissionPolicy, ResetScope};
use crate::test_utils::{VecTransport, motion_packet, telemetry_packet};
use crate::types::{CarTelemetryData, PacketId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

async fn next_with(
    updates: &mut (impl Stream<Item = Arc<HistorySnapshot>> + Unpin),
    predicate: impl Fn(&HistorySnapshot) -> bool,
) -> Arc<HistorySnapshot> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = updates.next().await.expect("pipeline alive");
            if predicate(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("snapshot within timeout")
}

#[tokio::test]
async fn overlapping_polls_build_deduplicated_history() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut pipeline = Pipeline::new(PipelineConfig::polling()).expect("valid config");
    let mut updates = pipeline.history_updates(UpdateRate::Native);

    // Second poll repeats frames 2 and 3 from the first window
    let transport = VecTransport::new(vec![
        vec![telemetry_packet(1, 0, 100), telemetry_packet(2, 0, 110), telemetry_packet(3, 0, 120)],
        vec![telemetry_packet(2, 0, 110), telemetry_packet(3, 0, 120), telemetry_packet(4, 0, 130)],
    ]);
    assert!(pipeline.subscribe(transport));

    let snapshot = next_with(&mut updates, |s| s.records("CarTelemetryData").len() == 4).await;
    let speeds: Vec<u16> = snapshot
        .records_as::<CarTelemetryData>("CarTelemetryData")
        .expect("telemetry records")
        .iter()
        .map(|record| record.speed)
        .collect();
    assert_eq!(speeds, vec![100, 110, 120, 130]);

    let stats = pipeline.queue_stats();
    assert_eq!(stats[0].0, "CarTelemetryData");
    assert_eq!(stats[0].1.admitted, 4);
    assert_eq!(stats[0].1.duplicates_dropped, 2);
}

#[tokio::test]
async fn records_follow_the_player_car() {
    let mut pipeline = Pipeline::new(PipelineConfig::streaming()).expect("valid config");
    let mut updates = pipeline.history_updates(UpdateRate::Native);

    pipeline.subscribe(VecTransport::new(vec![vec![
        telemetry_packet(1, 3, 211),
        motion_packet(1, 3, 42.0),
    ]]));

    let snapshot = next_with(&mut updates, |s| s.total_records() == 2).await;
    let telemetry = snapshot.latest("CarTelemetryData").expect("telemetry record");
    assert_eq!(telemetry["Speed"], 211);
    let motion = snapshot.latest("CarMotionData").expect("motion record");
    assert_eq!(motion["WorldPositionX"], 42.0);
}

struct CountingTransport {
    started: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for CountingTransport {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawPacket>>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Stream
    }
}

#[tokio::test]
async fn second_subscribe_is_ignored() {
    let started = Arc::new(AtomicUsize::new(0));
    let mut pipeline = Pipeline::new(PipelineConfig::streaming()).expect("valid config");

    assert!(pipeline.subscribe(CountingTransport { started: Arc::clone(&started) }));
    assert!(!pipeline.subscribe(CountingTransport { started: Arc::clone(&started) }));
    assert!(pipeline.is_subscribed());
    assert_eq!(pipeline.transport_mode(), Some(TransportMode::Stream));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);

    pipeline.teardown();
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let mut idle = Pipeline::new(PipelineConfig::default()).expect("valid config");
    idle.teardown();
    idle.teardown();
    assert!(!idle.is_subscribed());

    let started = Arc::new(AtomicUsize::new(0));
    let mut running = Pipeline::new(PipelineConfig::default()).expect("valid config");
    running.subscribe(CountingTransport { started });
    running.teardown();
    running.teardown();
    assert!(!running.is_subscribed());
    assert_eq!(running.transport_mode(), None);
}

#[tokio::test]
async fn subscribe_again_after_teardown() {
    let started = Arc::new(AtomicUsize::new(0));
    let mut pipeline = Pipeline::new(PipelineConfig::streaming()).expect("valid config");
    let mut updates = pipeline.history_updates(UpdateRate::Native);

    assert!(pipeline.subscribe(CountingTransport { started: Arc::clone(&started) }));
    pipeline.teardown();

    assert!(pipeline.subscribe(VecTransport::new(vec![vec![telemetry_packet(1, 0, 180)]])));
    assert!(pipeline.is_subscribed());
    assert_eq!(pipeline.transport_mode(), Some(TransportMode::Replay));

    let snapshot = next_with(&mut updates, |s| s.records("CarTelemetryData").len() == 1).await;
    assert_eq!(snapshot.latest("CarTelemetryData").expect("telemetry record")["Speed"], 180);
    assert_eq!(started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reset_publishes_empty_histories() {
    let config = PipelineConfig::polling().with_descriptors(vec![
        QueueDescriptor::new(PacketId::CarTelemetry, "CarTelemetryData")
            .with_reset_scope(ResetScope::PendingAndSeen),
    ]);
    let pipeline = Pipeline::new(config).expect("valid config");

    pipeline.route(telemetry_packet(1, 0, 50));
    pipeline.route(telemetry_packet(2, 0, 60));
    assert_eq!(pipeline.flush(), 2);
    assert_eq!(pipeline.current_history().records("CarTelemetryData").len(), 2);

    let before = pipeline.current_history().version();
    pipeline.reset();
    let after = pipeline.current_history();
    assert!(after.version() > before);
    assert_eq!(after.total_records(), 0);

    // Seen ids were forgotten, so frame 1 is admitted again
    pipeline.route(telemetry_packet(1, 0, 55));
    assert_eq!(pipeline.flush(), 1);
}

#[test]
fn manual_routing_without_subscription() {
    let pipeline = Pipeline::new(PipelineConfig::polling()).expect("valid config");

    assert_eq!(pipeline.route(telemetry_packet(1, 0, 10)), RouteOutcome::Delivered {
        matched: 1,
        admitted: 1
    });
    assert_eq!(pipeline.route(telemetry_packet(1, 0, 10)), RouteOutcome::Delivered {
        matched: 1,
        admitted: 0
    });

    let lap_data = RawPacket::new(crate::types::PacketHeader::new(PacketId::LapData, 1, 0));
    assert_eq!(pipeline.route(lap_data), RouteOutcome::Unrouted);
    assert_eq!(pipeline.flush(), 1);
}

#[test]
fn histories_are_capped() {
    let config = PipelineConfig::streaming().with_history_cap(3);
    let pipeline = Pipeline::new(config).expect("valid config");

    for frame in 0..10 {
        pipeline.route(telemetry_packet(frame, 0, frame as u16));
    }
    assert_eq!(pipeline.flush(), 10);

    let records = pipeline.current_history();
    let speeds: Vec<_> = records
        .records("CarTelemetryData")
        .iter()
        .map(|record| record["Speed"].as_u64().expect("speed"))
        .collect();
    assert_eq!(speeds, vec![7, 8, 9]);
}

#[test]
fn default_layout_uses_backup_count() {
    let pipeline = Pipeline::new(PipelineConfig::default()).expect("valid config");
    for descriptor in pipeline.descriptors() {
        assert_eq!(descriptor.history_cap, PACKET_BACKUP_COUNT);
        assert_eq!(descriptor.policy, AdmissionPolicy::DedupByFrameId);
    }
}

#[test]
fn invalid_layout_is_rejected() {
    let config = PipelineConfig::polling().with_history_cap(0);
    assert!(Pipeline::new(config).is_err());
}

#[tokio::test(start_paused = true)]
async fn throttled_updates_keep_latest() {
    let pipeline = Pipeline::new(PipelineConfig::streaming()).expect("valid config");
    let mut updates = pipeline.history_updates(UpdateRate::Max(10));

    let initial = updates.next().await.expect("current snapshot");
    assert_eq!(initial.total_records(), 0);

    for frame in 0..5 {
        pipeline.route(telemetry_packet(frame, 0, 100 + frame as u16));
        pipeline.flush();
    }

    let start = tokio::time::Instant::now();
    let latest = updates.next().await.expect("throttled snapshot");
    assert_eq!(latest.total_records(), 5);
    assert!(start.elapsed() >= Duration::from_millis(90));
}
