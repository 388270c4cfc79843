use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use frame_sync::{FrameSyncType, SyncConfig};
use mcmot_bus::{CameraMetadata, ConsumerLoop, FrameEnvelope, FrameMetadata, MemoryBus, StageCallback};

struct CountingStage {
    count: AtomicUsize,
}

impl StageCallback for CountingStage {
    fn handle(&self, _envelope: FrameEnvelope) -> mcmot_bus::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn envelope_bytes(camera_id: &str, frame_number: u64, frame_timestamp: f64) -> Vec<u8> {
    let envelope = FrameEnvelope {
        frame_number,
        frame_timestamp,
        frame: None,
        frame_metadata: FrameMetadata {
            height: 480,
            width: 640,
            codec: 1.0,
            fps: 30,
            actual_fps: 30,
        },
        camera_metadata: CameraMetadata {
            camera_id: camera_id.to_string(),
            extra: Default::default(),
        },
        detections: None,
    };
    serde_json::to_vec(&envelope).unwrap()
}

/// Direct passthrough: no sync config, every message reaches the callback.
#[tokio::test(flavor = "multi_thread")]
async fn passthrough_without_sync_config() {
    let stage = Arc::new(CountingStage {
        count: AtomicUsize::new(0),
    });
    let bus = MemoryBus::new();
    bus.push(None, envelope_bytes("cam-0", 1, 1.0));
    bus.push(None, envelope_bytes("cam-0", 2, 2.0));

    let consumer_loop = ConsumerLoop::new(bus, stage.clone(), None, None);
    // Drive the loop briefly in the background, then stop driving it by
    // dropping the handle -- MemoryBus::poll blocks (returns None) once
    // drained, so a timeout bounds the test.
    let handle = tokio::spawn(async move { consumer_loop.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();

    assert_eq!(stage.count.load(Ordering::SeqCst), 2);
}

/// A `timestamp` sync config with `unify=false` enforces per-camera rate
/// control (skip_count) but still delivers every non-skipped frame
/// directly, matching `process_cv_module`'s non-unify path.
#[tokio::test(flavor = "multi_thread")]
async fn single_camera_sync_delivers_frames_directly() {
    let bus = MemoryBus::new();
    bus.push(None, envelope_bytes("cam-0", 1, 1.0));
    bus.push(None, envelope_bytes("cam-0", 2, 1.01));

    let stage = Arc::new(CountingStage {
        count: AtomicUsize::new(0),
    });
    let config = SyncConfig::builder()
        .frame_sync_type(FrameSyncType::Timestamp)
        .fps(30)
        .build()
        .unwrap();

    let consumer_loop = ConsumerLoop::new(bus, stage.clone(), None, Some(config));
    let handle = tokio::spawn(async move { consumer_loop.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();

    assert_eq!(stage.count.load(Ordering::SeqCst), 2);
}

/// E6 — `seek_to_end=true`: the first message is delivered, then every
/// message already queued behind it is dropped by the seek, and only a
/// message produced after the seek is delivered next.
#[tokio::test(flavor = "multi_thread")]
async fn seek_to_end_drops_backlogged_messages() {
    let bus = MemoryBus::new();
    bus.push(None, envelope_bytes("cam-0", 1, 10.0));
    bus.push(None, envelope_bytes("cam-0", 2, 10.5));
    bus.push(None, envelope_bytes("cam-0", 3, 11.0));
    bus.push(None, envelope_bytes("cam-0", 4, 11.5));

    let stage = Arc::new(CountingStage {
        count: AtomicUsize::new(0),
    });
    let config = SyncConfig::builder()
        .frame_sync_type(FrameSyncType::Number)
        .fps(30)
        .seek_to_end(true)
        .build()
        .unwrap();

    let bus_handle = Arc::new(bus);
    let consumer_loop = ConsumerLoop::new(MemoryBusHandle(bus_handle.clone()), stage.clone(), None, Some(config));
    let handle = tokio::spawn(async move { consumer_loop.run().await });

    // Give the loop time to consume M1 and seek past M2-M4, then produce M5.
    tokio::time::sleep(Duration::from_millis(50)).await;
    bus_handle.push(None, envelope_bytes("cam-0", 5, 12.0));
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();

    // Only M1 (before the seek) and M5 (produced after) ever reach the stage.
    assert_eq!(stage.count.load(Ordering::SeqCst), 2);
}

/// Thin `Bus` forwarder so the test can keep a handle to push messages
/// after handing ownership of the bus to `ConsumerLoop::new`.
struct MemoryBusHandle(Arc<mcmot_bus::MemoryBus>);

#[async_trait::async_trait]
impl mcmot_bus::Bus for MemoryBusHandle {
    async fn poll(&self, timeout: Duration) -> mcmot_bus::Result<Option<mcmot_bus::RawMessage>> {
        self.0.poll(timeout).await
    }

    fn commit(&self, message: &mcmot_bus::RawMessage) -> mcmot_bus::Result<()> {
        self.0.commit(message)
    }

    fn seek_to_end(&self) -> mcmot_bus::Result<()> {
        self.0.seek_to_end()
    }

    fn end_offsets(&self) -> mcmot_bus::Result<std::collections::HashMap<i32, i64>> {
        self.0.end_offsets()
    }

    fn committed_offsets(&self) -> mcmot_bus::Result<std::collections::HashMap<i32, i64>> {
        self.0.committed_offsets()
    }

    fn assignment(&self) -> mcmot_bus::Result<Vec<i32>> {
        self.0.assignment()
    }

    fn close(&self) {
        self.0.close()
    }
}
