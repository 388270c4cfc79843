use std::sync::Arc;

use frame_sync::FrameCache;
use mcmot_bus::{FrameEnvelope, StageCallback};
use parking_lot::Mutex;
use tracing::debug;

/// Forwards every frame it sees to `tracing` at debug level. Stands in for
/// the model-bound stage logic (capture/detection/reid/analytics), which is
/// out of scope here — only the invocation contract is.
pub struct LoggingStage {
    pub name: &'static str,
}

impl StageCallback for LoggingStage {
    fn handle(&self, envelope: FrameEnvelope) -> mcmot_bus::Result<()> {
        debug!(
            stage = self.name,
            camera_id = envelope.camera_id(),
            frame_number = envelope.frame_number,
            "frame reached stage"
        );
        Ok(())
    }
}

/// One side of the tracker stage's capture/detection join: inserts arriving
/// frames into a `FrameCache` shared with the other feed's loop, then tries
/// to pull matching records out of the opposite camera's cache by
/// timestamp.
///
/// Two instances of this, one per feed, are wired to two `ConsumerLoop`s
/// sharing the same two caches (SPEC_FULL.md §5 — tracker stage runs TWO
/// consumer loops joined through a shared `FrameCache`).
pub struct CacheJoinStage {
    own_cache: Arc<Mutex<FrameCache<FrameEnvelope>>>,
    peer_cache: Arc<Mutex<FrameCache<FrameEnvelope>>>,
    downstream: Arc<dyn StageCallback>,
}

impl CacheJoinStage {
    pub fn new(
        own_cache: Arc<Mutex<FrameCache<FrameEnvelope>>>,
        peer_cache: Arc<Mutex<FrameCache<FrameEnvelope>>>,
        downstream: Arc<dyn StageCallback>,
    ) -> Self {
        Self {
            own_cache,
            peer_cache,
            downstream,
        }
    }
}

impl StageCallback for CacheJoinStage {
    fn handle(&self, envelope: FrameEnvelope) -> mcmot_bus::Result<()> {
        let camera_id = envelope.camera_id().to_string();
        let frame_timestamp = envelope.frame_timestamp;
        self.own_cache
            .lock()
            .add_frame(&camera_id, frame_timestamp, frame_sync::FrameRecord {
                camera_id: camera_id.clone(),
                frame_number: envelope.frame_number,
                frame_timestamp,
                fps: envelope.frame_metadata.fps,
                payload: envelope,
                entry_time: frame_timestamp,
            });

        let matches = self.peer_cache.lock().take_before(&camera_id, frame_timestamp);
        for record in matches {
            self.downstream.handle(record.payload)?;
        }
        Ok(())
    }
}
