use std::time::Duration;

/// Identifier of a camera's partition in the bus. Carried opaque through the
/// synchronization core; equality/ordering are the only operations needed
/// here.
pub type CameraId = String;

/// A single decoded frame as handed to the synchronizer by the consumer
/// loop.
///
/// Immutable after creation; destroyed on eviction or group dispatch.
#[derive(Debug, Clone)]
pub struct FrameRecord<P> {
    pub camera_id: CameraId,
    pub frame_number: u64,
    pub frame_timestamp: f64,
    pub fps: u32,
    pub payload: P,
    /// Monotonic seconds at which this record was handed to `collect`.
    pub entry_time: f64,
}

/// Per-camera bookkeeping created on first observation of a `camera_id` and
/// never destroyed during a session.
#[derive(Debug, Clone, Default)]
pub(crate) struct CameraState {
    pub(crate) start_time: f64,
    /// Only meaningful for [`crate::timestamp_sync::TimestampSynchronizer`].
    pub(crate) initial_delay: f64,
    pub(crate) last_frame_number: u64,
    pub(crate) last_frame_timestamp: f64,
}

/// The key a [`crate::sequencer::Sequencer`] orders groups by: either the
/// frame number (number-sync mode) or the anchor timestamp of a group
/// (timestamp-sync mode). Both compare as `f64` so the sequencer can treat
/// them uniformly.
pub type GroupingKey = ordered_float::OrderedFloat<f64>;

/// A complete set of per-camera frames sharing one `grouping_key`.
///
/// Complete means exactly one record per camera observed so far; groups are
/// produced atomically by a synchronization pass and are not retained by the
/// synchronizer after being handed to the [`crate::sequencer::Sequencer`].
#[derive(Debug, Clone)]
pub struct Group<P> {
    pub grouping_key: GroupingKey,
    pub records: Vec<FrameRecord<P>>,
}

impl<P> Group<P> {
    pub fn cameras(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.camera_id.as_str())
    }
}

/// Outcome of a per-camera rate-control decision.
///
/// Replaces the source's overloaded `(number, bool)` return with a tagged
/// variant: a camera is either behind (skip ahead) or ahead (wait) of its
/// expected position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    /// The consumer should advance its source by this many frames before
    /// reading the next one (0 means "proceed, exactly on schedule").
    Skip(u64),
    /// The consumer should sleep this long before reading the next frame.
    Wait(Duration),
}
