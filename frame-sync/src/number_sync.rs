use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::sequencer::Sequencer;
use crate::types::{CameraId, CameraState, FrameRecord, Group, GroupingKey, Sampling};

struct Buffered<P> {
    record: FrameRecord<P>,
    grouped: bool,
}

struct Inner<P> {
    fps: u32,
    cameras: BTreeMap<CameraId, CameraState>,
    buffer: Vec<Buffered<P>>,
}

/// Groups frames across cameras that share the same `frame_number` and
/// drives per-camera rate control against a fixed `fps`.
///
/// Used for tightly time-locked synthetic/recorded sources (SPEC_FULL.md
/// §4.3).
pub struct NumberSynchronizer<P> {
    inner: Mutex<Inner<P>>,
    sequencer: Sequencer<P>,
    retention_time: f64,
}

impl<P> NumberSynchronizer<P> {
    pub fn new(fps: u32, retention_time: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                fps,
                cameras: BTreeMap::new(),
                buffer: Vec::new(),
            }),
            sequencer: Sequencer::new(),
            retention_time,
        }
    }

    /// Buffer one frame. `now` is the monotonic arrival time (becomes the
    /// record's `entry_time`, populated unconditionally, unlike the
    /// source's mode-dependent field — see SPEC_FULL.md §9).
    pub fn collect(&self, camera_id: &str, frame_number: u64, frame_timestamp: f64, fps: u32, payload: P, now: f64) {
        let mut inner = self.inner.lock();
        if inner.fps == 0 {
            inner.fps = fps;
        }
        inner
            .cameras
            .entry(camera_id.to_string())
            .or_insert_with(|| CameraState {
                start_time: frame_timestamp,
                initial_delay: 0.0,
                last_frame_number: 0,
                last_frame_timestamp: 0.0,
            });
        if let Some(state) = inner.cameras.get_mut(camera_id) {
            state.last_frame_number = frame_number;
            state.last_frame_timestamp = frame_timestamp;
        }
        debug!(camera_id, frame_number, "collected frame for number sync");
        inner.buffer.push(Buffered {
            record: FrameRecord {
                camera_id: camera_id.to_string(),
                frame_number,
                frame_timestamp,
                fps,
                payload,
                entry_time: now,
            },
            grouped: false,
        });
    }

    /// Per-camera rate control. Fatal `Error::UnknownCamera` if the camera
    /// has never been observed (P6).
    pub fn sampling(&self, camera_id: &str) -> Result<Sampling> {
        let inner = self.inner.lock();
        let state = inner
            .cameras
            .get(camera_id)
            .ok_or_else(|| Error::UnknownCamera(camera_id.to_string()))?;
        let elapsed = state.last_frame_timestamp - state.start_time;
        let expected_frame = (elapsed * inner.fps as f64).floor() as i64;
        let delta = expected_frame - state.last_frame_number as i64;
        if delta < 0 {
            let wait = Duration::from_secs_f64((-delta) as f64 / inner.fps.max(1) as f64);
            Ok(Sampling::Wait(wait))
        } else {
            Ok(Sampling::Skip(delta as u64))
        }
    }

    /// One grouping pass: group un-grouped buffered records by
    /// `frame_number` in ascending order, sequence the completed groups,
    /// and drain them to `deliver`. Evicts grouped records and records
    /// older than `retention_time`.
    pub fn synchronize(&self, now: f64, mut deliver: impl FnMut(Group<P>))
    where
        P: Clone,
    {
        {
            let mut inner = self.inner.lock();
            let num_cameras = inner.cameras.len();

            let mut frame_numbers: Vec<u64> =
                inner.buffer.iter().map(|b| b.record.frame_number).collect();
            frame_numbers.sort_unstable();
            frame_numbers.dedup();

            for frame_number in frame_numbers {
                let idx: Vec<usize> = inner
                    .buffer
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| !b.grouped && b.record.frame_number == frame_number)
                    .map(|(i, _)| i)
                    .collect();
                if idx.len() == num_cameras && num_cameras > 0 {
                    let records: Vec<FrameRecord<P>> =
                        idx.iter().map(|&i| inner.buffer[i].record.clone()).collect();
                    for &i in &idx {
                        inner.buffer[i].grouped = true;
                    }
                    self.sequencer.collect(Group {
                        grouping_key: GroupingKey::from(frame_number as f64),
                        records,
                    });
                }
            }
        }

        self.sequencer.sequence();
        while let Some(group) = self.sequencer.next() {
            deliver(group);
        }

        let retention_time = self.retention_time;
        let mut inner = self.inner.lock();
        let before = inner.buffer.len();
        inner
            .buffer
            .retain(|b| !b.grouped && (now - b.record.entry_time) <= retention_time);
        debug!(before, after = inner.buffer.len(), "number-sync buffer cleanup");
    }

    pub fn buffer_len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn fps(&self) -> u32 {
        self.inner.lock().fps
    }
}
