use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::sequencer::Sequencer;
use crate::types::{CameraId, CameraState, FrameRecord, Group, GroupingKey, Sampling};

struct Buffered<P> {
    record: FrameRecord<P>,
    /// Anchor timestamp of the group this record was placed in, once grouped.
    grouped: Option<f64>,
}

struct Inner<P> {
    fps: u32,
    tolerance: f64,
    cameras: BTreeMap<CameraId, CameraState>,
    buffer: Vec<Buffered<P>>,
}

/// Groups frames across cameras whose timestamps fall within `tolerance =
/// 1/fps` of one another, and drives per-camera rate control against each
/// camera's measured arrival delay.
///
/// Used for independently clocked live sources (SPEC_FULL.md §4.4).
pub struct TimestampSynchronizer<P> {
    inner: Mutex<Inner<P>>,
    sequencer: Sequencer<P>,
    retention_time: f64,
    latency_threshold: Option<f64>,
}

impl<P> TimestampSynchronizer<P> {
    pub fn new(fps: u32, retention_time: f64, latency_threshold: Option<f64>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                fps,
                tolerance: if fps > 0 { 1.0 / fps as f64 } else { 0.0 },
                cameras: BTreeMap::new(),
                buffer: Vec::new(),
            }),
            sequencer: Sequencer::new(),
            retention_time,
            latency_threshold,
        }
    }

    /// Buffer one frame. `now` calibrates each camera's `initial_delay` on
    /// first observation (clamped to `latency_threshold` when configured)
    /// and is unconditionally stored as the record's `entry_time`.
    pub fn collect(&self, camera_id: &str, frame_number: u64, frame_timestamp: f64, fps: u32, payload: P, now: f64) {
        let mut inner = self.inner.lock();
        if inner.fps == 0 {
            inner.fps = fps;
            inner.tolerance = if fps > 0 { 1.0 / fps as f64 } else { 0.0 };
        }

        let raw_delay = now - frame_timestamp;
        let clamped_delay = match self.latency_threshold {
            Some(threshold) => raw_delay.min(threshold),
            None => raw_delay,
        };
        inner
            .cameras
            .entry(camera_id.to_string())
            .or_insert_with(|| CameraState {
                start_time: now,
                initial_delay: clamped_delay,
                last_frame_number: 0,
                last_frame_timestamp: 0.0,
            });

        if let Some(state) = inner.cameras.get_mut(camera_id) {
            state.last_frame_number = frame_number;
            state.last_frame_timestamp = frame_timestamp;
        }

        debug!(camera_id, frame_number, "collected frame for timestamp sync");
        inner.buffer.push(Buffered {
            record: FrameRecord {
                camera_id: camera_id.to_string(),
                frame_number,
                frame_timestamp,
                fps,
                payload,
                entry_time: now,
            },
            grouped: None,
        });
    }

    /// Per-camera rate control driven by measured arrival delay relative to
    /// the camera's calibrated `initial_delay`. Fatal `Error::UnknownCamera`
    /// if the camera has never been observed (P6).
    pub fn sampling(&self, camera_id: &str, now: f64) -> Result<Sampling> {
        let inner = self.inner.lock();
        let state = inner
            .cameras
            .get(camera_id)
            .ok_or_else(|| Error::UnknownCamera(camera_id.to_string()))?;
        let delay = now - state.last_frame_timestamp - state.initial_delay;
        if delay < 0.0 {
            Ok(Sampling::Wait(Duration::from_secs_f64(-delay)))
        } else {
            let skip = ((delay * inner.fps as f64).floor().max(0.0)) as u64;
            Ok(Sampling::Skip(skip))
        }
    }

    /// One grouping pass: for every ungrouped record, open a new group
    /// anchored at its timestamp and absorb every other ungrouped record
    /// within `tolerance`, one per camera, in buffer order (O(n^2), matching
    /// the source's pairwise scan). Completed groups (one record per known
    /// camera) are sequenced and drained to `deliver`.
    pub fn synchronize(&self, now: f64, mut deliver: impl FnMut(Group<P>))
    where
        P: Clone,
    {
        {
            let mut inner = self.inner.lock();
            let num_cameras = inner.cameras.len();
            let tolerance = inner.tolerance;

            let anchors: Vec<usize> = (0..inner.buffer.len())
                .filter(|&i| inner.buffer[i].grouped.is_none())
                .collect();

            for anchor_idx in anchors {
                if inner.buffer[anchor_idx].grouped.is_some() {
                    continue;
                }
                let anchor_ts = inner.buffer[anchor_idx].record.frame_timestamp;
                let mut chosen = vec![anchor_idx];
                let mut cams_in_group = vec![inner.buffer[anchor_idx].record.camera_id.clone()];

                for i in 0..inner.buffer.len() {
                    if i == anchor_idx || inner.buffer[i].grouped.is_some() {
                        continue;
                    }
                    let frame = &inner.buffer[i].record;
                    if (frame.frame_timestamp - anchor_ts).abs() <= tolerance
                        && !cams_in_group.contains(&frame.camera_id)
                    {
                        cams_in_group.push(frame.camera_id.clone());
                        chosen.push(i);
                        if chosen.len() == num_cameras {
                            break;
                        }
                    }
                }

                if num_cameras > 0 && chosen.len() == num_cameras {
                    let records: Vec<FrameRecord<P>> =
                        chosen.iter().map(|&i| inner.buffer[i].record.clone()).collect();
                    for &i in &chosen {
                        inner.buffer[i].grouped = Some(anchor_ts);
                    }
                    self.sequencer.collect(Group {
                        grouping_key: GroupingKey::from(anchor_ts),
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
            .retain(|b| b.grouped.is_none() && (now - b.record.entry_time) <= retention_time);
        debug!(before, after = inner.buffer.len(), "timestamp-sync buffer cleanup");
    }

    pub fn buffer_len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn tolerance(&self) -> f64 {
        self.inner.lock().tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// E2 — timestamp sync, two cameras within tolerance.
    #[test]
    fn two_cameras_within_tolerance() {
        let sync = TimestampSynchronizer::new(30, 60.0, None);
        // tolerance = 1/30 ~= 0.0333
        sync.collect("A", 1, 10.000, 30, "A1", 10.0);
        sync.collect("B", 1, 10.010, 30, "B1", 10.0);

        let mut delivered = Vec::new();
        sync.synchronize(10.0, |g| delivered.push(g));
        assert_eq!(delivered.len(), 1);
        let mut cams: Vec<&str> = delivered[0].cameras().collect();
        cams.sort_unstable();
        assert_eq!(cams, vec!["A", "B"]);
    }

    #[test]
    fn outside_tolerance_does_not_group() {
        let sync = TimestampSynchronizer::new(30, 60.0, None);
        sync.collect("A", 1, 10.000, 30, "A1", 10.0);
        sync.collect("B", 1, 10.500, 30, "B1", 10.5);

        let mut delivered = Vec::new();
        sync.synchronize(10.5, |g| delivered.push(g));
        assert!(delivered.is_empty());
        assert_eq!(sync.buffer_len(), 2);
    }

    #[test]
    fn unknown_camera_is_fatal() {
        let sync: TimestampSynchronizer<()> = TimestampSynchronizer::new(30, 60.0, None);
        assert!(matches!(
            sync.sampling("ghost", 0.0),
            Err(Error::UnknownCamera(_))
        ));
    }

    /// E5 — rate control in TimestampSynchronizer: arriving late relative to
    /// the calibrated initial delay yields Skip.
    #[test]
    fn rate_control_skip_when_late() {
        let sync = TimestampSynchronizer::new(30, 60.0, None);
        // initial_delay = now(100.0) - frame_timestamp(100.0) = 0.0
        sync.collect("A", 1, 100.0, 30, (), 100.0);
        // next observation: delay = 101.5 - 100.1 - 0.0 = 1.4s late -> skip.
        sync.collect("A", 2, 100.1, 30, (), 100.0);

        match sync.sampling("A", 101.5).unwrap() {
            Sampling::Skip(n) => assert_eq!(n, ((1.5 - 0.1) * 30.0).floor() as u64),
            other => panic!("expected Skip, got {other:?}"),
        }
    }

    #[test]
    fn rate_control_wait_when_early() {
        let sync = TimestampSynchronizer::new(30, 60.0, None);
        sync.collect("A", 1, 100.0, 30, (), 100.0);
        match sync.sampling("A", 100.0).unwrap() {
            Sampling::Wait(d) => assert!(d.as_secs_f64() >= 0.0),
            other => panic!("expected Wait, got {other:?}"),
        }
    }

    /// Single camera: every frame forms a complete group of size 1.
    #[test]
    fn single_camera_forms_singleton_groups() {
        let sync = TimestampSynchronizer::new(30, 60.0, None);
        sync.collect("A", 1, 10.0, 30, "A1", 10.0);
        let mut delivered = Vec::new();
        sync.synchronize(10.0, |g| delivered.push(g));
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].records.len(), 1);
    }

    /// fps=0 at construction: the first collected message's fps is adopted
    /// and tolerance initialized from it.
    #[test]
    fn fps_zero_adopts_first_reported_fps() {
        let sync: TimestampSynchronizer<()> = TimestampSynchronizer::new(0, 60.0, None);
        assert_eq!(sync.tolerance(), 0.0);
        sync.collect("A", 1, 10.0, 20, (), 10.0);
        approx::assert_relative_eq!(sync.tolerance(), 1.0 / 20.0);
    }

    /// Initial delay is clamped to `latency_threshold` when configured.
    #[test]
    fn initial_delay_is_clamped_by_latency_threshold() {
        let sync = TimestampSynchronizer::new(30, 60.0, Some(1.0));
        // raw delay would be 5.0, clamped to 1.0.
        sync.collect("A", 1, 95.0, 30, (), 100.0);
        sync.collect("A", 2, 95.0, 30, (), 100.0);
        // delay = now - last_ts - initial_delay = 100.0 - 95.0 - 1.0 = 4.0 -> skip.
        match sync.sampling("A", 100.0).unwrap() {
            Sampling::Skip(n) => assert_eq!(n, (4.0 * 30.0) as u64),
            other => panic!("expected Skip, got {other:?}"),
        }
    }
}
