use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::types::{CameraId, FrameRecord};

/// A cache key pairing the frame's timestamp with a monotonically
/// increasing insertion sequence number.
///
/// The source relies on dict insertion order happening to match timestamp
/// order, which breaks the moment `add_frame` re-inserts an existing
/// timestamp at the back (see SPEC_FULL.md §9). Keying explicitly by
/// `(timestamp, seq)` makes `take_before` correct regardless of
/// re-insertion order while still giving re-insertion "most recent
/// position" semantics, because `seq` is bumped on every insert.
type CacheKey = (OrderedFloat<f64>, u64);

/// Per-camera, time-indexed ring buffer used to bridge two asynchronous
/// streams (e.g. raw capture frames vs. detections arriving later) so a
/// downstream stage can look up past frames by timestamp.
struct PerCameraCache<P> {
    entries: BTreeMap<CacheKey, FrameRecord<P>>,
    by_timestamp: BTreeMap<OrderedFloat<f64>, u64>,
    max_size: usize,
    next_seq: u64,
}

impl<P> PerCameraCache<P> {
    fn new(max_size: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            by_timestamp: BTreeMap::new(),
            max_size,
            next_seq: 0,
        }
    }

    fn add_frame(&mut self, frame_timestamp: f64, record: FrameRecord<P>) {
        let ts = OrderedFloat(frame_timestamp);
        if let Some(old_seq) = self.by_timestamp.remove(&ts) {
            self.entries.remove(&(ts, old_seq));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_timestamp.insert(ts, seq);
        self.entries.insert((ts, seq), record);

        if self.max_size > 0 && self.entries.len() > self.max_size {
            if let Some((&oldest_key, _)) = self.entries.iter().next() {
                self.entries.remove(&oldest_key);
                self.by_timestamp.remove(&oldest_key.0);
            }
        }
    }

    fn take_before(&mut self, t: f64) -> Vec<FrameRecord<P>> {
        let split_key = (OrderedFloat(t), 0);
        let tail = self.entries.split_off(&split_key);
        let head = std::mem::replace(&mut self.entries, tail);
        for (k, _) in &head {
            self.by_timestamp.remove(&k.0);
        }
        head.into_values().collect()
    }

    fn take_between(&mut self, from_t: f64, to_t: f64) -> Vec<FrameRecord<P>> {
        self.take_before(to_t)
            .into_iter()
            .filter(|r| r.frame_timestamp > from_t)
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Bounded per-camera time-keyed buffer with eviction and range extraction.
///
/// No locking is done internally; callers that share a `FrameCache` across
/// tasks (the tracker stage's two consumer loops, per SPEC_FULL.md §5) must
/// wrap it in a `parking_lot::Mutex` themselves.
pub struct FrameCache<P> {
    max_size: usize,
    per_camera: std::collections::HashMap<CameraId, PerCameraCache<P>>,
}

impl<P> Default for FrameCache<P> {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl<P> FrameCache<P> {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            per_camera: Default::default(),
        }
    }

    /// Idempotent. Returns whether a new per-camera cache was created.
    pub fn add_camera(&mut self, camera_id: &str) -> bool {
        if self.per_camera.contains_key(camera_id) {
            return false;
        }
        self.per_camera
            .insert(camera_id.to_string(), PerCameraCache::new(self.max_size));
        true
    }

    /// Upsert. Re-insertion moves the entry to the most-recent position; if
    /// the camera's cache exceeds `max_size`, the oldest entry is evicted.
    pub fn add_frame(&mut self, camera_id: &str, frame_timestamp: f64, record: FrameRecord<P>) {
        self.add_camera(camera_id);
        self.per_camera
            .get_mut(camera_id)
            .expect("just inserted by add_camera")
            .add_frame(frame_timestamp, record);
    }

    /// Returns and removes all records with `frame_timestamp < t`, in
    /// ascending timestamp order. An unknown `camera_id` is not an error:
    /// returns empty.
    pub fn take_before(&mut self, camera_id: &str, t: f64) -> Vec<FrameRecord<P>> {
        match self.per_camera.get_mut(camera_id) {
            Some(cache) => cache.take_before(t),
            None => Vec::new(),
        }
    }

    /// Equivalent to `take_before(to_t)` filtered to records with
    /// `frame_timestamp > from_t`.
    pub fn take_between(&mut self, camera_id: &str, from_t: f64, to_t: f64) -> Vec<FrameRecord<P>> {
        match self.per_camera.get_mut(camera_id) {
            Some(cache) => cache.take_between(from_t, to_t),
            None => Vec::new(),
        }
    }

    pub fn len(&self, camera_id: &str) -> usize {
        self.per_camera.get(camera_id).map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ts: f64) -> FrameRecord<f64> {
        FrameRecord {
            camera_id: "camA".into(),
            frame_number: 1,
            frame_timestamp: ts,
            fps: 30,
            payload: ts,
            entry_time: 0.0,
        }
    }

    /// E4 — FrameCache range extraction.
    #[test]
    fn take_before_and_between() {
        let mut cache = FrameCache::new(1000);
        cache.add_frame("camA", 1.0, rec(1.0));
        cache.add_frame("camA", 2.0, rec(2.0));
        cache.add_frame("camA", 3.0, rec(3.0));

        let before = cache.take_before("camA", 3.0);
        assert_eq!(
            before.iter().map(|r| r.payload).collect::<Vec<_>>(),
            vec![1.0, 2.0]
        );
        assert_eq!(cache.len("camA"), 1);

        let mut fresh = FrameCache::new(1000);
        fresh.add_frame("camA", 1.0, rec(1.0));
        fresh.add_frame("camA", 2.0, rec(2.0));
        fresh.add_frame("camA", 3.0, rec(3.0));
        let between = fresh.take_between("camA", 1.0, 3.0);
        assert_eq!(
            between.iter().map(|r| r.payload).collect::<Vec<_>>(),
            vec![2.0]
        );
    }

    /// P4 + R2
    #[test]
    fn eviction_and_reinsertion() {
        let mut cache = FrameCache::new(2);
        cache.add_frame("camA", 1.0, rec(1.0));
        cache.add_frame("camA", 2.0, rec(2.0));
        cache.add_frame("camA", 3.0, rec(3.0));
        assert_eq!(cache.len("camA"), 2);

        let mut replace = FrameCache::new(1000);
        replace.add_frame("camA", 5.0, rec(5.0));
        let mut updated = rec(5.0);
        updated.payload = 99.0;
        replace.add_frame("camA", 5.0, updated);
        let out = replace.take_before("camA", 100.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload, 99.0);
    }

    #[test]
    fn unknown_camera_returns_empty() {
        let mut cache: FrameCache<()> = FrameCache::new(10);
        assert!(cache.take_before("nope", 10.0).is_empty());
        assert!(cache.take_between("nope", 0.0, 10.0).is_empty());
    }

    /// R3
    #[test]
    fn take_before_is_idempotent_when_empty() {
        let mut cache = FrameCache::new(10);
        cache.add_frame("camA", 1.0, rec(1.0));
        assert_eq!(cache.take_before("camA", 2.0).len(), 1);
        assert!(cache.take_before("camA", 2.0).is_empty());
    }
}
