use parking_lot::Mutex;

use crate::types::Group;

struct Inner<P> {
    pending: Vec<Group<P>>,
    ordered: std::collections::VecDeque<Group<P>>,
}

/// Delivers completed groups to the downstream callback in chronological
/// order of the group's key, regardless of the order in which they were
/// completed.
///
/// All three operations are serialized by a single mutex (no recursive
/// locking, unlike the source's nested-lock `sequence_groups`).
pub struct Sequencer<P> {
    inner: Mutex<Inner<P>>,
}

impl<P> Default for Sequencer<P> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: Vec::new(),
                ordered: std::collections::VecDeque::new(),
            }),
        }
    }
}

impl<P> Sequencer<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group to the in-buffer list.
    pub fn collect(&self, group: Group<P>) {
        self.inner.lock().pending.push(group);
    }

    /// Sort the in-buffer list by grouping key, move it to the output
    /// queue, and clear the in-buffer list. A pass that finds nothing
    /// pending is a no-op (R1).
    pub fn sequence(&self) {
        let mut inner = self.inner.lock();
        if inner.pending.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut inner.pending);
        pending.sort_by_key(|g| g.grouping_key);
        inner.ordered.extend(pending);
    }

    /// Pop and return the next group from the output queue; `None` when
    /// empty.
    pub fn next(&self) -> Option<Group<P>> {
        self.inner.lock().ordered.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameRecord, GroupingKey};

    fn group(key: f64) -> Group<()> {
        Group {
            grouping_key: GroupingKey::from(key),
            records: vec![FrameRecord {
                camera_id: "camA".into(),
                frame_number: key as u64,
                frame_timestamp: key,
                fps: 30,
                payload: (),
                entry_time: 0.0,
            }],
        }
    }

    /// E3 — sequencing across out-of-order completion.
    #[test]
    fn sequence_reorders_by_key() {
        let seq = Sequencer::new();
        seq.collect(group(2.0));
        seq.collect(group(1.0));
        seq.sequence();

        let first = seq.next().unwrap();
        let second = seq.next().unwrap();
        assert_eq!(first.grouping_key, GroupingKey::from(1.0));
        assert_eq!(second.grouping_key, GroupingKey::from(2.0));
        assert!(seq.next().is_none());
    }

    /// R1 — idempotent sequencing with no intervening collect.
    #[test]
    fn sequence_twice_is_a_noop() {
        let seq: Sequencer<()> = Sequencer::new();
        seq.collect(group(1.0));
        seq.sequence();
        assert!(seq.next().is_some());
        seq.sequence();
        assert!(seq.next().is_none());
    }
}
