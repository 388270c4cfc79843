use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use crate::bus::{Bus, RawMessage};
use crate::error::Result;

struct State {
    pending: VecDeque<RawMessage>,
    next_offset: i64,
    end_offset: i64,
    committed: i64,
}

/// In-process, single-partition [`Bus`] used by tests and by
/// `mcmot-pipeline`'s local-dev mode in place of a real broker.
pub struct MemoryBus {
    state: Mutex<State>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                next_offset: 0,
                end_offset: 0,
                committed: 0,
            }),
        }
    }

    /// Enqueue a message as if it had just been produced.
    pub fn push(&self, key: Option<String>, payload: Vec<u8>) {
        let mut state = self.state.lock();
        let offset = state.end_offset;
        state.end_offset += 1;
        state.pending.push_back(RawMessage {
            partition: 0,
            offset,
            key,
            payload,
        });
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Bus for MemoryBus {
    async fn poll(&self, _timeout: Duration) -> Result<Option<RawMessage>> {
        let mut state = self.state.lock();
        Ok(state.pending.pop_front().map(|m| {
            state.next_offset = m.offset + 1;
            m
        }))
    }

    fn commit(&self, message: &RawMessage) -> Result<()> {
        let mut state = self.state.lock();
        state.committed = message.offset + 1;
        Ok(())
    }

    fn seek_to_end(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.pending.clear();
        state.committed = state.end_offset;
        Ok(())
    }

    fn end_offsets(&self) -> Result<HashMap<i32, i64>> {
        Ok(HashMap::from([(0, self.state.lock().end_offset)]))
    }

    fn committed_offsets(&self) -> Result<HashMap<i32, i64>> {
        Ok(HashMap::from([(0, self.state.lock().committed)]))
    }

    fn assignment(&self) -> Result<Vec<i32>> {
        Ok(vec![0])
    }

    fn close(&self) {}
}
