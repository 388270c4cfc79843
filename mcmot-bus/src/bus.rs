use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// Where a partition's offset reset lands when a consumer group has no
/// committed position yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    Earliest,
    Latest,
}

/// One message pulled off a bus partition, still undecoded.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Transport abstraction the consumer loop drives. Mirrors the operations
/// the source's `MessageConsumer` performs directly against `KafkaConsumer`
/// (SPEC_FULL.md §6): subscribe happens at construction, then poll / commit
/// / seek_to_end / end_offsets / committed / assignment / close.
#[async_trait::async_trait]
pub trait Bus: Send + Sync {
    /// Waits up to `timeout` for the next message; `None` on timeout.
    async fn poll(&self, timeout: Duration) -> Result<Option<RawMessage>>;

    /// Commits the offset of the given message (i.e. offset + 1) for its
    /// partition.
    fn commit(&self, message: &RawMessage) -> Result<()>;

    /// Seeks every assigned partition to its high watermark, then commits
    /// the new position. Used by `ignore_initial_delay` and `seek_to_end`
    /// (P... see SPEC_FULL.md §4.8).
    fn seek_to_end(&self) -> Result<()>;

    fn end_offsets(&self) -> Result<HashMap<i32, i64>>;

    fn committed_offsets(&self) -> Result<HashMap<i32, i64>>;

    fn assignment(&self) -> Result<Vec<i32>>;

    fn close(&self);

    /// Sum over assigned partitions of `max(end_offset - committed_offset, 0)`.
    fn backlog(&self) -> Result<u64> {
        let end = self.end_offsets()?;
        let committed = self.committed_offsets()?;
        Ok(self
            .assignment()?
            .into_iter()
            .map(|p| {
                let end = end.get(&p).copied().unwrap_or(0);
                let committed = committed.get(&p).copied().unwrap_or(0);
                (end - committed).max(0) as u64
            })
            .sum())
    }
}
