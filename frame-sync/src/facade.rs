use crate::config::{FrameSyncType, SyncConfig};
use crate::error::{Error, Result};
use crate::number_sync::NumberSynchronizer;
use crate::timestamp_sync::TimestampSynchronizer;
use crate::types::{Group, Sampling};

/// Dispatches to whichever synchronizer `config.frame_sync_type` selects.
///
/// Constructed only for [`FrameSyncType::Number`] or
/// [`FrameSyncType::Timestamp`] — `FrameSyncType::None` is rejected here
/// (P7): a consumer that wants no grouping at all skips building a facade
/// entirely rather than routing through a no-op variant.
pub enum SynchronizationFacade<P> {
    Number(NumberSynchronizer<P>),
    Timestamp(TimestampSynchronizer<P>),
}

impl<P> SynchronizationFacade<P> {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        match config.frame_sync_type {
            FrameSyncType::Number => Ok(Self::Number(NumberSynchronizer::new(
                config.fps,
                config.retention_time,
            ))),
            FrameSyncType::Timestamp => Ok(Self::Timestamp(TimestampSynchronizer::new(
                config.fps,
                config.retention_time,
                Some(config.latency_threshold).filter(|t| *t > 0.0),
            ))),
            FrameSyncType::None => Err(Error::Configuration(
                "frame_sync_type 'none' does not build a synchronization facade".to_string(),
            )),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn collect(
        &self,
        camera_id: &str,
        frame_number: u64,
        frame_timestamp: f64,
        fps: u32,
        payload: P,
        now: f64,
    ) {
        match self {
            Self::Number(s) => s.collect(camera_id, frame_number, frame_timestamp, fps, payload, now),
            Self::Timestamp(s) => s.collect(camera_id, frame_number, frame_timestamp, fps, payload, now),
        }
    }

    pub fn sampling(&self, camera_id: &str, now: f64) -> Result<Sampling> {
        match self {
            Self::Number(s) => s.sampling(camera_id),
            Self::Timestamp(s) => s.sampling(camera_id, now),
        }
    }

    pub fn synchronize(&self, now: f64, deliver: impl FnMut(Group<P>))
    where
        P: Clone,
    {
        match self {
            Self::Number(s) => s.synchronize(now, deliver),
            Self::Timestamp(s) => s.synchronize(now, deliver),
        }
    }
}
