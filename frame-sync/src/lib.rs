//! Per-camera rate control, cross-camera grouping, and chronological
//! sequencing for a multi-camera frame pipeline.
//!
//! [`facade::SynchronizationFacade`] is the primary entry point; it wraps
//! whichever of [`number_sync::NumberSynchronizer`] or
//! [`timestamp_sync::TimestampSynchronizer`] a [`config::SyncConfig`]
//! selects. [`frame_cache::FrameCache`] is a separate, independently usable
//! bounded buffer for bridging two asynchronous per-camera streams.

pub mod config;
pub mod error;
pub mod facade;
pub mod frame_cache;
pub mod number_sync;
pub mod sequencer;
pub mod timestamp_sync;
pub mod types;

pub use config::{FrameSyncType, SyncConfig, SyncConfigBuilder};
pub use error::{Error, Result};
pub use facade::SynchronizationFacade;
pub use frame_cache::FrameCache;
pub use number_sync::NumberSynchronizer;
pub use sequencer::Sequencer;
pub use timestamp_sync::TimestampSynchronizer;
pub use types::{CameraId, FrameRecord, Group, GroupingKey, Sampling};
