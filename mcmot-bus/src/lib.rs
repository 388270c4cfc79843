//! Bus transport, wire envelope, and the consumer loop that ties a
//! [`frame_sync::SynchronizationFacade`] to a live or in-memory message
//! stream.

pub mod bus;
pub mod callback;
pub mod consumer_loop;
pub mod envelope;
pub mod error;
pub mod kafka_bus;
pub mod memory_bus;

pub use bus::{Bus, OffsetReset, RawMessage};
pub use callback::StageCallback;
pub use consumer_loop::ConsumerLoop;
pub use envelope::{CameraMetadata, ControlEnvelope, ControlSignal, FrameEnvelope, FrameMetadata};
pub use error::{Error, Result};
pub use kafka_bus::KafkaBus;
pub use memory_bus::MemoryBus;
