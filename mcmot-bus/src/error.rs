#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("kafka error: {source}")]
    Kafka {
        #[from]
        source: rdkafka::error::KafkaError,
    },

    #[error(transparent)]
    FrameSync(#[from] frame_sync::Error),

    #[error("invalid bus configuration: {0}")]
    Configuration(String),

    /// A single message could not be processed (bad key, undecodable
    /// payload). Logged and skipped by the consumer loop, never fatal.
    #[error("transient message error: {0}")]
    TransientMessage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
