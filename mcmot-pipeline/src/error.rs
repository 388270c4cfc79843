#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid pipeline configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    FrameSync(#[from] frame_sync::Error),

    #[error(transparent)]
    Bus(#[from] mcmot_bus::Error),

    #[error("{source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
