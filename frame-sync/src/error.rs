#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid frame synchronizer configuration: {0}")]
    Configuration(String),
    #[error("sampling requested for unknown camera '{0}'")]
    UnknownCamera(String),
}

pub type Result<T> = std::result::Result<T, Error>;
