use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy for an experiment run.
///
/// Configuration and calibration problems are fatal and surface before any
/// stimulus is shown. `Quit` is not a failure: it is the reserved quit key
/// (or a cancelled subject dialog) unwinding the run after a final data
/// flush.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not measure a stable display refresh rate in two attempts")]
    Calibration,

    #[error("response box required but not available: {0}")]
    DeviceNotFound(String),

    #[error("indefinite presentation time requires awaiting a response")]
    InvalidDuration,

    #[error("failed to persist data: {0}")]
    Persist(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("quit key pressed")]
    Quit,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn display(msg: impl Into<String>) -> Self {
        Error::Display(msg.into())
    }
}
