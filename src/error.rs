use thiserror::Error;

/// Error taxonomy for the Drove control-plane client and DNS handler.
#[derive(Debug, Error)]
pub enum DroveError {
    #[error("config error: {0}")]
    Config(String),

    #[error("all endpoints are down")]
    NoLeader,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("timeout error: {0}")]
    Timeout(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("drove dns not ready")]
    NotReady,
}

pub type Result<T> = std::result::Result<T, DroveError>;
