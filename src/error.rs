//! Error types for serialq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The queue has begun or completed disposal and accepts no more work.
    #[error("queue disposed")]
    Disposed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the disposed rejection returned by `enqueue`.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Error::Disposed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
