use thiserror::Error;

/// Errors raised while building caches and datasets or persisting them.
#[derive(Debug, Error)]
pub enum Error {
    /// The size parameters cannot produce a valid cache or dataset.
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),

    /// A cache or dataset buffer could not be allocated.
    #[error("failed to allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// The progress callback asked to stop dataset generation.
    #[error("dataset generation cancelled")]
    Cancelled,

    #[error("failed to start dataset workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
