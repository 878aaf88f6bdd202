//! Error taxonomy for the download, decrypt, and extraction engines.

use std::io;

use thiserror::Error;

/// Errors raised by the acquisition pipeline's three engines.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// A download completed but the written byte count didn't match the
    /// size reported by the inform response.
    #[error("downloaded {got} bytes, expected {expected}")]
    DownloadSizeMismatch { got: u64, expected: u64 },

    /// The FUS stream request itself failed.
    #[error("download request failed: {0}")]
    DownloadHttpError(#[from] crate::fus::FusError),

    /// The caller's cancellation predicate fired mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    /// An ECB-encrypted input's length was not a multiple of the AES block
    /// size.
    #[error("encrypted input is not a multiple of the AES block size")]
    InvalidBlockSize,

    /// The ZIP archive could not be opened or a member could not be read.
    #[error("bad zip archive: {0}")]
    BadZip(String),

    /// Underlying filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A lower-level crypto operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, AcquireError>;
