//! Error taxonomy for the FUS RPC client and its message codec.

use thiserror::Error;

/// Errors raised by the FUS client and the message codec it drives.
#[derive(Debug, Error)]
pub enum FusError {
    /// A non-stream request (`inform`/`init`) returned a non-2xx status.
    #[error("FUS request failed with HTTP {status}")]
    HttpError { status: u16 },

    /// A streaming download request returned a non-OK status.
    #[error("FUS download stream failed with HTTP {status}")]
    DownloadError { status: u16 },

    /// The inform/init response's `Results/Status` was not `200`.
    #[error("FUS server returned status {code}")]
    BadStatus { code: i32 },

    /// A required field was absent from a parsed response.
    #[error("FUS response missing required field {name:?}")]
    MissingField { name: &'static str },

    /// The bootstrap exchange never yielded a usable nonce, so no request
    /// requiring a signature can proceed.
    #[error("could not obtain a decryption key: no nonce available")]
    DecryptionKeyUnobtainable,

    /// A lower-level crypto operation (nonce decryption, signing) failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),

    /// The underlying HTTP transport failed.
    #[error("FUS transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FusError>;
