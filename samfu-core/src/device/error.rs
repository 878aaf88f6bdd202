//! The error taxonomy shared by the AT and Odin device channels.

use thiserror::Error;

use crate::serial::SerialError;

/// Errors raised while detecting, addressing, or exchanging messages with a
/// device over its AT or Odin serial channel.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No candidate serial device could be found.
    #[error("no Samsung device was found")]
    NotFound,

    /// The underlying serial transport failed during an AT exchange.
    #[error("AT transport error: {0}")]
    ATTransportError(#[from] SerialError),

    /// An AT command's response did not contain the expected `OK`.
    #[error("unexpected AT response: {0:?}")]
    ATBadResponse(String),

    /// An AT command produced no bytes at all before its timeout elapsed.
    #[error("no response from device to AT command")]
    ATNoResponse,

    /// An AT response (e.g. `+DEVCONINFO`) could not be parsed into its
    /// expected fields.
    #[error("could not parse AT response: {0}")]
    ATParseError(String),

    /// The underlying serial transport failed during an Odin exchange.
    #[error("Odin transport error: {0}")]
    OdinTransportError(SerialError),

    /// An Odin exchange (`DVIF`) produced no bytes at all.
    #[error("empty response from device in Odin mode")]
    OdinEmptyResponse,
}

pub type Result<T> = std::result::Result<T, DeviceError>;
