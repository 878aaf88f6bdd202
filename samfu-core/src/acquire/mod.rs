//! The three-stage acquisition pipeline: download, decrypt, extract.

pub mod decrypt;
pub mod download;
pub mod error;
pub mod extract;

pub use error::AcquireError;
