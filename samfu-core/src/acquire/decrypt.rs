//! Streaming ECB decryption of an ENC4 firmware container.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use log::debug;

use super::error::{AcquireError, Result};
use crate::crypto;

/// Derives the 16-byte ECB decryption key for a known firmware entry:
/// `md5(logic_check(latest_fw_version, logic_value_factory))`.
///
/// A second derivation (`md5("<region>:<model>:<version>")`) exists for
/// legacy files but isn't needed by this pipeline; see the firmware's own
/// `logic_value_factory` path above.
pub fn derive_decryption_key(latest_fw_version: &str, logic_value_factory: &str) -> Result<[u8; 16]> {
    let logic = crypto::logic_check(latest_fw_version, logic_value_factory)?;
    Ok(crypto::md5_digest(logic.as_bytes()))
}

/// Decrypts `enc_path` into `out_path` using AES-ECB with `key`, honoring
/// `cancelled` before each block read and reporting `(bytes_read,
/// total_bytes)` progress after every block.
pub fn decrypt_file(
    enc_path: &Path,
    out_path: &Path,
    key: &[u8; 16],
    mut on_progress: impl FnMut(u64, u64),
    mut cancelled: impl FnMut() -> bool,
) -> Result<()> {
    let total_bytes = std::fs::metadata(enc_path)?.len();
    if total_bytes % 16 != 0 {
        return Err(AcquireError::InvalidBlockSize);
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let reader = BufReader::new(File::open(enc_path)?);
    let writer = BufWriter::new(File::create(out_path)?);

    crypto::aes_ecb_decrypt_stream(reader, writer, key, total_bytes, |read, total| {
        if cancelled() {
            return Err(crypto::CryptoError::Io(std::io::Error::new(std::io::ErrorKind::Interrupted, "cancelled")));
        }
        on_progress(read, total);
        Ok(())
    })
    .map_err(|e| match &e {
        crypto::CryptoError::Io(io_err) if io_err.kind() == std::io::ErrorKind::Interrupted => AcquireError::Cancelled,
        _ => AcquireError::Crypto(e),
    })?;

    debug!("decrypted {enc_path:?} -> {out_path:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_decryption_key_is_16_bytes_and_deterministic() {
        let a = derive_decryption_key("A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3", "abcd1234").unwrap();
        let b = derive_decryption_key("A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3", "abcd1234").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn derive_decryption_key_rejects_short_version() {
        assert!(derive_decryption_key("short", "abcd1234").is_err());
    }
}
