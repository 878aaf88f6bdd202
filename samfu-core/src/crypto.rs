//! Cryptographic primitives backing the FUS challenge/response exchange and
//! the ENC4 firmware container format.
//!
//! Every function here is pure: no I/O besides [`md5_of_file`], which streams
//! a file through [`md5_hex`]'s underlying digest. None of the key material
//! handled here is secret in any meaningful sense (it is embedded in every
//! shipped client and rotated server-side per request), so there is no need
//! for constant-time comparisons or zeroization.

use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
};

use aes::{Aes128, Aes192, Aes256};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit, generic_array::GenericArray};
use md5::{Digest, Md5};
use thiserror::Error;

/// The AES block size used throughout this module and the ENC4 container
/// format.
pub const BLOCK_SIZE: usize = 16;

/// The 16-entry table `derive_key` indexes into with `ord(nonce_char) % 16`.
/// Only the first 16 bytes of [`KEY_2`] ever participate in that indexing;
/// the remainder is reserved so the same constant can also serve, whole, as
/// the fixed key behind [`decrypt_nonce`].
const KEY_1: [u8; 32] = *b"hqzdurufm2c8mf6bsjezu1qgveouv7c7";

/// Appended, whole, after the 16 bytes selected from [`KEY_1`] to form the
/// 48-byte key used by [`make_signature`].
const KEY_2: [u8; 32] = *b"w13r4cvf4hctaujv9u7qab84rpc16gvk";

/// Errors raised by the cryptographic primitives in this module.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The input to a block-oriented operation was not a multiple of
    /// [`BLOCK_SIZE`] bytes.
    #[error("input length {0} is not a multiple of the AES block size")]
    InvalidBlockSize(usize),

    /// A PKCS#7-padded buffer had an invalid or missing padding trailer.
    #[error("invalid PKCS#7 padding")]
    InvalidPadding,

    /// An AES key was not 16, 24, or 32 bytes.
    #[error("invalid AES key length {0}")]
    InvalidKeyLength(usize),

    /// [`logic_check`] was called with an input shorter than 16 bytes.
    #[error("logic_check input must be at least 16 bytes, got {0}")]
    LogicCheckInputTooShort(usize),

    /// Base64 decoding of a server-supplied nonce failed.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A decrypted nonce was not valid UTF-8.
    #[error("nonce is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Underlying I/O failure while streaming a file or buffer through a
    /// cipher.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

type Result<T> = std::result::Result<T, CryptoError>;

/// Pads `data` to a multiple of [`BLOCK_SIZE`] using PKCS#7.
///
/// Always appends a full padding block when `data.len()` is already a
/// multiple of [`BLOCK_SIZE`], per the PKCS#7 definition.
pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.resize(data.len() + pad_len, pad_len as u8);
    out
}

/// Removes and validates PKCS#7 padding added by [`pkcs7_pad`].
pub fn pkcs7_unpad(data: &[u8]) -> Result<Vec<u8>> {
    let Some(&pad_len) = data.last() else {
        return Err(CryptoError::InvalidPadding);
    };
    let pad_len = pad_len as usize;

    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(CryptoError::InvalidPadding);
    }
    if !data[data.len() - pad_len..].iter().all(|&b| b as usize == pad_len) {
        return Err(CryptoError::InvalidPadding);
    }

    Ok(data[..data.len() - pad_len].to_vec())
}

/// Runs a fixed-size-key block cipher operation across `key`, dispatching to
/// AES-128/192/256 by key length, for CBC mode.
fn with_cbc_cipher<R>(
    key: &[u8],
    iv: &[u8; BLOCK_SIZE],
    encrypt: bool,
    data: &[u8],
    finish: impl FnOnce(Vec<u8>) -> R,
) -> Result<R> {
    macro_rules! run {
        ($cipher:ty) => {{
            let mut buf = data.to_vec();
            if encrypt {
                let enc = cbc::Encryptor::<$cipher>::new_from_slices(key, iv)
                    .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
                encrypt_cbc_blocks(enc, &mut buf);
            } else {
                let dec = cbc::Decryptor::<$cipher>::new_from_slices(key, iv)
                    .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
                decrypt_cbc_blocks(dec, &mut buf)?;
            }
            finish(buf)
        }};
    }

    match key.len() {
        16 => Ok(run!(Aes128)),
        24 => Ok(run!(Aes192)),
        32 => Ok(run!(Aes256)),
        other => Err(CryptoError::InvalidKeyLength(other)),
    }
}

fn encrypt_cbc_blocks<C>(mut enc: cbc::Encryptor<C>, buf: &mut [u8])
where
    C: BlockEncryptMutAlias,
{
    for chunk in buf.chunks_mut(BLOCK_SIZE) {
        let block = GenericArray::from_mut_slice(chunk);
        enc.encrypt_block_mut(block);
    }
}

fn decrypt_cbc_blocks<C>(mut dec: cbc::Decryptor<C>, buf: &mut [u8]) -> Result<()>
where
    C: BlockDecryptMutAlias,
{
    if buf.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidBlockSize(buf.len()));
    }
    for chunk in buf.chunks_mut(BLOCK_SIZE) {
        let block = GenericArray::from_mut_slice(chunk);
        dec.decrypt_block_mut(block);
    }
    Ok(())
}

use cipher::BlockEncryptMut as BlockEncryptMutAlias;
use cipher::BlockDecryptMut as BlockDecryptMutAlias;

/// Encrypts `data` with AES-CBC, PKCS#7-padding it first.
///
/// `iv = key[0..16]`; the encryption key itself is `key[16..]`, which must be
/// 16, 24, or 32 bytes. This matches the two call sites in this module:
/// [`make_signature`] passes the 48-byte output of [`derive_key`] (a 16-byte
/// IV followed by the 32-byte [`KEY_2`]), and tests exercise the primitive
/// directly with other sizes.
pub fn aes_cbc_encrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let (iv, enc_key) = split_iv(key)?;
    let padded = pkcs7_pad(data);
    with_cbc_cipher(enc_key, &iv, true, &padded, |buf| buf)
}

/// Decrypts `data` with AES-CBC and removes PKCS#7 padding.
///
/// See [`aes_cbc_encrypt`] for the `key`/IV convention.
pub fn aes_cbc_decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let (iv, enc_key) = split_iv(key)?;
    let decrypted = with_cbc_cipher(enc_key, &iv, false, data, |buf| buf)?;
    pkcs7_unpad(&decrypted)
}

fn split_iv(key: &[u8]) -> Result<([u8; BLOCK_SIZE], &[u8])> {
    if key.len() < BLOCK_SIZE {
        return Err(CryptoError::InvalidKeyLength(key.len()));
    }
    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&key[..BLOCK_SIZE]);
    Ok((iv, &key[BLOCK_SIZE..]))
}

/// Decrypts a stream of AES-ECB blocks with a 16-byte key, unpadding only the
/// final block.
///
/// `reader` must yield a number of bytes that is a multiple of
/// [`BLOCK_SIZE`]; otherwise [`CryptoError::InvalidBlockSize`] is returned.
/// Every block but the last is written out verbatim; the last block is
/// PKCS#7-unpadded before being written. Calls `on_progress(bytes_read,
/// total_bytes)` after each block so callers can report progress and check
/// for cancellation.
pub fn aes_ecb_decrypt_stream(
    mut reader: impl Read,
    mut writer: impl Write,
    key: &[u8; BLOCK_SIZE],
    total_bytes: u64,
    mut on_progress: impl FnMut(u64, u64) -> Result<()>,
) -> Result<()> {
    let cipher = Aes128::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;

    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut pending: Option<[u8; BLOCK_SIZE]> = None;
    let mut read_total: u64 = 0;

    loop {
        match read_exact_or_eof(&mut reader, &mut buf)? {
            0 => break,
            BLOCK_SIZE => {}
            n => return Err(CryptoError::InvalidBlockSize(read_total as usize + n)),
        }

        read_total += BLOCK_SIZE as u64;

        let mut block = GenericArray::clone_from_slice(&buf);
        cipher.decrypt_block(&mut block);

        if let Some(prev) = pending.take() {
            writer.write_all(&prev)?;
        }

        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&block);
        pending = Some(out);

        on_progress(read_total, total_bytes)?;
    }

    if let Some(last) = pending {
        let unpadded = pkcs7_unpad(&last)?;
        writer.write_all(&unpadded)?;
    }

    Ok(())
}

/// Reads up to `buf.len()` bytes, returning the number actually read (0 at
/// EOF, possibly less than `buf.len()` on a short final read).
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Derives the 48-byte key used to sign a plaintext nonce: 16 bytes selected
/// from [`KEY_1`] by `ord(nonce_char) % 16`, one per character of `nonce`
/// (only the first 16 characters participate), followed by the full 32 bytes
/// of [`KEY_2`].
pub fn derive_key(nonce: &str) -> [u8; 48] {
    let mut out = [0u8; 48];
    for (i, c) in nonce.chars().take(16).enumerate() {
        out[i] = KEY_1[(c as usize) % 16];
    }
    out[16..48].copy_from_slice(&KEY_2);
    out
}

/// Computes the `Authorization` header's signature field for a plaintext
/// nonce: `base64(aes_cbc_encrypt(nonce, derive_key(nonce)))`.
pub fn make_signature(nonce: &str) -> Result<String> {
    let key = derive_key(nonce);
    let encrypted = aes_cbc_encrypt(nonce.as_bytes(), &key)?;
    Ok(BASE64.encode(encrypted))
}

/// Decrypts a base64-encoded, AES-CBC-encrypted nonce as returned by the FUS
/// `NONCE` response header, using the fixed [`KEY_1`] constant as both key
/// and (via its leading 16 bytes) IV.
pub fn decrypt_nonce(b64: &str) -> Result<String> {
    let raw = BASE64.decode(b64)?;
    let decrypted = aes_cbc_decrypt(&raw, &KEY_1)?;
    Ok(String::from_utf8(decrypted)?)
}

/// Computes the `LOGIC_CHECK` value: for each character `c` of `nonce`, takes
/// `input[ord(c) & 0x0F]`.
///
/// `input` must be at least 16 bytes long, since `ord(c) & 0x0F` ranges over
/// `0..16`.
pub fn logic_check(input: &str, nonce: &str) -> Result<String> {
    let bytes = input.as_bytes();
    if bytes.len() < 16 {
        return Err(CryptoError::LogicCheckInputTooShort(bytes.len()));
    }

    Ok(nonce
        .chars()
        .map(|c| bytes[(c as usize) & 0x0F] as char)
        .collect())
}

/// Computes the lowercase hex MD5 digest of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    hex_encode(&digest)
}

/// Computes the raw 16-byte MD5 digest of `data`.
pub fn md5_digest(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

/// Streams a file through MD5 in fixed-size chunks and returns the lowercase
/// hex digest, without holding the whole file in memory.
pub fn md5_of_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{:02x}", b).unwrap();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs7_round_trips() {
        for len in 0..40 {
            let data: Vec<u8> = (0..len as u8).collect();
            let padded = pkcs7_pad(&data);
            assert_eq!(padded.len() % BLOCK_SIZE, 0);
            assert_eq!(pkcs7_unpad(&padded).unwrap(), data);
        }
    }

    #[test]
    fn pkcs7_pad_always_adds_at_least_one_byte() {
        let data = vec![0u8; 32];
        let padded = pkcs7_pad(&data);
        assert_eq!(padded.len(), 48);
    }

    #[test]
    fn pkcs7_unpad_rejects_bad_padding() {
        let bad = vec![1, 2, 3, 0];
        assert!(pkcs7_unpad(&bad).is_err());
    }

    #[test]
    fn aes_cbc_round_trips() {
        let key = derive_key("0123456789abcdef");
        let plaintext = b"hello firmware world";
        let ciphertext = aes_cbc_encrypt(plaintext, &key).unwrap();
        let decrypted = aes_cbc_decrypt(&ciphertext, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn logic_check_requires_16_bytes() {
        assert!(logic_check(&"a".repeat(16), "nonce").is_ok());
        assert!(logic_check(&"a".repeat(15), "nonce").is_err());
    }

    #[test]
    fn logic_check_is_deterministic() {
        let input = "ABCDEF0123456789";
        let nonce = "somenonce";
        assert_eq!(logic_check(input, nonce).unwrap(), logic_check(input, nonce).unwrap());
    }

    #[test]
    fn derive_key_is_48_bytes_and_deterministic() {
        let a = derive_key("AAAAAAAAAAAAAAAA");
        let b = derive_key("AAAAAAAAAAAAAAAA");
        assert_eq!(a.len(), 48);
        assert_eq!(a, b);
    }

    #[test]
    fn md5_hex_matches_known_vector() {
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn aes_ecb_decrypt_stream_rejects_non_block_multiple_input() {
        let key = [0u8; 16];
        let input = vec![0u8; 20];
        let mut out = Vec::new();
        let err = aes_ecb_decrypt_stream(&input[..], &mut out, &key, 20, |_, _| Ok(()));
        assert!(err.is_err());
    }

    #[test]
    fn aes_ecb_decrypt_stream_unpads_only_final_block() {
        let key = [0x42u8; 16];
        let cipher = Aes128::new_from_slice(&key).unwrap();

        let plain = pkcs7_pad(b"a full firmware payload!");
        assert_eq!(plain.len() % BLOCK_SIZE, 0);

        let mut encrypted = Vec::new();
        for chunk in plain.chunks(BLOCK_SIZE) {
            let mut block = GenericArray::clone_from_slice(chunk);
            cipher.encrypt_block(&mut block);
            encrypted.extend_from_slice(&block);
        }

        let mut out = Vec::new();
        aes_ecb_decrypt_stream(&encrypted[..], &mut out, &key, encrypted.len() as u64, |_, _| Ok(())).unwrap();
        assert_eq!(out, b"a full firmware payload!");
    }
}
