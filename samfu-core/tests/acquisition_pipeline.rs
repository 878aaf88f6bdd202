//! Exercises the decrypt → extract half of the acquisition pipeline against
//! a synthetic ENC4 container, independent of any network transport.

use std::{
    io::Write,
    time::SystemTime,
};

use aes::Aes128;
use cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};
use samfu_core::{
    acquire::{decrypt, extract},
    repo::{FirmwareRecord, Store},
};
use zip::{ZipWriter, write::SimpleFileOptions};

fn encrypt_ecb(plaintext: &[u8], key: &[u8; 16]) -> Vec<u8> {
    let cipher = Aes128::new_from_slice(key).unwrap();
    let mut padded = plaintext.to_vec();
    let pad_len = 16 - (padded.len() % 16);
    padded.extend(std::iter::repeat(pad_len as u8).take(pad_len));

    let mut out = Vec::with_capacity(padded.len());
    for chunk in padded.chunks(16) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.encrypt_block(&mut block);
        out.extend_from_slice(&block);
    }
    out
}

fn build_fixture_zip() -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut buf);
        let opts = SimpleFileOptions::default();
        writer.start_file("AP_A146PXXS6CXK3.tar.md5", opts).unwrap();
        writer.write_all(b"ap-partition-bytes").unwrap();
        writer.start_file("HOME_CSC_A146POXM6CXK3.tar.md5", opts).unwrap();
        writer.write_all(b"home-csc-bytes").unwrap();
        writer.finish().unwrap();
    }
    buf.into_inner()
}

#[test]
fn decrypt_then_extract_drops_home_csc_and_records_components() {
    let dir = tempfile::tempdir().unwrap();
    let version_code = "A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3";

    let key = decrypt::derive_decryption_key(version_code, "abcd1234efgh5678").unwrap();
    let plaintext = build_fixture_zip();
    let ciphertext = encrypt_ecb(&plaintext, &key);

    let enc_path = dir.path().join("firmware.zip.enc4");
    let zip_path = dir.path().join("firmware.zip");
    std::fs::write(&enc_path, &ciphertext).unwrap();

    decrypt::decrypt_file(&enc_path, &zip_path, &key, |_, _| {}, || false).unwrap();
    assert_eq!(std::fs::read(&zip_path).unwrap(), plaintext);

    let mut store = Store::open_in_memory().unwrap();
    store
        .upsert_firmware(&FirmwareRecord {
            version_code: version_code.to_string(),
            filename: "firmware.zip.enc4".to_string(),
            path: "/binary/path/".to_string(),
            size_bytes: ciphertext.len() as u64,
            logic_value_factory: "abcd1234efgh5678".to_string(),
            latest_fw_version: version_code.to_string(),
            downloaded: true,
            decrypted: true,
            extracted: false,
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        })
        .unwrap();

    let out_dir = extract::extract(
        &mut store,
        version_code,
        &zip_path,
        |_, _, _| {},
        |name| name.starts_with("HOME_CSC_"),
        || false,
    )
    .unwrap();

    assert!(out_dir.join("AP_A146PXXS6CXK3.tar.md5").exists());
    assert!(!out_dir.join("HOME_CSC_A146POXM6CXK3.tar.md5").exists());

    let components = store.list_components(version_code).unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].filename, "AP_A146PXXS6CXK3.tar.md5");

    let rec = store.find_firmware(version_code).unwrap().unwrap();
    assert!(rec.extracted);
}

#[test]
fn decrypt_rejects_a_container_not_aligned_to_the_block_size() {
    let dir = tempfile::tempdir().unwrap();
    let enc_path = dir.path().join("bad.enc4");
    let out_path = dir.path().join("bad.zip");
    std::fs::write(&enc_path, b"not sixteen aligned bytes!").unwrap();

    let key = [0u8; 16];
    let err = decrypt::decrypt_file(&enc_path, &out_path, &key, |_, _| {}, || false).unwrap_err();
    assert!(matches!(err, samfu_core::acquire::AcquireError::InvalidBlockSize));
}

#[test]
fn decrypt_is_cancellable_mid_stream() {
    let dir = tempfile::tempdir().unwrap();
    let version_code = "A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3";
    let key = decrypt::derive_decryption_key(version_code, "abcd1234efgh5678").unwrap();

    let plaintext = vec![0x42u8; 64];
    let ciphertext = encrypt_ecb(&plaintext, &key);
    let enc_path = dir.path().join("firmware.zip.enc4");
    let out_path = dir.path().join("firmware.zip");
    std::fs::write(&enc_path, &ciphertext).unwrap();

    let err = decrypt::decrypt_file(&enc_path, &out_path, &key, |_, _| {}, || true).unwrap_err();
    assert!(matches!(err, samfu_core::acquire::AcquireError::Cancelled));
}
