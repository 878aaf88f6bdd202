//! Exercises the repository store's lifecycle invariants end-to-end: the
//! monotonic firmware flags, component bookkeeping, and startup
//! reconciliation, against a temporary on-disk database and directory tree.

use std::time::SystemTime;

use samfu_core::repo::{ComponentRecord, FirmwareRecord, FirmwareStatusUpdate, Store};

fn sample(version_code: &str) -> FirmwareRecord {
    let now = SystemTime::now();
    FirmwareRecord {
        version_code: version_code.to_string(),
        filename: "A146PXXS6CXK3.zip.enc4".to_string(),
        path: "/binary/path/".to_string(),
        size_bytes: 3_221_225_472,
        logic_value_factory: "ABCDEF0123456789".to_string(),
        latest_fw_version: version_code.to_string(),
        downloaded: false,
        decrypted: false,
        extracted: false,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn lifecycle_flags_only_transition_forward_within_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(&dir.path().join("firmware.db")).unwrap();

    let version_code = "A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3";
    store.upsert_firmware(&sample(version_code)).unwrap();

    store
        .update_firmware_status(version_code, FirmwareStatusUpdate { downloaded: Some(true), ..Default::default() })
        .unwrap();
    store
        .update_firmware_status(version_code, FirmwareStatusUpdate { decrypted: Some(true), ..Default::default() })
        .unwrap();
    store
        .update_firmware_status(version_code, FirmwareStatusUpdate { extracted: Some(true), ..Default::default() })
        .unwrap();

    let rec = store.find_firmware(version_code).unwrap().unwrap();
    assert!(rec.downloaded && rec.decrypted && rec.extracted);
}

#[test]
fn components_are_recorded_against_their_owning_version() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(&dir.path().join("firmware.db")).unwrap();

    let version_code = "A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3";
    store.upsert_firmware(&sample(version_code)).unwrap();

    for name in ["AP_A146PXXS6CXK3.tar.md5", "BL_A146PXXS6CXK3.tar.md5", "CSC_OXM_A146POXM6CXK3.tar.md5"] {
        store
            .upsert_component(&ComponentRecord {
                version_code: version_code.to_string(),
                filename: name.to_string(),
                size_bytes: 1024,
                md5sum: "deadbeefdeadbeefdeadbeefdeadbeef".to_string(),
            })
            .unwrap();
    }

    let components = store.list_components(version_code).unwrap();
    assert_eq!(components.len(), 3);
}

#[test]
fn startup_reconciliation_matches_seed_scenario_six() {
    let dir = tempfile::tempdir().unwrap();
    let firmware_dir = dir.path().join("firmware");
    let decrypted_dir = dir.path().join("decrypted");
    std::fs::create_dir_all(&firmware_dir).unwrap();
    std::fs::create_dir_all(&decrypted_dir).unwrap();

    let mut store = Store::open(&dir.path().join("firmware.db")).unwrap();

    let present = sample("AAA/BBB/CCC/AAA");
    std::fs::write(firmware_dir.join(&present.filename), b"encrypted bytes").unwrap();
    store.upsert_firmware(&present).unwrap();

    let mut missing = sample("DDD/EEE/FFF/DDD");
    missing.filename = "orphan.zip.enc4".to_string();
    store.upsert_firmware(&missing).unwrap();
    std::fs::write(decrypted_dir.join("orphan.zip"), b"decrypted bytes").unwrap();

    let progress = store.cleanup_repository(&firmware_dir, &decrypted_dir, |_| {}).unwrap();

    assert_eq!(progress.total, 2);
    assert_eq!(progress.missing, 1);
    assert_eq!(progress.deleted, 1);
    assert_eq!(progress.decrypted_deleted, 1);

    assert!(store.find_firmware("AAA/BBB/CCC/AAA").unwrap().is_some());
    assert!(store.find_firmware("DDD/EEE/FFF/DDD").unwrap().is_none());
    assert!(!decrypted_dir.join("orphan.zip").exists());
}
