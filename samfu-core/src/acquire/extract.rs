//! ZIP enumeration and selective extraction with per-file checksums.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use log::{debug, info};
use zip::ZipArchive;

use super::error::{AcquireError, Result};
use crate::{crypto, repo::{ComponentRecord, Store}};

/// Extracts `zip_path` into a sibling directory named after its stem.
///
/// `skip_member` is consulted per entry (e.g. to drop `HOME_CSC_*` files);
/// `cancelled` is polled before each member. On success every top-level
/// regular file in the output directory is checksummed and recorded as a
/// [`ComponentRecord`] against `version_code`, and the firmware row's
/// `extracted` flag is set.
#[allow(clippy::too_many_arguments)]
pub fn extract(
    store: &mut Store,
    version_code: &str,
    zip_path: &Path,
    mut on_progress: impl FnMut(&str, usize, usize),
    mut skip_member: impl FnMut(&str) -> bool,
    mut cancelled: impl FnMut() -> bool,
) -> Result<PathBuf> {
    let out_dir = output_dir_for(zip_path);
    fs::create_dir_all(&out_dir)?;

    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| AcquireError::BadZip(e.to_string()))?;

    let total = archive.len();
    let mut extracted_count = 0;

    for i in 0..total {
        if cancelled() {
            return Err(AcquireError::Cancelled);
        }

        let mut entry = archive.by_index(i).map_err(|e| AcquireError::BadZip(e.to_string()))?;
        let name = entry.name().to_string();

        if skip_member(&name) {
            continue;
        }

        let dest = out_dir.join(sanitize_member_name(&name));
        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out_file = File::create(&dest)?;
        io::copy(&mut entry, &mut out_file)?;

        extracted_count += 1;
        on_progress("extract", extracted_count, total);
    }

    debug!("extracted {extracted_count}/{total} members of {zip_path:?} to {out_dir:?}");

    checksum_output(store, version_code, &out_dir, &mut on_progress, &mut cancelled)?;

    store.update_firmware_status(
        version_code,
        crate::repo::FirmwareStatusUpdate { extracted: Some(true), ..Default::default() },
    )?;

    info!("marked {version_code} as extracted");
    Ok(out_dir)
}

fn checksum_output(
    store: &mut Store,
    version_code: &str,
    out_dir: &Path,
    on_progress: &mut impl FnMut(&str, usize, usize),
    cancelled: &mut impl FnMut() -> bool,
) -> Result<()> {
    let mut files: Vec<PathBuf> = fs::read_dir(out_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let total = files.len();
    for (i, path) in files.iter().enumerate() {
        if cancelled() {
            return Err(AcquireError::Cancelled);
        }

        let md5sum = crypto::md5_of_file(path)?;
        let size_bytes = fs::metadata(path)?.len();
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();

        store.upsert_component(&ComponentRecord {
            version_code: version_code.to_string(),
            filename,
            size_bytes,
            md5sum,
        })?;

        on_progress("checksum", i + 1, total);
    }

    Ok(())
}

/// Removes the encrypted and decrypted source files for a firmware entry,
/// used after a successful extraction+checksum pass when cleanup was
/// requested.
pub fn cleanup_sources(enc_path: &Path, decrypted_path: &Path) -> Result<()> {
    if enc_path.exists() {
        fs::remove_file(enc_path)?;
    }
    if decrypted_path.exists() {
        fs::remove_file(decrypted_path)?;
    }
    Ok(())
}

fn output_dir_for(zip_path: &Path) -> PathBuf {
    let stem = zip_path.file_stem().and_then(|s| s.to_str()).unwrap_or("extracted");
    zip_path.with_file_name(stem)
}

/// Strips any parent-directory components from a ZIP member's name so a
/// malicious archive can't write outside `out_dir`.
fn sanitize_member_name(name: &str) -> PathBuf {
    Path::new(name).components().filter(|c| matches!(c, std::path::Component::Normal(_))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_strips_extension() {
        let out = output_dir_for(Path::new("/tmp/decrypted/A146P.zip"));
        assert_eq!(out, Path::new("/tmp/decrypted/A146P"));
    }

    #[test]
    fn sanitize_strips_parent_dir_components() {
        let sanitized = sanitize_member_name("../../etc/passwd");
        assert_eq!(sanitized, Path::new("etc/passwd"));
    }
}
