//! Resumable, cancellable streaming download of an encrypted firmware blob.

use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Write},
    path::Path,
};

use log::{debug, info};

use super::error::{AcquireError, Result};
use crate::fus::FusClient;

/// Default chunk size: large enough to amortize syscall overhead, small
/// enough that cancellation reacts in well under a second at typical
/// bandwidths.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// A download's source location on the FUS cloud.
#[derive(Clone, Debug)]
pub struct RemoteBinary<'a> {
    pub path: &'a str,
    pub filename: &'a str,
    pub expected_size: u64,
}

/// Downloads `remote` into `enc_path`, resuming from a `.part` sibling file
/// if `resume` is set and one exists.
///
/// `on_progress(written, expected)` is called after every chunk is written.
/// `cancelled` is polled before each chunk; when it returns `true` the
/// `.part` file is left in place (so a later call with `resume = true` picks
/// up where this one stopped) and [`AcquireError::Cancelled`] is returned.
pub fn download(
    client: &mut FusClient,
    remote: &RemoteBinary<'_>,
    enc_path: &Path,
    resume: bool,
    mut on_progress: impl FnMut(u64, u64),
    mut cancelled: impl FnMut() -> bool,
) -> Result<()> {
    if let Some(parent) = enc_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let part_path = part_path_for(enc_path);
    let start = if resume && part_path.exists() { fs::metadata(&part_path)?.len() } else { 0 };

    if start > 0 {
        info!("resuming download of {:?} from byte {start}", remote.filename);
    }

    let mut response = client.stream(&format!("{}{}", remote.path, remote.filename), start)?;

    let mut file = if start > 0 {
        OpenOptions::new().append(true).open(&part_path)?
    } else {
        File::create(&part_path)?
    };

    let mut written = start;
    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];

    loop {
        if cancelled() {
            return Err(AcquireError::Cancelled);
        }

        let n = response.read(&mut buf)?;
        if n == 0 {
            break;
        }

        file.write_all(&buf[..n])?;
        written += n as u64;
        on_progress(written, remote.expected_size);
    }

    if written != remote.expected_size {
        return Err(AcquireError::DownloadSizeMismatch { got: written, expected: remote.expected_size });
    }

    drop(file);
    fs::rename(&part_path, enc_path)?;
    debug!("download of {:?} complete, {written} bytes", remote.filename);

    Ok(())
}

fn part_path_for(enc_path: &Path) -> std::path::PathBuf {
    let mut part = enc_path.as_os_str().to_owned();
    part.push(".part");
    part.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        let part = part_path_for(Path::new("/tmp/data/firmware.zip.enc4"));
        assert_eq!(part, Path::new("/tmp/data/firmware.zip.enc4.part"));
    }
}
