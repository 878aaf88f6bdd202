//! Loads `config.toml` (if present) and environment variable overrides into
//! a resolved [`samfu_core::config::Config`].

use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// The on-disk shape of `config.toml`; every field is optional so a caller
/// can override just the knobs they care about.
#[derive(Deserialize, Default)]
struct FileConfig {
    csc_filter: Option<Vec<String>>,
    auto_fusmode: Option<bool>,
    skip_home_csc: Option<bool>,
    cleanup_after_extract: Option<bool>,
    resume: Option<bool>,
    data_dir: Option<PathBuf>,
    firmware_dir: Option<PathBuf>,
    decrypted_dir: Option<PathBuf>,
}

/// Loads configuration from `path` (if it exists) layered under defaults,
/// then applies the `FIRM_DATA_DIR`/`FIRM_DECRYPT_DIR` environment overrides.
pub fn load(path: &std::path::Path) -> Result<samfu_core::config::Config> {
    let file_config = if path.exists() {
        let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        toml::from_str(&text).with_context(|| format!("parsing {path:?}"))?
    } else {
        FileConfig::default()
    };

    let data_dir = env::var("FIRM_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .or(file_config.data_dir)
        .unwrap_or_else(default_data_dir);

    let firmware_dir = file_config.firmware_dir.unwrap_or_else(|| data_dir.join("firmware"));

    let decrypted_dir = env::var("FIRM_DECRYPT_DIR")
        .ok()
        .map(PathBuf::from)
        .or(file_config.decrypted_dir)
        .unwrap_or_else(|| data_dir.join("decrypted"));

    Ok(samfu_core::config::Config {
        csc_filter: file_config.csc_filter.unwrap_or_default(),
        auto_fusmode: file_config.auto_fusmode.unwrap_or(false),
        skip_home_csc: file_config.skip_home_csc.unwrap_or(true),
        cleanup_after_extract: file_config.cleanup_after_extract.unwrap_or(false),
        resume: file_config.resume.unwrap_or(true),
        data_dir,
        firmware_dir,
        decrypted_dir,
    })
}

fn default_data_dir() -> PathBuf {
    dirs_fallback().join("samfu")
}

/// A minimal stand-in for a full `dirs`-style lookup: honors `XDG_DATA_HOME`
/// and `HOME`, falling back to the current directory as a last resort.
fn dirs_fallback() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home).join(".local/share");
    }
    PathBuf::from(".")
}
