//! The finite set of configuration knobs the core accepts from its caller.
//!
//! Parsing an on-disk `config.toml` or environment variables is a concern of
//! `samfu-cli`; this module only defines the resolved shape the pipeline
//! consumes, plus the validation `Config::validate` applies regardless of
//! where the values came from.

use std::path::PathBuf;

use thiserror::Error;

/// Resolved, validated configuration for a pipeline run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Accepted CSC (regional) codes. An empty list accepts every device.
    pub csc_filter: Vec<String>,

    /// Whether the orchestrator may drive the device into Odin mode after a
    /// successful extraction.
    pub auto_fusmode: bool,

    /// Whether to drop `HOME_CSC_*` entries during extraction.
    pub skip_home_csc: bool,

    /// Whether to remove encrypted/decrypted sources after a successful
    /// extraction.
    pub cleanup_after_extract: bool,

    /// Whether downloads resume from a `.part` file when one is present.
    pub resume: bool,

    /// Root directory for application data (database, logs).
    pub data_dir: PathBuf,

    /// Directory encrypted firmware artifacts are written to.
    pub firmware_dir: PathBuf,

    /// Directory decrypted/extracted artifacts are written to.
    pub decrypted_dir: PathBuf,
}

/// Errors raised by configuration collaborators (e.g. `samfu-cli`'s
/// `config.toml` loader) and surfaced, unmodified, through the core.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration field was absent.
    #[error("missing required configuration field: {0}")]
    MissingField(String),

    /// A configuration field had a value that could not be used.
    #[error("invalid value for configuration field {field}: {reason}")]
    InvalidValue {
        /// The offending field's name.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl Config {
    /// Checks whether `csc` is accepted by [`Self::csc_filter`].
    ///
    /// An empty filter accepts all codes. Comparison is case-insensitive.
    pub fn accepts_csc(&self, csc: &str) -> bool {
        self.csc_filter.is_empty()
            || self
                .csc_filter
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(csc))
    }

    /// The path to the SQLite database file under [`Self::data_dir`].
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("firmware.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            csc_filter: vec![],
            auto_fusmode: true,
            skip_home_csc: true,
            cleanup_after_extract: false,
            resume: true,
            data_dir: PathBuf::from("/tmp/samfu-data"),
            firmware_dir: PathBuf::from("/tmp/samfu-data/firmware"),
            decrypted_dir: PathBuf::from("/tmp/samfu-data/decrypted"),
        }
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let cfg = base_config();
        assert!(cfg.accepts_csc("XAA"));
        assert!(cfg.accepts_csc("eux"));
    }

    #[test]
    fn non_empty_filter_matches_case_insensitively() {
        let mut cfg = base_config();
        cfg.csc_filter = vec!["EUX".to_string(), "DBT".to_string()];
        assert!(cfg.accepts_csc("eux"));
        assert!(!cfg.accepts_csc("XAA"));
    }
}
