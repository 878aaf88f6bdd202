//! Persistent record types stored in the repository database.

use std::time::SystemTime;

/// A tracked firmware entry, keyed by its normalized version code.
#[derive(Clone, PartialEq, Debug)]
pub struct FirmwareRecord {
    pub version_code: String,
    pub filename: String,
    pub path: String,
    pub size_bytes: u64,
    pub logic_value_factory: String,
    pub latest_fw_version: String,
    pub downloaded: bool,
    pub decrypted: bool,
    pub extracted: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// Partial update applied by [`super::update_firmware_status`]; `None`
/// fields are left untouched.
#[derive(Clone, Copy, Default, Debug)]
pub struct FirmwareStatusUpdate {
    pub downloaded: Option<bool>,
    pub decrypted: Option<bool>,
    pub extracted: Option<bool>,
}

impl FirmwareStatusUpdate {
    /// Whether this update changes anything at all.
    pub fn is_empty(&self) -> bool {
        self.downloaded.is_none() && self.decrypted.is_none() && self.extracted.is_none()
    }
}

/// A single extracted file belonging to a firmware entry.
#[derive(Clone, PartialEq, Debug)]
pub struct ComponentRecord {
    pub version_code: String,
    pub filename: String,
    pub size_bytes: u64,
    pub md5sum: String,
}

/// FUS outcome recorded against a device session, one row per `(session_id,
/// imei)` pair.
#[derive(Clone, PartialEq, Debug)]
pub enum FusStatus {
    Unknown,
    Ok,
    Error,
    Denied,
    Unauthorized,
    Throttled,
}

impl FusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Denied => "denied",
            Self::Unauthorized => "unauthorized",
            Self::Throttled => "throttled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "unknown" => Self::Unknown,
            "ok" => Self::Ok,
            "error" => Self::Error,
            "denied" => Self::Denied,
            "unauthorized" => Self::Unauthorized,
            "throttled" => Self::Throttled,
            _ => return None,
        })
    }
}

/// Upgrade pipeline outcome recorded against a device session.
#[derive(Clone, PartialEq, Debug)]
pub enum UpgradeStatus {
    Queued,
    InProgress,
    Ok,
    Failed,
    Skipped,
    Unknown,
}

impl UpgradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "ok" => Self::Ok,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            "unknown" => Self::Unknown,
            _ => return None,
        })
    }
}

/// A row in `imei_log`, tracking one device session's FUS/upgrade outcome.
#[derive(Clone, PartialEq, Debug)]
pub struct AuditEvent {
    pub id: i64,
    pub session_id: String,
    pub imei: String,
    pub model: String,
    pub csc: String,
    pub version_code: String,
    pub fota_version: Option<String>,
    pub serial_number: Option<String>,
    pub lock_status: Option<String>,
    pub aid: Option<String>,
    pub cc: Option<String>,
    pub status_fus: FusStatus,
    pub status_upgrade: UpgradeStatus,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub upgrade_at: Option<SystemTime>,
}

/// A new audit row to be upserted, before the store assigns `id` and
/// timestamps.
#[derive(Clone, Debug)]
pub struct NewAuditEvent {
    pub session_id: String,
    pub imei: String,
    pub model: String,
    pub csc: String,
    pub version_code: String,
    pub fota_version: Option<String>,
    pub serial_number: Option<String>,
    pub lock_status: Option<String>,
    pub aid: Option<String>,
    pub cc: Option<String>,
    pub status_fus: FusStatus,
    pub status_upgrade: UpgradeStatus,
}

/// Summary counters emitted while [`super::cleanup_repository`] runs.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct ReconciliationProgress {
    pub processed: usize,
    pub total: usize,
    pub missing: usize,
    pub deleted: usize,
    pub decrypted_deleted: usize,
}
