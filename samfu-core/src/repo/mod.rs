//! The SQLite-backed repository store: firmware lifecycle tracking,
//! extracted components, and per-device audit events.

pub mod error;
pub mod models;

use std::{
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, params};

pub use error::RepoError;
use error::Result;
pub use models::{
    AuditEvent, ComponentRecord, FirmwareRecord, FirmwareStatusUpdate, FusStatus, NewAuditEvent,
    ReconciliationProgress, UpgradeStatus,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS firmware (
    id INTEGER PRIMARY KEY,
    version_code TEXT NOT NULL UNIQUE CHECK (length(version_code) - length(replace(version_code, '/', '')) = 3),
    filename TEXT NOT NULL,
    path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL CHECK (size_bytes > 0),
    logic_value_factory TEXT NOT NULL,
    latest_fw_version TEXT NOT NULL,
    downloaded INTEGER NOT NULL DEFAULT 0,
    decrypted INTEGER NOT NULL DEFAULT 0,
    extracted INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS firmware_updated_at
AFTER UPDATE ON firmware
BEGIN
    UPDATE firmware SET updated_at = strftime('%s', 'now') WHERE id = NEW.id;
END;

CREATE TABLE IF NOT EXISTS components (
    version_code TEXT NOT NULL,
    filename TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    md5sum TEXT NOT NULL,
    PRIMARY KEY (version_code, filename)
);

CREATE TABLE IF NOT EXISTS imei_log (
    id INTEGER PRIMARY KEY,
    session_id TEXT NOT NULL,
    imei TEXT NOT NULL,
    model TEXT NOT NULL,
    csc TEXT NOT NULL CHECK (length(csc) BETWEEN 3 AND 5),
    version_code TEXT NOT NULL,
    fota_version TEXT,
    serial_number TEXT,
    lock_status TEXT,
    aid TEXT,
    cc TEXT,
    status_fus TEXT NOT NULL,
    status_upgrade TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    upgrade_at INTEGER,
    UNIQUE (session_id, imei)
);
"#;

/// A handle to the firmware repository database.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if absent) the database at `path`, enables WAL
    /// journaling, and applies the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_millis(5000))?;
        conn.execute_batch(SCHEMA)?;

        debug!("opened repository store at {path:?}");
        Ok(Self { conn })
    }

    /// Opens an in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Inserts a new firmware row, or updates the existing one with the
    /// same `version_code`.
    pub fn upsert_firmware(&mut self, rec: &FirmwareRecord) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO firmware (
                version_code, filename, path, size_bytes, logic_value_factory,
                latest_fw_version, downloaded, decrypted, extracted, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            ON CONFLICT(version_code) DO UPDATE SET
                filename = excluded.filename,
                path = excluded.path,
                size_bytes = excluded.size_bytes,
                logic_value_factory = excluded.logic_value_factory,
                latest_fw_version = excluded.latest_fw_version,
                downloaded = excluded.downloaded,
                decrypted = excluded.decrypted,
                extracted = excluded.extracted",
            params![
                rec.version_code,
                rec.filename,
                rec.path,
                rec.size_bytes as i64,
                rec.logic_value_factory,
                rec.latest_fw_version,
                rec.downloaded as i64,
                rec.decrypted as i64,
                rec.extracted as i64,
                to_unix(rec.created_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Looks up a firmware row by its normalized version code.
    pub fn find_firmware(&self, version_code: &str) -> Result<Option<FirmwareRecord>> {
        self.conn
            .query_row(
                "SELECT version_code, filename, path, size_bytes, logic_value_factory,
                        latest_fw_version, downloaded, decrypted, extracted, created_at, updated_at
                 FROM firmware WHERE version_code = ?1",
                params![version_code],
                row_to_firmware,
            )
            .optional()
            .map_err(RepoError::from)
    }

    /// Lists firmware rows ordered by newest first, optionally bounded to
    /// `limit` rows.
    pub fn list_firmware(&self, limit: Option<u32>) -> Result<Vec<FirmwareRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT version_code, filename, path, size_bytes, logic_value_factory,
                    latest_fw_version, downloaded, decrypted, extracted, created_at, updated_at
             FROM firmware ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit.unwrap_or(u32::MAX)], row_to_firmware)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Applies a partial status update to a firmware row. Rejects updates
    /// that touch nothing.
    pub fn update_firmware_status(&mut self, version_code: &str, update: FirmwareStatusUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(RepoError::EmptyStatusUpdate);
        }

        let tx = self.conn.transaction()?;

        if let Some(v) = update.downloaded {
            tx.execute("UPDATE firmware SET downloaded = ?1 WHERE version_code = ?2", params![v as i64, version_code])?;
        }
        if let Some(v) = update.decrypted {
            tx.execute("UPDATE firmware SET decrypted = ?1 WHERE version_code = ?2", params![v as i64, version_code])?;
        }
        if let Some(v) = update.extracted {
            tx.execute("UPDATE firmware SET extracted = ?1 WHERE version_code = ?2", params![v as i64, version_code])?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Deletes a firmware row by version code. A no-op (not an error) if it
    /// doesn't exist.
    pub fn delete_firmware(&mut self, version_code: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM firmware WHERE version_code = ?1", params![version_code])?;
        tx.commit()?;
        Ok(())
    }

    /// Inserts or replaces an extracted component entry.
    pub fn upsert_component(&mut self, rec: &ComponentRecord) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO components (version_code, filename, size_bytes, md5sum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(version_code, filename) DO UPDATE SET
                size_bytes = excluded.size_bytes,
                md5sum = excluded.md5sum",
            params![rec.version_code, rec.filename, rec.size_bytes as i64, rec.md5sum],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Lists every component recorded for a firmware version.
    pub fn list_components(&self, version_code: &str) -> Result<Vec<ComponentRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT version_code, filename, size_bytes, md5sum FROM components WHERE version_code = ?1")?;
        let rows = stmt.query_map(params![version_code], |row| {
            Ok(ComponentRecord {
                version_code: row.get(0)?,
                filename: row.get(1)?,
                size_bytes: row.get::<_, i64>(2)? as u64,
                md5sum: row.get(3)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Inserts a new audit row, or updates the mutable fields of the
    /// existing one keyed by `(session_id, imei)`.
    pub fn upsert_imei_event(&mut self, event: &NewAuditEvent) -> Result<()> {
        let now = to_unix(SystemTime::now());
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO imei_log (
                session_id, imei, model, csc, version_code, fota_version, serial_number,
                lock_status, aid, cc, status_fus, status_upgrade, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            ON CONFLICT(session_id, imei) DO UPDATE SET
                model = excluded.model,
                csc = excluded.csc,
                version_code = excluded.version_code,
                fota_version = excluded.fota_version,
                serial_number = excluded.serial_number,
                lock_status = excluded.lock_status,
                aid = excluded.aid,
                cc = excluded.cc,
                status_fus = excluded.status_fus,
                status_upgrade = excluded.status_upgrade,
                updated_at = excluded.updated_at",
            params![
                event.session_id,
                event.imei,
                event.model,
                event.csc,
                event.version_code,
                event.fota_version,
                event.serial_number,
                event.lock_status,
                event.aid,
                event.cc,
                event.status_fus.as_str(),
                event.status_upgrade.as_str(),
                now,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Finds every audit row for a given IMEI, newest first.
    pub fn find_by_imei(&self, imei: &str) -> Result<Vec<AuditEvent>> {
        let mut stmt = self.conn.prepare(&format!("{AUDIT_SELECT} WHERE imei = ?1 ORDER BY created_at DESC"))?;
        let rows = stmt.query_map(params![imei], row_to_audit)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Finds audit rows for `(model, csc)`, optionally bounded to rows
    /// created at or after `since`.
    pub fn find_by_model_csc(&self, model: &str, csc: &str, since: Option<SystemTime>) -> Result<Vec<AuditEvent>> {
        let since_secs = since.map(to_unix).unwrap_or(0);
        let mut stmt = self.conn.prepare(&format!(
            "{AUDIT_SELECT} WHERE model = ?1 AND csc = ?2 AND created_at >= ?3 ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![model, csc, since_secs], row_to_audit)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Walks every firmware row and checks `firmware_dir/filename` still
    /// exists on disk. Missing files (and their decrypted sibling, if any)
    /// are removed; this is the only path that implicitly deletes rows.
    pub fn cleanup_repository(
        &mut self,
        firmware_dir: &Path,
        decrypted_dir: &Path,
        mut on_progress: impl FnMut(ReconciliationProgress),
    ) -> Result<ReconciliationProgress> {
        let rows = self.list_firmware(None)?;
        let mut progress = ReconciliationProgress { total: rows.len(), ..Default::default() };

        for rec in rows {
            progress.processed += 1;

            let encrypted_path = firmware_dir.join(&rec.filename);
            if !encrypted_path.exists() {
                progress.missing += 1;

                let decrypted_name = rec.filename.strip_suffix(".enc4").unwrap_or(&rec.filename);
                let decrypted_path = decrypted_dir.join(decrypted_name);
                if decrypted_path.exists() {
                    if let Err(e) = std::fs::remove_file(&decrypted_path) {
                        warn!("failed to remove stale decrypted file {decrypted_path:?}: {e}");
                    } else {
                        progress.decrypted_deleted += 1;
                    }
                }

                self.delete_firmware(&rec.version_code)?;
                progress.deleted += 1;
            }

            on_progress(progress);
        }

        info!(
            "reconciliation complete: {}/{} processed, {} missing, {} deleted",
            progress.processed, progress.total, progress.missing, progress.deleted
        );
        Ok(progress)
    }
}

const AUDIT_SELECT: &str = "SELECT id, session_id, imei, model, csc, version_code, fota_version, serial_number,
        lock_status, aid, cc, status_fus, status_upgrade, created_at, updated_at, upgrade_at FROM imei_log";

fn row_to_firmware(row: &rusqlite::Row<'_>) -> rusqlite::Result<FirmwareRecord> {
    Ok(FirmwareRecord {
        version_code: row.get(0)?,
        filename: row.get(1)?,
        path: row.get(2)?,
        size_bytes: row.get::<_, i64>(3)? as u64,
        logic_value_factory: row.get(4)?,
        latest_fw_version: row.get(5)?,
        downloaded: row.get::<_, i64>(6)? != 0,
        decrypted: row.get::<_, i64>(7)? != 0,
        extracted: row.get::<_, i64>(8)? != 0,
        created_at: from_unix(row.get(9)?),
        updated_at: from_unix(row.get(10)?),
    })
}

fn row_to_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    Ok(AuditEvent {
        id: row.get(0)?,
        session_id: row.get(1)?,
        imei: row.get(2)?,
        model: row.get(3)?,
        csc: row.get(4)?,
        version_code: row.get(5)?,
        fota_version: row.get(6)?,
        serial_number: row.get(7)?,
        lock_status: row.get(8)?,
        aid: row.get(9)?,
        cc: row.get(10)?,
        status_fus: FusStatus::parse(&row.get::<_, String>(11)?).unwrap_or(FusStatus::Unknown),
        status_upgrade: UpgradeStatus::parse(&row.get::<_, String>(12)?).unwrap_or(UpgradeStatus::Unknown),
        created_at: from_unix(row.get(13)?),
        updated_at: from_unix(row.get(14)?),
        upgrade_at: row.get::<_, Option<i64>>(15)?.map(from_unix),
    })
}

fn to_unix(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn from_unix(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_firmware(version_code: &str) -> FirmwareRecord {
        FirmwareRecord {
            version_code: version_code.to_string(),
            filename: format!("{}.zip.enc4", version_code.replace('/', "_")),
            path: "/binary/path/".to_string(),
            size_bytes: 1024,
            logic_value_factory: "abcd1234".to_string(),
            latest_fw_version: version_code.to_string(),
            downloaded: true,
            decrypted: false,
            extracted: false,
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    #[test]
    fn upsert_and_find_round_trips() {
        let mut store = Store::open_in_memory().unwrap();
        let rec = sample_firmware("AAA/BBB/CCC/DDD");
        store.upsert_firmware(&rec).unwrap();

        let found = store.find_firmware("AAA/BBB/CCC/DDD").unwrap().unwrap();
        assert_eq!(found.filename, rec.filename);
        assert!(found.downloaded);
        assert!(!found.decrypted);
    }

    #[test]
    fn upsert_is_idempotent_by_version_code() {
        let mut store = Store::open_in_memory().unwrap();
        let mut rec = sample_firmware("AAA/BBB/CCC/DDD");
        store.upsert_firmware(&rec).unwrap();

        rec.decrypted = true;
        store.upsert_firmware(&rec).unwrap();

        let all = store.list_firmware(None).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].decrypted);
    }

    #[test]
    fn empty_status_update_is_rejected() {
        let mut store = Store::open_in_memory().unwrap();
        let rec = sample_firmware("AAA/BBB/CCC/DDD");
        store.upsert_firmware(&rec).unwrap();

        let err = store.update_firmware_status("AAA/BBB/CCC/DDD", FirmwareStatusUpdate::default()).unwrap_err();
        assert!(matches!(err, RepoError::EmptyStatusUpdate));
    }

    #[test]
    fn partial_status_update_only_touches_named_fields() {
        let mut store = Store::open_in_memory().unwrap();
        let rec = sample_firmware("AAA/BBB/CCC/DDD");
        store.upsert_firmware(&rec).unwrap();

        store
            .update_firmware_status(
                "AAA/BBB/CCC/DDD",
                FirmwareStatusUpdate { decrypted: Some(true), ..Default::default() },
            )
            .unwrap();

        let found = store.find_firmware("AAA/BBB/CCC/DDD").unwrap().unwrap();
        assert!(found.downloaded);
        assert!(found.decrypted);
        assert!(!found.extracted);
    }

    #[test]
    fn component_upsert_and_list() {
        let mut store = Store::open_in_memory().unwrap();
        let rec = sample_firmware("AAA/BBB/CCC/DDD");
        store.upsert_firmware(&rec).unwrap();

        store
            .upsert_component(&ComponentRecord {
                version_code: "AAA/BBB/CCC/DDD".to_string(),
                filename: "modem.bin".to_string(),
                size_bytes: 2048,
                md5sum: "deadbeef".to_string(),
            })
            .unwrap();

        let components = store.list_components("AAA/BBB/CCC/DDD").unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].filename, "modem.bin");
    }

    #[test]
    fn imei_event_upsert_is_keyed_by_session_and_imei() {
        let mut store = Store::open_in_memory().unwrap();
        let event = NewAuditEvent {
            session_id: "sess-1".to_string(),
            imei: "123456789012345".to_string(),
            model: "SM-A146P".to_string(),
            csc: "EUX".to_string(),
            version_code: "AAA/BBB/CCC/DDD".to_string(),
            fota_version: None,
            serial_number: None,
            lock_status: None,
            aid: None,
            cc: None,
            status_fus: FusStatus::Unknown,
            status_upgrade: UpgradeStatus::Queued,
        };
        store.upsert_imei_event(&event).unwrap();
        store.upsert_imei_event(&event).unwrap();

        let rows = store.find_by_imei("123456789012345").unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn reconciliation_removes_rows_whose_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let firmware_dir = dir.path().join("firmware");
        let decrypted_dir = dir.path().join("decrypted");
        std::fs::create_dir_all(&firmware_dir).unwrap();
        std::fs::create_dir_all(&decrypted_dir).unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let rec = sample_firmware("AAA/BBB/CCC/DDD");
        store.upsert_firmware(&rec).unwrap();

        let progress = store.cleanup_repository(&firmware_dir, &decrypted_dir, |_| {}).unwrap();

        assert_eq!(progress.total, 1);
        assert_eq!(progress.missing, 1);
        assert_eq!(progress.deleted, 1);
        assert!(store.find_firmware("AAA/BBB/CCC/DDD").unwrap().is_none());
    }

    #[test]
    fn reconciliation_is_a_fixed_point_when_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let firmware_dir = dir.path().join("firmware");
        let decrypted_dir = dir.path().join("decrypted");
        std::fs::create_dir_all(&firmware_dir).unwrap();
        std::fs::create_dir_all(&decrypted_dir).unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let rec = sample_firmware("AAA/BBB/CCC/DDD");
        store.upsert_firmware(&rec).unwrap();

        store.cleanup_repository(&firmware_dir, &decrypted_dir, |_| {}).unwrap();
        let second = store.cleanup_repository(&firmware_dir, &decrypted_dir, |_| {}).unwrap();

        assert_eq!(second.total, 0);
        assert_eq!(second.deleted, 0);
    }
}
