//! The top-level pipeline state machine: poll for a device, check its
//! firmware against FOTA, and drive it through download/decrypt/extract.

pub mod context;
pub mod error;
pub mod progress;

use std::{thread, time::Duration};

use log::{debug, info, warn};

pub use context::{AppContext, CancelToken, SessionId};
pub use error::OrchestratorError;
pub use progress::{ProgressSink, Severity};

use crate::{
    acquire::{
        decrypt,
        download::{self, RemoteBinary},
        extract,
    },
    device::{self, DeviceError, models::ATDeviceInfo},
    fota,
    fus::{FusClient, FusError},
    repo::{FirmwareRecord, FirmwareStatusUpdate, FusStatus, NewAuditEvent, Store, UpgradeStatus},
    version::VersionCode,
};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const DETECTION_ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// The terminal outcome of handling one detected device through to its
/// disconnect (or the end of its pipeline run).
#[derive(Debug)]
pub enum PipelineOutcome {
    UpToDate,
    CscFiltered,
    Completed { version_code: String },
    Failed(OrchestratorError),
}

/// Runs the continuous detection/pipeline loop. Intended to be the entire
/// body of the one worker thread described by the concurrency model; it
/// returns only when `shutdown` reports `true`, checked once per polling
/// cycle — the orchestrator itself never aborts early on a pipeline error.
pub fn run(ctx: &mut AppContext, store: &mut Store, mut shutdown: impl FnMut() -> bool) {
    let mut connected = false;

    while !shutdown() {
        match device::at::read_device_info_at(None) {
            Ok(info) => {
                if !connected {
                    connected = true;
                    ctx.cancel.reset();
                    info!("device detected: model={} csc={}", info.model, info.sales_code);

                    let outcome = handle_device(ctx, store, &info);
                    report_outcome(ctx, &outcome);

                    wait_for_disconnect(&mut shutdown);
                    connected = false;
                    ctx.cancel.reset();
                    ctx.progress.status("waiting for device");
                }
            },
            Err(DeviceError::NotFound) => {
                if connected {
                    connected = false;
                    ctx.progress.message("device disconnected", Severity::Info);
                }
            },
            Err(e) => {
                warn!("transient detection error: {e}");
                thread::sleep(DETECTION_ERROR_BACKOFF);
            },
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Blocks (polling at [`POLL_INTERVAL`]) until the device is no longer
/// detected or shutdown is requested.
fn wait_for_disconnect(shutdown: &mut impl FnMut() -> bool) {
    while !shutdown() {
        match device::at::read_device_info_at(None) {
            Ok(_) => thread::sleep(POLL_INTERVAL),
            Err(_) => return,
        }
    }
}

fn report_outcome(ctx: &AppContext, outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::UpToDate => ctx.progress.message("Firmware already latest version", Severity::Success),
        PipelineOutcome::CscFiltered => ctx.progress.message("CSC Filtered", Severity::Info),
        PipelineOutcome::Completed { version_code } => {
            ctx.progress.message(&format!("firmware {version_code} ready"), Severity::Success)
        },
        PipelineOutcome::Failed(e) => ctx.progress.message(&e.to_string(), Severity::Error),
    }
}

/// Runs one full check-and-acquire cycle for a newly detected device.
fn handle_device(ctx: &mut AppContext, store: &mut Store, info: &ATDeviceInfo) -> PipelineOutcome {
    let imei = info.imei.clone().unwrap_or_default();

    let mut new_event = NewAuditEvent {
        session_id: ctx.session_id.as_str().to_string(),
        imei: imei.clone(),
        model: info.model.clone(),
        csc: info.sales_code.clone(),
        version_code: info.firmware_version.clone(),
        fota_version: None,
        serial_number: info.serial_number.clone(),
        lock_status: info.lock_status.clone(),
        aid: info.aid.clone(),
        cc: info.cc.clone(),
        status_fus: FusStatus::Unknown,
        status_upgrade: UpgradeStatus::Queued,
    };

    if let Err(e) = store.upsert_imei_event(&new_event) {
        return PipelineOutcome::Failed(e.into());
    }

    if !ctx.config.accepts_csc(&info.sales_code) {
        debug!("device csc {:?} rejected by filter", info.sales_code);
        return PipelineOutcome::CscFiltered;
    }

    let fota_version = match fota::get_latest_version(&info.model, &info.sales_code) {
        Ok(v) => v,
        Err(e) => return PipelineOutcome::Failed(error_from_fota(e)),
    };

    new_event.fota_version = Some(fota_version.as_str());
    if let Err(e) = store.upsert_imei_event(&new_event) {
        return PipelineOutcome::Failed(e.into());
    }

    if fota_version.as_str() == info.firmware_version {
        return PipelineOutcome::UpToDate;
    }

    let cached = store
        .find_firmware(&fota_version.as_str())
        .ok()
        .flatten()
        .map(|rec| rec.downloaded)
        .unwrap_or(false);

    let result = if cached {
        run_decrypt_and_extract(ctx, store, &fota_version)
    } else {
        run_full_acquisition(ctx, store, info, &fota_version)
    };

    match result {
        Ok(()) => {
            new_event.status_fus = FusStatus::Ok;
            let _ = store.upsert_imei_event(&new_event);
            PipelineOutcome::Completed { version_code: fota_version.as_str() }
        },
        Err(e) => {
            new_event.status_fus = FusStatus::Error;
            let _ = store.upsert_imei_event(&new_event);
            PipelineOutcome::Failed(e)
        },
    }
}

fn error_from_fota(e: fota::FotaError) -> OrchestratorError {
    OrchestratorError::Fota(e)
}

/// Downloads, decrypts, and extracts a firmware that isn't yet cached.
fn run_full_acquisition(
    ctx: &mut AppContext,
    store: &mut Store,
    info: &ATDeviceInfo,
    fota_version: &VersionCode,
) -> crate::orchestrator::error::Result<()> {
    let mut client = FusClient::bootstrap()?;

    let imei = info.imei.clone().unwrap_or_default();
    let inform = match client.inform(&info.firmware_version, &info.model, &info.sales_code, &imei) {
        Ok(inform) => inform,
        Err(FusError::BadStatus { code: 400 }) => {
            ctx.progress.message("Please update via OTA", Severity::Warning);
            return Err(FusError::BadStatus { code: 400 }.into());
        },
        Err(FusError::BadStatus { code: 408 }) => {
            ctx.progress.message("Invalid model, CSC, or IMEI", Severity::Error);
            return Err(FusError::BadStatus { code: 408 }.into());
        },
        Err(e) => return Err(e.into()),
    };

    match client.init(&inform.filename) {
        Ok(_) => {},
        Err(FusError::BadStatus { code: 400 }) => {
            ctx.progress.message("Please update via OTA", Severity::Warning);
            return Err(FusError::BadStatus { code: 400 }.into());
        },
        Err(FusError::BadStatus { code: 408 }) => {
            ctx.progress.message("Invalid model, CSC, or IMEI", Severity::Error);
            return Err(FusError::BadStatus { code: 408 }.into());
        },
        Err(e) => return Err(e.into()),
    }

    let enc_path = ctx.config.firmware_dir.join(&inform.filename);
    let decrypted_name = inform.filename.strip_suffix(".enc4").unwrap_or(&inform.filename);
    let decrypted_path = ctx.config.decrypted_dir.join(decrypted_name);

    let remote = RemoteBinary { path: &inform.path, filename: &inform.filename, expected_size: inform.size_bytes };
    let cancel = ctx.cancel.clone();
    let progress = ctx.progress.clone();

    download::download(
        &mut client,
        &remote,
        &enc_path,
        ctx.config.resume,
        |done, total| progress.progress("download", done, total, &inform.filename),
        || cancel.is_cancelled(),
    )?;

    let now = std::time::SystemTime::now();
    store.upsert_firmware(&FirmwareRecord {
        version_code: fota_version.as_str(),
        filename: inform.filename.clone(),
        path: inform.path.clone(),
        size_bytes: inform.size_bytes,
        logic_value_factory: inform.logic_value_factory.clone(),
        latest_fw_version: inform.latest_fw_version.clone(),
        downloaded: true,
        decrypted: false,
        extracted: false,
        created_at: now,
        updated_at: now,
    })?;

    run_decrypt_and_extract_with_paths(ctx, store, fota_version, &enc_path, &decrypted_path)
}

/// Decrypts and extracts a firmware already known to the store (either just
/// downloaded or previously cached).
fn run_decrypt_and_extract(
    ctx: &mut AppContext,
    store: &mut Store,
    fota_version: &VersionCode,
) -> crate::orchestrator::error::Result<()> {
    let rec = store
        .find_firmware(&fota_version.as_str())?
        .expect("cached lookup guarantees a row exists");

    let enc_path = ctx.config.firmware_dir.join(&rec.filename);
    let decrypted_name = rec.filename.strip_suffix(".enc4").unwrap_or(&rec.filename);
    let decrypted_path = ctx.config.decrypted_dir.join(decrypted_name);

    run_decrypt_and_extract_with_paths(ctx, store, fota_version, &enc_path, &decrypted_path)
}

fn run_decrypt_and_extract_with_paths(
    ctx: &mut AppContext,
    store: &mut Store,
    fota_version: &VersionCode,
    enc_path: &std::path::Path,
    decrypted_path: &std::path::Path,
) -> crate::orchestrator::error::Result<()> {
    let version_code = fota_version.as_str();
    let rec = store.find_firmware(&version_code)?.expect("firmware row must exist before decrypt");

    let key = decrypt::derive_decryption_key(&rec.latest_fw_version, &rec.logic_value_factory)?;

    let cancel = ctx.cancel.clone();
    let progress = ctx.progress.clone();
    decrypt::decrypt_file(
        enc_path,
        decrypted_path,
        &key,
        |done, total| progress.progress("decrypt", done, total, &rec.filename),
        || cancel.is_cancelled(),
    )?;

    store.update_firmware_status(&version_code, FirmwareStatusUpdate { decrypted: Some(true), ..Default::default() })?;

    let skip_home_csc = ctx.config.skip_home_csc;
    let cancel = ctx.cancel.clone();
    let progress = ctx.progress.clone();
    extract::extract(
        store,
        &version_code,
        decrypted_path,
        |stage, done, total| progress.progress(stage, done as u64, total as u64, &version_code),
        move |name: &str| skip_home_csc && name.starts_with("HOME_CSC_"),
        || cancel.is_cancelled(),
    )?;

    if ctx.config.cleanup_after_extract {
        extract::cleanup_sources(enc_path, decrypted_path)?;
    }

    if ctx.config.auto_fusmode {
        info!("auto_fusmode enabled, driving device back into Odin mode");
        let options = device::mode::ModeWaitOptions::default();
        match device::mode::enter_odin_mode(None, options, &device::mode::NoopObserver) {
            Ok(port) => info!("device back in Odin mode on {port}"),
            Err(e) => warn!("auto_fusmode: failed to re-enter Odin mode: {e}"),
        }
    }

    debug!("pipeline complete for {version_code}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_outcome_debug_is_human_readable() {
        let outcome = PipelineOutcome::UpToDate;
        assert!(format!("{outcome:?}").contains("UpToDate"));
    }
}
