//! Coordinates getting a device into Odin (download) mode and waiting for it
//! to come back up, bridging the AT and Odin channels.

use std::{thread, time::Duration};

use log::{debug, warn};

use super::{at, error::DeviceError, odin};
use crate::serial;

type Result<T> = std::result::Result<T, DeviceError>;

/// Parameters controlling the wait for a device to appear in Odin mode.
#[derive(Clone, Copy, Debug)]
pub struct ModeWaitOptions {
    /// Grace period after triggering the reboot, before polling starts.
    pub startup_grace: Duration,
    /// Delay between successive Odin-mode probes.
    pub check_interval: Duration,
    /// Total time budget to wait for the device to reappear.
    pub wait_timeout: Duration,
}

impl Default for ModeWaitOptions {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(10),
            check_interval: Duration::from_millis(750),
            wait_timeout: Duration::from_secs(60),
        }
    }
}

/// A callback invoked at milestones while waiting for download mode, used by
/// orchestrator-level progress reporting.
pub trait ModeWaitObserver {
    /// Called once the reboot has been triggered and the grace sleep begins.
    fn rebooting(&self) {}
    /// Called before each Odin-mode probe, with the elapsed wait time.
    fn polling(&self, _elapsed: Duration) {}
    /// Called once the device answers in Odin mode.
    fn detected(&self, _port_id: &str) {}
}

/// A no-op observer for callers that don't care about progress milestones.
pub struct NoopObserver;
impl ModeWaitObserver for NoopObserver {}

/// Triggers a reboot to download mode over AT, waits out the startup grace
/// period, then waits for the device to reappear as an Odin device.
pub fn enter_odin_mode(
    port_id: Option<&str>,
    options: ModeWaitOptions,
    observer: &dyn ModeWaitObserver,
) -> Result<String> {
    debug!("triggering AT+FUS? reboot to download mode");
    at::enter_download_mode(port_id)?;
    observer.rebooting();

    thread::sleep(options.startup_grace);

    wait_for_odin_mode(port_id, options, observer)
}

/// Polls for a device to appear in Odin mode, up to `options.wait_timeout`.
///
/// Transport-level failures while polling (the device not yet enumerable,
/// USB re-enumeration in progress) are treated as "not yet" rather than
/// fatal; only running out of time produces [`DeviceError::NotFound`].
pub fn wait_for_odin_mode(
    port_id: Option<&str>,
    options: ModeWaitOptions,
    observer: &dyn ModeWaitObserver,
) -> Result<String> {
    let start = std::time::Instant::now();

    while start.elapsed() < options.wait_timeout {
        observer.polling(start.elapsed());

        match find_odin_port(port_id, options.check_interval) {
            Ok(Some(found)) => {
                observer.detected(&found);
                return Ok(found);
            },
            Ok(None) => {},
            Err(e) => warn!("transient error while polling for Odin mode: {e}"),
        }

        thread::sleep(options.check_interval);
    }

    Err(DeviceError::NotFound)
}

/// Probes `port_id` (or every enumerated candidate, if `None`) for the Odin
/// handshake, returning the first port that answers.
fn find_odin_port(port_id: Option<&str>, probe_timeout: Duration) -> Result<Option<String>> {
    let candidates: Vec<String> = match port_id {
        Some(p) => vec![p.to_string()],
        None => serial::enumerate()
            .map_err(DeviceError::OdinTransportError)?
            .into_iter()
            .map(|d| d.port_id)
            .collect(),
    };

    for candidate in candidates {
        match odin::is_odin_mode(&candidate, probe_timeout) {
            Ok(true) => return Ok(Some(candidate)),
            Ok(false) => continue,
            Err(DeviceError::OdinTransportError(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_wait_options_are_sane() {
        let opts = ModeWaitOptions::default();
        assert!(opts.startup_grace <= opts.wait_timeout);
        assert!(opts.check_interval < opts.wait_timeout);
    }
}
