//! AT command exchange and `+DEVCONINFO` parsing.

use std::{collections::HashMap, time::Duration};

use log::{debug, trace, warn};

use super::{
    error::{DeviceError, Result},
    models::ATDeviceInfo,
};
use crate::serial::{self, Handle, PortConfig};

/// The default timeout applied to [`send_at`] when the caller doesn't
/// specify one.
pub const DEFAULT_AT_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends an AT `command` to `port_id` (or the first detected device, if
/// `None`) and returns its decoded response text.
///
/// A trailing `CRLF` is appended if the caller didn't include one. Input and
/// output buffers are cleared before the command is written. The response is
/// accumulated (lossily decoded as UTF-8) until `timeout` elapses.
///
/// Fails with [`DeviceError::ATNoResponse`] if nothing was read at all, and
/// with [`DeviceError::ATBadResponse`] if `expect_ok` is set and the response
/// does not contain `"OK"`.
pub fn send_at(
    command: &str,
    port_id: Option<&str>,
    timeout: Duration,
    expect_ok: bool,
) -> Result<String> {
    let port_id = resolve_port(port_id)?;
    let mut handle = Handle::open(&port_id, &PortConfig::at_modern()).map_err(DeviceError::ATTransportError)?;

    let response = exchange(&mut handle, command, timeout)?;

    if response.is_empty() {
        return Err(DeviceError::ATNoResponse);
    }

    if expect_ok && !response.contains("OK") {
        return Err(DeviceError::ATBadResponse(response));
    }

    Ok(response)
}

/// Runs a single AT exchange over an already-open handle: clear buffers,
/// write the (CRLF-terminated) command, and read for `timeout`.
fn exchange(handle: &mut Handle, command: &str, timeout: Duration) -> Result<String> {
    handle.flush_buffers().map_err(DeviceError::ATTransportError)?;

    let mut framed = command.to_string();
    if !framed.ends_with("\r\n") {
        framed.push_str("\r\n");
    }

    trace!("AT >> {:?}", framed);
    handle.write(framed.as_bytes()).map_err(DeviceError::ATTransportError)?;

    let raw = handle.read_for(timeout).map_err(DeviceError::ATTransportError)?;
    let text = String::from_utf8_lossy(&raw).into_owned();
    trace!("AT << {:?}", text);

    Ok(text)
}

fn resolve_port(port_id: Option<&str>) -> Result<String> {
    match port_id {
        Some(p) => Ok(p.to_string()),
        None => Ok(serial::first_device().map_err(DeviceError::ATTransportError)?.port_id),
    }
}

/// Sends `AT+DEVCONINFO` and parses the device's identity information.
pub fn read_device_info_at(port_id: Option<&str>) -> Result<ATDeviceInfo> {
    let response = send_at("AT+DEVCONINFO", port_id, DEFAULT_AT_TIMEOUT, true)?;

    let line = response
        .lines()
        .find(|l| l.trim_start().starts_with("+DEVCONINFO:"))
        .ok_or_else(|| DeviceError::ATParseError("no +DEVCONINFO line in response".to_string()))?;

    let suffix = line
        .trim_start()
        .strip_prefix("+DEVCONINFO:")
        .unwrap_or_default();

    let fields = parse_devconinfo_fields(suffix);

    let model = fields.get("MN").cloned().unwrap_or_default();
    let firmware_version = fields.get("VER").cloned().unwrap_or_default();
    let sales_code = fields.get("PRD").cloned().unwrap_or_default();

    if model.is_empty() || firmware_version.is_empty() || sales_code.is_empty() {
        return Err(DeviceError::ATParseError(
            "missing required field (MN, VER, or PRD) in +DEVCONINFO".to_string(),
        ));
    }

    Ok(ATDeviceInfo {
        model,
        firmware_version,
        sales_code,
        imei: fields.get("IMEI").cloned(),
        serial_number: fields.get("SN").cloned(),
        lock_status: fields.get("LOCK").cloned(),
        aid: fields.get("AID").cloned(),
        cc: fields.get("CC").cloned(),
    })
}

/// Parses `KEY1(VALUE1);KEY2(VALUE2);...` fragments into a map.
///
/// Values may not contain `(` or `)`; unrecognized keys are preserved in the
/// map too (callers pick out the ones they care about), matching the AT
/// response grammar's "unknowns ignored" rule at the call site rather than
/// here.
fn parse_devconinfo_fields(suffix: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for fragment in suffix.split(';') {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }

        let Some(open) = fragment.find('(') else { continue };
        let Some(close) = fragment.rfind(')') else { continue };
        if close <= open {
            continue;
        }

        let key = fragment[..open].trim().to_string();
        let value = fragment[open + 1..close].to_string();
        map.insert(key, value);
    }

    map
}

/// Triggers the device to reboot into download (Odin) mode.
///
/// No response is expected: the device reboots immediately after receiving
/// `AT+FUS?`. The serial handle is released on every exit path.
pub fn enter_download_mode(port_id: Option<&str>) -> Result<()> {
    let port_id = resolve_port(port_id)?;
    let mut handle = Handle::open(&port_id, &PortConfig::at_modern()).map_err(DeviceError::ATTransportError)?;

    handle.flush_buffers().map_err(DeviceError::ATTransportError)?;
    let result = handle.write(b"AT+FUS?\r\n");

    // The handle is dropped (and the port released) regardless of outcome.
    drop(handle);

    match result {
        Ok(()) => {
            debug!("sent AT+FUS?, device should now be rebooting into download mode");
            Ok(())
        },
        Err(e) => {
            warn!("failed to send AT+FUS?: {e}");
            Err(DeviceError::ATTransportError(e))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devconinfo_fragments() {
        let fields = parse_devconinfo_fields(
            "MN(SM-A146P);VER(A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3);PRD(EUX);IMEI(123456789012345);",
        );

        assert_eq!(fields.get("MN").unwrap(), "SM-A146P");
        assert_eq!(fields.get("PRD").unwrap(), "EUX");
        assert_eq!(fields.get("IMEI").unwrap(), "123456789012345");
    }

    #[test]
    fn ignores_malformed_fragments() {
        let fields = parse_devconinfo_fields("MN(SM-A146P);GARBAGE;PRD(EUX)");
        assert_eq!(fields.len(), 2);
        assert!(!fields.contains_key("GARBAGE"));
    }

    #[test]
    fn tolerates_trailing_semicolon() {
        let fields = parse_devconinfo_fields("MN(SM-A146P);PRD(EUX);");
        assert_eq!(fields.len(), 2);
    }
}
