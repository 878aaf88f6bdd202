//! Odin (download mode) probing and the `DVIF` device-info exchange.

use std::{thread, time::Duration};

use log::{debug, trace};

use super::{error::DeviceError, models::OdinDeviceInfo};
use crate::serial::{Handle, PortConfig};

/// The 4-byte probe written to detect whether a device is in Odin mode.
pub const ODIN_CMD: &[u8; 4] = b"ODIN";

/// The 4-byte literal a device in Odin mode responds with to [`ODIN_CMD`].
pub const LOKE_RESPONSE: &[u8; 4] = b"LOKE";

/// The 4-byte command requesting device information in Odin mode.
pub const DVIF_CMD: &[u8; 4] = b"DVIF";

/// The settle time Odin devices need between a command being written and its
/// response being fully buffered.
const RESPONSE_SETTLE: Duration = Duration::from_millis(400);

type Result<T> = std::result::Result<T, DeviceError>;

/// Opens `port_id` with RTS/CTS enabled, writes [`ODIN_CMD`], and reports
/// whether the device answered with [`LOKE_RESPONSE`].
///
/// A transport-level failure to open or write the port is reported as
/// [`DeviceError::OdinTransportError`]; it is treated as distinct from "the
/// device answered but said something else" (`Ok(false)`), since the caller
/// (the mode coordinator) treats the former as non-fatal during polling.
pub fn is_odin_mode(port_id: &str, timeout: Duration) -> Result<bool> {
    let mut config = PortConfig::odin();
    config.timeout = timeout;

    let mut handle = Handle::open(port_id, &config).map_err(DeviceError::OdinTransportError)?;
    handle.flush_buffers().map_err(DeviceError::OdinTransportError)?;

    trace!("ODIN >> {:?}", ODIN_CMD);
    handle.write(ODIN_CMD).map_err(DeviceError::OdinTransportError)?;

    thread::sleep(RESPONSE_SETTLE);

    let response = handle.read_available().map_err(DeviceError::OdinTransportError)?;
    trace!("ODIN << {} bytes", response.len());

    let found = response.windows(LOKE_RESPONSE.len()).any(|w| w == LOKE_RESPONSE);
    Ok(found)
}

/// Queries `DVIF` device information, either on a freshly opened `port_id`
/// or across an already-open `handle` (some devices drop session state
/// between separate connections, so preserving the handle across an `ODIN`
/// probe and a `DVIF` query can matter).
pub fn read_odin_info(port_id: Option<&str>, handle: Option<&mut Handle>) -> Result<OdinDeviceInfo> {
    let mut owned_handle;
    let handle = match handle {
        Some(h) => h,
        None => {
            let port_id = port_id.expect("read_odin_info requires a port_id when no handle is given");
            owned_handle = Handle::open(port_id, &PortConfig::odin()).map_err(DeviceError::OdinTransportError)?;
            owned_handle.set_dtr(false).map_err(DeviceError::OdinTransportError)?;
            owned_handle.set_rts(false).map_err(DeviceError::OdinTransportError)?;
            &mut owned_handle
        },
    };

    handle.flush_buffers().map_err(DeviceError::OdinTransportError)?;

    trace!("ODIN >> {:?}", DVIF_CMD);
    handle.write(DVIF_CMD).map_err(DeviceError::OdinTransportError)?;

    thread::sleep(RESPONSE_SETTLE);

    let raw = handle.read_available().map_err(DeviceError::OdinTransportError)?;
    if raw.is_empty() {
        return Err(DeviceError::OdinEmptyResponse);
    }

    let text = String::from_utf8_lossy(&raw).into_owned();
    debug!("DVIF response: {text:?}");

    Ok(parse_dvif(&text))
}

/// Parses a `@key=value;key=value;...#` response into an
/// [`OdinDeviceInfo`], lowercasing keys and preserving the raw string.
fn parse_dvif(text: &str) -> OdinDeviceInfo {
    let trimmed = text.trim().trim_start_matches('@').trim_end_matches('#');

    let mut info = OdinDeviceInfo { raw: text.to_string(), ..Default::default() };

    for pair in trimmed.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let Some((key, value)) = pair.split_once('=') else { continue };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();

        match key.as_str() {
            "capa" => info.capa = Some(value),
            "product" => info.product = Some(value),
            "model" => info.model = Some(value),
            "fwver" => info.fwver = Some(value),
            "vendor" => info.vendor = Some(value),
            "sales" => info.sales = Some(value),
            "ver" => info.ver = Some(value),
            "did" => info.did = Some(value),
            "un" => info.un = Some(value),
            "tmu_temp" => info.tmu_temp = Some(value),
            "prov" => info.prov = Some(value),
            _ => {},
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dvif_response() {
        let info = parse_dvif("@MODEL=SM-A146P;FWVER=1.0;SALES=EUX#");
        assert_eq!(info.model.as_deref(), Some("SM-A146P"));
        assert_eq!(info.fwver.as_deref(), Some("1.0"));
        assert_eq!(info.sales.as_deref(), Some("EUX"));
    }

    #[test]
    fn keys_are_normalized_to_lowercase() {
        let info = parse_dvif("@Model=SM-A146P#");
        assert_eq!(info.model.as_deref(), Some("SM-A146P"));
    }

    #[test]
    fn raw_response_is_preserved_verbatim() {
        let raw = "@model=SM-A146P#";
        let info = parse_dvif(raw);
        assert_eq!(info.raw, raw);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let info = parse_dvif("@model=SM-A146P;bogus=1#");
        assert_eq!(info.model.as_deref(), Some("SM-A146P"));
    }
}
