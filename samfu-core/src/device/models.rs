//! Data records produced by the AT and Odin device channels.

/// Information parsed from an `AT+DEVCONINFO` response.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ATDeviceInfo {
    /// The device model (`MN`).
    pub model: String,
    /// The full four-part build string as reported by the device
    /// (`VER`): PDA/CSC/MODEM/BOOTLOADER.
    pub firmware_version: String,
    /// The 3-letter sales/regional code (`PRD`).
    pub sales_code: String,
    /// The 15-digit IMEI (`IMEI`), when reported.
    pub imei: Option<String>,
    /// The device serial number (`SN`), when reported.
    pub serial_number: Option<String>,
    /// The lock status (`LOCK`), when reported.
    pub lock_status: Option<String>,
    /// The authorized ID (`AID`), when reported.
    pub aid: Option<String>,
    /// The country code (`CC`), when reported.
    pub cc: Option<String>,
}

/// Information parsed from an Odin `DVIF` response.
///
/// Every field is optional since devices report different subsets of keys;
/// [`OdinDeviceInfo::raw`] always holds the unparsed response for callers
/// that need fields this struct does not break out.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct OdinDeviceInfo {
    /// Capability flags, as reported.
    pub capa: Option<String>,
    /// Product identifier.
    pub product: Option<String>,
    /// Device model.
    pub model: Option<String>,
    /// Firmware version.
    pub fwver: Option<String>,
    /// Vendor identifier.
    pub vendor: Option<String>,
    /// Sales/regional code.
    pub sales: Option<String>,
    /// Protocol/bootloader version.
    pub ver: Option<String>,
    /// Device ID.
    pub did: Option<String>,
    /// Unknown/undocumented field, preserved verbatim.
    pub un: Option<String>,
    /// Thermal/temperature reading.
    pub tmu_temp: Option<String>,
    /// Provisioning state.
    pub prov: Option<String>,
    /// The full, unparsed `@key=value;...#` response.
    pub raw: String,
}
