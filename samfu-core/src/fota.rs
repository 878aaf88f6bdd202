//! FOTA cloud version probe: the cheap, unauthenticated check the
//! orchestrator uses to decide whether a device is already current before
//! spending a FUS exchange.

use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::version::VersionCode;

const FOTA_BASE_URL: &str = "https://fota-cloud-dn.ospserver.net/firmware";
const USER_AGENT: &str = "curl/7.87.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while probing the FOTA cloud for a device's latest
/// available firmware version.
#[derive(Debug, Error)]
pub enum FotaError {
    /// The server responded `403`, which the cloud uses to mean the
    /// `(model, region)` pair is unrecognized.
    #[error("no FOTA entry for model {model:?} in region {region:?}")]
    ModelOrRegionNotFound { model: String, region: String },

    /// Any other non-2xx HTTP status.
    #[error("FOTA server returned HTTP {status}")]
    Http { status: u16 },

    /// The response was a well-formed document but lacked a latest-version
    /// entry.
    #[error("no firmware published for model {model:?} in region {region:?}")]
    NoFirmware { model: String, region: String },

    /// The response could not be parsed as the expected XML shape.
    #[error("could not parse FOTA response field {field:?}")]
    ParsingError { field: &'static str },

    /// The underlying HTTP transport failed.
    #[error("FOTA request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

type Result<T> = std::result::Result<T, FotaError>;

/// Fetches the latest published firmware version for `model` in `region`
/// and normalizes it to a four-part [`VersionCode`].
pub fn get_latest_version(model: &str, region: &str) -> Result<VersionCode> {
    let url = format!("{FOTA_BASE_URL}/{region}/{model}/version.xml");
    debug!("GET {url}");

    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let response = client.get(&url).send()?;
    let status = response.status();

    if status.as_u16() == 403 {
        return Err(FotaError::ModelOrRegionNotFound { model: model.to_string(), region: region.to_string() });
    }
    if !status.is_success() {
        return Err(FotaError::Http { status: status.as_u16() });
    }

    let body = response.text()?;
    let latest = extract_latest_version(&body)
        .ok_or_else(|| FotaError::NoFirmware { model: model.to_string(), region: region.to_string() })?;

    VersionCode::normalize(&latest).ok_or(FotaError::ParsingError { field: "firmware/version/latest" })
}

/// Pulls the text content of `firmware/version/latest` out of the FOTA
/// version document.
///
/// A small hand-rolled extraction is used instead of a full XML parse
/// because the document has no attributes, namespaces, or nesting beyond
/// this one path; [`crate::fus::codec`] uses the real XML machinery where
/// the shape is richer.
fn extract_latest_version(body: &str) -> Option<String> {
    let start = body.find("<latest>")? + "<latest>".len();
    let end = body[start..].find("</latest>")? + start;
    let text = body[start..end].trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_latest_version_text() {
        let xml = "<?xml version=\"1.0\"?><versioninfo><firmware><version><latest>A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3</latest></version></firmware></versioninfo>";
        assert_eq!(extract_latest_version(xml).as_deref(), Some("A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3"));
    }

    #[test]
    fn missing_latest_tag_yields_none() {
        let xml = "<?xml version=\"1.0\"?><versioninfo><firmware><version></version></firmware></versioninfo>";
        assert_eq!(extract_latest_version(xml), None);
    }

    #[test]
    fn empty_latest_tag_yields_none() {
        let xml = "<latest></latest>";
        assert_eq!(extract_latest_version(xml), None);
    }
}
