//! XML envelope construction and response parsing for the FUS RPC protocol.

use quick_xml::escape::escape;

use super::error::FusError;
use crate::crypto;

type Result<T> = std::result::Result<T, FusError>;

/// A single successfully parsed inform response.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InformInfo {
    /// `FUSBody/Results/LATEST_FW_VERSION/Data`.
    pub latest_fw_version: String,
    /// `FUSBody/Put/LOGIC_VALUE_FACTORY/Data`.
    pub logic_value_factory: String,
    /// `FUSBody/Put/BINARY_NAME/Data`.
    pub filename: String,
    /// `FUSBody/Put/BINARY_BYTE_SIZE/Data`, parsed as an integer.
    pub size_bytes: u64,
    /// `FUSBody/Put/MODEL_PATH/Data`.
    pub path: String,
}

/// Wraps one `<Key>value</Key>` tag pair in a `<Data>` child, matching the
/// envelope's convention of nesting every leaf value one level deeper.
fn tag(name: &str, value: &str) -> String {
    format!("<{name}><Data>{}</Data></{name}>", escape(value))
}

fn tag_raw(name: &str, value: &str) -> String {
    format!("<{name}><Data>{value}</Data></{name}>")
}

fn envelope(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" ?><FUSroot><FUSHdr><ProtoVer>1.0</ProtoVer></FUSHdr><FUSBody><Put>{body}</Put></FUSBody></FUSroot>"
    )
}

/// Builds the `NF_DownloadBinaryInform.do` request body.
pub fn build_inform_request(version: &str, model: &str, region: &str, device_id: &str, nonce: &str) -> Result<String> {
    let logic_check = crypto::logic_check(version, nonce)?;

    let body = [
        tag_raw("ACCESS_MODE", "2"),
        tag_raw("BINARY_NATURE", "1"),
        tag("CLIENT_PRODUCT", "Smart Switch"),
        tag("CLIENT_VERSION", "4.3.23123_1"),
        tag("DEVICE_IMEI_PUSH", device_id),
        tag("DEVICE_FW_VERSION", version),
        tag("DEVICE_LOCAL_CODE", region),
        tag("DEVICE_MODEL_NAME", model),
        tag("LOGIC_CHECK", &logic_check),
    ]
    .concat();

    Ok(envelope(&body))
}

/// Builds the `NF_DownloadBinaryInitForMass.do` request body.
pub fn build_init_request(filename: &str, nonce: &str) -> Result<String> {
    let stem = filename.split('.').next().unwrap_or(filename);
    let tail: String = stem.chars().rev().take(16).collect::<String>().chars().rev().collect();
    let logic_check = crypto::logic_check(&tail, nonce)?;

    let body = [tag("BINARY_FILE_NAME", filename), tag("LOGIC_CHECK", &logic_check)].concat();

    Ok(envelope(&body))
}

/// Parses an `NF_DownloadBinaryInform.do` response.
pub fn parse_inform(xml: &str) -> Result<InformInfo> {
    let status = find_text(xml, "FUSBody", "Results", "Status").ok_or(FusError::MissingField { name: "Status" })?;
    let code: i32 = status.trim().parse().map_err(|_| FusError::MissingField { name: "Status" })?;
    if code != 200 {
        return Err(FusError::BadStatus { code });
    }

    let latest_fw_version = find_data(xml, "FUSBody", "Results", "LATEST_FW_VERSION")
        .filter(|s| !s.is_empty())
        .ok_or(FusError::MissingField { name: "LATEST_FW_VERSION" })?;
    let logic_value_factory = find_data(xml, "FUSBody", "Put", "LOGIC_VALUE_FACTORY")
        .filter(|s| !s.is_empty())
        .ok_or(FusError::MissingField { name: "LOGIC_VALUE_FACTORY" })?;
    let filename = find_data(xml, "FUSBody", "Put", "BINARY_NAME")
        .filter(|s| !s.is_empty())
        .ok_or(FusError::MissingField { name: "BINARY_NAME" })?;
    let size_text = find_data(xml, "FUSBody", "Put", "BINARY_BYTE_SIZE")
        .filter(|s| !s.is_empty())
        .ok_or(FusError::MissingField { name: "BINARY_BYTE_SIZE" })?;
    let path = find_data(xml, "FUSBody", "Put", "MODEL_PATH")
        .filter(|s| !s.is_empty())
        .ok_or(FusError::MissingField { name: "MODEL_PATH" })?;

    let size_bytes = size_text.trim().parse().map_err(|_| FusError::MissingField { name: "BINARY_BYTE_SIZE" })?;

    Ok(InformInfo { latest_fw_version, logic_value_factory, filename, size_bytes, path })
}

/// Finds the text content of `root/section/field`, skipping the `Data`
/// indirection used by [`find_data`].
fn find_text(xml: &str, root: &str, section: &str, field: &str) -> Option<String> {
    let root_body = between(xml, &format!("<{root}>"), &format!("</{root}>"))?;
    let section_body = between(root_body, &format!("<{section}>"), &format!("</{section}>"))?;
    let field_body = between(section_body, &format!("<{field}>"), &format!("</{field}>"))?;
    Some(field_body.trim().to_string())
}

/// Finds `root/section/field/Data`'s text content.
fn find_data(xml: &str, root: &str, section: &str, field: &str) -> Option<String> {
    let root_body = between(xml, &format!("<{root}>"), &format!("</{root}>"))?;
    let section_body = between(root_body, &format!("<{section}>"), &format!("</{section}>"))?;
    let field_body = between(section_body, &format!("<{field}>"), &format!("</{field}>"))?;
    let data_body = between(field_body, "<Data>", "</Data>")?;
    Some(data_body.trim().to_string())
}

fn between<'a>(haystack: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = haystack.find(open)? + open.len();
    let rest = &haystack[start..];
    let end = rest.find(close)?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FUSMsg><FUSBody>
<Results><Status><Data>200</Data></Status></Results>
<Put>
<LOGIC_VALUE_FACTORY><Data>abcd1234</Data></LOGIC_VALUE_FACTORY>
<BINARY_NAME><Data>A146PXXS6CXK3.zip.enc4</Data></BINARY_NAME>
<BINARY_BYTE_SIZE><Data>123456</Data></BINARY_BYTE_SIZE>
<MODEL_PATH><Data>/path/to/bin/</Data></MODEL_PATH>
</Put>
<Results><LATEST_FW_VERSION><Data>A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3</Data></LATEST_FW_VERSION></Results>
</FUSBody></FUSMsg>"#;

    #[test]
    fn parses_full_inform_response() {
        let info = parse_inform(SAMPLE_RESPONSE).unwrap();
        assert_eq!(info.filename, "A146PXXS6CXK3.zip.enc4");
        assert_eq!(info.size_bytes, 123456);
        assert_eq!(info.path, "/path/to/bin/");
        assert_eq!(info.logic_value_factory, "abcd1234");
    }

    #[test]
    fn non_200_status_is_bad_status() {
        let xml = r#"<FUSMsg><FUSBody><Results><Status><Data>408</Data></Status></Results></FUSBody></FUSMsg>"#;
        let err = parse_inform(xml).unwrap_err();
        assert!(matches!(err, FusError::BadStatus { code: 408 }));
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let xml = r#"<FUSMsg><FUSBody><Results><Status><Data>200</Data></Status></Results></FUSBody></FUSMsg>"#;
        let err = parse_inform(xml).unwrap_err();
        assert!(matches!(err, FusError::MissingField { name: "LATEST_FW_VERSION" }));
    }

    #[test]
    fn inform_request_contains_logic_check_and_fields() {
        let body = build_inform_request("A/B/C/D", "SM-A146P", "EUX", "123456789012345", "somenonce1234567").unwrap();
        assert!(body.contains("DEVICE_MODEL_NAME"));
        assert!(body.contains("SM-A146P"));
        assert!(body.contains("LOGIC_CHECK"));
    }

    #[test]
    fn init_request_uses_tail16_of_stem() {
        let nonce = "somenonce1234567";
        let body = build_init_request("A146PXXS6CXK3.zip.enc4", nonce).unwrap();
        assert!(body.contains("BINARY_FILE_NAME"));
        assert!(body.contains("A146PXXS6CXK3.zip.enc4"));

        // The stem splits on the *first* dot ("A146PXXS6CXK3", not
        // "A146PXXS6CXK3.zip"), so LOGIC_CHECK must be computed over that,
        // not over the last-dot-delimited stem.
        let expected_logic_check = crypto::logic_check("A146PXXS6CXK3", nonce).unwrap();
        assert!(body.contains(&expected_logic_check));
    }
}
