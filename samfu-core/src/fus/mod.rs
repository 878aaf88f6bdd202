//! The authenticated FUS (Firmware Update Service) RPC client.
//!
//! A [`FusClient`] bootstraps a nonce/session pair on construction and then
//! drives `inform`/`init`/`stream` exchanges, rotating its nonce and cookie
//! whenever a response supplies fresh ones.

pub mod codec;
pub mod error;

use std::time::Duration;

use log::{debug, trace};
use reqwest::blocking::{Client, Response};

pub use codec::InformInfo;
pub use error::FusError;
use error::Result;

use crate::crypto;

const NONCE_URL: &str = "https://neofussvr.sslcs.cdngc.net/NF_DownloadGenerateNonce.do";
const INFORM_URL: &str = "https://neofussvr.sslcs.cdngc.net/NF_DownloadBinaryInform.do";
const INIT_URL: &str = "https://neofussvr.sslcs.cdngc.net/NF_DownloadBinaryInitForMass.do";
const CLOUD_BASE_URL: &str = "http://cloud-neofussvr.samsungmobile.com/NF_DownloadBinaryForMass.do";
const USER_AGENT: &str = "Kies2.0_FUS";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transient session state rotated on every server response that supplies a
/// fresh `NONCE` header or `JSESSIONID` cookie.
#[derive(Clone, Default, Debug)]
struct Session {
    plain_nonce: String,
    encrypted_nonce: String,
    signature: String,
    jsession_cookie: Option<String>,
}

/// An authenticated client bound to a single FUS session.
///
/// Construction performs the bootstrap exchange immediately, so a
/// successfully constructed `FusClient` always holds a usable nonce.
pub struct FusClient {
    http: Client,
    session: Session,
}

impl FusClient {
    /// Bootstraps a new session: POSTs an empty body to the nonce endpoint
    /// and derives the plaintext nonce and its signature from the response.
    pub fn bootstrap() -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).timeout(REQUEST_TIMEOUT).build()?;

        let mut client = Self { http, session: Session::default() };

        let response = client
            .http
            .post(NONCE_URL)
            .header("Authorization", client.auth_header(false))
            .body("")
            .send()?;

        client.rotate_session(&response)?;
        Ok(client)
    }

    /// Sends the inform request and returns the parsed response.
    pub fn inform(&mut self, version: &str, model: &str, region: &str, device_id: &str) -> Result<InformInfo> {
        let body = codec::build_inform_request(version, model, region, device_id, &self.session.plain_nonce)?;
        let xml = self.post(INFORM_URL, body)?;
        codec::parse_inform(&xml)
    }

    /// Sends the init request (required before streaming the binary) and
    /// returns the raw response body for callers that don't need a typed
    /// view of it.
    pub fn init(&mut self, filename: &str) -> Result<String> {
        let body = codec::build_init_request(filename, &self.session.plain_nonce)?;
        self.post(INIT_URL, body)
    }

    fn post(&mut self, url: &str, body: String) -> Result<String> {
        trace!("FUS POST {url}");
        let response = self.request(url).body(body).send()?;
        let status = response.status();
        self.rotate_session(&response)?;

        if !status.is_success() {
            return Err(FusError::HttpError { status: status.as_u16() });
        }

        Ok(response.text()?)
    }

    /// Opens a streaming GET against the binary download endpoint, resuming
    /// from `start` bytes if nonzero.
    pub fn stream(&mut self, remote_path: &str, start: u64) -> Result<Response> {
        let url = format!("{CLOUD_BASE_URL}?file={remote_path}");
        let mut request = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header(true));

        if start > 0 {
            request = request.header("Range", format!("bytes={start}-"));
        }
        if let Some(cookie) = &self.session.jsession_cookie {
            request = request.header("Cookie", format!("JSESSIONID={cookie}"));
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(FusError::DownloadError { status: response.status().as_u16() });
        }

        Ok(response)
    }

    fn request(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        let mut builder = self.http.post(url).header("Authorization", self.auth_header(false));
        if let Some(cookie) = &self.session.jsession_cookie {
            builder = builder.header("Cookie", format!("JSESSIONID={cookie}"));
        }
        builder
    }

    /// Builds the `Authorization` header. Streaming requests carry the
    /// encrypted nonce; everything else carries an empty nonce.
    fn auth_header(&self, streaming: bool) -> String {
        let nonce = if streaming { self.session.encrypted_nonce.as_str() } else { "" };
        format!(
            "FUS nonce=\"{nonce}\", signature=\"{}\", nc=\"\", type=\"\", realm=\"\", newauth=\"1\"",
            self.session.signature
        )
    }

    /// Inspects a response for a `NONCE` header, rotating the plaintext
    /// nonce, its signature, and the encrypted nonce when one is present; and
    /// for a `JSESSIONID` cookie, rotating the session cookie when present.
    fn rotate_session(&mut self, response: &Response) -> Result<()> {
        if let Some(nonce_header) = response.headers().get("NONCE") {
            let encrypted_nonce = nonce_header.to_str().unwrap_or_default().to_string();
            let plain_nonce = crypto::decrypt_nonce(&encrypted_nonce)?;
            let signature = crypto::make_signature(&plain_nonce)?;

            debug!("rotated FUS nonce");
            self.session.encrypted_nonce = encrypted_nonce;
            self.session.plain_nonce = plain_nonce;
            self.session.signature = signature;
        }

        for cookie_header in response.headers().get_all("Set-Cookie") {
            if let Ok(text) = cookie_header.to_str() {
                if let Some(value) = extract_jsessionid(text) {
                    self.session.jsession_cookie = Some(value);
                }
            }
        }

        Ok(())
    }
}

fn extract_jsessionid(set_cookie: &str) -> Option<String> {
    let rest = set_cookie.strip_prefix("JSESSIONID=")?;
    let value = rest.split(';').next()?;
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_jsessionid_from_set_cookie() {
        let header = "JSESSIONID=ABCDEF123; Path=/; HttpOnly";
        assert_eq!(extract_jsessionid(header).as_deref(), Some("ABCDEF123"));
    }

    #[test]
    fn non_jsessionid_cookie_is_ignored() {
        assert_eq!(extract_jsessionid("OTHER=value"), None);
    }
}
