//! Registration service client.
//!
//! Two calls against the fleet backend:
//!
//! | call                   | method | payload                        | reply                          |
//! |------------------------|--------|--------------------------------|--------------------------------|
//! | [`submit_csr`]         | POST   | `{"deviceId": …, "csr": …}`    | `{"status", "certificate"}`    |
//! | [`fetch_latest_version`]| GET   | —                              | `{"version", "url"}`           |
//!
//! Both are generic over [`HttpPort`]; transport security (mTLS for the
//! version pull) is the adapter's concern.  A certificate is only ever
//! returned on an explicit `"success"` status — a 200 with a failure
//! status body is still a rejection.

use core::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::agent::ports::{HttpError, HttpPort};
use crate::config::{CERT_PEM_MAX, URL_MAX, VERSION_STR_MAX};

// ── Wire types ────────────────────────────────────────────────

#[derive(Serialize)]
struct RegisterRequest<'a> {
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    csr: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    status: String,
    #[serde(default)]
    certificate: Option<String>,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
    url: String,
}

/// Latest-release record as advertised by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub version: heapless::String<VERSION_STR_MAX>,
    pub url: heapless::String<URL_MAX>,
}

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// Transport-level failure.
    Http(HttpError),
    /// Non-2xx HTTP status.
    Status(u16),
    /// 2xx reply with an empty body.
    EmptyResponse,
    /// Body was not the expected JSON shape.
    Json,
    /// Backend replied but refused the request (non-success status field).
    ServiceRejected,
    /// Returned certificate exceeds the credential buffer.
    CertTooLarge,
    /// A reply field exceeds its fixed bound.
    FieldTooLarge(&'static str),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http transport: {e}"),
            Self::Status(code) => write!(f, "unexpected HTTP status {code}"),
            Self::EmptyResponse => write!(f, "empty response body"),
            Self::Json => write!(f, "malformed JSON response"),
            Self::ServiceRejected => write!(f, "service rejected the request"),
            Self::CertTooLarge => write!(f, "certificate exceeds buffer bound"),
            Self::FieldTooLarge(field) => write!(f, "reply field `{field}` exceeds bound"),
        }
    }
}

impl From<HttpError> for RegistrationError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

// ── Operations ────────────────────────────────────────────────

/// Submit a CSR for signing.  Returns the signed client certificate PEM.
pub fn submit_csr<H: HttpPort>(
    http: &mut H,
    url: &str,
    device_id: &str,
    csr_pem: &str,
) -> Result<heapless::String<CERT_PEM_MAX>, RegistrationError> {
    let body = serde_json::to_vec(&RegisterRequest {
        device_id,
        csr: csr_pem,
    })
    .map_err(|_| RegistrationError::Json)?;

    info!("registration: submitting CSR for {device_id}");
    let resp = http.post_json(url, &body)?;
    debug!("registration: status {} ({} B body)", resp.status, resp.body.len());

    if !(200..300).contains(&resp.status) {
        warn!("registration: rejected with HTTP {}", resp.status);
        return Err(RegistrationError::Status(resp.status));
    }
    if resp.body.is_empty() {
        return Err(RegistrationError::EmptyResponse);
    }

    let parsed: RegisterResponse =
        serde_json::from_slice(&resp.body).map_err(|_| RegistrationError::Json)?;

    if parsed.status != "success" {
        warn!("registration: service status `{}`", parsed.status);
        return Err(RegistrationError::ServiceRejected);
    }
    let cert = parsed.certificate.ok_or(RegistrationError::Json)?;

    let mut out = heapless::String::new();
    out.push_str(&cert)
        .map_err(|()| RegistrationError::CertTooLarge)?;
    info!("registration: certificate issued ({} B PEM)", out.len());
    Ok(out)
}

/// Ask the backend for the latest published firmware version and its
/// download URL.  Served over the mTLS transport.
pub fn fetch_latest_version<H: HttpPort>(
    http: &mut H,
    url: &str,
) -> Result<ReleaseInfo, RegistrationError> {
    debug!("registration: pulling latest version record");
    let resp = http.get(url)?;

    if !(200..300).contains(&resp.status) {
        warn!("registration: version pull failed with HTTP {}", resp.status);
        return Err(RegistrationError::Status(resp.status));
    }
    if resp.body.is_empty() {
        return Err(RegistrationError::EmptyResponse);
    }

    let parsed: VersionResponse =
        serde_json::from_slice(&resp.body).map_err(|_| RegistrationError::Json)?;

    let mut version = heapless::String::new();
    version
        .push_str(&parsed.version)
        .map_err(|()| RegistrationError::FieldTooLarge("version"))?;
    let mut dl_url = heapless::String::new();
    dl_url
        .push_str(&parsed.url)
        .map_err(|()| RegistrationError::FieldTooLarge("url"))?;

    info!("registration: latest release is {version}");
    Ok(ReleaseInfo { version, url: dl_url })
}

// ── Tests ─────────────────────────────────────────────────────
