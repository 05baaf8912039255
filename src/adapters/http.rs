//! HTTPS transport adapter.
//!
//! Implements [`HttpPort`] over the ESP-IDF HTTP client.  Server trust
//! comes from the built-in certificate bundle; once the device holds a
//! signed identity, [`HttpAdapter::set_client_identity`] rebuilds the
//! connection configuration with the client certificate and key so every
//! subsequent request is mutually authenticated.
//!
//! There is no host-side network backend: host tests drive the agent
//! through mock ports instead, and every method here reports
//! [`HttpError::Unsupported`] when built for the host.

use log::info;

use crate::agent::ports::{HttpError, HttpPort, HttpResponse, ImageStream};
#[cfg(target_os = "espidf")]
use crate::config::HTTP_BODY_MAX;

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::{Headers, Method, Status};
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::{Read, Write};
#[cfg(target_os = "espidf")]
use esp_idf_svc::tls::X509;

pub struct HttpAdapter {
    // Only the device backend consumes the timeout; the host backend
    // refuses network I/O outright.
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    identity: Option<(&'static core::ffi::CStr, &'static core::ffi::CStr)>,
    #[cfg(not(target_os = "espidf"))]
    identity_set: bool,
}

impl HttpAdapter {
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            timeout_ms,
            #[cfg(target_os = "espidf")]
            identity: None,
            #[cfg(not(target_os = "espidf"))]
            identity_set: false,
        }
    }

    #[cfg(target_os = "espidf")]
    fn configuration(&self) -> Configuration {
        let mut conf = Configuration {
            timeout: Some(core::time::Duration::from_millis(u64::from(self.timeout_ms))),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        if let Some((cert, key)) = self.identity {
            // Leaked buffers are NUL-terminated PEM, set once per boot.
            conf.client_certificate = Some(X509::pem_until_nul(cert));
            conf.private_key = Some(X509::pem_until_nul(key));
        }
        conf
    }

    #[cfg(target_os = "espidf")]
    fn request(
        &mut self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, HttpError> {
        let mut conn =
            EspHttpConnection::new(&self.configuration()).map_err(|_| HttpError::Connect)?;

        let headers: &[(&str, &str)] = match body {
            Some(_) => &[("Content-Type", "application/json")],
            None => &[],
        };
        conn.initiate_request(method, url, headers)
            .map_err(|_| HttpError::Connect)?;
        if let Some(payload) = body {
            let mut sent = 0;
            while sent < payload.len() {
                sent += conn.write(&payload[sent..]).map_err(|_| HttpError::Io)?;
            }
        }
        conn.initiate_response().map_err(|_| HttpError::Io)?;

        let status = conn.status();
        let mut out = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let n = conn.read(&mut chunk).map_err(|_| HttpError::Io)?;
            if n == 0 {
                break;
            }
            if out.len() + n > HTTP_BODY_MAX {
                return Err(HttpError::BodyTooLarge);
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(HttpResponse { status, body: out })
    }
}

#[cfg(target_os = "espidf")]
impl HttpPort for HttpAdapter {
    type Stream = EspImageStream;

    fn set_client_identity(&mut self, cert_pem: &str, key_pem: &str) -> Result<(), HttpError> {
        // The TLS stack wants NUL-terminated PEM living as long as the
        // connection configuration; the identity is set once per boot.
        fn leak_nul(pem: &str) -> Result<&'static core::ffi::CStr, HttpError> {
            if pem.is_empty() {
                return Err(HttpError::BadClientIdentity);
            }
            let owned = std::ffi::CString::new(pem).map_err(|_| HttpError::BadClientIdentity)?;
            Ok(Box::leak(owned.into_boxed_c_str()))
        }

        self.identity = Some((leak_nul(cert_pem)?, leak_nul(key_pem)?));
        info!("HttpAdapter: client identity installed, requests now use mTLS");
        Ok(())
    }

    fn post_json(&mut self, url: &str, body: &[u8]) -> Result<HttpResponse, HttpError> {
        self.request(Method::Post, url, Some(body))
    }

    fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        self.request(Method::Get, url, None)
    }

    fn open_stream(&mut self, url: &str) -> Result<Self::Stream, HttpError> {
        let mut conn =
            EspHttpConnection::new(&self.configuration()).map_err(|_| HttpError::Connect)?;
        conn.initiate_request(Method::Get, url, &[])
            .map_err(|_| HttpError::Connect)?;
        conn.initiate_response().map_err(|_| HttpError::Io)?;

        let status = conn.status();
        if !(200..300).contains(&status) {
            return Err(HttpError::Io);
        }
        let content_length = conn
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok());
        info!(
            "HttpAdapter: image stream open ({} B advertised)",
            content_length.unwrap_or(0)
        );
        Ok(EspImageStream {
            conn,
            content_length,
            received: 0,
        })
    }
}

/// Chunked reader over an open image download.
#[cfg(target_os = "espidf")]
pub struct EspImageStream {
    conn: EspHttpConnection,
    content_length: Option<usize>,
    received: usize,
}

#[cfg(target_os = "espidf")]
impl ImageStream for EspImageStream {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, HttpError> {
        let n = self.conn.read(buf).map_err(|_| HttpError::ConnectionReset)?;
        self.received += n;
        Ok(n)
    }

    fn is_complete(&self) -> bool {
        match self.content_length {
            Some(total) => self.received >= total,
            // No length header: EOF is the only end-of-body signal.
            None => true,
        }
    }
}

// ── Host backend ──────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct NoStream;

#[cfg(not(target_os = "espidf"))]
impl ImageStream for NoStream {
    fn read_chunk(&mut self, _buf: &mut [u8]) -> Result<usize, HttpError> {
        Err(HttpError::Unsupported)
    }
    fn is_complete(&self) -> bool {
        false
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpPort for HttpAdapter {
    type Stream = NoStream;

    fn set_client_identity(&mut self, cert_pem: &str, key_pem: &str) -> Result<(), HttpError> {
        if cert_pem.is_empty() || key_pem.is_empty() {
            return Err(HttpError::BadClientIdentity);
        }
        self.identity_set = true;
        info!("HttpAdapter: client identity recorded (simulation)");
        Ok(())
    }

    fn post_json(&mut self, _url: &str, _body: &[u8]) -> Result<HttpResponse, HttpError> {
        Err(HttpError::Unsupported)
    }

    fn get(&mut self, _url: &str) -> Result<HttpResponse, HttpError> {
        Err(HttpError::Unsupported)
    }

    fn open_stream(&mut self, _url: &str) -> Result<Self::Stream, HttpError> {
        Err(HttpError::Unsupported)
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn host_backend_refuses_network() {
        let mut http = HttpAdapter::new(3000);
        assert_eq!(
            http.get("https://example.com"),
            Err(HttpError::Unsupported)
        );
    }

    #[test]
    fn empty_identity_is_rejected() {
        let mut http = HttpAdapter::new(3000);
        assert_eq!(
            http.set_client_identity("", "key"),
            Err(HttpError::BadClientIdentity)
        );
        assert!(!http.identity_set);
    }

    #[test]
    fn identity_is_recorded() {
        let mut http = HttpAdapter::new(3000);
        http.set_client_identity("CERT", "KEY").unwrap();
        assert!(http.identity_set);
    }
}
