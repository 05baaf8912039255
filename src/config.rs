//! Agent configuration parameters.
//!
//! Service endpoints, key parameters, and the fixed buffer bounds the
//! agent enforces on everything it copies out of the network or the
//! persistent store.

use serde::{Deserialize, Serialize};

// ── Fixed buffer bounds ───────────────────────────────────────
//
// Oversized values fail with a typed error; nothing is truncated.

/// Maximum private-key PEM length.
pub const KEY_PEM_MAX: usize = 2048;
/// Maximum CSR PEM length.
pub const CSR_PEM_MAX: usize = 2048;
/// Maximum client-certificate PEM length.
pub const CERT_PEM_MAX: usize = 2048;
/// Maximum version-string length from the update service.
pub const VERSION_STR_MAX: usize = 100;
/// Maximum firmware-image URL length from the update service.
pub const URL_MAX: usize = 100;
/// Maximum HTTP response body the agent will buffer.
pub const HTTP_BODY_MAX: usize = 2048;

/// Core agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Registration endpoint (POST `{deviceId, csr}` → certificate).
    pub register_url: String,
    /// Version-check endpoint (GET, client-cert authenticated).
    pub version_url: String,
    /// RSA modulus size for the device keypair.
    pub rsa_bits: usize,
    /// Transport connect/read timeout (milliseconds).
    pub http_timeout_ms: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            register_url: "https://provisioning.example.com/api/device/register".into(),
            version_url: "https://mtls.provisioning.example.com/api/device/pull/update".into(),
            rsa_bits: 2048,
            http_timeout_ms: 3000,
        }
    }
}

impl AgentConfig {
    /// Range-check the configuration.  Rejects invalid values instead of
    /// clamping them.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.register_url.starts_with("https://") {
            return Err("register_url must be https");
        }
        if !self.version_url.starts_with("https://") {
            return Err("version_url must be https");
        }
        if !matches!(self.rsa_bits, 2048 | 3072 | 4096) {
            return Err("rsa_bits must be 2048, 3072 or 4096");
        }
        if !(500..=60_000).contains(&self.http_timeout_ms) {
            return Err("http_timeout_ms must be 500-60000");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = AgentConfig::default();
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_plaintext_endpoint() {
        let c = AgentConfig {
            register_url: "http://provisioning.example.com/api/device/register".into(),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_odd_key_size() {
        let c = AgentConfig {
            rsa_bits: 1024,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let c = AgentConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: AgentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.register_url, c2.register_url);
        assert_eq!(c.rsa_bits, c2.rsa_bits);
    }
}
