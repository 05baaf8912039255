//! Compile-time provisioning assets.
//!
//! First-boot seed material baked into the binary.  Values come from
//! the build environment so a factory image can carry real credentials
//! without them ever appearing in source control; the defaults below
//! only exist so development builds run.

use crate::agent::service::ProvisioningAssets;

const fn env_or(value: Option<&'static str>, default: &'static str) -> &'static str {
    match value {
        Some(v) => v,
        None => default,
    }
}

/// Assets resolved at compile time from `OTAGENT_SSID`,
/// `OTAGENT_PASSPHRASE` and `OTAGENT_DEVICE_ID`.
pub const DEFAULT_ASSETS: ProvisioningAssets = ProvisioningAssets {
    ssid: env_or(option_env!("OTAGENT_SSID"), "otagent-dev"),
    passphrase: env_or(option_env!("OTAGENT_PASSPHRASE"), "changeme-dev"),
    device_id: env_or(option_env!("OTAGENT_DEVICE_ID"), "dev-0000000000"),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fit_the_stored_record_bounds() {
        assert!(DEFAULT_ASSETS.ssid.len() <= 32);
        assert!(DEFAULT_ASSETS.passphrase.len() <= 64);
        assert!(DEFAULT_ASSETS.device_id.len() <= 32);
    }
}
