//! Agent run cycle.
//!
//! One pass through the full device lifecycle:
//!
//! 1. seed network provisioning on a factory-fresh device
//! 2. ensure a signed mTLS identity exists (generate + register once)
//! 3. pull the latest release record over the mTLS channel
//! 4. compare against the installed version
//! 5. stream the image to the inactive partition when behind
//! 6. record the new version, then flip the boot target last
//!
//! Step 2 is idempotent: with credentials already stored, the cycle
//! performs no key generation, no registration call, and no writes.

use log::{info, warn};

use crate::agent::ports::{FlashPort, HttpPort, StoragePort};
use crate::config::AgentConfig;
use crate::error::Error;
use crate::identity;
use crate::ota::OtaEngine;
use crate::registration;
use crate::store::{CredentialStore, DeviceCredentials, NetworkProvisioning};
use crate::version::{self, Version};

/// Compile-time fallback material seeded into storage on first boot.
#[derive(Debug, Clone, Copy)]
pub struct ProvisioningAssets {
    pub ssid: &'static str,
    pub passphrase: &'static str,
    pub device_id: &'static str,
}

/// What a completed cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Installed version matches or exceeds the published one.
    UpToDate(Version),
    /// A new image was written and armed; restart to boot it.
    Updated { from: Option<Version>, to: Version },
}

pub struct AgentService<S: StoragePort, H: HttpPort, F: FlashPort> {
    store: CredentialStore<S>,
    http: H,
    flash: F,
    config: AgentConfig,
}

impl<S: StoragePort, H: HttpPort, F: FlashPort> AgentService<S, H, F> {
    pub fn new(storage: S, http: H, flash: F, config: AgentConfig) -> Result<Self, Error> {
        config.validate().map_err(Error::Config)?;
        Ok(Self {
            store: CredentialStore::new(storage),
            http,
            flash,
            config,
        })
    }

    /// Tear the service apart again, handing the adapters back.
    pub fn into_parts(self) -> (S, H, F) {
        (self.store.into_inner(), self.http, self.flash)
    }

    /// Run one full cycle.
    pub fn run(&mut self, assets: &ProvisioningAssets) -> Result<Outcome, Error> {
        let network = self.ensure_network_provisioning(assets)?;
        info!("agent: device {} on network {}", network.device_id, network.ssid);

        let creds = self.ensure_identity(&network.device_id)?;
        self.http
            .set_client_identity(&creds.certificate_pem, &creds.private_key_pem)
            .map_err(|e| Error::Registration(e.into()))?;

        let release =
            registration::fetch_latest_version(&mut self.http, &self.config.version_url)?;
        let available: Version = release.version.parse()?;
        let installed = self.store.get_version()?;

        if !version::update_required(installed.as_ref(), &available) {
            info!("agent: up to date at {available}");
            return Ok(Outcome::UpToDate(available));
        }
        match installed {
            Some(current) => info!("agent: updating {current} -> {available}"),
            None => info!("agent: no installed version recorded, updating to {available}"),
        }

        let mut engine = OtaEngine::new(&mut self.http, &mut self.flash);
        engine.resolve().map_err(Error::Ota)?;
        engine.download(&release.url).map_err(Error::Ota)?;

        // Version is durable before the boot flip: a crash between the
        // two leaves the old image booting with a stale record, which
        // the next cycle repairs by updating again.
        self.store.set_version(&available)?;
        engine.arm().map_err(Error::Ota)?;

        Ok(Outcome::Updated {
            from: installed,
            to: available,
        })
    }

    /// Seed network provisioning from compile-time assets on a
    /// factory-fresh device; otherwise return the stored record.
    fn ensure_network_provisioning(
        &mut self,
        assets: &ProvisioningAssets,
    ) -> Result<NetworkProvisioning, Error> {
        if let Some(record) = self.store.get_network_provisioning()? {
            return Ok(record);
        }

        info!("agent: first boot, seeding network provisioning");
        let mut record = NetworkProvisioning {
            ssid: heapless::String::new(),
            passphrase: heapless::String::new(),
            device_id: heapless::String::new(),
        };
        record
            .ssid
            .push_str(assets.ssid)
            .map_err(|()| Error::Config("ssid exceeds 32 bytes"))?;
        record
            .passphrase
            .push_str(assets.passphrase)
            .map_err(|()| Error::Config("passphrase exceeds 64 bytes"))?;
        record
            .device_id
            .push_str(assets.device_id)
            .map_err(|()| Error::Config("device id exceeds 32 bytes"))?;

        self.store.set_network_provisioning(&record)?;
        Ok(record)
    }

    /// Return stored credentials, or mint them: generate keypair + CSR,
    /// register, persist the pair.  Only a clean miss triggers the
    /// fresh path; any backend failure propagates untouched.
    fn ensure_identity(&mut self, device_id: &str) -> Result<DeviceCredentials, Error> {
        if let Some(creds) = self.store.get_credentials()? {
            info!("agent: stored identity found, skipping provisioning");
            return Ok(creds);
        }

        warn!("agent: no stored identity, provisioning a new one");
        let fresh = identity::provision_identity(self.config.rsa_bits)?;
        let certificate_pem = registration::submit_csr(
            &mut self.http,
            &self.config.register_url,
            device_id,
            &fresh.csr_pem,
        )?;

        let creds = DeviceCredentials {
            private_key_pem: fresh.key_pem,
            certificate_pem,
        };
        // Persisted only after the backend accepted the CSR, as one
        // commit, so storage never holds an unregistered key.
        self.store.set_credentials(&creds)?;
        info!("agent: identity provisioned and persisted");
        Ok(creds)
    }
}
