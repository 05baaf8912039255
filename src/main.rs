//! Firmware entry point.
//!
//! Boot sequence: bring up ESP-IDF, run one agent cycle, then either
//! park (up to date), restart into the new image (updated), or restart
//! to retry (any failure).  A restart re-runs the whole provisioning
//! and update sequence, which is the only retry loop this design has.

use anyhow::Result;
use log::{error, info};

use otagent::adapters::provisioning::DEFAULT_ASSETS;
use otagent::adapters::{FlashAdapter, HttpAdapter, NvsAdapter};
use otagent::agent::{AgentService, Outcome};
use otagent::config::AgentConfig;
use otagent::Severity;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("otagent v{} starting", env!("CARGO_PKG_VERSION"));

    // ── 2. Adapters ───────────────────────────────────────────
    let config = AgentConfig::default();
    let storage = match NvsAdapter::new() {
        Ok(nvs) => nvs,
        Err(e) => {
            error!("NVS init failed ({e}), restarting");
            restart();
        }
    };
    let http = HttpAdapter::new(config.http_timeout_ms);
    let flash = FlashAdapter::new();

    // ── 3. One agent cycle ────────────────────────────────────
    let mut agent = match AgentService::new(storage, http, flash, config) {
        Ok(agent) => agent,
        Err(e) => {
            error!("agent init failed: {e}");
            restart();
        }
    };

    match agent.run(&DEFAULT_ASSETS) {
        Ok(Outcome::UpToDate(version)) => {
            info!("firmware {version} is current, parking until next power cycle");
            park();
        }
        Ok(Outcome::Updated { from, to }) => {
            match from {
                Some(from) => info!("updated {from} -> {to}, restarting into new image"),
                None => info!("installed {to}, restarting into new image"),
            }
            restart();
        }
        // Restart is the retry mechanism: the whole provisioning and
        // update sequence re-runs from scratch on the next boot.
        Err(e) => {
            match e.severity() {
                Severity::Abort => error!("cycle abandoned: {e}; restarting to retry"),
                Severity::Fatal => error!("fatal: {e}; restarting"),
            }
            restart();
        }
    }
}

/// Idle forever; the device keeps running its current image.
fn park() -> ! {
    loop {
        std::thread::sleep(core::time::Duration::from_secs(60));
    }
}

fn restart() -> ! {
    unsafe {
        esp_idf_svc::sys::esp_restart();
    }
}
