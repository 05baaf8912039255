//! Device identity provisioning and OTA update agent for ESP32-class
//! devices.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      agent::service                     │
//! │   provision identity → register → version gate → OTA    │
//! └───────┬──────────────┬──────────────┬──────────────┬────┘
//!         │              │              │              │
//!    identity       registration      store           ota
//!   (RSA + CSR)    (JSON backend)  (NVS records)  (stream→flash)
//!         │              │              │              │
//! ════════╪══════════════╪═ ports ═════╪══════════════╪═════
//!         │              │              │              │
//!       rand/rsa     HttpAdapter    NvsAdapter    FlashAdapter
//! ```
//!
//! The core above the `ports` line is platform-independent and fully
//! testable on the host; the adapters below it carry the ESP-IDF
//! backends behind `#[cfg(target_os = "espidf")]` with simulation
//! counterparts for everything tests need.

pub mod adapters;
pub mod agent;
pub mod config;
pub mod error;
pub mod identity;
pub mod ota;
pub mod registration;
pub mod store;
pub mod version;

pub use error::{Error, Severity};
