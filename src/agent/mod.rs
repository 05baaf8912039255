//! Platform-independent agent core.
//!
//! [`ports`] defines the hardware/transport seams; [`service`] runs the
//! provision-then-update cycle against whatever adapters are plugged in.
//! Nothing in this tree touches ESP-IDF directly, which is what lets
//! the whole flow run under host tests.

pub mod ports;
pub mod service;

pub use service::{AgentService, Outcome, ProvisioningAssets};
