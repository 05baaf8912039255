//! Platform adapters.
//!
//! Each adapter implements one port from [`crate::agent::ports`] twice:
//! a real ESP-IDF backend behind `#[cfg(target_os = "espidf")]` and a
//! simulation backend for host builds and tests.

pub mod flash;
pub mod http;
pub mod nvs;
pub mod provisioning;

pub use flash::FlashAdapter;
pub use http::HttpAdapter;
pub use nvs::NvsAdapter;
