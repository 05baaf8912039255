//! Agent-wide error type.
//!
//! Every subsystem keeps its own typed error; this enum is the single
//! aggregate the service run loop returns.  Severity classifies the
//! failure for the driver: [`Severity::Abort`] means the cycle was
//! abandoned cleanly and a plain retry is safe, [`Severity::Fatal`]
//! means persistent or security-relevant state is suspect.  Only the
//! driver turns either into a device restart.

use core::fmt;

use crate::identity::IdentityError;
use crate::ota::OtaError;
use crate::registration::RegistrationError;
use crate::store::StoreError;
use crate::version::VersionParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Identity(IdentityError),
    Registration(RegistrationError),
    Store(StoreError),
    Version(VersionParseError),
    Ota(OtaError),
    /// Configuration failed validation at startup.
    Config(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The cycle was abandoned cleanly; retrying from scratch is safe.
    Abort,
    /// Persistent or security-relevant state is suspect.
    Fatal,
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            // Transient network and backend hiccups retry next cycle.
            Self::Registration(_) => Severity::Abort,
            Self::Ota(OtaError::Http(_))
            | Self::Ota(OtaError::MalformedStream { .. })
            | Self::Ota(OtaError::ConnectionClosed { .. })
            | Self::Ota(OtaError::ImageValidationFailed) => Severity::Abort,
            // A published version record that does not parse is the
            // backend's bug, not ours; skip the cycle.
            Self::Version(_) => Severity::Abort,
            // Broken storage, broken crypto, or a half-armed boot flip
            // cannot be recovered in-process.
            Self::Identity(_) | Self::Store(_) | Self::Config(_) => Severity::Fatal,
            Self::Ota(_) => Severity::Fatal,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity(e) => write!(f, "identity: {e}"),
            Self::Registration(e) => write!(f, "registration: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Version(e) => write!(f, "version: {e}"),
            Self::Ota(e) => write!(f, "ota: {e}"),
            Self::Config(reason) => write!(f, "config: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<IdentityError> for Error {
    fn from(e: IdentityError) -> Self {
        Self::Identity(e)
    }
}

impl From<RegistrationError> for Error {
    fn from(e: RegistrationError) -> Self {
        Self::Registration(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<VersionParseError> for Error {
    fn from(e: VersionParseError) -> Self {
        Self::Version(e)
    }
}

impl From<OtaError> for Error {
    fn from(e: OtaError) -> Self {
        Self::Ota(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ports::HttpError;

    #[test]
    fn network_failures_abort_but_do_not_restart() {
        let e = Error::from(RegistrationError::Http(HttpError::Timeout));
        assert_eq!(e.severity(), Severity::Abort);
        let e = Error::from(OtaError::ConnectionClosed { received: 4096 });
        assert_eq!(e.severity(), Severity::Abort);
    }

    #[test]
    fn storage_and_crypto_failures_are_fatal() {
        let e = Error::from(IdentityError::KeyGen);
        assert_eq!(e.severity(), Severity::Fatal);
        let e = Error::from(StoreError::Corrupt);
        assert_eq!(e.severity(), Severity::Fatal);
    }

    #[test]
    fn boot_arm_failure_is_fatal() {
        let e = Error::from(OtaError::BootArmFailed);
        assert_eq!(e.severity(), Severity::Fatal);
    }
}
