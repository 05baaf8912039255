//! Streaming firmware update engine.
//!
//! Drives a download from the release URL through the flash port in
//! three externally visible phases, matching the partition lifecycle:
//!
//! ```text
//! resolve() ──▶ download(url) ──▶ arm()
//!   pick the      stream chunks     flip the boot
//!   inactive      to flash, verify  target (last,
//!   partition     header + image    atomically)
//! ```
//!
//! The caller records the new version number between `download` and
//! `arm`, so a crash in that window leaves the device booting the old,
//! intact image.  The first chunk must carry the complete ESP image
//! header block (24 B image header + 8 B segment header + 256 B app
//! descriptor) before a single byte is written to flash; a stream that
//! cannot produce it is rejected without touching the partition.

use core::fmt;

use log::{debug, error, info, warn};

use crate::agent::ports::{
    FlashError, FlashPort, HttpError, HttpPort, ImageStream, PartitionPair,
};

/// Transfer chunk size.
pub const OTA_CHUNK_SIZE: usize = 1024;
/// ESP image header length.
pub const IMAGE_HEADER_LEN: usize = 24;
/// First segment header length.
pub const SEGMENT_HEADER_LEN: usize = 8;
/// Application descriptor length.
pub const APP_DESC_LEN: usize = 256;
/// The first chunk must strictly exceed this to prove the descriptor is
/// complete and more image follows.
pub const MIN_FIRST_CHUNK: usize = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN + APP_DESC_LEN;

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Init,
    PartitionsResolved,
    Streaming,
    HeaderValidated,
    Writing,
    Finalized,
    BootArmed,
    Failed,
}

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// Engine method called out of phase order.
    BadState(OtaState),
    /// Transport failure opening or reading the stream.
    Http(HttpError),
    /// Flash port failure.
    Flash(FlashError),
    /// First chunk too short to contain the image header block.
    MalformedStream { got: usize },
    /// Stream ended before the server said the body was complete.
    ConnectionClosed { received: usize },
    /// Full image written but the final validation check rejected it.
    ImageValidationFailed,
    /// The boot-target flip itself failed.
    BootArmFailed,
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadState(state) => write!(f, "engine call out of order (state {state:?})"),
            Self::Http(e) => write!(f, "download transport: {e}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::MalformedStream { got } => {
                write!(f, "first chunk too short for image header ({got} B)")
            }
            Self::ConnectionClosed { received } => {
                write!(f, "stream closed early after {received} B")
            }
            Self::ImageValidationFailed => write!(f, "written image failed validation"),
            Self::BootArmFailed => write!(f, "boot target flip failed"),
        }
    }
}

impl From<HttpError> for OtaError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

impl From<FlashError> for OtaError {
    fn from(e: FlashError) -> Self {
        match e {
            FlashError::ImageValidationFailed => Self::ImageValidationFailed,
            FlashError::BootArmFailed => Self::BootArmFailed,
            other => Self::Flash(other),
        }
    }
}

// ── Engine ────────────────────────────────────────────────────

/// One-shot update engine.  Consume with `resolve` → `download` → `arm`.
pub struct OtaEngine<'a, H: HttpPort, F: FlashPort> {
    http: &'a mut H,
    flash: &'a mut F,
    state: OtaState,
    partitions: Option<PartitionPair>,
    bytes_written: usize,
}

impl<'a, H: HttpPort, F: FlashPort> OtaEngine<'a, H, F> {
    pub fn new(http: &'a mut H, flash: &'a mut F) -> Self {
        Self {
            http,
            flash,
            state: OtaState::Init,
            partitions: None,
            bytes_written: 0,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// Total payload bytes written to the update partition.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Resolve the running / update partition pair.
    ///
    /// A boot-target coincidence (update target == running partition,
    /// possible after an interrupted flip) is logged and tolerated.
    pub fn resolve(&mut self) -> Result<&PartitionPair, OtaError> {
        if self.state != OtaState::Init {
            return Err(OtaError::BadState(self.state));
        }
        let pair = self.flash.resolve_partitions()?;
        info!(
            "ota: running {} -> update target {}",
            pair.running, pair.update_target
        );
        if pair.running.offset == pair.update_target.offset {
            warn!("ota: update target equals running partition, continuing");
        }
        self.state = OtaState::PartitionsResolved;
        Ok(self.partitions.insert(pair))
    }

    /// Stream the image at `url` into the update partition and run the
    /// final image validation.  On any failure the partial write is
    /// aborted and the engine is poisoned.
    pub fn download(&mut self, url: &str) -> Result<(), OtaError> {
        if self.state != OtaState::PartitionsResolved {
            return Err(OtaError::BadState(self.state));
        }
        match self.stream_to_flash(url) {
            Ok(()) => {
                self.state = OtaState::Finalized;
                info!("ota: image written and validated ({} B)", self.bytes_written);
                Ok(())
            }
            Err(e) => {
                error!("ota: download failed after {} B: {e}", self.bytes_written);
                if self.state == OtaState::Writing {
                    self.flash.abort();
                }
                self.state = OtaState::Failed;
                Err(e)
            }
        }
    }

    fn stream_to_flash(&mut self, url: &str) -> Result<(), OtaError> {
        let target = match &self.partitions {
            Some(pair) => pair.update_target.clone(),
            None => return Err(OtaError::BadState(self.state)),
        };

        self.state = OtaState::Streaming;
        let mut stream = self.http.open_stream(url)?;
        let mut chunk = [0u8; OTA_CHUNK_SIZE];

        // First chunk: must strictly exceed the header block before the
        // partition is even opened for writing.
        let first_len = read_nonempty(&mut stream, &mut chunk)?;
        if first_len <= MIN_FIRST_CHUNK {
            return Err(OtaError::MalformedStream { got: first_len });
        }
        let app_desc_start = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN;
        debug!(
            "ota: header block validated, app descriptor at [{app_desc_start}..{MIN_FIRST_CHUNK}]"
        );
        self.state = OtaState::HeaderValidated;

        self.flash.begin(&target)?;
        self.state = OtaState::Writing;
        self.flash.write(&chunk[..first_len])?;
        self.bytes_written = first_len;

        loop {
            let n = stream.read_chunk(&mut chunk)?;
            if n == 0 {
                if stream.is_complete() {
                    break;
                }
                // Peer hung up mid-body.
                return Err(OtaError::ConnectionClosed {
                    received: self.bytes_written,
                });
            }
            self.flash.write(&chunk[..n])?;
            self.bytes_written += n;
            if self.bytes_written % (64 * 1024) < n {
                debug!("ota: {} B written", self.bytes_written);
            }
        }

        self.flash.finalize()?;
        Ok(())
    }

    /// Flip the boot target to the freshly written partition.  Only
    /// valid after a successful `download`; this is the last step so an
    /// interruption anywhere earlier leaves the old image booting.
    pub fn arm(&mut self) -> Result<(), OtaError> {
        if self.state != OtaState::Finalized {
            return Err(OtaError::BadState(self.state));
        }
        let target = match &self.partitions {
            Some(pair) => pair.update_target.clone(),
            None => return Err(OtaError::BadState(self.state)),
        };
        self.flash.arm_boot_target(&target)?;
        self.state = OtaState::BootArmed;
        info!("ota: boot target armed to {target}");
        Ok(())
    }
}

/// Read until at least one byte arrives or the stream ends.
fn read_nonempty<S: ImageStream>(stream: &mut S, buf: &mut [u8]) -> Result<usize, OtaError> {
    let n = stream.read_chunk(buf)?;
    if n == 0 {
        return Err(OtaError::MalformedStream { got: 0 });
    }
    Ok(n)
}

// ── Tests ─────────────────────────────────────────────────────
