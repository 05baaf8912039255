//! Port traits — the hexagonal boundary between the agent core and the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AgentService (domain)
//! ```
//!
//! Driven adapters (NVS storage, the TLS HTTP client, the flash/OTA
//! partition layer) implement these traits.  The
//! [`AgentService`](super::service::AgentService) consumes them via
//! generics, so the provisioning and update logic never touches
//! ESP-IDF directly and runs unmodified on the host under test.
//!
//! ## Security notes
//!
//! - **StoragePort** implementations MUST commit durably before a write
//!   returns success; a write that cannot be committed is an error even
//!   if the raw set succeeded.
//! - **HttpPort** implementations MUST verify the server certificate
//!   against the CA bundle, and MUST present the client identity set via
//!   [`HttpPort::set_client_identity`] on every subsequent request.
//! - All port errors are typed — callers must handle every variant explicitly.

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent namespaced key-value storage with crash-durable writes.
///
/// Backed by ESP-IDF NVS on device and an in-memory map on the host.
/// `NotFound` is deliberately a distinct variant from `Io`: an absent
/// key is a normal first-boot condition, a backend fault is not.
pub trait StoragePort {
    /// Read a value into `buf`.  Returns the number of bytes written.
    ///
    /// A value longer than `buf` fails with [`StorageError::BufferTooSmall`]
    /// rather than truncating silently.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value and commit it durably before returning.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Write several keys in one namespace, committing once after all of
    /// them.  Either every entry is durable or the commit fails as a whole;
    /// callers use this to keep paired values (certificate + private key)
    /// from being observed half-updated.
    fn write_batch(
        &mut self,
        namespace: &str,
        entries: &[(&str, &[u8])],
    ) -> Result<(), StorageError>;

    /// Delete a key.  Deleting an absent key is [`StorageError::NotFound`].
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist (normal on first boot).
    NotFound,
    /// The stored value does not fit the caller's buffer.
    BufferTooSmall,
    /// Storage partition is full.
    Full,
    /// The value was written but the durability commit failed.
    CommitFailed,
    /// Generic I/O error from the storage backend.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::BufferTooSmall => write!(f, "value exceeds caller buffer"),
            Self::Full => write!(f, "storage full"),
            Self::CommitFailed => write!(f, "durability commit failed"),
            Self::Io => write!(f, "storage I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// HTTP port (driven adapter: domain → TLS transport)
// ───────────────────────────────────────────────────────────────

/// A bounded HTTP response.
///
/// Adapters cap the body at their configured receive buffer; anything
/// larger fails the request with [`HttpError::BodyTooLarge`] instead of
/// handing the domain a truncated payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn body_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.body).ok()
    }
}

/// Request/response + streamed-download primitive over mutually
/// authenticated TLS.
///
/// The agent core treats this as an opaque collaborator: sockets, TLS
/// session setup, and timeouts all live behind the trait.  The connect
/// and per-read timeouts are the adapter's concern.
pub trait HttpPort {
    type Stream: ImageStream;

    /// Install the client certificate + private key used to authenticate
    /// every subsequent request (mTLS).  PEM text for both.
    fn set_client_identity(&mut self, cert_pem: &str, key_pem: &str) -> Result<(), HttpError>;

    /// POST a JSON body, returning status and the full (bounded) body.
    fn post_json(&mut self, url: &str, body: &[u8]) -> Result<HttpResponse, HttpError>;

    /// GET, returning status and the full (bounded) body.
    fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError>;

    /// GET, handing back a chunk-readable stream over the response body.
    /// Response headers have been fetched when this returns.
    fn open_stream(&mut self, url: &str) -> Result<Self::Stream, HttpError>;
}

/// Chunked read access to a streamed response body.
pub trait ImageStream {
    /// Blocking read of up to `buf.len()` bytes.  `Ok(0)` signals that the
    /// server closed the stream; combine with [`is_complete`](Self::is_complete)
    /// to distinguish a clean end from a premature close.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, HttpError>;

    /// Whether every byte announced by the response headers has been read.
    fn is_complete(&self) -> bool;
}

/// Errors from [`HttpPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// TCP connect or TLS handshake failed.
    Connect,
    /// The request could not be written or the response not read.
    Io,
    /// The peer reset the connection mid-transfer.
    ConnectionReset,
    /// The transport-level read timeout expired.
    Timeout,
    /// Response body exceeds the adapter's receive buffer.
    BodyTooLarge,
    /// The supplied client identity could not be loaded into the TLS stack.
    BadClientIdentity,
    /// Operation not available on this backend (host simulation).
    Unsupported,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect / TLS handshake failed"),
            Self::Io => write!(f, "HTTP I/O error"),
            Self::ConnectionReset => write!(f, "connection reset by peer"),
            Self::Timeout => write!(f, "transport read timeout"),
            Self::BodyTooLarge => write!(f, "response body exceeds receive buffer"),
            Self::BadClientIdentity => write!(f, "client certificate/key rejected"),
            Self::Unsupported => write!(f, "not available on this backend"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Flash port (driven adapter: domain ↔ OTA partitions)
// ───────────────────────────────────────────────────────────────

/// A firmware partition, resolved freshly every boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRef {
    pub label: heapless::String<16>,
    pub offset: u32,
    pub size: u32,
}

impl fmt::Display for PartitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @0x{:06x} ({} B)", self.label, self.offset, self.size)
    }
}

/// The currently executing partition and the writable update target.
///
/// The update target is scratch space for exactly one in-flight update;
/// it becomes the running partition only after a complete, validated
/// write and an explicit boot-target change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPair {
    pub running: PartitionRef,
    pub update_target: PartitionRef,
}

/// Partition lifecycle operations for one OTA update.
///
/// Call order: `resolve_partitions` → `begin` → `write`* → `finalize`
/// → `arm_boot_target`, with `abort` usable any time after `begin` to
/// abandon a partial write.
pub trait FlashPort {
    /// Resolve the running partition and the next writable update partition.
    fn resolve_partitions(&mut self) -> Result<PartitionPair, FlashError>;

    /// Erase/prepare `target` for sequential writes.
    fn begin(&mut self, target: &PartitionRef) -> Result<(), FlashError>;

    /// Append `data` at the current write position.
    fn write(&mut self, data: &[u8]) -> Result<(), FlashError>;

    /// Close the write and validate the complete image (checksum +
    /// structure).  Failure means the partition contents are unusable.
    fn finalize(&mut self) -> Result<(), FlashError>;

    /// Abandon an in-progress write.  The partition is left in an
    /// undefined state and must not be armed.
    fn abort(&mut self);

    /// Mark `target` as the boot partition for the next reset.
    fn arm_boot_target(&mut self, target: &PartitionRef) -> Result<(), FlashError>;
}

/// Errors from [`FlashPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Running or update partition could not be resolved.
    PartitionNotFound,
    /// Erase/prepare of the update partition failed.
    BeginFailed,
    /// A sequential write failed mid-image.
    WriteFailed,
    /// Whole-image validation failed after the final write.
    ImageValidationFailed,
    /// The boot-target change did not take.
    BootArmFailed,
    /// No write is in progress.
    NotWriting,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartitionNotFound => write!(f, "partition not found"),
            Self::BeginFailed => write!(f, "partition erase/begin failed"),
            Self::WriteFailed => write!(f, "partition write failed"),
            Self::ImageValidationFailed => write!(f, "image validation failed"),
            Self::BootArmFailed => write!(f, "set boot partition failed"),
            Self::NotWriting => write!(f, "no partition write in progress"),
        }
    }
}
