//! Port traits: the hexagonal boundary between update logic and the device.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DeviceAdapter / FlashUpdater (domain)
//! ```
//!
//! Driven adapters (HTTP client, NVS, OTA flash driver, heap statistics)
//! implement these traits. The domain consumes them via generics, so it
//! never touches ESP-IDF directly and runs unchanged against host mocks.
//!
//! ## Contract notes
//!
//! - **HttpClient** bodies are returned whole for API calls; firmware images
//!   are pulled through a [`ByteSource`] so they never sit in two buffers.
//! - **StoragePort** writes MUST be atomic per key. The ESP-IDF NVS API
//!   guarantees this natively.
//! - **FlashDriver** transactions are abandoned with `abort()`; the running
//!   image is never touched until `end()` succeeds.

use core::fmt;

// ───────────────────────────────────────────────────────────────
// HTTP port (driven adapter: domain ↔ OTAM service)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Status line and declared length of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHead {
    pub status: u16,
    pub content_length: Option<usize>,
}

/// Pull-based body reader.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes. `Ok(0)` means the stream ended.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Blocking HTTP(S) client.
pub trait HttpClient {
    /// Body reader borrowed from the client for one streamed request.
    /// Dropping it ends the request.
    type Body<'a>: ByteSource
    where
        Self: 'a;

    /// Send a request and buffer the whole response body.
    fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<HttpResponse, TransportError>;

    /// Send a GET and return the response head plus a reader for the body.
    fn get_stream(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<(StreamHead, Self::Body<'_>), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced to prevent collisions between subsystems.
pub trait StoragePort {
    /// Check that `namespace` can be opened for read/write.
    fn open(&mut self, namespace: &str) -> Result<(), StorageError>;

    /// Read a value. Returns the number of bytes written to `buf`.
    ///
    /// A value longer than `buf` may be truncated, so callers size `buf`
    /// one byte past the largest value they accept.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

/// Typed accessors layered on the byte-oriented [`StoragePort`].
///
/// Integers are stored little-endian, booleans as one byte, text as UTF-8.
pub trait StorageExt: StoragePort {
    fn read_str<const N: usize>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<heapless::String<N>>, StorageError> {
        // One spare byte so an oversized value is detected, not truncated.
        let mut buf = vec![0u8; N + 1];
        let len = match self.read(namespace, key, &mut buf) {
            Ok(len) if len <= N => len,
            Ok(_) => return Err(StorageError::Corrupted),
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let text = core::str::from_utf8(&buf[..len]).map_err(|_| StorageError::Corrupted)?;
        let mut out = heapless::String::new();
        out.push_str(text).map_err(|_| StorageError::Corrupted)?;
        Ok(Some(out))
    }

    fn read_i32(&self, namespace: &str, key: &str) -> Result<Option<i32>, StorageError> {
        let mut buf = [0u8; 5];
        match self.read(namespace, key, &mut buf) {
            Ok(4) => Ok(Some(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))),
            Ok(_) => Err(StorageError::Corrupted),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_bool(&self, namespace: &str, key: &str) -> Result<Option<bool>, StorageError> {
        let mut buf = [0u8; 2];
        match self.read(namespace, key, &mut buf) {
            Ok(1) => Ok(Some(buf[0] != 0)),
            Ok(_) => Err(StorageError::Corrupted),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_str(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.write(namespace, key, value.as_bytes())
    }

    fn write_i32(&mut self, namespace: &str, key: &str, value: i32) -> Result<(), StorageError> {
        self.write(namespace, key, &value.to_le_bytes())
    }

    fn write_bool(&mut self, namespace: &str, key: &str, value: bool) -> Result<(), StorageError> {
        self.write(namespace, key, &[u8::from(value)])
    }
}

impl<T: StoragePort + ?Sized> StorageExt for T {}

// ───────────────────────────────────────────────────────────────
// Flash port (driven adapter: domain → OTA partition)
// ───────────────────────────────────────────────────────────────

/// Sized write transaction against the inactive program slot.
pub trait FlashDriver {
    /// Open a transaction for an image of `size` bytes.
    fn begin(&mut self, size: usize) -> Result<(), FlashDriverError>;

    /// Append `data`. Returns the number of bytes accepted; anything short of
    /// `data.len()` is a failed write.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Finalize the image and mark it bootable.
    fn end(&mut self) -> Result<(), FlashDriverError>;

    /// Whether the last transaction completed and the image is bootable.
    fn is_finished(&self) -> bool;

    /// Abandon the open transaction, if any.
    fn abort(&mut self);

    /// Most recent driver failure.
    fn last_error(&self) -> Option<FlashDriverError>;
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain ← heap statistics)
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Bytes currently free on the heap.
    fn free_heap(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`HttpClient`] and [`ByteSource`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established.
    Connect,
    /// Read or write on an open connection failed.
    Io,
    /// Request could not be built (bad URL, header too long).
    InvalidRequest,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Namespace could not be opened.
    OpenFailed,
    /// Storage partition is full.
    Full,
    /// Stored bytes do not decode as the requested type.
    Corrupted,
    /// Generic I/O error.
    IoError,
}

/// Failure kinds reported by a [`FlashDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashDriverError {
    Write,
    Erase,
    Read,
    Space,
    Size,
    Stream,
    Md5,
    MagicByte,
    NoPartition,
    BadArgument,
    Activate,
    Aborted,
    Unknown,
}

impl FlashDriverError {
    /// Human-readable description, suitable for the remote status log.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Write => "Flash Write Failed",
            Self::Erase => "Flash Erase Failed",
            Self::Read => "Flash Read Failed",
            Self::Space => "Not Enough Space",
            Self::Size => "Bad Size Given",
            Self::Stream => "Stream Read Timeout",
            Self::Md5 => "MD5 Check Failed",
            Self::MagicByte => "Wrong Magic Byte",
            Self::NoPartition => "Partition Could Not be Found",
            Self::BadArgument => "Bad Argument",
            Self::Activate => "Could Not Activate The Firmware",
            Self::Aborted => "Update Aborted",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connection failed"),
            Self::Io => write!(f, "I/O error"),
            Self::InvalidRequest => write!(f, "invalid request"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::OpenFailed => write!(f, "namespace open failed"),
            Self::Full => write!(f, "storage full"),
            Self::Corrupted => write!(f, "stored value corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for FlashDriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
