//! Error types untuk semua layer
//!
//! Satu enum per layer (codec, transport, storage, stat), plus `Error`
//! di level crate untuk caller yang tidak peduli layer mana yang gagal.

use std::fmt;
use std::io;

use thiserror::Error;

/// Crate-level result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Semua error yang bisa keluar dari crate ini
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Codec errors (size, encode, decode, schema lookup)
#[derive(Debug, Error)]
pub enum CodecError {
    /// A type name could not be classified through the registry
    #[error("schema error in `{type_name}`: {reason}")]
    Schema { type_name: String, reason: String },

    /// Value shape does not match the descriptor it is encoded against
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: &'static str,
    },

    /// Decode target is not an instance of the descriptor's type
    #[error("class cast: cannot decode `{expected}` into `{found}`")]
    ClassCast { expected: String, found: String },

    /// Buffer ended before all expected bytes were read
    #[error("truncated input at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid tag byte {tag:#04x} at offset {offset}")]
    InvalidTag { offset: usize, tag: u8 },

    #[error("invalid length {len} at offset {offset}")]
    InvalidLength { offset: usize, len: i32 },

    #[error("invalid UTF-16 string at offset {offset}")]
    InvalidUtf16 { offset: usize },

    /// Element or code-unit count does not fit the 4-byte count field
    #[error("{what} length {len} exceeds i32::MAX")]
    TooLarge { what: &'static str, len: usize },

    /// Array/object nesting melebihi batas
    #[error("nesting deeper than {depth} levels")]
    TooDeep { depth: usize },

    #[error("encoded {written} bytes but size pass predicted {predicted}")]
    SizeMismatch { predicted: usize, written: usize },

    #[error("{remaining} trailing bytes after decoded value")]
    TrailingBytes { remaining: usize },
}

impl CodecError {
    pub(crate) fn schema(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// Transport errors (connection, send loop, listener)
#[derive(Debug, Error)]
pub enum TransportError {
    /// Read failed before the expected number of bytes arrived
    #[error("truncated read: received {received} of {expected} bytes")]
    Truncated {
        received: usize,
        expected: usize,
        #[source]
        cause: io::Error,
    },

    /// Write of a queued message failed; `label` is the caller's error label
    #[error("{label}")]
    SendFailed {
        label: String,
        #[source]
        cause: Box<TransportError>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("frame length {len} outside 0..={max}")]
    FrameTooLarge { len: i64, max: usize },

    #[error("connection `{0}` is closed")]
    Closed(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// FrameStore errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("capacity must be a non-zero power of two, got {0}")]
    InvalidCapacity(usize),

    #[error("store is full: {needed} bytes needed, {available} available")]
    Full { needed: usize, available: usize },

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("no frame at offset {0}")]
    BadOffset(usize),
}

/// Which bound a rejected assignment crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Minimum,
    Maximum,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Minimum => f.write_str("less than the minimum"),
            Bound::Maximum => f.write_str("greater than the maximum"),
        }
    }
}

/// Assignment to a non-regulating stat fell outside its bounds
#[derive(Debug, Clone, PartialEq, Error)]
#[error("current was set to {attempted} which is {side} value of {bound}")]
pub struct OutOfRangeError<T: fmt::Debug + fmt::Display> {
    pub attempted: T,
    pub bound: T,
    pub side: Bound,
}
