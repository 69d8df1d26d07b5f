//! OpenWire codec error types

use thiserror::Error;

/// OpenWire codec errors
///
/// Every variant is fatal to the frame being encoded or decoded; the codec
/// never retries. Transport code decides whether a failure closes the
/// connection.
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer too small
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Invalid negotiation magic
    #[error("invalid wire format magic: {found:02x?}")]
    InvalidMagic {
        /// Found magic bytes
        found: [u8; 8],
    },

    /// Unknown data structure type code
    #[error("unknown data structure type code: {code:#x}")]
    UnknownTypeCode {
        /// Offending type byte
        code: u8,
    },

    /// Frame exceeds the negotiated maximum size
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared frame size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Bytes left over after a structure decoded completely
    #[error("trailing bytes after structure: {remaining} remaining")]
    TrailingBytes {
        /// Unconsumed byte count
        remaining: usize,
    },

    /// Variable-width long marker outside 0..=8
    #[error("invalid variable-width long marker: {marker:#x}")]
    InvalidVarlongMarker {
        /// Offending marker byte
        marker: u8,
    },

    /// Loose-mode presence marker was neither 0 nor 1
    #[error("invalid presence marker: {marker:#x}")]
    InvalidMarkerByte {
        /// Offending marker byte
        marker: u8,
    },

    /// Invalid UTF-8 in a string field
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Cached-object index was never populated on the decode side
    #[error("cache index miss: index {index} not populated")]
    CacheIndexMiss {
        /// Referenced index
        index: u16,
    },

    /// Encode-side cache state diverged between the two tight passes
    #[error("marshal cache desync while encoding {type_code:#x}")]
    CacheDesync {
        /// Type code being encoded
        type_code: u8,
    },

    /// Read past the end of a tight-mode boolean stream
    #[error("boolean stream underrun: {limit} bits available")]
    BooleanStreamUnderrun {
        /// Bits available in the stream
        limit: usize,
    },

    /// Throwable payload named a class outside the allow-list
    #[error("disallowed throwable class: {class}")]
    DisallowedThrowableClass {
        /// Class name carried on the wire
        class: String,
    },

    /// Structure array field with more elements than the u16 count carries
    #[error("array field {field} has {len} elements, limit is 65535")]
    ArrayTooLong {
        /// Field name from the descriptor table
        field: &'static str,
        /// Element count
        len: usize,
    },

    /// Negotiated or requested version outside the supported range
    ///
    /// Wide enough to carry a negative version exactly as a peer advertised
    /// it.
    #[error("unsupported protocol version {version} (supported {min}..={max})")]
    UnsupportedVersion {
        /// Offending version
        version: i64,
        /// Minimum supported version
        min: u32,
        /// Maximum supported version
        max: u32,
    },

    /// Field value did not match the kind its descriptor declares
    #[error("field {field} of {type_name}: expected {expected}")]
    FieldType {
        /// Owning structure name
        type_name: &'static str,
        /// Field name from the descriptor table
        field: &'static str,
        /// Expected field kind
        expected: &'static str,
    },

    /// Fixed-length byte field carried the wrong number of bytes
    #[error("fixed-size field expected {expected} bytes, got {got}")]
    FixedSizeMismatch {
        /// Declared size
        expected: usize,
        /// Actual size
        got: usize,
    },

    /// Capability property blob malformed
    #[error("invalid capability property: {reason}")]
    InvalidProperty {
        /// What was wrong
        reason: &'static str,
    },

    /// IO error from the caller-supplied sink or source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
