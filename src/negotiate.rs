//! Wire format negotiation.
//!
//! Each side opens by sending a `WireFormatInfo` advertising its preferred
//! version and capabilities, framed by the bootstrap context so a peer of
//! any version can read it. Capabilities travel as a string-keyed property
//! blob: unknown keys are skipped, which is what lets old and new peers
//! talk. [`negotiate`] folds the local and remote advertisements into the
//! [`FormatContext`] both directions use from then on; the rule is always
//! the weaker side wins, so the outcome is identical on both ends.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::command::WireFormatInfo;
use crate::context::{EncodingMode, FormatContext};
use crate::error::{Error, Result};
use crate::primitives::{ByteReader, read_str, write_str};
use crate::{DEFAULT_CACHE_SIZE, MAGIC, MAX_VERSION, MIN_VERSION};

const KEY_TIGHT_ENCODING: &str = "TightEncodingEnabled";
const KEY_CACHE: &str = "CacheEnabled";
const KEY_CACHE_SIZE: &str = "CacheSize";
const KEY_MAX_FRAME_SIZE: &str = "MaxFrameSize";
const KEY_STACK_TRACE: &str = "StackTraceEnabled";
const KEY_SIZE_PREFIX_DISABLED: &str = "SizePrefixDisabled";

const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_LONG: u8 = 3;
const TAG_STRING: u8 = 4;

/// Serialize the capability flags into the property blob carried by a
/// `WireFormatInfo` frame.
#[must_use]
pub fn encode_properties(info: &WireFormatInfo) -> Bytes {
    let mut out = BytesMut::new();
    out.put_u16(6);
    put_bool(&mut out, KEY_TIGHT_ENCODING, info.tight_encoding_enabled);
    put_bool(&mut out, KEY_CACHE, info.cache_enabled);
    put_int(&mut out, KEY_CACHE_SIZE, info.cache_size as i32);
    put_long(&mut out, KEY_MAX_FRAME_SIZE, info.max_frame_size as i64);
    put_bool(&mut out, KEY_STACK_TRACE, info.stack_trace_enabled);
    put_bool(&mut out, KEY_SIZE_PREFIX_DISABLED, info.size_prefix_disabled);
    out.freeze()
}

fn put_bool(out: &mut BytesMut, key: &str, value: bool) {
    write_str(out, key);
    out.put_u8(TAG_BOOL);
    out.put_u8(u8::from(value));
}

fn put_int(out: &mut BytesMut, key: &str, value: i32) {
    write_str(out, key);
    out.put_u8(TAG_INT);
    out.put_i32(value);
}

fn put_long(out: &mut BytesMut, key: &str, value: i64) {
    write_str(out, key);
    out.put_u8(TAG_LONG);
    out.put_i64(value);
}

/// Parse a capability property blob.
///
/// Absent capabilities stay at their conservative zero values, so a peer
/// that advertises nothing negotiates down to loose encoding with no
/// caching. Unknown keys are skipped. The caller overwrites `magic` and
/// `version` from the enclosing frame.
pub fn decode_properties(blob: &[u8]) -> Result<WireFormatInfo> {
    let mut info = WireFormatInfo {
        magic: MAGIC,
        version: 0,
        tight_encoding_enabled: false,
        cache_enabled: false,
        cache_size: 0,
        max_frame_size: crate::DEFAULT_MAX_FRAME_SIZE as u64,
        stack_trace_enabled: false,
        size_prefix_disabled: false,
    };
    let mut reader = ByteReader::new(blob);
    let count = reader.read_u16()?;
    for _ in 0..count {
        let key = read_str(&mut reader)?;
        let tag = reader.read_u8()?;
        match (key.as_str(), tag) {
            (KEY_TIGHT_ENCODING, TAG_BOOL) => {
                info.tight_encoding_enabled = read_bool(&mut reader)?;
            }
            (KEY_CACHE, TAG_BOOL) => info.cache_enabled = read_bool(&mut reader)?,
            (KEY_CACHE_SIZE, TAG_INT) => {
                info.cache_size = reader.read_i32()?.max(0) as u32;
            }
            (KEY_MAX_FRAME_SIZE, TAG_LONG) => {
                info.max_frame_size = reader.read_i64()?.max(0) as u64;
            }
            (KEY_STACK_TRACE, TAG_BOOL) => info.stack_trace_enabled = read_bool(&mut reader)?,
            (KEY_SIZE_PREFIX_DISABLED, TAG_BOOL) => {
                info.size_prefix_disabled = read_bool(&mut reader)?;
            }
            // Unknown key, or a known key under an unexpected tag: skip the
            // value by its tag so the rest of the blob stays readable.
            (_, TAG_BOOL) => {
                reader.read_u8()?;
            }
            (_, TAG_INT) => {
                reader.read_i32()?;
            }
            (_, TAG_LONG) => {
                reader.read_i64()?;
            }
            (_, TAG_STRING) => {
                read_str(&mut reader)?;
            }
            (_, _) => {
                return Err(Error::InvalidProperty {
                    reason: "unknown capability value tag",
                });
            }
        }
    }
    if !reader.is_empty() {
        return Err(Error::InvalidProperty {
            reason: "bytes after the declared capability count",
        });
    }
    Ok(info)
}

fn read_bool(reader: &mut ByteReader<'_>) -> Result<bool> {
    match reader.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::InvalidProperty {
            reason: "capability boolean was neither 0 nor 1",
        }),
    }
}

/// Fold the local and remote advertisements into the connection's context.
///
/// Deterministic and symmetric: version is the minimum of the two, boolean
/// capabilities require both sides, numeric bounds take the smaller side.
pub fn negotiate(local: &WireFormatInfo, remote: &WireFormatInfo) -> Result<FormatContext> {
    if remote.magic != MAGIC {
        return Err(Error::InvalidMagic {
            found: remote.magic,
        });
    }
    let version = local.version.min(remote.version);
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(Error::UnsupportedVersion {
            version: i64::from(version),
            min: MIN_VERSION,
            max: MAX_VERSION,
        });
    }

    let mode = if local.tight_encoding_enabled && remote.tight_encoding_enabled {
        EncodingMode::Tight
    } else {
        EncodingMode::Loose
    };
    let cache_enabled = local.cache_enabled && remote.cache_enabled;
    let cache_size = match local.cache_size.min(remote.cache_size) {
        // A side that enables caching without naming a bound gets the default.
        0 => DEFAULT_CACHE_SIZE,
        size => size as usize,
    };
    let max_frame_size = local.max_frame_size.min(remote.max_frame_size) as usize;
    let stack_traces = local.stack_trace_enabled && remote.stack_trace_enabled;
    let size_prefix_disabled = local.size_prefix_disabled && remote.size_prefix_disabled;

    debug!(
        version,
        ?mode,
        cache_enabled,
        cache_size,
        max_frame_size,
        stack_traces,
        size_prefix_disabled,
        "negotiated wire format"
    );

    Ok(FormatContext::new(version, mode)
        .with_cache(cache_enabled)
        .with_cache_size(cache_size)
        .with_stack_traces(stack_traces)
        .with_max_frame_size(max_frame_size)
        .with_size_prefix_disabled(size_prefix_disabled))
}
