//! Per-connection marshalling context.
//!
//! A [`FormatContext`] bundles everything one direction of a connection
//! needs to turn commands into frames and back: the negotiated version and
//! encoding mode, the frame-size bound, the throwable stack-trace switch,
//! and the paired identity caches. Contexts are stateful because the caches
//! are; frames must be decoded in the order they were encoded.
//!
//! Frame layout is `[u32 length][u8 type code][payload]`, length counting
//! everything after itself. A connection may negotiate the length prefix
//! away, in which case a frame is exactly one buffer.

use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::boolean_stream::BooleanStream;
use crate::cache::{MarshalCache, UnmarshalCache};
use crate::command::DataStructure;
use crate::error::{Error, Result};
use crate::marshaller;
use crate::primitives::ByteReader;
use crate::registry::Registry;
use crate::{DEFAULT_CACHE_SIZE, DEFAULT_MAX_FRAME_SIZE, MIN_VERSION};

/// How structure bodies are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    /// Two-pass encoding: booleans and presence flags are bit-packed into a
    /// prefix stream and literal bytes follow.
    Tight,
    /// One-pass encoding with inline marker bytes.
    Loose,
}

/// Stateful codec for one direction pair of a connection.
#[derive(Debug)]
pub struct FormatContext {
    registry: Registry,
    cache_enabled: bool,
    cache_size: usize,
    stack_traces: bool,
    max_frame_size: usize,
    size_prefix_disabled: bool,
    marshal_cache: MarshalCache<DataStructure>,
    unmarshal_cache: UnmarshalCache<DataStructure>,
}

impl FormatContext {
    /// Context for an already-negotiated version and mode, with default
    /// caching, frame bound, and stack traces on.
    #[must_use]
    pub fn new(version: u32, mode: EncodingMode) -> Self {
        Self {
            registry: Registry::new(version, mode),
            cache_enabled: true,
            cache_size: DEFAULT_CACHE_SIZE,
            stack_traces: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            size_prefix_disabled: false,
            marshal_cache: MarshalCache::new(DEFAULT_CACHE_SIZE),
            unmarshal_cache: UnmarshalCache::new(DEFAULT_CACHE_SIZE),
        }
    }

    /// Context both ends use before negotiation completes: lowest version,
    /// loose encoding, no caching. The `WireFormatInfo` exchange itself is
    /// framed with this.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self::new(MIN_VERSION, EncodingMode::Loose).with_cache(false)
    }

    /// Enable or disable the identity caches.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Resize the identity caches. Clamped to the u16 index space, with a
    /// floor of 16 so no single frame can carry more cached fields than the
    /// cache holds slots. Both ends must agree on the bound or indices
    /// drift.
    #[must_use]
    pub fn with_cache_size(mut self, size: usize) -> Self {
        let size = size.clamp(16, usize::from(u16::MAX) + 1);
        self.cache_size = size;
        self.marshal_cache = MarshalCache::new(size);
        self.unmarshal_cache = UnmarshalCache::new(size);
        self
    }

    /// Enable or disable marshalling of throwable stack traces.
    #[must_use]
    pub fn with_stack_traces(mut self, enabled: bool) -> Self {
        self.stack_traces = enabled;
        self
    }

    /// Set the largest frame either direction will accept.
    #[must_use]
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Omit the four-byte length prefix from frames.
    #[must_use]
    pub fn with_size_prefix_disabled(mut self, disabled: bool) -> Self {
        self.size_prefix_disabled = disabled;
        self
    }

    /// Negotiated protocol version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.registry.version()
    }

    /// Negotiated encoding mode.
    #[must_use]
    pub const fn mode(&self) -> EncodingMode {
        self.registry.mode()
    }

    /// Whether the identity caches are in play.
    #[must_use]
    pub const fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Identity cache bound.
    #[must_use]
    pub const fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// Whether throwable stack traces ride on the wire.
    #[must_use]
    pub const fn stack_traces(&self) -> bool {
        self.stack_traces
    }

    /// Largest acceptable frame.
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Whether frames omit the length prefix.
    #[must_use]
    pub const fn size_prefix_disabled(&self) -> bool {
        self.size_prefix_disabled
    }

    pub(crate) const fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn marshal_cache_lookup(&self, value: &DataStructure) -> Option<u16> {
        self.marshal_cache.lookup(value)
    }

    pub(crate) fn marshal_cache_insert(&mut self, value: DataStructure) -> u16 {
        self.marshal_cache.insert(value)
    }

    pub(crate) fn unmarshal_cache_get(&self, index: u16) -> Result<DataStructure> {
        self.unmarshal_cache.get(index).map(Clone::clone)
    }

    pub(crate) fn unmarshal_cache_insert(&mut self, value: DataStructure) -> u16 {
        self.unmarshal_cache.insert(value)
    }

    /// Encode one command as a complete frame.
    ///
    /// A frame that fails to encode, including one rejected for exceeding
    /// the frame bound, leaves the identity cache exactly as it was: the
    /// peer never sees the frame, so its insertions must not stand.
    pub fn marshal(&mut self, ds: &DataStructure) -> Result<Bytes> {
        match self.marshal_frame(ds) {
            Ok(frame) => {
                self.marshal_cache.commit();
                Ok(frame)
            }
            Err(err) => {
                self.marshal_cache.rollback();
                Err(err)
            }
        }
    }

    fn marshal_frame(&mut self, ds: &DataStructure) -> Result<Bytes> {
        let mode = self.mode();
        let mut body;
        match mode {
            EncodingMode::Tight => {
                let mut bits = BooleanStream::new();
                let field_len = marshaller::tight_marshal1(self, ds, &mut bits)?;
                let payload_len = 1 + bits.marshalled_size() + field_len;
                self.check_frame_len(payload_len)?;
                body = BytesMut::with_capacity(payload_len);
                body.put_u8(ds.type_code());
                bits.marshal(&mut body);
                bits.reset_read();
                marshaller::tight_marshal2(self, ds, &mut body, &mut bits)?;
            }
            EncodingMode::Loose => {
                body = BytesMut::with_capacity(64);
                body.put_u8(ds.type_code());
                marshaller::loose_marshal(self, ds, &mut body)?;
                self.check_frame_len(body.len())?;
            }
        }
        trace!(
            command = ds.type_name(),
            len = body.len(),
            ?mode,
            "marshalled frame"
        );
        if self.size_prefix_disabled {
            return Ok(body.freeze());
        }
        let mut framed = BytesMut::with_capacity(4 + body.len());
        framed.put_u32(body.len() as u32);
        framed.extend_from_slice(&body);
        Ok(framed.freeze())
    }

    /// Decode one command from a complete frame. The buffer must hold
    /// exactly one frame; leftover bytes are a structural error.
    pub fn unmarshal(&mut self, frame: &[u8]) -> Result<DataStructure> {
        let mut reader = ByteReader::new(frame);
        if self.size_prefix_disabled {
            self.check_frame_len(frame.len())?;
        } else {
            let declared = reader.read_u32()? as usize;
            self.check_frame_len(declared)?;
            if reader.remaining() < declared {
                return Err(Error::BufferTooSmall {
                    needed: declared,
                    got: reader.remaining(),
                });
            }
            if reader.remaining() > declared {
                return Err(Error::TrailingBytes {
                    remaining: reader.remaining() - declared,
                });
            }
        }
        let code = reader.read_u8()?;
        let ds = match self.mode() {
            EncodingMode::Tight => {
                let mut bits = BooleanStream::unmarshal(&mut reader)?;
                marshaller::tight_unmarshal(self, code, &mut reader, &mut bits)?
            }
            EncodingMode::Loose => marshaller::loose_unmarshal(self, code, &mut reader)?,
        };
        if !reader.is_empty() {
            return Err(Error::TrailingBytes {
                remaining: reader.remaining(),
            });
        }
        trace!(command = ds.type_name(), len = frame.len(), "unmarshalled frame");
        Ok(ds)
    }

    /// Encode one command and write the frame to an IO sink.
    pub fn marshal_into<W: Write>(&mut self, ds: &DataStructure, writer: &mut W) -> Result<()> {
        let frame = self.marshal(ds)?;
        writer.write_all(&frame)?;
        Ok(())
    }

    /// Read one length-prefixed frame from an IO source and decode it.
    pub fn unmarshal_from<R: Read>(&mut self, reader: &mut R) -> Result<DataStructure> {
        if self.size_prefix_disabled {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "frame boundaries are unknowable from a stream without the size prefix",
            )));
        }
        let mut prefix = [0u8; 4];
        reader.read_exact(&mut prefix)?;
        let declared = u32::from_be_bytes(prefix) as usize;
        self.check_frame_len(declared)?;
        let mut frame = vec![0u8; 4 + declared];
        frame[..4].copy_from_slice(&prefix);
        reader.read_exact(&mut frame[4..])?;
        self.unmarshal(&frame)
    }

    fn check_frame_len(&self, len: usize) -> Result<()> {
        if len > self.max_frame_size || len > u32::MAX as usize {
            return Err(Error::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::samples::{every_sample, sample_connection_info};
    use crate::command::{ConnectionId, ConnectionInfo, SessionId, SessionInfo};

    fn roundtrip(mode: EncodingMode, version: u32, ds: &DataStructure) -> DataStructure {
        let mut sender = FormatContext::new(version, mode);
        let mut receiver = FormatContext::new(version, mode);
        let frame = sender.marshal(ds).unwrap();
        receiver.unmarshal(&frame).unwrap()
    }

    #[test]
    fn test_every_command_roundtrips_tight() {
        for sample in every_sample() {
            assert_eq!(roundtrip(EncodingMode::Tight, 12, &sample), sample);
        }
    }

    #[test]
    fn test_every_command_roundtrips_loose() {
        for sample in every_sample() {
            assert_eq!(roundtrip(EncodingMode::Loose, 12, &sample), sample);
        }
    }

    #[test]
    fn test_old_version_drops_gated_fields() {
        let sent = DataStructure::ConnectionInfo(sample_connection_info());
        let received = roundtrip(EncodingMode::Tight, 1, &sent);
        let DataStructure::ConnectionInfo(info) = received else {
            panic!("wrong variant");
        };
        // Fields below their `since` version come back as defaults.
        assert_eq!(info.client_ip, None);
        assert!(!info.fault_tolerant);
        assert!(!info.manageable);
    }

    #[test]
    fn test_repeat_cached_value_shrinks_frame() {
        let mut sender = FormatContext::new(12, EncodingMode::Tight);
        let mut receiver = FormatContext::new(12, EncodingMode::Tight);
        let command = DataStructure::SessionInfo(SessionInfo {
            session_id: Some(SessionId::new("conn-77", 3)),
        });

        let first = sender.marshal(&command).unwrap();
        let second = sender.marshal(&command).unwrap();
        assert!(second.len() < first.len(), "{} vs {}", second.len(), first.len());
        // Frame two is the cached reference: prefix, code, bits, u16 index.
        assert!(second.len() <= 4 + 1 + 2 + 2);

        assert_eq!(receiver.unmarshal(&first).unwrap(), command);
        assert_eq!(receiver.unmarshal(&second).unwrap(), command);
    }

    #[test]
    fn test_cache_disabled_never_emits_references() {
        let mut sender = FormatContext::new(12, EncodingMode::Tight).with_cache(false);
        let command = DataStructure::SessionInfo(SessionInfo {
            session_id: Some(SessionId::new("conn-77", 3)),
        });
        let first = sender.marshal(&command).unwrap();
        let second = sender.marshal(&command).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_order_cache_reference_is_fatal() {
        let mut sender = FormatContext::new(12, EncodingMode::Tight);
        let mut receiver = FormatContext::new(12, EncodingMode::Tight);
        let command = DataStructure::SessionInfo(SessionInfo {
            session_id: Some(SessionId::new("conn-77", 3)),
        });
        sender.marshal(&command).unwrap();
        let reference_frame = sender.marshal(&command).unwrap();
        // Receiver never saw the populating frame.
        assert!(matches!(
            receiver.unmarshal(&reference_frame),
            Err(Error::CacheIndexMiss { .. })
        ));
    }

    #[test]
    fn test_frame_too_large_on_encode_and_decode() {
        let command = DataStructure::ConnectionId(ConnectionId::new("x".repeat(100)));
        let mut small = FormatContext::new(12, EncodingMode::Loose).with_max_frame_size(16);
        assert!(matches!(
            small.marshal(&command),
            Err(Error::FrameTooLarge { max: 16, .. })
        ));

        let mut normal = FormatContext::new(12, EncodingMode::Loose);
        let frame = normal.marshal(&command).unwrap();
        let mut strict = FormatContext::new(12, EncodingMode::Loose).with_max_frame_size(16);
        assert!(matches!(
            strict.unmarshal(&frame),
            Err(Error::FrameTooLarge { max: 16, .. })
        ));
    }

    #[test]
    fn test_rejected_frame_leaves_the_caches_in_lockstep() {
        for mode in [EncodingMode::Tight, EncodingMode::Loose] {
            let mut sender = FormatContext::new(12, mode).with_max_frame_size(40);
            let mut receiver = FormatContext::new(12, mode).with_max_frame_size(40);

            // The oversized frame carries a cacheable identifier; its
            // rejection must not leave that identifier in the sender's
            // cache, or the follow-up frame would reference an index the
            // receiver never populated.
            let oversized = DataStructure::ConnectionInfo(ConnectionInfo {
                connection_id: Some(ConnectionId::new("conn-77")),
                client_id: Some("x".repeat(200)),
                ..ConnectionInfo::default()
            });
            assert!(matches!(
                sender.marshal(&oversized),
                Err(Error::FrameTooLarge { .. })
            ));

            let follow_up = DataStructure::ConnectionInfo(ConnectionInfo {
                connection_id: Some(ConnectionId::new("conn-77")),
                ..ConnectionInfo::default()
            });
            let frame = sender.marshal(&follow_up).unwrap();
            assert_eq!(receiver.unmarshal(&frame).unwrap(), follow_up);
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let command = DataStructure::ConnectionId(ConnectionId::new("c"));
        let mut ctx = FormatContext::new(12, EncodingMode::Tight);
        let frame = ctx.marshal(&command).unwrap();
        let mut padded = frame.to_vec();
        padded.push(0xAA);
        assert!(matches!(
            ctx.unmarshal(&padded),
            Err(Error::TrailingBytes { .. })
        ));
    }

    #[test]
    fn test_unknown_type_code_rejected() {
        let mut ctx = FormatContext::new(12, EncodingMode::Loose);
        // Length 1, type code 0xEE, no payload.
        let frame = [0, 0, 0, 1, 0xEE];
        assert!(matches!(
            ctx.unmarshal(&frame),
            Err(Error::UnknownTypeCode { code: 0xEE })
        ));
    }

    #[test]
    fn test_size_prefix_disabled_frames() {
        let command = DataStructure::ConnectionId(ConnectionId::new("bare"));
        let mut sender = FormatContext::new(12, EncodingMode::Tight).with_size_prefix_disabled(true);
        let mut receiver =
            FormatContext::new(12, EncodingMode::Tight).with_size_prefix_disabled(true);
        let frame = sender.marshal(&command).unwrap();
        assert_eq!(frame[0], crate::command::type_code::CONNECTION_ID);
        assert_eq!(receiver.unmarshal(&frame).unwrap(), command);
    }

    #[test]
    fn test_io_helpers_frame_a_stream() {
        let command = DataStructure::SessionInfo(SessionInfo {
            session_id: Some(SessionId::new("conn-io", 9)),
        });
        let mut sender = FormatContext::new(12, EncodingMode::Tight);
        let mut receiver = FormatContext::new(12, EncodingMode::Tight);

        let mut stream = Vec::new();
        sender.marshal_into(&command, &mut stream).unwrap();
        sender.marshal_into(&command, &mut stream).unwrap();

        let mut cursor = std::io::Cursor::new(stream);
        assert_eq!(receiver.unmarshal_from(&mut cursor).unwrap(), command);
        assert_eq!(receiver.unmarshal_from(&mut cursor).unwrap(), command);
    }

    #[test]
    fn test_bootstrap_context_defaults() {
        let ctx = FormatContext::bootstrap();
        assert_eq!(ctx.version(), MIN_VERSION);
        assert_eq!(ctx.mode(), EncodingMode::Loose);
        assert!(!ctx.cache_enabled());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_connection_id_roundtrips_both_modes(value in ".{0,200}") {
                let command = DataStructure::ConnectionId(ConnectionId::new(value));
                prop_assert_eq!(
                    roundtrip(EncodingMode::Tight, 12, &command),
                    command.clone()
                );
                prop_assert_eq!(roundtrip(EncodingMode::Loose, 12, &command), command);
            }

            #[test]
            fn prop_session_id_roundtrips_any_counter(
                connection in "[a-z0-9:-]{1,40}",
                counter in proptest::num::i64::ANY,
            ) {
                let command = DataStructure::SessionId(SessionId::new(connection, counter));
                prop_assert_eq!(
                    roundtrip(EncodingMode::Tight, 12, &command),
                    command.clone()
                );
                prop_assert_eq!(roundtrip(EncodingMode::Loose, 12, &command), command);
            }

            #[test]
            fn prop_repeated_frames_stay_in_cache_lockstep(
                names in proptest::collection::vec("[a-z]{1,12}", 1..30),
            ) {
                let mut sender = FormatContext::new(12, EncodingMode::Tight).with_cache_size(8);
                let mut receiver = FormatContext::new(12, EncodingMode::Tight).with_cache_size(8);
                for name in names {
                    let command = DataStructure::SessionInfo(SessionInfo {
                        session_id: Some(SessionId::new(name, 1)),
                    });
                    let frame = sender.marshal(&command).unwrap();
                    prop_assert_eq!(receiver.unmarshal(&frame).unwrap(), command);
                }
            }
        }
    }
}
