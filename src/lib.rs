//! OpenWire - binary wire protocol codec for broker messaging
//!
//! This library implements the OpenWire frame codec: version-negotiated
//! marshalling of broker commands with tight (bit-packed, two-pass) and
//! loose (marker-byte) encodings, identity caching of repeated reference
//! values, and validated exception payloads.
//!
//! # Quick Start
//!
//! ```rust
//! use openwire::{ConnectionId, DataStructure, EncodingMode, FormatContext};
//!
//! // One context per connection, after negotiation.
//! let mut sender = FormatContext::new(12, EncodingMode::Tight);
//! let mut receiver = FormatContext::new(12, EncodingMode::Tight);
//!
//! let command = DataStructure::ConnectionId(ConnectionId::new("conn-1"));
//! let frame = sender.marshal(&command)?;
//! let decoded = receiver.unmarshal(&frame)?;
//! assert_eq!(decoded, command);
//! # Ok::<(), openwire::Error>(())
//! ```
//!
//! # Features
//!
//! - **Tight encoding** - booleans and presence flags bit-packed into a
//!   prefix stream, variable-width longs, exact pre-sized frames
//! - **Identity caching** - repeated identifiers shrink to a two-byte
//!   reference, with deterministic lock-step eviction on both ends
//! - **Version negotiation** - `WireFormatInfo` capability exchange; gated
//!   fields drop out below the version that introduced them
//! - **Validated throwables** - exception class names checked against a
//!   closed allow-list before anything is built from them

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod boolean_stream;
pub mod cache;
pub mod command;
pub mod context;
pub mod error;
mod marshaller;
pub mod negotiate;
pub mod primitives;
pub mod registry;
pub mod schema;
pub mod throwable;

pub use boolean_stream::BooleanStream;
pub use command::{
    BrokerId, BrokerInfo, ConnectionId, ConnectionInfo, ConsumerId, ConsumerInfo, DataStructure,
    ExceptionResponse, KeepAliveInfo, MessageAck, MessageId, ProducerId, ProducerInfo, Queue,
    RemoveInfo, Response, SessionId, SessionInfo, ShutdownInfo, Topic, WireFormatInfo, type_code,
};
pub use context::{EncodingMode, FormatContext};
pub use error::{Error, Result};
pub use negotiate::negotiate;
pub use registry::{Registry, TypeEntry};
pub use schema::{FieldDescriptor, FieldKind, FieldValue};
pub use throwable::{ThrowableClass, WireThrowable};

/// Eight-byte protocol magic opening every negotiation frame.
pub const MAGIC: [u8; 8] = *b"OpenWire";

/// Lowest protocol version this codec speaks.
pub const MIN_VERSION: u32 = 1;

/// Highest protocol version this codec speaks.
pub const MAX_VERSION: u32 = 12;

/// Version advertised by default.
pub const DEFAULT_VERSION: u32 = 12;

/// Identity cache bound used when a peer does not name one.
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// Default largest acceptable frame (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
