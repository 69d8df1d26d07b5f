//! Dense type-code dispatch table.
//!
//! One registry is built per connection for its (negotiated version,
//! encoding mode) pair; a frame's leading type byte indexes straight into
//! the table. An unknown code is a structural decode error, never a skipped
//! frame.

use crate::command::{
    BrokerId, BrokerInfo, ConnectionId, ConnectionInfo, ConsumerId, ConsumerInfo, ExceptionResponse,
    KeepAliveInfo, MessageAck, MessageId, ProducerId, ProducerInfo, Queue, RemoveInfo, Response,
    SessionId, SessionInfo, ShutdownInfo, Topic, WireFormatInfo, type_code,
};
use crate::context::EncodingMode;
use crate::error::{Error, Result};
use crate::schema::FieldDescriptor;

/// Registry entry tying a wire type code to its schema.
#[derive(Debug)]
pub struct TypeEntry {
    /// Structure name, for diagnostics.
    pub name: &'static str,
    /// Wire type code.
    pub code: u8,
    /// Ordered field table.
    pub schema: &'static [FieldDescriptor],
}

static ENTRIES: &[TypeEntry] = &[
    TypeEntry {
        name: "WireFormatInfo",
        code: type_code::WIREFORMAT_INFO,
        schema: WireFormatInfo::SCHEMA,
    },
    TypeEntry {
        name: "BrokerInfo",
        code: type_code::BROKER_INFO,
        schema: BrokerInfo::SCHEMA,
    },
    TypeEntry {
        name: "ConnectionInfo",
        code: type_code::CONNECTION_INFO,
        schema: ConnectionInfo::SCHEMA,
    },
    TypeEntry {
        name: "SessionInfo",
        code: type_code::SESSION_INFO,
        schema: SessionInfo::SCHEMA,
    },
    TypeEntry {
        name: "ConsumerInfo",
        code: type_code::CONSUMER_INFO,
        schema: ConsumerInfo::SCHEMA,
    },
    TypeEntry {
        name: "ProducerInfo",
        code: type_code::PRODUCER_INFO,
        schema: ProducerInfo::SCHEMA,
    },
    TypeEntry {
        name: "KeepAliveInfo",
        code: type_code::KEEP_ALIVE_INFO,
        schema: KeepAliveInfo::SCHEMA,
    },
    TypeEntry {
        name: "ShutdownInfo",
        code: type_code::SHUTDOWN_INFO,
        schema: ShutdownInfo::SCHEMA,
    },
    TypeEntry {
        name: "RemoveInfo",
        code: type_code::REMOVE_INFO,
        schema: RemoveInfo::SCHEMA,
    },
    TypeEntry {
        name: "MessageAck",
        code: type_code::MESSAGE_ACK,
        schema: MessageAck::SCHEMA,
    },
    TypeEntry {
        name: "Response",
        code: type_code::RESPONSE,
        schema: Response::SCHEMA,
    },
    TypeEntry {
        name: "ExceptionResponse",
        code: type_code::EXCEPTION_RESPONSE,
        schema: ExceptionResponse::SCHEMA,
    },
    TypeEntry {
        name: "Queue",
        code: type_code::QUEUE,
        schema: Queue::SCHEMA,
    },
    TypeEntry {
        name: "Topic",
        code: type_code::TOPIC,
        schema: Topic::SCHEMA,
    },
    TypeEntry {
        name: "MessageId",
        code: type_code::MESSAGE_ID,
        schema: MessageId::SCHEMA,
    },
    TypeEntry {
        name: "ConnectionId",
        code: type_code::CONNECTION_ID,
        schema: ConnectionId::SCHEMA,
    },
    TypeEntry {
        name: "SessionId",
        code: type_code::SESSION_ID,
        schema: SessionId::SCHEMA,
    },
    TypeEntry {
        name: "ConsumerId",
        code: type_code::CONSUMER_ID,
        schema: ConsumerId::SCHEMA,
    },
    TypeEntry {
        name: "ProducerId",
        code: type_code::PRODUCER_ID,
        schema: ProducerId::SCHEMA,
    },
    TypeEntry {
        name: "BrokerId",
        code: type_code::BROKER_ID,
        schema: BrokerId::SCHEMA,
    },
];

/// Per-connection type-code lookup table.
#[derive(Debug)]
pub struct Registry {
    entries: [Option<&'static TypeEntry>; 256],
    version: u32,
    mode: EncodingMode,
}

impl Registry {
    /// Build the table for a (version, mode) pair.
    #[must_use]
    pub fn new(version: u32, mode: EncodingMode) -> Self {
        let mut entries: [Option<&'static TypeEntry>; 256] = [None; 256];
        for entry in ENTRIES {
            entries[usize::from(entry.code)] = Some(entry);
        }
        Self {
            entries,
            version,
            mode,
        }
    }

    /// Resolve a wire type code.
    pub fn lookup(&self, code: u8) -> Result<&'static TypeEntry> {
        self.entries[usize::from(code)].ok_or(Error::UnknownTypeCode { code })
    }

    /// Protocol version the table was built for.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Encoding mode the table was built for.
    #[must_use]
    pub const fn mode(&self) -> EncodingMode {
        self.mode
    }
}
