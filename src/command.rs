//! Concrete wire commands and the [`DataStructure`] tagged union.
//!
//! Each command declares its ordered field table (`SCHEMA`), a `fields()`
//! projection into [`FieldValue`]s, and a `from_fields` constructor; the
//! generic drivers in [`crate::marshaller`] interpret the table and never
//! know the concrete types. The set carried here is the representative slice
//! of the broker command catalogue: identifiers, lifecycle commands,
//! destinations, acks and responses, covering every field kind, version gate,
//! cacheable reference, recursive array and throwable path the engine
//! supports.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::negotiate;
use crate::schema::{FieldDescriptor, FieldKind, FieldValue, FieldValues};
use crate::throwable::WireThrowable;
use crate::{DEFAULT_CACHE_SIZE, DEFAULT_MAX_FRAME_SIZE, DEFAULT_VERSION, MAGIC};

/// Wire type codes, stable across every protocol version.
pub mod type_code {
    /// Negotiation frame.
    pub const WIREFORMAT_INFO: u8 = 1;
    /// Broker advertisement.
    pub const BROKER_INFO: u8 = 2;
    /// Connection establishment.
    pub const CONNECTION_INFO: u8 = 3;
    /// Session establishment.
    pub const SESSION_INFO: u8 = 4;
    /// Consumer registration.
    pub const CONSUMER_INFO: u8 = 5;
    /// Producer registration.
    pub const PRODUCER_INFO: u8 = 6;
    /// Liveness probe.
    pub const KEEP_ALIVE_INFO: u8 = 10;
    /// Orderly shutdown notice.
    pub const SHUTDOWN_INFO: u8 = 11;
    /// Resource teardown.
    pub const REMOVE_INFO: u8 = 12;
    /// Message acknowledgment.
    pub const MESSAGE_ACK: u8 = 22;
    /// Plain command response.
    pub const RESPONSE: u8 = 30;
    /// Response carrying an exception.
    pub const EXCEPTION_RESPONSE: u8 = 31;
    /// Point-to-point destination.
    pub const QUEUE: u8 = 100;
    /// Publish-subscribe destination.
    pub const TOPIC: u8 = 101;
    /// Message identifier.
    pub const MESSAGE_ID: u8 = 110;
    /// Connection identifier.
    pub const CONNECTION_ID: u8 = 120;
    /// Session identifier.
    pub const SESSION_ID: u8 = 121;
    /// Consumer identifier.
    pub const CONSUMER_ID: u8 = 122;
    /// Producer identifier.
    pub const PRODUCER_ID: u8 = 123;
    /// Broker identifier.
    pub const BROKER_ID: u8 = 124;
}

/// Extract a specific variant from a nested structure, failing structurally
/// when the wire carried a different type than the field expects.
macro_rules! expect_variant {
    ($value:expr, $variant:ident, $type_name:expr, $field:expr) => {
        match $value {
            DataStructure::$variant(inner) => Ok(inner),
            _ => Err(Error::FieldType {
                type_name: $type_name,
                field: $field,
                expected: stringify!($variant),
            }),
        }
    };
}

fn opt_str(value: &Option<String>) -> FieldValue {
    FieldValue::Str(value.clone())
}

/// Negotiation frame: fixed magic, advertised version, capability blob.
///
/// The capability flags are carried on the wire as a string-keyed property
/// blob inside the third field; `fields()` re-derives the blob from the
/// typed flags (the marshal-aware half of the lifecycle) and `from_fields`
/// parses it back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireFormatInfo {
    /// Eight-byte protocol magic.
    pub magic: [u8; 8],
    /// Highest protocol version this side speaks.
    pub version: u32,
    /// Tight encoding supported.
    pub tight_encoding_enabled: bool,
    /// Identity caching supported.
    pub cache_enabled: bool,
    /// Identity cache bound this side accepts.
    pub cache_size: u32,
    /// Largest frame this side accepts.
    pub max_frame_size: u64,
    /// Throwable stack traces wanted.
    pub stack_trace_enabled: bool,
    /// Omit the four-byte frame length prefix.
    pub size_prefix_disabled: bool,
}

impl Default for WireFormatInfo {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: DEFAULT_VERSION,
            tight_encoding_enabled: true,
            cache_enabled: true,
            cache_size: DEFAULT_CACHE_SIZE as u32,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE as u64,
            stack_trace_enabled: true,
            size_prefix_disabled: false,
        }
    }
}

impl WireFormatInfo {
    /// Wire schema. Stable since version 1 so any peer can read it before
    /// negotiation completes.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("magic", FieldKind::FixedBytes(8)),
        FieldDescriptor::new("version", FieldKind::Int),
        FieldDescriptor::new("properties", FieldKind::ByteSeq),
    ];

    /// Advertisement for the given version with default capabilities.
    #[must_use]
    pub fn advertising(version: u32) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::FixedBytes(Bytes::copy_from_slice(&self.magic)),
            FieldValue::Int(self.version as i32),
            FieldValue::ByteSeq(Some(negotiate::encode_properties(self))),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        let magic_bytes = values.take_fixed()?;
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&magic_bytes);
        let version = values.take_int()?;
        if version < 0 {
            return Err(Error::UnsupportedVersion {
                version: i64::from(version),
                min: crate::MIN_VERSION,
                max: crate::MAX_VERSION,
            });
        }
        let properties = values.take_bytes()?.unwrap_or_default();
        let mut info = negotiate::decode_properties(&properties)?;
        info.magic = magic;
        info.version = version as u32;
        Ok(info)
    }
}

/// Broker identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BrokerId {
    /// Unique broker name.
    pub value: String,
}

impl BrokerId {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("value", FieldKind::Str)];

    /// Create an identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![FieldValue::Str(Some(self.value.clone()))]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            value: values.take_str()?.unwrap_or_default(),
        })
    }
}

/// Connection identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    /// Unique connection name.
    pub value: String,
}

impl ConnectionId {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("value", FieldKind::Str)];

    /// Create an identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![FieldValue::Str(Some(self.value.clone()))]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            value: values.take_str()?.unwrap_or_default(),
        })
    }
}

/// Session identifier, scoped to a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SessionId {
    /// Owning connection.
    pub connection_id: String,
    /// Session counter within the connection.
    pub value: i64,
}

impl SessionId {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("connection_id", FieldKind::Str),
        FieldDescriptor::new("value", FieldKind::Long),
    ];

    /// Create an identifier.
    pub fn new(connection_id: impl Into<String>, value: i64) -> Self {
        Self {
            connection_id: connection_id.into(),
            value,
        }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Str(Some(self.connection_id.clone())),
            FieldValue::Long(self.value),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            connection_id: values.take_str()?.unwrap_or_default(),
            value: values.take_long()?,
        })
    }
}

/// Consumer identifier, scoped to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConsumerId {
    /// Owning connection.
    pub connection_id: String,
    /// Owning session counter.
    pub session_id: i64,
    /// Consumer counter within the session.
    pub value: i64,
}

impl ConsumerId {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("connection_id", FieldKind::Str),
        FieldDescriptor::new("session_id", FieldKind::Long),
        FieldDescriptor::new("value", FieldKind::Long),
    ];

    /// Create an identifier.
    pub fn new(connection_id: impl Into<String>, session_id: i64, value: i64) -> Self {
        Self {
            connection_id: connection_id.into(),
            session_id,
            value,
        }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Str(Some(self.connection_id.clone())),
            FieldValue::Long(self.session_id),
            FieldValue::Long(self.value),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            connection_id: values.take_str()?.unwrap_or_default(),
            session_id: values.take_long()?,
            value: values.take_long()?,
        })
    }
}

/// Producer identifier, scoped to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProducerId {
    /// Owning connection.
    pub connection_id: String,
    /// Owning session counter.
    pub session_id: i64,
    /// Producer counter within the session.
    pub value: i64,
}

impl ProducerId {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("connection_id", FieldKind::Str),
        FieldDescriptor::new("session_id", FieldKind::Long),
        FieldDescriptor::new("value", FieldKind::Long),
    ];

    /// Create an identifier.
    pub fn new(connection_id: impl Into<String>, session_id: i64, value: i64) -> Self {
        Self {
            connection_id: connection_id.into(),
            session_id,
            value,
        }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Str(Some(self.connection_id.clone())),
            FieldValue::Long(self.session_id),
            FieldValue::Long(self.value),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            connection_id: values.take_str()?.unwrap_or_default(),
            session_id: values.take_long()?,
            value: values.take_long()?,
        })
    }
}

/// Message identifier: producer reference plus two sequence counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MessageId {
    /// Producing endpoint; cacheable, it repeats on every message.
    pub producer_id: Option<ProducerId>,
    /// Sequence assigned by the producer.
    pub producer_sequence_id: i64,
    /// Sequence assigned by the broker.
    pub broker_sequence_id: i64,
}

impl MessageId {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("producer_id", FieldKind::Struct).cached(),
        FieldDescriptor::new("producer_sequence_id", FieldKind::Long),
        FieldDescriptor::new("broker_sequence_id", FieldKind::Long),
    ];

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Struct(
                self.producer_id
                    .clone()
                    .map(|id| Box::new(DataStructure::ProducerId(id))),
            ),
            FieldValue::Long(self.producer_sequence_id),
            FieldValue::Long(self.broker_sequence_id),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        let producer_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, ProducerId, "MessageId", "producer_id"))
            .transpose()?;
        Ok(Self {
            producer_id,
            producer_sequence_id: values.take_long()?,
            broker_sequence_id: values.take_long()?,
        })
    }
}

/// Point-to-point destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Queue {
    /// Physical destination name.
    pub name: String,
}

impl Queue {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("name", FieldKind::Str)];

    /// Create a queue destination.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![FieldValue::Str(Some(self.name.clone()))]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            name: values.take_str()?.unwrap_or_default(),
        })
    }
}

/// Publish-subscribe destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Topic {
    /// Physical destination name.
    pub name: String,
}

impl Topic {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("name", FieldKind::Str)];

    /// Create a topic destination.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![FieldValue::Str(Some(self.name.clone()))]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            name: values.take_str()?.unwrap_or_default(),
        })
    }
}

/// Connection establishment command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConnectionInfo {
    /// Identifier of the connection; cacheable, it rides on every command.
    pub connection_id: Option<ConnectionId>,
    /// Client-chosen identifier.
    pub client_id: Option<String>,
    /// Credentials.
    pub password: Option<String>,
    /// Credentials.
    pub user_name: Option<String>,
    /// Brokers the command already passed through.
    pub broker_path: Option<Vec<BrokerId>>,
    /// Connection participates in master election (since v2).
    pub broker_master_connector: bool,
    /// Connection is remotely manageable (since v2).
    pub manageable: bool,
    /// Tolerates broker failover (since v6).
    pub fault_tolerant: bool,
    /// Reconnecting after failover (since v6).
    pub failover_reconnect: bool,
    /// Observed client address (since v8).
    pub client_ip: Option<String>,
}

impl ConnectionInfo {
    /// Wire schema. Trailing entries were appended by later protocol
    /// versions and are gated by their `since` marks.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("connection_id", FieldKind::Struct).cached(),
        FieldDescriptor::new("client_id", FieldKind::Str),
        FieldDescriptor::new("password", FieldKind::Str),
        FieldDescriptor::new("user_name", FieldKind::Str),
        FieldDescriptor::new("broker_path", FieldKind::StructArray),
        FieldDescriptor::new("broker_master_connector", FieldKind::Bool).since(2),
        FieldDescriptor::new("manageable", FieldKind::Bool).since(2),
        FieldDescriptor::new("fault_tolerant", FieldKind::Bool).since(6),
        FieldDescriptor::new("failover_reconnect", FieldKind::Bool).since(6),
        FieldDescriptor::new("client_ip", FieldKind::Str).since(8),
    ];

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Struct(
                self.connection_id
                    .clone()
                    .map(|id| Box::new(DataStructure::ConnectionId(id))),
            ),
            opt_str(&self.client_id),
            opt_str(&self.password),
            opt_str(&self.user_name),
            FieldValue::StructArray(self.broker_path.clone().map(|path| {
                path.into_iter().map(DataStructure::BrokerId).collect()
            })),
            FieldValue::Bool(self.broker_master_connector),
            FieldValue::Bool(self.manageable),
            FieldValue::Bool(self.fault_tolerant),
            FieldValue::Bool(self.failover_reconnect),
            opt_str(&self.client_ip),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        let connection_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, ConnectionId, "ConnectionInfo", "connection_id"))
            .transpose()?;
        let client_id = values.take_str()?;
        let password = values.take_str()?;
        let user_name = values.take_str()?;
        let broker_path = values
            .take_array()?
            .map(|path| {
                path.into_iter()
                    .map(|ds| expect_variant!(ds, BrokerId, "ConnectionInfo", "broker_path"))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;
        Ok(Self {
            connection_id,
            client_id,
            password,
            user_name,
            broker_path,
            broker_master_connector: values.take_bool()?,
            manageable: values.take_bool()?,
            fault_tolerant: values.take_bool()?,
            failover_reconnect: values.take_bool()?,
            client_ip: values.take_str()?,
        })
    }
}

/// Session establishment command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SessionInfo {
    /// Identifier of the session; cacheable.
    pub session_id: Option<SessionId>,
}

impl SessionInfo {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("session_id", FieldKind::Struct).cached()];

    fn fields(&self) -> Vec<FieldValue> {
        vec![FieldValue::Struct(
            self.session_id
                .clone()
                .map(|id| Box::new(DataStructure::SessionId(id))),
        )]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        let session_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, SessionId, "SessionInfo", "session_id"))
            .transpose()?;
        Ok(Self { session_id })
    }
}

/// Consumer registration command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConsumerInfo {
    /// Identifier of the consumer; cacheable.
    pub consumer_id: Option<ConsumerId>,
    /// Consumer is a queue browser.
    pub browser: bool,
    /// Destination consumed from; polymorphic queue or topic.
    pub destination: Option<Box<DataStructure>>,
    /// Broker-to-consumer prefetch window.
    pub prefetch_size: i32,
    /// Deliver without waiting for consumer acks.
    pub dispatch_async: bool,
    /// Message selector expression.
    pub selector: Option<String>,
    /// Suppress messages published over this consumer's own connection.
    pub no_local: bool,
    /// Sole consumer of the destination.
    pub exclusive: bool,
    /// Receive retained matching messages on subscribe.
    pub retroactive: bool,
    /// Dispatch priority.
    pub priority: u8,
    /// Brokers the command already passed through.
    pub broker_path: Option<Vec<BrokerId>>,
    /// Batch acks where possible (since v2).
    pub optimized_acknowledge: bool,
    /// Subscription originates from a network bridge (since v4).
    pub network_subscription: bool,
}

impl ConsumerInfo {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("consumer_id", FieldKind::Struct).cached(),
        FieldDescriptor::new("browser", FieldKind::Bool),
        FieldDescriptor::new("destination", FieldKind::Struct),
        FieldDescriptor::new("prefetch_size", FieldKind::Int),
        FieldDescriptor::new("dispatch_async", FieldKind::Bool),
        FieldDescriptor::new("selector", FieldKind::Str),
        FieldDescriptor::new("no_local", FieldKind::Bool),
        FieldDescriptor::new("exclusive", FieldKind::Bool),
        FieldDescriptor::new("retroactive", FieldKind::Bool),
        FieldDescriptor::new("priority", FieldKind::Byte),
        FieldDescriptor::new("broker_path", FieldKind::StructArray),
        FieldDescriptor::new("optimized_acknowledge", FieldKind::Bool).since(2),
        FieldDescriptor::new("network_subscription", FieldKind::Bool).since(4),
    ];

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Struct(
                self.consumer_id
                    .clone()
                    .map(|id| Box::new(DataStructure::ConsumerId(id))),
            ),
            FieldValue::Bool(self.browser),
            FieldValue::Struct(self.destination.clone()),
            FieldValue::Int(self.prefetch_size),
            FieldValue::Bool(self.dispatch_async),
            opt_str(&self.selector),
            FieldValue::Bool(self.no_local),
            FieldValue::Bool(self.exclusive),
            FieldValue::Bool(self.retroactive),
            FieldValue::Byte(self.priority),
            FieldValue::StructArray(self.broker_path.clone().map(|path| {
                path.into_iter().map(DataStructure::BrokerId).collect()
            })),
            FieldValue::Bool(self.optimized_acknowledge),
            FieldValue::Bool(self.network_subscription),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        let consumer_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, ConsumerId, "ConsumerInfo", "consumer_id"))
            .transpose()?;
        Ok(Self {
            consumer_id,
            browser: values.take_bool()?,
            destination: values.take_struct()?,
            prefetch_size: values.take_int()?,
            dispatch_async: values.take_bool()?,
            selector: values.take_str()?,
            no_local: values.take_bool()?,
            exclusive: values.take_bool()?,
            retroactive: values.take_bool()?,
            priority: values.take_byte()?,
            broker_path: values
                .take_array()?
                .map(|path| {
                    path.into_iter()
                        .map(|ds| expect_variant!(ds, BrokerId, "ConsumerInfo", "broker_path"))
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?,
            optimized_acknowledge: values.take_bool()?,
            network_subscription: values.take_bool()?,
        })
    }
}

/// Producer registration command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProducerInfo {
    /// Identifier of the producer; cacheable.
    pub producer_id: Option<ProducerId>,
    /// Destination produced to; polymorphic queue or topic.
    pub destination: Option<Box<DataStructure>>,
    /// Brokers the command already passed through.
    pub broker_path: Option<Vec<BrokerId>>,
    /// Send without waiting for broker acks (since v2).
    pub dispatch_async: bool,
    /// Producer flow-control window in bytes (since v3).
    pub window_size: i32,
}

impl ProducerInfo {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("producer_id", FieldKind::Struct).cached(),
        FieldDescriptor::new("destination", FieldKind::Struct),
        FieldDescriptor::new("broker_path", FieldKind::StructArray),
        FieldDescriptor::new("dispatch_async", FieldKind::Bool).since(2),
        FieldDescriptor::new("window_size", FieldKind::Int).since(3),
    ];

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Struct(
                self.producer_id
                    .clone()
                    .map(|id| Box::new(DataStructure::ProducerId(id))),
            ),
            FieldValue::Struct(self.destination.clone()),
            FieldValue::StructArray(self.broker_path.clone().map(|path| {
                path.into_iter().map(DataStructure::BrokerId).collect()
            })),
            FieldValue::Bool(self.dispatch_async),
            FieldValue::Int(self.window_size),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        let producer_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, ProducerId, "ProducerInfo", "producer_id"))
            .transpose()?;
        Ok(Self {
            producer_id,
            destination: values.take_struct()?,
            broker_path: values
                .take_array()?
                .map(|path| {
                    path.into_iter()
                        .map(|ds| expect_variant!(ds, BrokerId, "ProducerInfo", "broker_path"))
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?,
            dispatch_async: values.take_bool()?,
            window_size: values.take_int()?,
        })
    }
}

/// Broker advertisement, exchanged between networked brokers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BrokerInfo {
    /// Identifier of the broker; cacheable.
    pub broker_id: Option<BrokerId>,
    /// Transport URL of the broker.
    pub broker_url: Option<String>,
    /// Advertisements of the broker's own peers.
    pub peer_broker_infos: Option<Vec<BrokerInfo>>,
    /// Display name.
    pub broker_name: Option<String>,
    /// Broker is a slave in a master/slave pair.
    pub slave_broker: bool,
    /// Broker is the master in a master/slave pair.
    pub master_broker: bool,
    /// Broker runs a fault-tolerant store.
    pub fault_tolerant_configuration: bool,
    /// Link carries traffic both ways (since v3).
    pub duplex_connection: bool,
    /// Advertisement arrived over a network bridge (since v3).
    pub network_connection: bool,
    /// Bridge connection counter (since v3).
    pub connection_id: i64,
}

impl BrokerInfo {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("broker_id", FieldKind::Struct).cached(),
        FieldDescriptor::new("broker_url", FieldKind::Str),
        FieldDescriptor::new("peer_broker_infos", FieldKind::StructArray),
        FieldDescriptor::new("broker_name", FieldKind::Str),
        FieldDescriptor::new("slave_broker", FieldKind::Bool),
        FieldDescriptor::new("master_broker", FieldKind::Bool),
        FieldDescriptor::new("fault_tolerant_configuration", FieldKind::Bool),
        FieldDescriptor::new("duplex_connection", FieldKind::Bool).since(3),
        FieldDescriptor::new("network_connection", FieldKind::Bool).since(3),
        FieldDescriptor::new("connection_id", FieldKind::Long).since(3),
    ];

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Struct(
                self.broker_id
                    .clone()
                    .map(|id| Box::new(DataStructure::BrokerId(id))),
            ),
            opt_str(&self.broker_url),
            FieldValue::StructArray(self.peer_broker_infos.clone().map(|peers| {
                peers.into_iter().map(DataStructure::BrokerInfo).collect()
            })),
            opt_str(&self.broker_name),
            FieldValue::Bool(self.slave_broker),
            FieldValue::Bool(self.master_broker),
            FieldValue::Bool(self.fault_tolerant_configuration),
            FieldValue::Bool(self.duplex_connection),
            FieldValue::Bool(self.network_connection),
            FieldValue::Long(self.connection_id),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        let broker_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, BrokerId, "BrokerInfo", "broker_id"))
            .transpose()?;
        let broker_url = values.take_str()?;
        let peer_broker_infos = values
            .take_array()?
            .map(|peers| {
                peers
                    .into_iter()
                    .map(|ds| expect_variant!(ds, BrokerInfo, "BrokerInfo", "peer_broker_infos"))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;
        Ok(Self {
            broker_id,
            broker_url,
            peer_broker_infos,
            broker_name: values.take_str()?,
            slave_broker: values.take_bool()?,
            master_broker: values.take_bool()?,
            fault_tolerant_configuration: values.take_bool()?,
            duplex_connection: values.take_bool()?,
            network_connection: values.take_bool()?,
            connection_id: values.take_long()?,
        })
    }
}

/// Liveness probe; carries no fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeepAliveInfo;

impl KeepAliveInfo {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[];

    fn from_fields(_values: FieldValues) -> Result<Self> {
        Ok(Self)
    }
}

/// Orderly shutdown notice; carries no fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ShutdownInfo;

impl ShutdownInfo {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[];

    fn from_fields(_values: FieldValues) -> Result<Self> {
        Ok(Self)
    }
}

/// Teardown of a previously created resource, addressed by its identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RemoveInfo {
    /// Identifier being removed; polymorphic over the id types.
    pub object_id: Option<Box<DataStructure>>,
    /// Sequence of the last delivered message, for consumer removal
    /// (since v5).
    pub last_delivered_sequence_id: i64,
}

impl RemoveInfo {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("object_id", FieldKind::Struct),
        FieldDescriptor::new("last_delivered_sequence_id", FieldKind::Long).since(5),
    ];

    /// Removal of the given identifier.
    #[must_use]
    pub fn of(object_id: DataStructure) -> Self {
        Self {
            object_id: Some(Box::new(object_id)),
            last_delivered_sequence_id: 0,
        }
    }

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Struct(self.object_id.clone()),
            FieldValue::Long(self.last_delivered_sequence_id),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            object_id: values.take_struct()?,
            last_delivered_sequence_id: values.take_long()?,
        })
    }
}

/// Message acknowledgment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MessageAck {
    /// Destination being acked.
    pub destination: Option<Box<DataStructure>>,
    /// Ack semantics discriminator (delivered, poison, redelivered, ...).
    pub ack_type: u8,
    /// Acking consumer; cacheable.
    pub consumer_id: Option<ConsumerId>,
    /// First message of the acked range.
    pub first_message_id: Option<MessageId>,
    /// Last message of the acked range.
    pub last_message_id: Option<MessageId>,
    /// Number of messages covered.
    pub message_count: i32,
    /// Why the message was poisoned (since v7).
    pub poison_cause: Option<WireThrowable>,
}

impl MessageAck {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("destination", FieldKind::Struct),
        FieldDescriptor::new("ack_type", FieldKind::Byte),
        FieldDescriptor::new("consumer_id", FieldKind::Struct).cached(),
        FieldDescriptor::new("first_message_id", FieldKind::Struct),
        FieldDescriptor::new("last_message_id", FieldKind::Struct),
        FieldDescriptor::new("message_count", FieldKind::Int),
        FieldDescriptor::new("poison_cause", FieldKind::Throwable).since(7),
    ];

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Struct(self.destination.clone()),
            FieldValue::Byte(self.ack_type),
            FieldValue::Struct(
                self.consumer_id
                    .clone()
                    .map(|id| Box::new(DataStructure::ConsumerId(id))),
            ),
            FieldValue::Struct(
                self.first_message_id
                    .clone()
                    .map(|id| Box::new(DataStructure::MessageId(id))),
            ),
            FieldValue::Struct(
                self.last_message_id
                    .clone()
                    .map(|id| Box::new(DataStructure::MessageId(id))),
            ),
            FieldValue::Int(self.message_count),
            FieldValue::Throwable(self.poison_cause.clone()),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        let destination = values.take_struct()?;
        let ack_type = values.take_byte()?;
        let consumer_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, ConsumerId, "MessageAck", "consumer_id"))
            .transpose()?;
        let first_message_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, MessageId, "MessageAck", "first_message_id"))
            .transpose()?;
        let last_message_id = values
            .take_struct()?
            .map(|ds| expect_variant!(*ds, MessageId, "MessageAck", "last_message_id"))
            .transpose()?;
        Ok(Self {
            destination,
            ack_type,
            consumer_id,
            first_message_id,
            last_message_id,
            message_count: values.take_int()?,
            poison_cause: values.take_throwable()?,
        })
    }
}

/// Plain response correlated to a request command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Response {
    /// Command id this responds to.
    pub correlation_id: i32,
}

impl Response {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("correlation_id", FieldKind::Int)];

    fn fields(&self) -> Vec<FieldValue> {
        vec![FieldValue::Int(self.correlation_id)]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            correlation_id: values.take_int()?,
        })
    }
}

/// Response carrying the failure that the request provoked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExceptionResponse {
    /// Command id this responds to.
    pub correlation_id: i32,
    /// The failure.
    pub exception: Option<WireThrowable>,
}

impl ExceptionResponse {
    /// Wire schema.
    pub const SCHEMA: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("correlation_id", FieldKind::Int),
        FieldDescriptor::new("exception", FieldKind::Throwable),
    ];

    fn fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Int(self.correlation_id),
            FieldValue::Throwable(self.exception.clone()),
        ]
    }

    fn from_fields(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            correlation_id: values.take_int()?,
            exception: values.take_throwable()?,
        })
    }
}

/// Tagged union over every wire-visible command and identifier type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataStructure {
    /// Negotiation frame.
    WireFormatInfo(WireFormatInfo),
    /// Broker advertisement.
    BrokerInfo(BrokerInfo),
    /// Connection establishment.
    ConnectionInfo(ConnectionInfo),
    /// Session establishment.
    SessionInfo(SessionInfo),
    /// Consumer registration.
    ConsumerInfo(ConsumerInfo),
    /// Producer registration.
    ProducerInfo(ProducerInfo),
    /// Liveness probe.
    KeepAliveInfo(KeepAliveInfo),
    /// Orderly shutdown notice.
    ShutdownInfo(ShutdownInfo),
    /// Resource teardown.
    RemoveInfo(RemoveInfo),
    /// Message acknowledgment.
    MessageAck(MessageAck),
    /// Plain response.
    Response(Response),
    /// Response carrying an exception.
    ExceptionResponse(ExceptionResponse),
    /// Point-to-point destination.
    Queue(Queue),
    /// Publish-subscribe destination.
    Topic(Topic),
    /// Message identifier.
    MessageId(MessageId),
    /// Connection identifier.
    ConnectionId(ConnectionId),
    /// Session identifier.
    SessionId(SessionId),
    /// Consumer identifier.
    ConsumerId(ConsumerId),
    /// Producer identifier.
    ProducerId(ProducerId),
    /// Broker identifier.
    BrokerId(BrokerId),
}

impl DataStructure {
    /// Wire type code of the concrete structure.
    #[must_use]
    pub const fn type_code(&self) -> u8 {
        match self {
            Self::WireFormatInfo(_) => type_code::WIREFORMAT_INFO,
            Self::BrokerInfo(_) => type_code::BROKER_INFO,
            Self::ConnectionInfo(_) => type_code::CONNECTION_INFO,
            Self::SessionInfo(_) => type_code::SESSION_INFO,
            Self::ConsumerInfo(_) => type_code::CONSUMER_INFO,
            Self::ProducerInfo(_) => type_code::PRODUCER_INFO,
            Self::KeepAliveInfo(_) => type_code::KEEP_ALIVE_INFO,
            Self::ShutdownInfo(_) => type_code::SHUTDOWN_INFO,
            Self::RemoveInfo(_) => type_code::REMOVE_INFO,
            Self::MessageAck(_) => type_code::MESSAGE_ACK,
            Self::Response(_) => type_code::RESPONSE,
            Self::ExceptionResponse(_) => type_code::EXCEPTION_RESPONSE,
            Self::Queue(_) => type_code::QUEUE,
            Self::Topic(_) => type_code::TOPIC,
            Self::MessageId(_) => type_code::MESSAGE_ID,
            Self::ConnectionId(_) => type_code::CONNECTION_ID,
            Self::SessionId(_) => type_code::SESSION_ID,
            Self::ConsumerId(_) => type_code::CONSUMER_ID,
            Self::ProducerId(_) => type_code::PRODUCER_ID,
            Self::BrokerId(_) => type_code::BROKER_ID,
        }
    }

    /// Name of the concrete structure, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::WireFormatInfo(_) => "WireFormatInfo",
            Self::BrokerInfo(_) => "BrokerInfo",
            Self::ConnectionInfo(_) => "ConnectionInfo",
            Self::SessionInfo(_) => "SessionInfo",
            Self::ConsumerInfo(_) => "ConsumerInfo",
            Self::ProducerInfo(_) => "ProducerInfo",
            Self::KeepAliveInfo(_) => "KeepAliveInfo",
            Self::ShutdownInfo(_) => "ShutdownInfo",
            Self::RemoveInfo(_) => "RemoveInfo",
            Self::MessageAck(_) => "MessageAck",
            Self::Response(_) => "Response",
            Self::ExceptionResponse(_) => "ExceptionResponse",
            Self::Queue(_) => "Queue",
            Self::Topic(_) => "Topic",
            Self::MessageId(_) => "MessageId",
            Self::ConnectionId(_) => "ConnectionId",
            Self::SessionId(_) => "SessionId",
            Self::ConsumerId(_) => "ConsumerId",
            Self::ProducerId(_) => "ProducerId",
            Self::BrokerId(_) => "BrokerId",
        }
    }

    /// Ordered field table of the concrete structure.
    #[must_use]
    pub const fn schema(&self) -> &'static [FieldDescriptor] {
        match self {
            Self::WireFormatInfo(_) => WireFormatInfo::SCHEMA,
            Self::BrokerInfo(_) => BrokerInfo::SCHEMA,
            Self::ConnectionInfo(_) => ConnectionInfo::SCHEMA,
            Self::SessionInfo(_) => SessionInfo::SCHEMA,
            Self::ConsumerInfo(_) => ConsumerInfo::SCHEMA,
            Self::ProducerInfo(_) => ProducerInfo::SCHEMA,
            Self::KeepAliveInfo(_) => KeepAliveInfo::SCHEMA,
            Self::ShutdownInfo(_) => ShutdownInfo::SCHEMA,
            Self::RemoveInfo(_) => RemoveInfo::SCHEMA,
            Self::MessageAck(_) => MessageAck::SCHEMA,
            Self::Response(_) => Response::SCHEMA,
            Self::ExceptionResponse(_) => ExceptionResponse::SCHEMA,
            Self::Queue(_) => Queue::SCHEMA,
            Self::Topic(_) => Topic::SCHEMA,
            Self::MessageId(_) => MessageId::SCHEMA,
            Self::ConnectionId(_) => ConnectionId::SCHEMA,
            Self::SessionId(_) => SessionId::SCHEMA,
            Self::ConsumerId(_) => ConsumerId::SCHEMA,
            Self::ProducerId(_) => ProducerId::SCHEMA,
            Self::BrokerId(_) => BrokerId::SCHEMA,
        }
    }

    /// Project the structure's fields in schema order, one value per
    /// descriptor. Version gating happens in the drivers, never here.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldValue> {
        match self {
            Self::WireFormatInfo(inner) => inner.fields(),
            Self::BrokerInfo(inner) => inner.fields(),
            Self::ConnectionInfo(inner) => inner.fields(),
            Self::SessionInfo(inner) => inner.fields(),
            Self::ConsumerInfo(inner) => inner.fields(),
            Self::ProducerInfo(inner) => inner.fields(),
            Self::KeepAliveInfo(_) | Self::ShutdownInfo(_) => Vec::new(),
            Self::RemoveInfo(inner) => inner.fields(),
            Self::MessageAck(inner) => inner.fields(),
            Self::Response(inner) => inner.fields(),
            Self::ExceptionResponse(inner) => inner.fields(),
            Self::Queue(inner) => inner.fields(),
            Self::Topic(inner) => inner.fields(),
            Self::MessageId(inner) => inner.fields(),
            Self::ConnectionId(inner) => inner.fields(),
            Self::SessionId(inner) => inner.fields(),
            Self::ConsumerId(inner) => inner.fields(),
            Self::ProducerId(inner) => inner.fields(),
            Self::BrokerId(inner) => inner.fields(),
        }
    }

    /// Rebuild a structure of the given type code from decoded field values.
    pub(crate) fn from_fields(code: u8, values: FieldValues) -> Result<Self> {
        match code {
            type_code::WIREFORMAT_INFO => {
                Ok(Self::WireFormatInfo(WireFormatInfo::from_fields(values)?))
            }
            type_code::BROKER_INFO => Ok(Self::BrokerInfo(BrokerInfo::from_fields(values)?)),
            type_code::CONNECTION_INFO => {
                Ok(Self::ConnectionInfo(ConnectionInfo::from_fields(values)?))
            }
            type_code::SESSION_INFO => Ok(Self::SessionInfo(SessionInfo::from_fields(values)?)),
            type_code::CONSUMER_INFO => Ok(Self::ConsumerInfo(ConsumerInfo::from_fields(values)?)),
            type_code::PRODUCER_INFO => Ok(Self::ProducerInfo(ProducerInfo::from_fields(values)?)),
            type_code::KEEP_ALIVE_INFO => {
                Ok(Self::KeepAliveInfo(KeepAliveInfo::from_fields(values)?))
            }
            type_code::SHUTDOWN_INFO => Ok(Self::ShutdownInfo(ShutdownInfo::from_fields(values)?)),
            type_code::REMOVE_INFO => Ok(Self::RemoveInfo(RemoveInfo::from_fields(values)?)),
            type_code::MESSAGE_ACK => Ok(Self::MessageAck(MessageAck::from_fields(values)?)),
            type_code::RESPONSE => Ok(Self::Response(Response::from_fields(values)?)),
            type_code::EXCEPTION_RESPONSE => Ok(Self::ExceptionResponse(
                ExceptionResponse::from_fields(values)?,
            )),
            type_code::QUEUE => Ok(Self::Queue(Queue::from_fields(values)?)),
            type_code::TOPIC => Ok(Self::Topic(Topic::from_fields(values)?)),
            type_code::MESSAGE_ID => Ok(Self::MessageId(MessageId::from_fields(values)?)),
            type_code::CONNECTION_ID => Ok(Self::ConnectionId(ConnectionId::from_fields(values)?)),
            type_code::SESSION_ID => Ok(Self::SessionId(SessionId::from_fields(values)?)),
            type_code::CONSUMER_ID => Ok(Self::ConsumerId(ConsumerId::from_fields(values)?)),
            type_code::PRODUCER_ID => Ok(Self::ProducerId(ProducerId::from_fields(values)?)),
            type_code::BROKER_ID => Ok(Self::BrokerId(BrokerId::from_fields(values)?)),
            code => Err(Error::UnknownTypeCode { code }),
        }
    }

    /// Whether the type takes part in the marshal/unmarshal lifecycle.
    ///
    /// Only the negotiation frame does: it validates its own magic after
    /// unmarshalling.
    #[must_use]
    pub const fn is_marshal_aware(&self) -> bool {
        matches!(self, Self::WireFormatInfo(_))
    }

    /// Post-unmarshal lifecycle hook for marshal-aware types.
    pub(crate) fn after_unmarshal(&self) -> Result<()> {
        if let Self::WireFormatInfo(info) = self {
            if info.magic != MAGIC {
                return Err(Error::InvalidMagic { found: info.magic });
            }
        }
        Ok(())
    }
}

/// Hand-built sample structures shared by the crate's test suites.
#[cfg(test)]
pub(crate) mod samples {
    use super::*;

    pub(crate) fn sample_connection_info() -> ConnectionInfo {
        ConnectionInfo {
            connection_id: Some(ConnectionId::new("conn-1")),
            client_id: Some("client-1".into()),
            password: None,
            user_name: Some("admin".into()),
            broker_path: Some(vec![BrokerId::new("broker-a"), BrokerId::new("broker-b")]),
            broker_master_connector: false,
            manageable: true,
            fault_tolerant: true,
            failover_reconnect: false,
            client_ip: Some("10.0.0.7".into()),
        }
    }

    pub(crate) fn every_sample() -> Vec<DataStructure> {
        vec![
            DataStructure::WireFormatInfo(WireFormatInfo::default()),
            DataStructure::BrokerInfo(BrokerInfo {
                broker_id: Some(BrokerId::new("broker-a")),
                broker_url: Some("tcp://broker-a:61616".into()),
                peer_broker_infos: Some(vec![BrokerInfo {
                    broker_id: Some(BrokerId::new("broker-b")),
                    ..BrokerInfo::default()
                }]),
                broker_name: Some("broker-a".into()),
                slave_broker: false,
                master_broker: true,
                fault_tolerant_configuration: false,
                duplex_connection: true,
                network_connection: false,
                connection_id: 9,
            }),
            DataStructure::ConnectionInfo(sample_connection_info()),
            DataStructure::SessionInfo(SessionInfo {
                session_id: Some(SessionId::new("conn-1", 2)),
            }),
            DataStructure::ConsumerInfo(ConsumerInfo {
                consumer_id: Some(ConsumerId::new("conn-1", 2, 5)),
                browser: false,
                destination: Some(Box::new(DataStructure::Queue(Queue::new("orders")))),
                prefetch_size: 1000,
                dispatch_async: true,
                selector: Some("priority > 4".into()),
                no_local: false,
                exclusive: false,
                retroactive: false,
                priority: 0,
                broker_path: None,
                optimized_acknowledge: true,
                network_subscription: false,
            }),
            DataStructure::ProducerInfo(ProducerInfo {
                producer_id: Some(ProducerId::new("conn-1", 2, 3)),
                destination: Some(Box::new(DataStructure::Topic(Topic::new("prices")))),
                broker_path: None,
                dispatch_async: false,
                window_size: 65536,
            }),
            DataStructure::KeepAliveInfo(KeepAliveInfo),
            DataStructure::ShutdownInfo(ShutdownInfo),
            DataStructure::RemoveInfo(RemoveInfo::of(DataStructure::ConsumerId(
                ConsumerId::new("conn-1", 2, 5),
            ))),
            DataStructure::MessageAck(MessageAck {
                destination: Some(Box::new(DataStructure::Queue(Queue::new("orders")))),
                ack_type: 2,
                consumer_id: Some(ConsumerId::new("conn-1", 2, 5)),
                first_message_id: Some(MessageId {
                    producer_id: Some(ProducerId::new("conn-1", 2, 3)),
                    producer_sequence_id: 41,
                    broker_sequence_id: 400,
                }),
                last_message_id: Some(MessageId {
                    producer_id: Some(ProducerId::new("conn-1", 2, 3)),
                    producer_sequence_id: 45,
                    broker_sequence_id: 404,
                }),
                message_count: 5,
                poison_cause: None,
            }),
            DataStructure::Response(Response { correlation_id: 77 }),
            DataStructure::ExceptionResponse(ExceptionResponse {
                correlation_id: 78,
                exception: Some(crate::throwable::WireThrowable::new(
                    crate::throwable::ThrowableClass::SecurityException,
                    "not authorized",
                )),
            }),
            DataStructure::Queue(Queue::new("orders")),
            DataStructure::Topic(Topic::new("prices")),
            DataStructure::MessageId(MessageId {
                producer_id: Some(ProducerId::new("conn-1", 2, 3)),
                producer_sequence_id: 1,
                broker_sequence_id: 10,
            }),
            DataStructure::ConnectionId(ConnectionId::new("conn-1")),
            DataStructure::SessionId(SessionId::new("conn-1", 2)),
            DataStructure::ConsumerId(ConsumerId::new("conn-1", 2, 5)),
            DataStructure::ProducerId(ProducerId::new("conn-1", 2, 3)),
            DataStructure::BrokerId(BrokerId::new("broker-a")),
        ]
    }
}
