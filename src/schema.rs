//! Field schema tables and the value model the generic drivers interpret.
//!
//! Every concrete command declares an ordered `&'static [FieldDescriptor]`
//! table. Slice order is the wire sequence order and is stable across all
//! protocol versions: a newer version only ever appends trailing
//! descriptors. The marshalling drivers walk (schema, values) pairs instead
//! of dispatching through per-type marshaller objects.

use bytes::Bytes;

use crate::command::DataStructure;
use crate::error::{Error, Result};
use crate::throwable::WireThrowable;

/// Semantic kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Boolean: one BooleanStream bit (tight) or one byte (loose).
    Bool,
    /// Unsigned byte.
    Byte,
    /// Big-endian 16-bit integer.
    Short,
    /// Big-endian 32-bit integer.
    Int,
    /// Long: tagged variable-width (tight) or eight bytes (loose).
    Long,
    /// Nullable UTF-8 string.
    Str,
    /// Nullable length-prefixed byte sequence.
    ByteSeq,
    /// Byte run of a constant size declared by the schema; no length prefix.
    FixedBytes(usize),
    /// Nullable nested data structure, dispatched by type code.
    Struct,
    /// Nullable array of nested data structures.
    StructArray,
    /// Nullable validated exception payload.
    Throwable,
}

impl FieldKind {
    /// Value a decoder substitutes for a field its negotiated version skips.
    #[must_use]
    pub fn default_value(self) -> FieldValue {
        match self {
            Self::Bool => FieldValue::Bool(false),
            Self::Byte => FieldValue::Byte(0),
            Self::Short => FieldValue::Short(0),
            Self::Int => FieldValue::Int(0),
            Self::Long => FieldValue::Long(0),
            Self::Str => FieldValue::Str(None),
            Self::ByteSeq => FieldValue::ByteSeq(None),
            Self::FixedBytes(len) => FieldValue::FixedBytes(Bytes::from(vec![0u8; len])),
            Self::Struct => FieldValue::Struct(None),
            Self::StructArray => FieldValue::StructArray(None),
            Self::Throwable => FieldValue::Throwable(None),
        }
    }
}

/// One entry of a command's wire schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Field name, for diagnostics.
    pub name: &'static str,
    /// Semantic kind.
    pub kind: FieldKind,
    /// Minimum protocol version; below it the field contributes no bits and
    /// no bytes on either side.
    pub since: u32,
    /// Route the value through the identity caches.
    pub cached: bool,
}

impl FieldDescriptor {
    /// Descriptor present since protocol version 1, not cached.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            since: 1,
            cached: false,
        }
    }

    /// Set the minimum protocol version.
    #[must_use]
    pub const fn since(mut self, version: u32) -> Self {
        self.since = version;
        self
    }

    /// Mark the field cacheable.
    #[must_use]
    pub const fn cached(mut self) -> Self {
        self.cached = true;
        self
    }
}

/// A field's runtime value, mirroring [`FieldKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// Boolean value.
    Bool(bool),
    /// Byte value.
    Byte(u8),
    /// Short value.
    Short(i16),
    /// Int value.
    Int(i32),
    /// Long value.
    Long(i64),
    /// Nullable string.
    Str(Option<String>),
    /// Nullable byte sequence.
    ByteSeq(Option<Bytes>),
    /// Constant-size byte run.
    FixedBytes(Bytes),
    /// Nullable nested structure.
    Struct(Option<Box<DataStructure>>),
    /// Nullable structure array.
    StructArray(Option<Vec<DataStructure>>),
    /// Nullable throwable.
    Throwable(Option<WireThrowable>),
}

impl FieldValue {
    /// Kind name, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Str(_) => "string",
            Self::ByteSeq(_) => "byte sequence",
            Self::FixedBytes(_) => "fixed bytes",
            Self::Struct(_) => "struct",
            Self::StructArray(_) => "struct array",
            Self::Throwable(_) => "throwable",
        }
    }
}

/// Ordered cursor over decoded field values, consumed by a command's
/// `from_fields` constructor.
///
/// Values arrive one per schema descriptor, version-skipped fields included
/// (those carry their kind's default). The typed `take_*` accessors fail
/// with a structural error on any kind mismatch, so a malformed table can
/// never produce a partially wrong structure.
#[derive(Debug)]
pub struct FieldValues {
    type_name: &'static str,
    schema: &'static [FieldDescriptor],
    values: std::vec::IntoIter<FieldValue>,
    index: usize,
}

impl FieldValues {
    /// Wrap decoded values for a given command schema.
    #[must_use]
    pub fn new(
        type_name: &'static str,
        schema: &'static [FieldDescriptor],
        values: Vec<FieldValue>,
    ) -> Self {
        Self {
            type_name,
            schema,
            values: values.into_iter(),
            index: 0,
        }
    }

    fn next(&mut self, expected: &'static str) -> Result<FieldValue> {
        let value = self.values.next().ok_or(Error::FieldType {
            type_name: self.type_name,
            field: self
                .schema
                .get(self.index)
                .map_or("<past end>", |descriptor| descriptor.name),
            expected,
        })?;
        self.index += 1;
        Ok(value)
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::FieldType {
            type_name: self.type_name,
            field: self.schema[self.index - 1].name,
            expected,
        }
    }

    /// Take the next value as a boolean.
    pub fn take_bool(&mut self) -> Result<bool> {
        match self.next("bool")? {
            FieldValue::Bool(value) => Ok(value),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Take the next value as a byte.
    pub fn take_byte(&mut self) -> Result<u8> {
        match self.next("byte")? {
            FieldValue::Byte(value) => Ok(value),
            _ => Err(self.mismatch("byte")),
        }
    }

    /// Take the next value as a short.
    pub fn take_short(&mut self) -> Result<i16> {
        match self.next("short")? {
            FieldValue::Short(value) => Ok(value),
            _ => Err(self.mismatch("short")),
        }
    }

    /// Take the next value as an int.
    pub fn take_int(&mut self) -> Result<i32> {
        match self.next("int")? {
            FieldValue::Int(value) => Ok(value),
            _ => Err(self.mismatch("int")),
        }
    }

    /// Take the next value as a long.
    pub fn take_long(&mut self) -> Result<i64> {
        match self.next("long")? {
            FieldValue::Long(value) => Ok(value),
            _ => Err(self.mismatch("long")),
        }
    }

    /// Take the next value as a nullable string.
    pub fn take_str(&mut self) -> Result<Option<String>> {
        match self.next("string")? {
            FieldValue::Str(value) => Ok(value),
            _ => Err(self.mismatch("string")),
        }
    }

    /// Take the next value as a nullable byte sequence.
    pub fn take_bytes(&mut self) -> Result<Option<Bytes>> {
        match self.next("byte sequence")? {
            FieldValue::ByteSeq(value) => Ok(value),
            _ => Err(self.mismatch("byte sequence")),
        }
    }

    /// Take the next value as a constant-size byte run.
    pub fn take_fixed(&mut self) -> Result<Bytes> {
        match self.next("fixed bytes")? {
            FieldValue::FixedBytes(value) => Ok(value),
            _ => Err(self.mismatch("fixed bytes")),
        }
    }

    /// Take the next value as a nullable nested structure.
    pub fn take_struct(&mut self) -> Result<Option<Box<DataStructure>>> {
        match self.next("struct")? {
            FieldValue::Struct(value) => Ok(value),
            _ => Err(self.mismatch("struct")),
        }
    }

    /// Take the next value as a nullable structure array.
    pub fn take_array(&mut self) -> Result<Option<Vec<DataStructure>>> {
        match self.next("struct array")? {
            FieldValue::StructArray(value) => Ok(value),
            _ => Err(self.mismatch("struct array")),
        }
    }

    /// Take the next value as a nullable throwable.
    pub fn take_throwable(&mut self) -> Result<Option<WireThrowable>> {
        match self.next("throwable")? {
            FieldValue::Throwable(value) => Ok(value),
            _ => Err(self.mismatch("throwable")),
        }
    }
}
