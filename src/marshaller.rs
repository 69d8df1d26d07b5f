//! Generic marshalling drivers.
//!
//! One interpreter walks a command's field table instead of one marshaller
//! class per type. Tight mode is the two-pass protocol: pass 1 visits every
//! field in sequence order, pushes all boolean and presence bits onto the
//! [`BooleanStream`] and returns the exact count of literal bytes the fields
//! will occupy; pass 2 revisits the same fields, replays the bits to decide
//! null/cached, and writes the literal bytes. Decode is a single pass that
//! reads the whole BooleanStream up front. Loose mode is one pass each way
//! with inline presence markers.
//!
//! A field whose `since` exceeds the negotiated version contributes nothing
//! on any pass, which is what keeps the two ends' identity caches in
//! lock-step.

use bytes::{BufMut, BytesMut};

use crate::boolean_stream::BooleanStream;
use crate::command::DataStructure;
use crate::context::FormatContext;
use crate::error::{Error, Result};
use crate::primitives::{
    ByteReader, read_str, read_varlong, str_size, varlong_size, write_str, write_varlong,
};
use crate::schema::{FieldDescriptor, FieldKind, FieldValue, FieldValues};
use crate::throwable::{ThrowableClass, WireThrowable};

fn mismatch(type_name: &'static str, desc: &FieldDescriptor, expected: &'static str) -> Error {
    Error::FieldType {
        type_name,
        field: desc.name,
        expected,
    }
}

/// The element count travels as a u16; a longer array would wrap the count
/// while still writing every element, yielding a malformed frame.
fn check_array_len(desc: &FieldDescriptor, len: usize) -> Result<()> {
    if len > usize::from(u16::MAX) {
        return Err(Error::ArrayTooLong {
            field: desc.name,
            len,
        });
    }
    Ok(())
}

fn checked_fields(ds: &DataStructure) -> Result<Vec<FieldValue>> {
    let values = ds.fields();
    if values.len() != ds.schema().len() {
        return Err(Error::FieldType {
            type_name: ds.type_name(),
            field: "<arity>",
            expected: "one value per schema descriptor",
        });
    }
    Ok(values)
}

/// Tight pass 1: write bits, return the literal byte count of the
/// structure's fields (type code byte not included).
pub(crate) fn tight_marshal1(
    ctx: &mut FormatContext,
    ds: &DataStructure,
    bs: &mut BooleanStream,
) -> Result<usize> {
    let values = checked_fields(ds)?;
    let mut size = 0;
    for (desc, value) in ds.schema().iter().zip(&values) {
        if desc.since > ctx.version() {
            continue;
        }
        size += tight_field1(ctx, ds.type_name(), desc, value, bs)?;
    }
    Ok(size)
}

/// Tight pass 2: write the literal bytes, replaying the bits pass 1 wrote.
pub(crate) fn tight_marshal2(
    ctx: &mut FormatContext,
    ds: &DataStructure,
    out: &mut BytesMut,
    bs: &mut BooleanStream,
) -> Result<()> {
    let values = checked_fields(ds)?;
    for (desc, value) in ds.schema().iter().zip(&values) {
        if desc.since > ctx.version() {
            continue;
        }
        tight_field2(ctx, ds, desc, value, out, bs)?;
    }
    Ok(())
}

/// Tight decode of one structure body (the type code byte was already
/// consumed and resolved by the caller).
pub(crate) fn tight_unmarshal(
    ctx: &mut FormatContext,
    code: u8,
    reader: &mut ByteReader<'_>,
    bs: &mut BooleanStream,
) -> Result<DataStructure> {
    let entry = ctx.registry().lookup(code)?;
    let mut values = Vec::with_capacity(entry.schema.len());
    for desc in entry.schema {
        if desc.since > ctx.version() {
            values.push(desc.kind.default_value());
        } else {
            values.push(tight_field_unmarshal(ctx, entry.name, desc, reader, bs)?);
        }
    }
    let ds = DataStructure::from_fields(code, FieldValues::new(entry.name, entry.schema, values))?;
    ds.after_unmarshal()?;
    Ok(ds)
}

/// Loose encode of one structure body.
pub(crate) fn loose_marshal(
    ctx: &mut FormatContext,
    ds: &DataStructure,
    out: &mut BytesMut,
) -> Result<()> {
    let values = checked_fields(ds)?;
    for (desc, value) in ds.schema().iter().zip(&values) {
        if desc.since > ctx.version() {
            continue;
        }
        loose_field(ctx, ds.type_name(), desc, value, out)?;
    }
    Ok(())
}

/// Loose decode of one structure body.
pub(crate) fn loose_unmarshal(
    ctx: &mut FormatContext,
    code: u8,
    reader: &mut ByteReader<'_>,
) -> Result<DataStructure> {
    let entry = ctx.registry().lookup(code)?;
    let mut values = Vec::with_capacity(entry.schema.len());
    for desc in entry.schema {
        if desc.since > ctx.version() {
            values.push(desc.kind.default_value());
        } else {
            values.push(loose_field_unmarshal(ctx, entry.name, desc, reader)?);
        }
    }
    let ds = DataStructure::from_fields(code, FieldValues::new(entry.name, entry.schema, values))?;
    ds.after_unmarshal()?;
    Ok(ds)
}

// ---- tight pass 1 ----

fn tight_field1(
    ctx: &mut FormatContext,
    type_name: &'static str,
    desc: &FieldDescriptor,
    value: &FieldValue,
    bs: &mut BooleanStream,
) -> Result<usize> {
    match (desc.kind, value) {
        (FieldKind::Bool, FieldValue::Bool(v)) => {
            bs.write_bool(*v);
            Ok(0)
        }
        (FieldKind::Byte, FieldValue::Byte(_)) => Ok(1),
        (FieldKind::Short, FieldValue::Short(_)) => Ok(2),
        (FieldKind::Int, FieldValue::Int(_)) => Ok(4),
        (FieldKind::Long, FieldValue::Long(v)) => Ok(varlong_size(*v as u64)),
        (FieldKind::Str, FieldValue::Str(v)) => Ok(tight_str1(v.as_deref(), bs)),
        (FieldKind::ByteSeq, FieldValue::ByteSeq(v)) => {
            bs.write_bool(v.is_some());
            Ok(v.as_ref().map_or(0, |bytes| 4 + bytes.len()))
        }
        (FieldKind::FixedBytes(len), FieldValue::FixedBytes(bytes)) => {
            if bytes.len() != len {
                return Err(Error::FixedSizeMismatch {
                    expected: len,
                    got: bytes.len(),
                });
            }
            Ok(len)
        }
        (FieldKind::Struct, FieldValue::Struct(v)) => {
            if desc.cached && ctx.cache_enabled() {
                tight_cached1(ctx, v.as_deref(), bs)
            } else {
                tight_nested1(ctx, v.as_deref(), bs)
            }
        }
        (FieldKind::StructArray, FieldValue::StructArray(v)) => {
            bs.write_bool(v.is_some());
            let Some(elements) = v else { return Ok(0) };
            check_array_len(desc, elements.len())?;
            let mut size = 2;
            for element in elements {
                size += tight_nested1(ctx, Some(element), bs)?;
            }
            Ok(size)
        }
        (FieldKind::Throwable, FieldValue::Throwable(v)) => tight_throwable1(ctx, v.as_ref(), bs),
        (_, value) => Err(mismatch(type_name, desc, value.kind_name())),
    }
}

fn tight_str1(value: Option<&str>, bs: &mut BooleanStream) -> usize {
    bs.write_bool(value.is_some());
    value.map_or(0, str_size)
}

fn tight_nested1(
    ctx: &mut FormatContext,
    value: Option<&DataStructure>,
    bs: &mut BooleanStream,
) -> Result<usize> {
    bs.write_bool(value.is_some());
    match value {
        None => Ok(0),
        Some(ds) => Ok(1 + tight_marshal1(ctx, ds, bs)?),
    }
}

fn tight_cached1(
    ctx: &mut FormatContext,
    value: Option<&DataStructure>,
    bs: &mut BooleanStream,
) -> Result<usize> {
    let Some(ds) = value else {
        bs.write_bool(false);
        return tight_nested1(ctx, None, bs);
    };
    if ctx.marshal_cache_lookup(ds).is_some() {
        bs.write_bool(true);
        return Ok(2);
    }
    bs.write_bool(false);
    let size = tight_nested1(ctx, Some(ds), bs)?;
    ctx.marshal_cache_insert(ds.clone());
    Ok(size)
}

fn tight_throwable1(
    ctx: &FormatContext,
    value: Option<&WireThrowable>,
    bs: &mut BooleanStream,
) -> Result<usize> {
    bs.write_bool(value.is_some());
    let Some(throwable) = value else { return Ok(0) };
    let mut size = tight_str1(Some(throwable.class.class_name()), bs);
    size += tight_str1(throwable.message.as_deref(), bs);
    if ctx.stack_traces() {
        size += tight_str1(throwable.stack_trace.as_deref(), bs);
    }
    Ok(size)
}

// ---- tight pass 2 ----

fn tight_field2(
    ctx: &mut FormatContext,
    ds: &DataStructure,
    desc: &FieldDescriptor,
    value: &FieldValue,
    out: &mut BytesMut,
    bs: &mut BooleanStream,
) -> Result<()> {
    let code = ds.type_code();
    match (desc.kind, value) {
        (FieldKind::Bool, FieldValue::Bool(_)) => {
            // Value already lives in the stream; consume it to stay in step.
            bs.read_bool()?;
            Ok(())
        }
        (FieldKind::Byte, FieldValue::Byte(v)) => {
            out.put_u8(*v);
            Ok(())
        }
        (FieldKind::Short, FieldValue::Short(v)) => {
            out.put_i16(*v);
            Ok(())
        }
        (FieldKind::Int, FieldValue::Int(v)) => {
            out.put_i32(*v);
            Ok(())
        }
        (FieldKind::Long, FieldValue::Long(v)) => {
            write_varlong(out, *v as u64);
            Ok(())
        }
        (FieldKind::Str, FieldValue::Str(v)) => tight_str2(code, v.as_deref(), out, bs),
        (FieldKind::ByteSeq, FieldValue::ByteSeq(v)) => {
            if bs.read_bool()? != v.is_some() {
                return Err(Error::CacheDesync { type_code: code });
            }
            if let Some(bytes) = v {
                out.put_u32(bytes.len() as u32);
                out.put_slice(bytes);
            }
            Ok(())
        }
        (FieldKind::FixedBytes(_), FieldValue::FixedBytes(bytes)) => {
            out.put_slice(bytes);
            Ok(())
        }
        (FieldKind::Struct, FieldValue::Struct(v)) => {
            if desc.cached && ctx.cache_enabled() {
                tight_cached2(ctx, code, v.as_deref(), out, bs)
            } else {
                tight_nested2(ctx, code, v.as_deref(), out, bs)
            }
        }
        (FieldKind::StructArray, FieldValue::StructArray(v)) => {
            if bs.read_bool()? != v.is_some() {
                return Err(Error::CacheDesync { type_code: code });
            }
            if let Some(elements) = v {
                out.put_u16(elements.len() as u16);
                for element in elements {
                    tight_nested2(ctx, code, Some(element), out, bs)?;
                }
            }
            Ok(())
        }
        (FieldKind::Throwable, FieldValue::Throwable(v)) => {
            tight_throwable2(ctx, code, v.as_ref(), out, bs)
        }
        (_, value) => Err(mismatch(ds.type_name(), desc, value.kind_name())),
    }
}

fn tight_str2(
    code: u8,
    value: Option<&str>,
    out: &mut BytesMut,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_bool()? != value.is_some() {
        return Err(Error::CacheDesync { type_code: code });
    }
    if let Some(s) = value {
        write_str(out, s);
    }
    Ok(())
}

fn tight_nested2(
    ctx: &mut FormatContext,
    code: u8,
    value: Option<&DataStructure>,
    out: &mut BytesMut,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_bool()? != value.is_some() {
        return Err(Error::CacheDesync { type_code: code });
    }
    if let Some(ds) = value {
        out.put_u8(ds.type_code());
        tight_marshal2(ctx, ds, out, bs)?;
    }
    Ok(())
}

fn tight_cached2(
    ctx: &mut FormatContext,
    code: u8,
    value: Option<&DataStructure>,
    out: &mut BytesMut,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_bool()? {
        // Pass 1 saw this value in the cache; it must still be there.
        let index = value
            .and_then(|ds| ctx.marshal_cache_lookup(ds))
            .ok_or(Error::CacheDesync { type_code: code })?;
        out.put_u16(index);
        Ok(())
    } else {
        tight_nested2(ctx, code, value, out, bs)
    }
}

fn tight_throwable2(
    ctx: &mut FormatContext,
    code: u8,
    value: Option<&WireThrowable>,
    out: &mut BytesMut,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_bool()? != value.is_some() {
        return Err(Error::CacheDesync { type_code: code });
    }
    let Some(throwable) = value else {
        return Ok(());
    };
    tight_str2(code, Some(throwable.class.class_name()), out, bs)?;
    tight_str2(code, throwable.message.as_deref(), out, bs)?;
    if ctx.stack_traces() {
        tight_str2(code, throwable.stack_trace.as_deref(), out, bs)?;
    }
    Ok(())
}

// ---- tight decode ----

fn tight_field_unmarshal(
    ctx: &mut FormatContext,
    type_name: &'static str,
    desc: &FieldDescriptor,
    reader: &mut ByteReader<'_>,
    bs: &mut BooleanStream,
) -> Result<FieldValue> {
    match desc.kind {
        FieldKind::Bool => Ok(FieldValue::Bool(bs.read_bool()?)),
        FieldKind::Byte => Ok(FieldValue::Byte(reader.read_u8()?)),
        FieldKind::Short => Ok(FieldValue::Short(reader.read_i16()?)),
        FieldKind::Int => Ok(FieldValue::Int(reader.read_i32()?)),
        FieldKind::Long => Ok(FieldValue::Long(read_varlong(reader)? as i64)),
        FieldKind::Str => Ok(FieldValue::Str(tight_str_unmarshal(reader, bs)?)),
        FieldKind::ByteSeq => {
            if !bs.read_bool()? {
                return Ok(FieldValue::ByteSeq(None));
            }
            let len = reader.read_u32()? as usize;
            let bytes = reader.read_exact(len)?;
            Ok(FieldValue::ByteSeq(Some(bytes.to_vec().into())))
        }
        FieldKind::FixedBytes(len) => {
            let bytes = reader.read_exact(len)?;
            Ok(FieldValue::FixedBytes(bytes.to_vec().into()))
        }
        FieldKind::Struct => {
            let value = if desc.cached && ctx.cache_enabled() {
                tight_cached_unmarshal(ctx, reader, bs)?
            } else {
                tight_nested_unmarshal(ctx, reader, bs)?
            };
            Ok(FieldValue::Struct(value))
        }
        FieldKind::StructArray => {
            if !bs.read_bool()? {
                return Ok(FieldValue::StructArray(None));
            }
            let count = reader.read_u16()?;
            let mut elements = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                let element = tight_nested_unmarshal(ctx, reader, bs)?.ok_or_else(|| {
                    mismatch(type_name, desc, "non-null array element")
                })?;
                elements.push(*element);
            }
            Ok(FieldValue::StructArray(Some(elements)))
        }
        FieldKind::Throwable => {
            if !bs.read_bool()? {
                return Ok(FieldValue::Throwable(None));
            }
            Ok(FieldValue::Throwable(Some(throwable_unmarshal(
                ctx,
                |reader| tight_str_unmarshal(reader, bs),
                reader,
                type_name,
                desc,
            )?)))
        }
    }
}

fn tight_str_unmarshal(
    reader: &mut ByteReader<'_>,
    bs: &mut BooleanStream,
) -> Result<Option<String>> {
    if bs.read_bool()? {
        Ok(Some(read_str(reader)?))
    } else {
        Ok(None)
    }
}

fn tight_nested_unmarshal(
    ctx: &mut FormatContext,
    reader: &mut ByteReader<'_>,
    bs: &mut BooleanStream,
) -> Result<Option<Box<DataStructure>>> {
    if !bs.read_bool()? {
        return Ok(None);
    }
    let code = reader.read_u8()?;
    Ok(Some(Box::new(tight_unmarshal(ctx, code, reader, bs)?)))
}

fn tight_cached_unmarshal(
    ctx: &mut FormatContext,
    reader: &mut ByteReader<'_>,
    bs: &mut BooleanStream,
) -> Result<Option<Box<DataStructure>>> {
    if bs.read_bool()? {
        let index = reader.read_u16()?;
        return Ok(Some(Box::new(ctx.unmarshal_cache_get(index)?)));
    }
    let value = tight_nested_unmarshal(ctx, reader, bs)?;
    if let Some(ds) = &value {
        ctx.unmarshal_cache_insert((**ds).clone());
    }
    Ok(value)
}

// ---- throwable decode, shared by both modes ----

fn throwable_unmarshal<'a, F>(
    ctx: &mut FormatContext,
    mut read_opt_str: F,
    reader: &mut ByteReader<'a>,
    type_name: &'static str,
    desc: &FieldDescriptor,
) -> Result<WireThrowable>
where
    F: FnMut(&mut ByteReader<'a>) -> Result<Option<String>>,
{
    let class_name =
        read_opt_str(reader)?.ok_or_else(|| mismatch(type_name, desc, "throwable class name"))?;
    // Allow-list gate: nothing is built from a name that fails this.
    let class = ThrowableClass::from_class_name(&class_name)?;
    let message = read_opt_str(reader)?;
    let stack_trace = if ctx.stack_traces() {
        read_opt_str(reader)?
    } else {
        None
    };
    Ok(WireThrowable {
        class,
        message,
        stack_trace,
    })
}

// ---- loose encode ----

fn put_presence(out: &mut BytesMut, present: bool) {
    out.put_u8(u8::from(present));
}

fn loose_field(
    ctx: &mut FormatContext,
    type_name: &'static str,
    desc: &FieldDescriptor,
    value: &FieldValue,
    out: &mut BytesMut,
) -> Result<()> {
    match (desc.kind, value) {
        (FieldKind::Bool, FieldValue::Bool(v)) => {
            out.put_u8(u8::from(*v));
            Ok(())
        }
        (FieldKind::Byte, FieldValue::Byte(v)) => {
            out.put_u8(*v);
            Ok(())
        }
        (FieldKind::Short, FieldValue::Short(v)) => {
            out.put_i16(*v);
            Ok(())
        }
        (FieldKind::Int, FieldValue::Int(v)) => {
            out.put_i32(*v);
            Ok(())
        }
        (FieldKind::Long, FieldValue::Long(v)) => {
            out.put_i64(*v);
            Ok(())
        }
        (FieldKind::Str, FieldValue::Str(v)) => {
            loose_str(out, v.as_deref());
            Ok(())
        }
        (FieldKind::ByteSeq, FieldValue::ByteSeq(v)) => {
            put_presence(out, v.is_some());
            if let Some(bytes) = v {
                out.put_u32(bytes.len() as u32);
                out.put_slice(bytes);
            }
            Ok(())
        }
        (FieldKind::FixedBytes(len), FieldValue::FixedBytes(bytes)) => {
            if bytes.len() != len {
                return Err(Error::FixedSizeMismatch {
                    expected: len,
                    got: bytes.len(),
                });
            }
            out.put_slice(bytes);
            Ok(())
        }
        (FieldKind::Struct, FieldValue::Struct(v)) => {
            if desc.cached && ctx.cache_enabled() {
                loose_cached(ctx, v.as_deref(), out)
            } else {
                loose_nested(ctx, v.as_deref(), out)
            }
        }
        (FieldKind::StructArray, FieldValue::StructArray(v)) => {
            if let Some(elements) = v {
                check_array_len(desc, elements.len())?;
            }
            put_presence(out, v.is_some());
            if let Some(elements) = v {
                out.put_u16(elements.len() as u16);
                for element in elements {
                    loose_nested(ctx, Some(element), out)?;
                }
            }
            Ok(())
        }
        (FieldKind::Throwable, FieldValue::Throwable(v)) => {
            put_presence(out, v.is_some());
            if let Some(throwable) = v {
                loose_str(out, Some(throwable.class.class_name()));
                loose_str(out, throwable.message.as_deref());
                if ctx.stack_traces() {
                    loose_str(out, throwable.stack_trace.as_deref());
                }
            }
            Ok(())
        }
        (_, value) => Err(mismatch(type_name, desc, value.kind_name())),
    }
}

fn loose_str(out: &mut BytesMut, value: Option<&str>) {
    put_presence(out, value.is_some());
    if let Some(s) = value {
        write_str(out, s);
    }
}

fn loose_nested(
    ctx: &mut FormatContext,
    value: Option<&DataStructure>,
    out: &mut BytesMut,
) -> Result<()> {
    put_presence(out, value.is_some());
    if let Some(ds) = value {
        out.put_u8(ds.type_code());
        loose_marshal(ctx, ds, out)?;
    }
    Ok(())
}

fn loose_cached(
    ctx: &mut FormatContext,
    value: Option<&DataStructure>,
    out: &mut BytesMut,
) -> Result<()> {
    let Some(ds) = value else {
        put_presence(out, false);
        return loose_nested(ctx, None, out);
    };
    if let Some(index) = ctx.marshal_cache_lookup(ds) {
        put_presence(out, true);
        out.put_u16(index);
        return Ok(());
    }
    put_presence(out, false);
    loose_nested(ctx, Some(ds), out)?;
    ctx.marshal_cache_insert(ds.clone());
    Ok(())
}

// ---- loose decode ----

fn read_presence(reader: &mut ByteReader<'_>) -> Result<bool> {
    match reader.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        marker => Err(Error::InvalidMarkerByte { marker }),
    }
}

fn loose_field_unmarshal(
    ctx: &mut FormatContext,
    type_name: &'static str,
    desc: &FieldDescriptor,
    reader: &mut ByteReader<'_>,
) -> Result<FieldValue> {
    match desc.kind {
        FieldKind::Bool => Ok(FieldValue::Bool(read_presence(reader)?)),
        FieldKind::Byte => Ok(FieldValue::Byte(reader.read_u8()?)),
        FieldKind::Short => Ok(FieldValue::Short(reader.read_i16()?)),
        FieldKind::Int => Ok(FieldValue::Int(reader.read_i32()?)),
        FieldKind::Long => Ok(FieldValue::Long(reader.read_i64()?)),
        FieldKind::Str => Ok(FieldValue::Str(loose_str_unmarshal(reader)?)),
        FieldKind::ByteSeq => {
            if !read_presence(reader)? {
                return Ok(FieldValue::ByteSeq(None));
            }
            let len = reader.read_u32()? as usize;
            let bytes = reader.read_exact(len)?;
            Ok(FieldValue::ByteSeq(Some(bytes.to_vec().into())))
        }
        FieldKind::FixedBytes(len) => {
            let bytes = reader.read_exact(len)?;
            Ok(FieldValue::FixedBytes(bytes.to_vec().into()))
        }
        FieldKind::Struct => {
            let value = if desc.cached && ctx.cache_enabled() {
                loose_cached_unmarshal(ctx, reader)?
            } else {
                loose_nested_unmarshal(ctx, reader)?
            };
            Ok(FieldValue::Struct(value))
        }
        FieldKind::StructArray => {
            if !read_presence(reader)? {
                return Ok(FieldValue::StructArray(None));
            }
            let count = reader.read_u16()?;
            let mut elements = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                let element = loose_nested_unmarshal(ctx, reader)?.ok_or_else(|| {
                    mismatch(type_name, desc, "non-null array element")
                })?;
                elements.push(*element);
            }
            Ok(FieldValue::StructArray(Some(elements)))
        }
        FieldKind::Throwable => {
            if !read_presence(reader)? {
                return Ok(FieldValue::Throwable(None));
            }
            Ok(FieldValue::Throwable(Some(throwable_unmarshal(
                ctx,
                loose_str_unmarshal,
                reader,
                type_name,
                desc,
            )?)))
        }
    }
}

fn loose_str_unmarshal(reader: &mut ByteReader<'_>) -> Result<Option<String>> {
    if read_presence(reader)? {
        Ok(Some(read_str(reader)?))
    } else {
        Ok(None)
    }
}

fn loose_nested_unmarshal(
    ctx: &mut FormatContext,
    reader: &mut ByteReader<'_>,
) -> Result<Option<Box<DataStructure>>> {
    if !read_presence(reader)? {
        return Ok(None);
    }
    let code = reader.read_u8()?;
    Ok(Some(Box::new(loose_unmarshal(ctx, code, reader)?)))
}

fn loose_cached_unmarshal(
    ctx: &mut FormatContext,
    reader: &mut ByteReader<'_>,
) -> Result<Option<Box<DataStructure>>> {
    if read_presence(reader)? {
        let index = reader.read_u16()?;
        return Ok(Some(Box::new(ctx.unmarshal_cache_get(index)?)));
    }
    let value = loose_nested_unmarshal(ctx, reader)?;
    if let Some(ds) = &value {
        ctx.unmarshal_cache_insert((**ds).clone());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::samples::every_sample;
    use crate::context::{EncodingMode, FormatContext};

    /// Pass 1's predicted byte count must equal pass 2's actual output for
    /// every carried type, at every supported version.
    #[test]
    fn test_pass1_size_matches_pass2_bytes() {
        for version in crate::MIN_VERSION..=crate::MAX_VERSION {
            for sample in every_sample() {
                let mut ctx = FormatContext::new(version, EncodingMode::Tight);
                let mut bs = BooleanStream::new();
                let predicted = tight_marshal1(&mut ctx, &sample, &mut bs).unwrap();

                let mut out = BytesMut::new();
                tight_marshal2(&mut ctx, &sample, &mut out, &mut bs).unwrap();
                assert_eq!(
                    predicted,
                    out.len(),
                    "{} at version {version}",
                    sample.type_name()
                );
            }
        }
    }

    /// Pass 2 must consume exactly the bits pass 1 produced.
    #[test]
    fn test_pass2_consumes_every_bit() {
        for sample in every_sample() {
            let mut ctx = FormatContext::new(crate::MAX_VERSION, EncodingMode::Tight);
            let mut bs = BooleanStream::new();
            let written = {
                tight_marshal1(&mut ctx, &sample, &mut bs).unwrap();
                bs.bit_len()
            };
            let mut out = BytesMut::new();
            tight_marshal2(&mut ctx, &sample, &mut out, &mut bs).unwrap();
            // Writing another structure would start from a clean stream, so
            // the read cursor sitting at the end is what lock-step means.
            assert_eq!(bs.bit_len(), written);
        }
    }

    #[test]
    fn test_array_beyond_u16_count_is_rejected_on_encode() {
        use crate::command::{BrokerId, ConnectionInfo};

        let sample = DataStructure::ConnectionInfo(ConnectionInfo {
            broker_path: Some(
                (0..70_000).map(|i| BrokerId::new(format!("b{i}"))).collect(),
            ),
            ..ConnectionInfo::default()
        });

        let mut ctx = FormatContext::new(crate::MAX_VERSION, EncodingMode::Tight);
        let mut bs = BooleanStream::new();
        assert!(matches!(
            tight_marshal1(&mut ctx, &sample, &mut bs),
            Err(Error::ArrayTooLong {
                field: "broker_path",
                len: 70_000
            })
        ));

        let mut ctx = FormatContext::new(crate::MAX_VERSION, EncodingMode::Loose);
        let mut out = BytesMut::new();
        assert!(matches!(
            loose_marshal(&mut ctx, &sample, &mut out),
            Err(Error::ArrayTooLong { .. })
        ));
    }

    #[test]
    fn test_gated_field_adds_no_bits_below_its_version() {
        let sample = DataStructure::ConnectionInfo(crate::command::samples::sample_connection_info());

        let mut ctx_old = FormatContext::new(1, EncodingMode::Tight);
        let mut bs_old = BooleanStream::new();
        tight_marshal1(&mut ctx_old, &sample, &mut bs_old).unwrap();

        let mut ctx_new = FormatContext::new(8, EncodingMode::Tight);
        let mut bs_new = BooleanStream::new();
        tight_marshal1(&mut ctx_new, &sample, &mut bs_new).unwrap();

        // Version 1 drops four gated bools and the client_ip presence bit.
        assert_eq!(bs_new.bit_len(), bs_old.bit_len() + 5);
    }
}
