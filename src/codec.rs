//! Byte-level translation between host [`Value`]s and stored buffers.
//!
//! All type, shape, and storage validation for reads and writes lives here:
//! class checks, fixed-width size checks, string capacity and character-set
//! enforcement, enum width dispatch, and compound member layout. The engine
//! above this module only moves opaque byte buffers around.
//!
//! Variable-length strings are framed as a little-endian u32 byte length
//! followed by the bytes; that framing is internal to the engine and never
//! exposed.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use encoding_rs::UTF_8;

use crate::datatype::{CharacterSet, StringPadding, TypeDescriptor};
use crate::dataspace::SpaceDescriptor;
use crate::error::{Result, StoreError};
use crate::value::{datetime_to_ole_days, ole_days_to_datetime, TypeClass, Value};

/// Encodes a host value against a declared type and space.
///
/// A space with element count 1 takes a single scalar value; larger spaces
/// take a [`Value::Array`] whose length equals the element count.
pub(crate) fn encode(
    value: &Value,
    ty: &TypeDescriptor,
    space: &SpaceDescriptor,
) -> Result<Vec<u8>> {
    let expected = space.element_count();
    let mut buf = Vec::new();
    if expected == 1 {
        encode_element(value, ty, &mut buf)?;
    } else {
        // The outer Value::Array is the element sequence. When the stored
        // type is itself an array, each item is in turn a Value::Array, the
        // same nesting decode produces.
        let items = match value {
            Value::Array(items) => items,
            _ => {
                return Err(StoreError::ShapeMismatch {
                    expected,
                    actual: 1,
                })
            }
        };
        if items.len() as u64 != expected {
            return Err(StoreError::ShapeMismatch {
                expected,
                actual: items.len() as u64,
            });
        }
        for item in items {
            encode_element(item, ty, &mut buf)?;
        }
    }
    Ok(buf)
}

/// Decodes a stored buffer back into a host value.
pub(crate) fn decode(bytes: &[u8], ty: &TypeDescriptor, space: &SpaceDescriptor) -> Result<Value> {
    let expected = space.element_count();
    if expected == 1 {
        let (value, _) = decode_element(bytes, ty)?;
        return Ok(value);
    }
    let mut items = Vec::with_capacity(expected as usize);
    let mut pos = 0usize;
    for _ in 0..expected {
        let (value, consumed) = decode_element(&bytes[pos..], ty)?;
        items.push(value);
        pos += consumed;
    }
    Ok(Value::Array(items))
}

/// Encodes one element, appending to `buf`.
pub(crate) fn encode_element(value: &Value, ty: &TypeDescriptor, buf: &mut Vec<u8>) -> Result<()> {
    match ty {
        TypeDescriptor::Integer { size, signed } => encode_integer(value, *size, *signed, buf),
        TypeDescriptor::Float { size } => encode_float(value, *size, buf),
        TypeDescriptor::String {
            capacity,
            charset,
            padding,
        } => encode_string(value, *capacity, *charset, *padding, buf),
        TypeDescriptor::Enum { base, .. } => encode_enum(value, ty, base, buf),
        TypeDescriptor::Compound { size, members } => {
            let value_members = match value {
                Value::Compound(m) => m,
                other => {
                    return Err(StoreError::TypeClassMismatch {
                        stored: TypeClass::Compound,
                        requested: other.class(),
                    })
                }
            };
            encode_compound(value_members, *size, members, buf)
        }
        TypeDescriptor::Array { base, dims } => {
            let items = match value {
                Value::Array(items) => items,
                other => {
                    return Err(StoreError::TypeClassMismatch {
                        stored: TypeClass::Array,
                        requested: other.class(),
                    })
                }
            };
            let expected: usize = dims.iter().product();
            if items.len() != expected {
                return Err(StoreError::ShapeMismatch {
                    expected: expected as u64,
                    actual: items.len() as u64,
                });
            }
            for item in items {
                encode_element(item, base, buf)?;
            }
            Ok(())
        }
    }
}

/// Decodes one element from the front of `bytes`, returning the value and
/// the number of bytes consumed.
pub(crate) fn decode_element(bytes: &[u8], ty: &TypeDescriptor) -> Result<(Value, usize)> {
    match ty {
        TypeDescriptor::Integer { size, signed } => decode_integer(bytes, *size, *signed),
        TypeDescriptor::Float { size } => decode_float(bytes, *size),
        TypeDescriptor::String {
            capacity,
            charset,
            padding,
        } => decode_string(bytes, *capacity, *charset, *padding),
        TypeDescriptor::Enum { base, members } => {
            let (size, signed) = base
                .int_width()
                .ok_or_else(|| StoreError::unsupported("enum over non-integer base"))?;
            let (raw, consumed) = decode_integer(bytes, size, signed)?;
            let stored = int_value_as_i64(&raw);
            // The 1-byte {FALSE, TRUE} enum decodes as a host bool.
            if is_boolean_enum(members) {
                return Ok((Value::Bool(stored != 0), consumed));
            }
            let member = ty
                .enum_member_by_value(stored)
                .ok_or_else(|| StoreError::not_found("enum member for value", &stored.to_string()))?;
            Ok((Value::Enum(member.name.clone()), consumed))
        }
        TypeDescriptor::Compound { size, members } => {
            ensure_len(bytes, *size)?;
            let mut out = Vec::with_capacity(members.len());
            for member in members {
                let (value, _) = decode_element(&bytes[member.offset..], &member.ty)?;
                out.push((member.name.clone(), value));
            }
            Ok((Value::Compound(out), *size))
        }
        TypeDescriptor::Array { base, dims } => {
            let count: usize = dims.iter().product();
            let mut items = Vec::with_capacity(count);
            let mut pos = 0usize;
            for _ in 0..count {
                let (value, consumed) = decode_element(&bytes[pos..], base)?;
                items.push(value);
                pos += consumed;
            }
            Ok((Value::Array(items), pos))
        }
    }
}

/// Checks the stored type's class against a requested host class.
pub(crate) fn check_class(stored: &TypeDescriptor, requested: TypeClass) -> Result<()> {
    if stored.class() != requested {
        return Err(StoreError::TypeClassMismatch {
            stored: stored.class(),
            requested,
        });
    }
    Ok(())
}

/// Checks the stored type's fixed byte size against the host type's size.
pub(crate) fn check_scalar_size(stored: &TypeDescriptor, host_size: usize) -> Result<()> {
    let stored_size = stored
        .byte_size()
        .ok_or_else(|| StoreError::unsupported("variable-length type in fixed-width read"))?;
    if stored_size != host_size {
        return Err(StoreError::StorageSizeMismatch {
            stored: stored_size,
            host: host_size,
        });
    }
    Ok(())
}

/// Encodes a string with explicit truncation to the declared capacity.
///
/// This is the only path that shortens input: the plain write path rejects
/// overlong strings with [`StoreError::InsufficientStorage`]. Exactly the
/// first `capacity` bytes are stored, clamped down to a character boundary
/// for UTF-8 input.
pub(crate) fn encode_string_truncated(
    s: &str,
    ty: &TypeDescriptor,
    space: &SpaceDescriptor,
) -> Result<Vec<u8>> {
    if space.element_count() != 1 {
        return Err(StoreError::ShapeMismatch {
            expected: space.element_count(),
            actual: 1,
        });
    }
    let (capacity, charset, padding) = match ty {
        TypeDescriptor::String {
            capacity: Some(c),
            charset,
            padding,
        } => (*c, *charset, *padding),
        TypeDescriptor::String { capacity: None, .. } => {
            return Err(StoreError::unsupported(
                "truncation on a variable-length string",
            ))
        }
        other => {
            return Err(StoreError::TypeClassMismatch {
                stored: other.class(),
                requested: TypeClass::String,
            })
        }
    };
    let truncated = if s.len() > capacity {
        let mut end = capacity;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    } else {
        s
    };
    let mut buf = Vec::with_capacity(capacity);
    encode_string(
        &Value::Str(truncated.to_string()),
        Some(capacity),
        charset,
        padding,
        &mut buf,
    )?;
    Ok(buf)
}

fn encode_integer(value: &Value, size: usize, signed: bool, buf: &mut Vec<u8>) -> Result<()> {
    if value.class() != TypeClass::Integer {
        return Err(StoreError::TypeClassMismatch {
            stored: TypeClass::Integer,
            requested: value.class(),
        });
    }
    match (value, size, signed) {
        (Value::I8(v), 1, true) => buf.write_i8(*v)?,
        (Value::I16(v), 2, true) => buf.write_i16::<LittleEndian>(*v)?,
        (Value::I32(v), 4, true) => buf.write_i32::<LittleEndian>(*v)?,
        (Value::I64(v), 8, true) => buf.write_i64::<LittleEndian>(*v)?,
        (Value::U8(v), 1, false) => buf.write_u8(*v)?,
        (Value::U16(v), 2, false) => buf.write_u16::<LittleEndian>(*v)?,
        (Value::U32(v), 4, false) => buf.write_u32::<LittleEndian>(*v)?,
        (Value::U64(v), 8, false) => buf.write_u64::<LittleEndian>(*v)?,
        _ => {
            let host = value.scalar_size().unwrap_or(0);
            if host != size {
                return Err(StoreError::StorageSizeMismatch {
                    stored: size,
                    host,
                });
            }
            return Err(StoreError::unsupported(format!(
                "signedness mismatch storing {:?} into {}-byte {} integer",
                value,
                size,
                if signed { "signed" } else { "unsigned" }
            )));
        }
    }
    Ok(())
}

fn encode_float(value: &Value, size: usize, buf: &mut Vec<u8>) -> Result<()> {
    match (value, size) {
        (Value::F32(v), 4) => buf.write_f32::<LittleEndian>(*v)?,
        (Value::F64(v), 8) => buf.write_f64::<LittleEndian>(*v)?,
        // Date-times transfer as a stored double.
        (Value::DateTime(dt), 8) => buf.write_f64::<LittleEndian>(datetime_to_ole_days(dt))?,
        (v, _) if v.class() == TypeClass::Float => {
            return Err(StoreError::StorageSizeMismatch {
                stored: size,
                host: v.scalar_size().unwrap_or(0),
            });
        }
        (v, _) => {
            return Err(StoreError::TypeClassMismatch {
                stored: TypeClass::Float,
                requested: v.class(),
            });
        }
    }
    Ok(())
}

fn encode_string(
    value: &Value,
    capacity: Option<usize>,
    charset: CharacterSet,
    padding: StringPadding,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let s = match value {
        Value::Str(s) => s,
        other => {
            return Err(StoreError::TypeClassMismatch {
                stored: TypeClass::String,
                requested: other.class(),
            })
        }
    };
    if charset == CharacterSet::Ascii && !s.is_ascii() {
        return Err(StoreError::StringEncoding(
            "non-ASCII character in ASCII string",
        ));
    }
    let bytes = s.as_bytes();
    match capacity {
        Some(cap) => {
            // Never silently truncate; the explicit truncation path is
            // encode_string_truncated.
            if bytes.len() > cap {
                return Err(StoreError::InsufficientStorage {
                    needed: bytes.len(),
                    capacity: cap,
                });
            }
            buf.extend_from_slice(bytes);
            let fill = match padding {
                StringPadding::NullTerminate | StringPadding::NullPad => 0u8,
                StringPadding::SpacePad => b' ',
            };
            buf.resize(buf.len() + (cap - bytes.len()), fill);
        }
        None => {
            let len = u32::try_from(bytes.len()).map_err(|_| StoreError::InsufficientStorage {
                needed: bytes.len(),
                capacity: u32::MAX as usize,
            })?;
            buf.write_u32::<LittleEndian>(len)?;
            buf.extend_from_slice(bytes);
        }
    }
    Ok(())
}

fn encode_enum(
    value: &Value,
    ty: &TypeDescriptor,
    base: &TypeDescriptor,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let (size, signed) = base
        .int_width()
        .ok_or_else(|| StoreError::unsupported("enum over non-integer base"))?;
    let stored = match value {
        Value::Enum(name) => {
            ty.enum_member_by_name(name)
                .ok_or_else(|| StoreError::not_found("enum member", name))?
                .value
        }
        Value::Bool(b) => {
            let v = i64::from(*b);
            if ty.enum_member_by_value(v).is_none() {
                return Err(StoreError::unsupported(
                    "bool value on an enum without 0/1 members",
                ));
            }
            v
        }
        other => {
            return Err(StoreError::TypeClassMismatch {
                stored: TypeClass::Enum,
                requested: other.class(),
            })
        }
    };
    write_int_as(stored, size, signed, buf)
}

fn encode_compound(
    value_members: &[(String, Value)],
    size: usize,
    members: &[crate::datatype::CompoundMember],
    buf: &mut Vec<u8>,
) -> Result<()> {
    // Reject duplicate and unknown member names before writing anything.
    for (i, (name, _)) in value_members.iter().enumerate() {
        if value_members[..i].iter().any(|(n, _)| n == name) {
            return Err(StoreError::NameNotUnique(name.clone()));
        }
        if !members.iter().any(|m| &m.name == name) {
            return Err(StoreError::unsupported(format!(
                "unknown compound member '{}'",
                name
            )));
        }
    }
    let start = buf.len();
    buf.resize(start + size, 0);
    for member in members {
        let value = value_members
            .iter()
            .find(|(n, _)| n == &member.name)
            .map(|(_, v)| v)
            .ok_or_else(|| StoreError::not_found("compound member", &member.name))?;
        let mut tmp = Vec::new();
        encode_element(value, &member.ty, &mut tmp)?;
        let dst = start + member.offset;
        buf[dst..dst + tmp.len()].copy_from_slice(&tmp);
    }
    Ok(())
}

fn write_int_as(value: i64, size: usize, signed: bool, buf: &mut Vec<u8>) -> Result<()> {
    match (size, signed) {
        (1, true) => buf.write_i8(value as i8)?,
        (2, true) => buf.write_i16::<LittleEndian>(value as i16)?,
        (4, true) => buf.write_i32::<LittleEndian>(value as i32)?,
        (8, true) => buf.write_i64::<LittleEndian>(value)?,
        (1, false) => buf.write_u8(value as u8)?,
        (2, false) => buf.write_u16::<LittleEndian>(value as u16)?,
        (4, false) => buf.write_u32::<LittleEndian>(value as u32)?,
        (8, false) => buf.write_u64::<LittleEndian>(value as u64)?,
        _ => {
            return Err(StoreError::unsupported(format!(
                "{}-byte enum base",
                size
            )))
        }
    }
    Ok(())
}

fn decode_integer(bytes: &[u8], size: usize, signed: bool) -> Result<(Value, usize)> {
    ensure_len(bytes, size)?;
    let mut cursor = Cursor::new(bytes);
    let value = match (size, signed) {
        (1, true) => Value::I8(cursor.read_i8()?),
        (2, true) => Value::I16(cursor.read_i16::<LittleEndian>()?),
        (4, true) => Value::I32(cursor.read_i32::<LittleEndian>()?),
        (8, true) => Value::I64(cursor.read_i64::<LittleEndian>()?),
        (1, false) => Value::U8(cursor.read_u8()?),
        (2, false) => Value::U16(cursor.read_u16::<LittleEndian>()?),
        (4, false) => Value::U32(cursor.read_u32::<LittleEndian>()?),
        (8, false) => Value::U64(cursor.read_u64::<LittleEndian>()?),
        _ => {
            return Err(StoreError::unsupported(format!(
                "{}-byte integer",
                size
            )))
        }
    };
    Ok((value, size))
}

fn decode_float(bytes: &[u8], size: usize) -> Result<(Value, usize)> {
    ensure_len(bytes, size)?;
    let mut cursor = Cursor::new(bytes);
    let value = match size {
        4 => Value::F32(cursor.read_f32::<LittleEndian>()?),
        8 => Value::F64(cursor.read_f64::<LittleEndian>()?),
        _ => return Err(StoreError::unsupported(format!("{}-byte float", size))),
    };
    Ok((value, size))
}

fn decode_string(
    bytes: &[u8],
    capacity: Option<usize>,
    charset: CharacterSet,
    padding: StringPadding,
) -> Result<(Value, usize)> {
    let (raw, consumed): (&[u8], usize) = match capacity {
        Some(cap) => {
            ensure_len(bytes, cap)?;
            (&bytes[..cap], cap)
        }
        None => {
            ensure_len(bytes, 4)?;
            let mut cursor = Cursor::new(bytes);
            let len = cursor.read_u32::<LittleEndian>()? as usize;
            ensure_len(bytes, 4 + len)?;
            (&bytes[4..4 + len], 4 + len)
        }
    };
    // Fixed-length buffers trim at the padding; variable-length carries its
    // exact byte length.
    let trimmed: &[u8] = if capacity.is_some() {
        let pad = match padding {
            StringPadding::NullTerminate | StringPadding::NullPad => 0u8,
            StringPadding::SpacePad => b' ',
        };
        let end = raw
            .iter()
            .rposition(|&b| b != pad)
            .map(|p| p + 1)
            .unwrap_or(0);
        // NullTerminate additionally stops at the first interior null.
        let slice = &raw[..end];
        if padding == StringPadding::NullTerminate {
            let nul = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
            &slice[..nul]
        } else {
            slice
        }
    } else {
        raw
    };
    let s = match charset {
        CharacterSet::Ascii => {
            if !trimmed.is_ascii() {
                return Err(StoreError::StringEncoding(
                    "non-ASCII byte in ASCII string",
                ));
            }
            String::from_utf8_lossy(trimmed).into_owned()
        }
        CharacterSet::Utf8 => {
            let (decoded, had_errors) = UTF_8.decode_without_bom_handling(trimmed);
            if had_errors {
                return Err(StoreError::StringEncoding("invalid UTF-8 in string"));
            }
            decoded.into_owned()
        }
    };
    Ok((Value::Str(s), consumed))
}

fn is_boolean_enum(members: &[crate::datatype::EnumMember]) -> bool {
    members.len() == 2
        && members.iter().any(|m| m.name == "FALSE" && m.value == 0)
        && members.iter().any(|m| m.name == "TRUE" && m.value == 1)
}

fn int_value_as_i64(value: &Value) -> i64 {
    match value {
        Value::I8(v) => i64::from(*v),
        Value::I16(v) => i64::from(*v),
        Value::I32(v) => i64::from(*v),
        Value::I64(v) => *v,
        Value::U8(v) => i64::from(*v),
        Value::U16(v) => i64::from(*v),
        Value::U32(v) => i64::from(*v),
        Value::U64(v) => *v as i64,
        _ => 0,
    }
}

fn ensure_len(bytes: &[u8], needed: usize) -> Result<()> {
    if bytes.len() < needed {
        return Err(StoreError::InsufficientStorage {
            needed,
            capacity: bytes.len(),
        });
    }
    Ok(())
}

/// Converts stored f64 bytes to a date-time; used by the typed read path.
pub(crate) fn decode_datetime(bytes: &[u8]) -> Result<chrono::NaiveDateTime> {
    let (value, _) = decode_float(bytes, 8)?;
    match value {
        Value::F64(days) => Ok(ole_days_to_datetime(days)),
        _ => unreachable!("decode_float(8) yields F64"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::TypeDescriptor;

    fn scalar() -> SpaceDescriptor {
        SpaceDescriptor::scalar()
    }

    #[test]
    fn test_integer_round_trip() {
        let ty = TypeDescriptor::of::<i32>();
        let bytes = encode(&Value::I32(-7), &ty, &scalar()).unwrap();
        assert_eq!(bytes, (-7i32).to_le_bytes());
        assert_eq!(decode(&bytes, &ty, &scalar()).unwrap(), Value::I32(-7));
    }

    #[test]
    fn test_integer_size_mismatch() {
        let ty = TypeDescriptor::of::<i64>();
        let err = encode(&Value::I32(1), &ty, &scalar()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::StorageSizeMismatch { stored: 8, host: 4 }
        ));
    }

    #[test]
    fn test_integer_class_mismatch() {
        let ty = TypeDescriptor::of::<i32>();
        let err = encode(&Value::Str("x".into()), &ty, &scalar()).unwrap_err();
        assert!(matches!(err, StoreError::TypeClassMismatch { .. }));
    }

    #[test]
    fn test_float_round_trip() {
        let ty = TypeDescriptor::of::<f64>();
        let bytes = encode(&Value::F64(2.5), &ty, &scalar()).unwrap();
        assert_eq!(decode(&bytes, &ty, &scalar()).unwrap(), Value::F64(2.5));
    }

    #[test]
    fn test_bool_transfers_through_byte() {
        let ty = TypeDescriptor::of::<bool>();
        let bytes = encode(&Value::Bool(true), &ty, &scalar()).unwrap();
        assert_eq!(bytes, vec![1]);
        assert_eq!(decode(&bytes, &ty, &scalar()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_fixed_string_padding_and_trim() {
        let ty = TypeDescriptor::fixed_string(
            8,
            CharacterSet::Ascii,
            StringPadding::NullTerminate,
        )
        .unwrap();
        let bytes = encode(&Value::Str("hi".into()), &ty, &scalar()).unwrap();
        assert_eq!(bytes, b"hi\0\0\0\0\0\0");
        assert_eq!(
            decode(&bytes, &ty, &scalar()).unwrap(),
            Value::Str("hi".into())
        );
    }

    #[test]
    fn test_fixed_string_space_pad() {
        let ty =
            TypeDescriptor::fixed_string(6, CharacterSet::Ascii, StringPadding::SpacePad).unwrap();
        let bytes = encode(&Value::Str("ab".into()), &ty, &scalar()).unwrap();
        assert_eq!(bytes, b"ab    ");
        assert_eq!(
            decode(&bytes, &ty, &scalar()).unwrap(),
            Value::Str("ab".into())
        );
    }

    #[test]
    fn test_fixed_string_overflow_rejected() {
        let ty = TypeDescriptor::fixed_string(
            4,
            CharacterSet::Ascii,
            StringPadding::NullTerminate,
        )
        .unwrap();
        let err = encode(&Value::Str("too long".into()), &ty, &scalar()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStorage {
                needed: 8,
                capacity: 4
            }
        ));
    }

    #[test]
    fn test_explicit_truncation() {
        let ty = TypeDescriptor::fixed_string(4, CharacterSet::Ascii, StringPadding::NullPad)
            .unwrap();
        let bytes = encode_string_truncated("abcdef", &ty, &scalar()).unwrap();
        assert_eq!(bytes, b"abcd");
        assert_eq!(
            decode(&bytes, &ty, &scalar()).unwrap(),
            Value::Str("abcd".into())
        );
    }

    #[test]
    fn test_truncation_respects_utf8_boundary() {
        let ty =
            TypeDescriptor::fixed_string(4, CharacterSet::Utf8, StringPadding::NullPad).unwrap();
        // 'é' is 2 bytes; truncating "aéé" (5 bytes) at 4 must not split it.
        let bytes = encode_string_truncated("aéé", &ty, &scalar()).unwrap();
        assert_eq!(
            decode(&bytes, &ty, &scalar()).unwrap(),
            Value::Str("aé".into())
        );
    }

    #[test]
    fn test_ascii_charset_enforced() {
        let ty = TypeDescriptor::fixed_string(
            8,
            CharacterSet::Ascii,
            StringPadding::NullTerminate,
        )
        .unwrap();
        let err = encode(&Value::Str("héllo".into()), &ty, &scalar()).unwrap_err();
        assert!(matches!(err, StoreError::StringEncoding(_)));
    }

    #[test]
    fn test_variable_string_round_trip() {
        let ty = TypeDescriptor::variable_string(CharacterSet::Utf8);
        let bytes = encode(&Value::Str("héllo".into()), &ty, &scalar()).unwrap();
        assert_eq!(
            decode(&bytes, &ty, &scalar()).unwrap(),
            Value::Str("héllo".into())
        );
    }

    #[test]
    fn test_enum_round_trip() {
        let ty = TypeDescriptor::enumeration(
            TypeDescriptor::of::<i16>(),
            &[("RED", 1), ("GREEN", 2), ("BLUE", 3)],
        )
        .unwrap();
        let bytes = encode(&Value::Enum("GREEN".into()), &ty, &scalar()).unwrap();
        assert_eq!(bytes, 2i16.to_le_bytes());
        assert_eq!(
            decode(&bytes, &ty, &scalar()).unwrap(),
            Value::Enum("GREEN".into())
        );
    }

    #[test]
    fn test_enum_unknown_member() {
        let ty =
            TypeDescriptor::enumeration(TypeDescriptor::of::<i16>(), &[("RED", 1)]).unwrap();
        let err = encode(&Value::Enum("MAUVE".into()), &ty, &scalar()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_compound_round_trip() {
        let ty = TypeDescriptor::compound(12)
            .unwrap_chain("id", 0, TypeDescriptor::of::<i32>())
            .unwrap_chain("score", 4, TypeDescriptor::of::<f64>())
            .build()
            .unwrap();
        let value = Value::Compound(vec![
            ("id".into(), Value::I32(42)),
            ("score".into(), Value::F64(0.5)),
        ]);
        let bytes = encode(&value, &ty, &scalar()).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode(&bytes, &ty, &scalar()).unwrap(), value);
    }

    #[test]
    fn test_compound_missing_member() {
        let ty = TypeDescriptor::compound(4)
            .unwrap_chain("id", 0, TypeDescriptor::of::<i32>())
            .build()
            .unwrap();
        let err = encode(&Value::Compound(vec![]), &ty, &scalar()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_multi_element_shape() {
        let ty = TypeDescriptor::of::<u16>();
        let space = SpaceDescriptor::simple_fixed(&[3]);
        let value = Value::Array(vec![Value::U16(1), Value::U16(2), Value::U16(3)]);
        let bytes = encode(&value, &ty, &space).unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(decode(&bytes, &ty, &space).unwrap(), value);

        let err = encode(
            &Value::Array(vec![Value::U16(1)]),
            &ty,
            &space,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ShapeMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_scalar_rejects_array() {
        let ty = TypeDescriptor::of::<u16>();
        let space = SpaceDescriptor::simple_fixed(&[2]);
        let err = encode(&Value::U16(5), &ty, &space).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_decode_short_buffer() {
        let ty = TypeDescriptor::of::<i32>();
        let err = decode(&[0u8, 0], &ty, &scalar()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStorage {
                needed: 4,
                capacity: 2
            }
        ));
    }

    #[test]
    fn test_multi_element_array_type() {
        // Two elements, each itself a fixed 2-byte array.
        let ty = TypeDescriptor::array(TypeDescriptor::of::<u8>(), &[2]).unwrap();
        let space = SpaceDescriptor::simple_fixed(&[2]);
        let value = Value::Array(vec![
            Value::Array(vec![Value::U8(1), Value::U8(2)]),
            Value::Array(vec![Value::U8(3), Value::U8(4)]),
        ]);
        let bytes = encode(&value, &ty, &space).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
        assert_eq!(decode(&bytes, &ty, &space).unwrap(), value);

        // A lone element where the space wants two is still a shape error.
        let one = Value::Array(vec![Value::U8(1), Value::U8(2)]);
        assert!(matches!(
            encode(&one, &ty, &space).unwrap_err(),
            StoreError::TypeClassMismatch { .. } | StoreError::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn test_array_element_type() {
        let ty = TypeDescriptor::array(TypeDescriptor::of::<u8>(), &[4]).unwrap();
        let value = Value::Array(vec![
            Value::U8(1),
            Value::U8(2),
            Value::U8(3),
            Value::U8(4),
        ]);
        let bytes = encode(&value, &ty, &scalar()).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
        assert_eq!(decode(&bytes, &ty, &scalar()).unwrap(), value);
    }

    // Small helper so compound construction reads cleanly in tests.
    trait ChainExt: Sized {
        fn unwrap_chain(self, name: &str, offset: usize, ty: TypeDescriptor) -> Self;
    }

    impl ChainExt for crate::datatype::CompoundBuilder {
        fn unwrap_chain(self, name: &str, offset: usize, ty: TypeDescriptor) -> Self {
            self.insert(name, offset, ty).unwrap()
        }
    }
}
