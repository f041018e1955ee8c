//! Host-side values and their classification.
//!
//! [`Value`] is the variant the host application reads and writes; the codec
//! translates it to and from the store's byte layout using the declared
//! [`crate::datatype::TypeDescriptor`]. Date-times cross the boundary as an
//! OLE-automation-style day count stored in a double; the conversion is exact
//! to the millisecond, a known and accepted lossy boundary.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Semantic class of a stored type or host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeClass {
    /// Fixed-width integer.
    Integer,

    /// Floating point.
    Float,

    /// String (fixed or variable-length).
    String,

    /// Enumeration over an integer base.
    Enum,

    /// Compound (struct).
    Compound,

    /// Fixed-size array element.
    Array,
}

/// A host-language value crossing the typed I/O boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 8-bit signed integer.
    I8(i8),

    /// 16-bit signed integer.
    I16(i16),

    /// 32-bit signed integer.
    I32(i32),

    /// 64-bit signed integer.
    I64(i64),

    /// 8-bit unsigned integer.
    U8(u8),

    /// 16-bit unsigned integer.
    U16(u16),

    /// 32-bit unsigned integer.
    U32(u32),

    /// 64-bit unsigned integer.
    U64(u64),

    /// 32-bit float.
    F32(f32),

    /// 64-bit float.
    F64(f64),

    /// Boolean, stored as a 1-byte enum.
    Bool(bool),

    /// String value.
    Str(String),

    /// Enum member, identified by name.
    Enum(String),

    /// Compound value: member name to value, in member order.
    Compound(Vec<(String, Value)>),

    /// Array of homogeneous values (also used for multi-element spaces).
    Array(Vec<Value>),

    /// Date-time, stored as an f64 OLE-automation day count.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Semantic class this value maps to on the store side.
    pub fn class(&self) -> TypeClass {
        match self {
            Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::U8(_)
            | Value::U16(_)
            | Value::U32(_)
            | Value::U64(_) => TypeClass::Integer,
            // DateTime transfers through a stored double.
            Value::F32(_) | Value::F64(_) | Value::DateTime(_) => TypeClass::Float,
            Value::Str(_) => TypeClass::String,
            Value::Bool(_) | Value::Enum(_) => TypeClass::Enum,
            Value::Compound(_) => TypeClass::Compound,
            Value::Array(_) => TypeClass::Array,
        }
    }

    /// Byte size of this value's fixed-width scalar form, if it has one.
    pub fn scalar_size(&self) -> Option<usize> {
        match self {
            Value::I8(_) | Value::U8(_) | Value::Bool(_) => Some(1),
            Value::I16(_) | Value::U16(_) => Some(2),
            Value::I32(_) | Value::U32(_) | Value::F32(_) => Some(4),
            Value::I64(_) | Value::U64(_) | Value::F64(_) | Value::DateTime(_) => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Enum(name) => write!(f, "{}", name),
            Value::Compound(members) => {
                write!(f, "{{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

/// Milliseconds per day, the resolution of the date-time contract.
const MS_PER_DAY: f64 = 86_400_000.0;

fn ole_epoch() -> NaiveDateTime {
    // 1899-12-30T00:00:00, the OLE automation epoch.
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .expect("valid OLE epoch date")
        .and_hms_opt(0, 0, 0)
        .expect("valid OLE epoch time")
}

/// Converts a date-time to an OLE-automation day count.
///
/// Sub-millisecond precision is discarded; the round trip through
/// [`ole_days_to_datetime`] is exact to the millisecond.
pub fn datetime_to_ole_days(dt: &NaiveDateTime) -> f64 {
    let delta = *dt - ole_epoch();
    delta.num_milliseconds() as f64 / MS_PER_DAY
}

/// Converts an OLE-automation day count back to a date-time, rounded to the
/// nearest millisecond.
pub fn ole_days_to_datetime(days: f64) -> NaiveDateTime {
    let ms = (days * MS_PER_DAY).round() as i64;
    ole_epoch() + Duration::milliseconds(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_classes() {
        assert_eq!(Value::I32(1).class(), TypeClass::Integer);
        assert_eq!(Value::F64(1.0).class(), TypeClass::Float);
        assert_eq!(Value::Str("x".into()).class(), TypeClass::String);
        assert_eq!(Value::Bool(true).class(), TypeClass::Enum);
        assert_eq!(Value::Enum("A".into()).class(), TypeClass::Enum);
        assert_eq!(Value::Compound(vec![]).class(), TypeClass::Compound);
        assert_eq!(Value::Array(vec![]).class(), TypeClass::Array);
    }

    #[test]
    fn test_datetime_classifies_as_float() {
        let dt = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(Value::DateTime(dt).class(), TypeClass::Float);
        assert_eq!(Value::DateTime(dt).scalar_size(), Some(8));
    }

    #[test]
    fn test_ole_epoch_is_zero() {
        let epoch = ole_epoch();
        assert_eq!(datetime_to_ole_days(&epoch), 0.0);
        assert_eq!(ole_days_to_datetime(0.0), epoch);
    }

    #[test]
    fn test_ole_round_trip_millisecond() {
        let dt = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_milli_opt(13, 37, 42, 123)
            .unwrap();
        let days = datetime_to_ole_days(&dt);
        let back = ole_days_to_datetime(days);
        let diff = (back - dt).num_milliseconds().abs();
        assert!(diff < 1, "round trip drifted by {}ms", diff);
    }

    #[test]
    fn test_ole_known_value() {
        // One full day after the epoch.
        let dt = NaiveDate::from_ymd_opt(1899, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(datetime_to_ole_days(&dt), 1.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::I32(7).to_string(), "7");
        assert_eq!(
            Value::Compound(vec![("a".into(), Value::I8(1))]).to_string(),
            "{a: 1}"
        );
        assert_eq!(
            Value::Array(vec![Value::U8(1), Value::U8(2)]).to_string(),
            "[1, 2]"
        );
    }
}
