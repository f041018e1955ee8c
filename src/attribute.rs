//! Attributes: small typed values attached to files, groups, datasets, and
//! named types.
//!
//! The generic [`Attribute::write`]/[`Attribute::read`] pair moves [`Value`]s
//! through the codec. The typed accessors are the checked fast path for
//! scalar attributes: each one validates the stored type's class and
//! fixed-width size before touching bytes, so a host `i32` can never be
//! silently read out of a stored 8-byte integer.

use chrono::NaiveDateTime;

use crate::codec;
use crate::datatype::TypeDescriptor;
use crate::dataspace::SpaceDescriptor;
use crate::error::{Result, StoreError};
use crate::handle::Handle;
use crate::store::{ObjectHandle, Store};
use crate::value::{TypeClass, Value};

/// An open attribute.
#[derive(Debug)]
pub struct Attribute<'s> {
    store: &'s Store,
    handle: Handle,
    name: String,
    open: bool,
}

impl<'s> Attribute<'s> {
    pub(crate) fn bind(store: &'s Store, handle: Handle, name: String) -> Self {
        Self {
            store,
            handle,
            name,
            open: true,
        }
    }

    /// Name of this attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared value type.
    pub fn dtype(&self) -> Result<TypeDescriptor> {
        self.store.attribute_type(self.handle)
    }

    /// The declared space.
    pub fn space(&self) -> Result<SpaceDescriptor> {
        self.store.attribute_space(self.handle)
    }

    /// Writes the attribute's value.
    ///
    /// A one-element space takes a scalar value; larger spaces take a
    /// [`Value::Array`] with one entry per element.
    pub fn write(&self, value: &Value) -> Result<()> {
        self.store.attribute_write(self.handle, value)
    }

    /// Reads the attribute's value.
    pub fn read(&self) -> Result<Value> {
        self.store.attribute_read(self.handle)
    }

    // ---- typed scalar accessors -----------------------------------------

    /// Reads a scalar 4-byte integer.
    ///
    /// # Errors
    ///
    /// * [`StoreError::TypeClassMismatch`] — stored type is not an integer.
    /// * [`StoreError::StorageSizeMismatch`] — stored width is not 4 bytes.
    /// * [`StoreError::ShapeMismatch`] — attribute is not single-element.
    pub fn read_i32(&self) -> Result<i32> {
        self.check_scalar(TypeClass::Integer, 4)?;
        match self.read()? {
            Value::I32(v) => Ok(v),
            Value::U32(v) => Ok(v as i32),
            other => Err(class_surprise(TypeClass::Integer, &other)),
        }
    }

    /// Reads a scalar 8-byte integer.
    pub fn read_i64(&self) -> Result<i64> {
        self.check_scalar(TypeClass::Integer, 8)?;
        match self.read()? {
            Value::I64(v) => Ok(v),
            Value::U64(v) => Ok(v as i64),
            other => Err(class_surprise(TypeClass::Integer, &other)),
        }
    }

    /// Reads a scalar double.
    pub fn read_f64(&self) -> Result<f64> {
        self.check_scalar(TypeClass::Float, 8)?;
        match self.read()? {
            Value::F64(v) => Ok(v),
            other => Err(class_surprise(TypeClass::Float, &other)),
        }
    }

    /// Reads a scalar boolean (a stored 1-byte `{FALSE, TRUE}` enum).
    pub fn read_bool(&self) -> Result<bool> {
        self.check_scalar(TypeClass::Enum, 1)?;
        match self.read()? {
            Value::Bool(v) => Ok(v),
            Value::Enum(_) => Err(StoreError::unsupported(
                "stored enum is not the boolean enum",
            )),
            other => Err(class_surprise(TypeClass::Enum, &other)),
        }
    }

    /// Reads a scalar string (fixed or variable-length).
    pub fn read_string(&self) -> Result<String> {
        let ty = self.dtype()?;
        codec::check_class(&ty, TypeClass::String)?;
        self.check_single_element()?;
        match self.read()? {
            Value::Str(s) => Ok(s),
            other => Err(class_surprise(TypeClass::String, &other)),
        }
    }

    /// Reads a scalar date-time from its stored double day count.
    pub fn read_datetime(&self) -> Result<NaiveDateTime> {
        self.check_scalar(TypeClass::Float, 8)?;
        let raw = self.store.attribute_raw(self.handle)?;
        codec::decode_datetime(&raw)
    }

    /// Writes a scalar 4-byte integer.
    pub fn write_i32(&self, v: i32) -> Result<()> {
        let ty = self.check_scalar(TypeClass::Integer, 4)?;
        let value = match ty {
            TypeDescriptor::Integer { signed: true, .. } => Value::I32(v),
            TypeDescriptor::Integer { signed: false, .. } => Value::U32(v as u32),
            _ => return Err(StoreError::unsupported("non-integer storage for i32")),
        };
        self.write(&value)
    }

    /// Writes a scalar 8-byte integer.
    pub fn write_i64(&self, v: i64) -> Result<()> {
        let ty = self.check_scalar(TypeClass::Integer, 8)?;
        let value = match ty {
            TypeDescriptor::Integer { signed: true, .. } => Value::I64(v),
            TypeDescriptor::Integer { signed: false, .. } => Value::U64(v as u64),
            _ => return Err(StoreError::unsupported("non-integer storage for i64")),
        };
        self.write(&value)
    }

    /// Writes a scalar double.
    pub fn write_f64(&self, v: f64) -> Result<()> {
        self.check_scalar(TypeClass::Float, 8)?;
        self.write(&Value::F64(v))
    }

    /// Writes a scalar boolean.
    pub fn write_bool(&self, v: bool) -> Result<()> {
        self.check_scalar(TypeClass::Enum, 1)?;
        self.write(&Value::Bool(v))
    }

    /// Writes a scalar string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InsufficientStorage`] if the string exceeds a
    /// fixed capacity; use [`Attribute::write_string_truncated`] to shorten
    /// instead.
    pub fn write_string(&self, s: &str) -> Result<()> {
        let ty = self.dtype()?;
        codec::check_class(&ty, TypeClass::String)?;
        self.check_single_element()?;
        self.write(&Value::Str(s.to_string()))
    }

    /// Writes a scalar string, truncating to the fixed capacity if needed.
    /// Truncation never splits a UTF-8 character.
    pub fn write_string_truncated(&self, s: &str) -> Result<()> {
        self.store.attribute_write_truncated(self.handle, s)
    }

    /// Writes a scalar date-time as its double day count.
    pub fn write_datetime(&self, dt: NaiveDateTime) -> Result<()> {
        self.check_scalar(TypeClass::Float, 8)?;
        self.write(&Value::DateTime(dt))
    }

    /// Closes this attribute handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyClosed`] on a second call.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(StoreError::AlreadyClosed(self.handle));
        }
        self.store.close_handle(self.handle)?;
        self.open = false;
        Ok(())
    }

    fn check_scalar(&self, class: TypeClass, size: usize) -> Result<TypeDescriptor> {
        let ty = self.dtype()?;
        codec::check_class(&ty, class)?;
        codec::check_scalar_size(&ty, size)?;
        self.check_single_element()?;
        Ok(ty)
    }

    fn check_single_element(&self) -> Result<()> {
        let count = self.space()?.element_count();
        if count != 1 {
            return Err(StoreError::ShapeMismatch {
                expected: count,
                actual: 1,
            });
        }
        Ok(())
    }
}

impl<'s> ObjectHandle<'s> for Attribute<'s> {
    fn store(&self) -> &'s Store {
        self.store
    }

    fn handle(&self) -> Handle {
        self.handle
    }
}

impl Drop for Attribute<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.store.close_handle(self.handle);
        }
    }
}

fn class_surprise(requested: TypeClass, got: &Value) -> StoreError {
    StoreError::TypeClassMismatch {
        stored: got.class(),
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{CharacterSet, StringPadding};
    use crate::store::AttributeHost;
    use chrono::NaiveDate;

    fn scalar_attr<'s>(
        store: &'s Store,
        ty: &TypeDescriptor,
    ) -> (crate::store::File<'s>, Attribute<'s>) {
        let file = store.create_file("data", true).unwrap();
        let attr = file
            .create_attribute("a", ty, &SpaceDescriptor::scalar())
            .unwrap();
        (file, attr)
    }

    #[test]
    fn test_i32_round_trip() {
        let store = Store::new();
        let (_file, attr) = scalar_attr(&store, &TypeDescriptor::of::<i32>());
        attr.write_i32(-42).unwrap();
        assert_eq!(attr.read_i32().unwrap(), -42);
    }

    #[test]
    fn test_i32_size_guard() {
        let store = Store::new();
        let (_file, attr) = scalar_attr(&store, &TypeDescriptor::of::<i64>());
        assert!(matches!(
            attr.read_i32().unwrap_err(),
            StoreError::StorageSizeMismatch { stored: 8, host: 4 }
        ));
        attr.write_i64(1 << 40).unwrap();
        assert_eq!(attr.read_i64().unwrap(), 1 << 40);
    }

    #[test]
    fn test_class_guard() {
        let store = Store::new();
        let (_file, attr) = scalar_attr(&store, &TypeDescriptor::of::<f64>());
        assert!(matches!(
            attr.read_i32().unwrap_err(),
            StoreError::TypeClassMismatch { .. }
        ));
        attr.write_f64(0.25).unwrap();
        assert_eq!(attr.read_f64().unwrap(), 0.25);
    }

    #[test]
    fn test_bool_round_trip() {
        let store = Store::new();
        let (_file, attr) = scalar_attr(&store, &TypeDescriptor::of::<bool>());
        attr.write_bool(true).unwrap();
        assert_eq!(attr.read_bool().unwrap(), true);
        assert_eq!(attr.read().unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_read_bool_rejects_foreign_enum() {
        let store = Store::new();
        let ty = TypeDescriptor::enumeration(
            TypeDescriptor::of::<u8>(),
            &[("OFF", 0), ("ON", 1)],
        )
        .unwrap();
        let (_file, attr) = scalar_attr(&store, &ty);
        attr.write(&Value::Enum("ON".into())).unwrap();
        // Same class and width as a boolean, but not the boolean enum; the
        // error must say so instead of claiming an enum/enum class clash.
        assert!(matches!(
            attr.read_bool().unwrap_err(),
            StoreError::UnsupportedType(_)
        ));
        assert_eq!(attr.read().unwrap(), Value::Enum("ON".into()));
    }

    #[test]
    fn test_string_overflow_vs_truncate() {
        let store = Store::new();
        let ty = TypeDescriptor::fixed_string(4, CharacterSet::Ascii, StringPadding::NullPad)
            .unwrap();
        let (_file, attr) = scalar_attr(&store, &ty);

        assert!(matches!(
            attr.write_string("too long").unwrap_err(),
            StoreError::InsufficientStorage { .. }
        ));
        attr.write_string_truncated("too long").unwrap();
        assert_eq!(attr.read_string().unwrap(), "too ");
    }

    #[test]
    fn test_datetime_round_trip_millisecond() {
        let store = Store::new();
        let (_file, attr) = scalar_attr(&store, &TypeDescriptor::of::<f64>());
        let dt = NaiveDate::from_ymd_opt(2023, 11, 5)
            .unwrap()
            .and_hms_milli_opt(8, 30, 15, 250)
            .unwrap();
        attr.write_datetime(dt).unwrap();
        assert_eq!(attr.read_datetime().unwrap(), dt);
        // The raw stored value is readable as a plain double too.
        assert!(attr.read_f64().unwrap() > 45_000.0);
    }

    #[test]
    fn test_unwritten_attribute_reads_default() {
        let store = Store::new();
        let (_file, attr) = scalar_attr(&store, &TypeDescriptor::of::<i32>());
        assert_eq!(attr.read_i32().unwrap(), 0);
    }

    #[test]
    fn test_typed_accessor_rejects_array_space() {
        let store = Store::new();
        let file = store.create_file("data", true).unwrap();
        let attr = file
            .create_attribute(
                "v",
                &TypeDescriptor::of::<i32>(),
                &SpaceDescriptor::simple_fixed(&[3]),
            )
            .unwrap();
        assert!(matches!(
            attr.read_i32().unwrap_err(),
            StoreError::ShapeMismatch { .. }
        ));
    }
}
