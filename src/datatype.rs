//! Type descriptors: the container's description of a value's binary layout.
//!
//! The mapping from host types to store-native descriptors is a closed
//! algebra: fixed-width integers and floats, fixed or variable-length
//! strings, enumerations over an integer base, compounds of the above, and
//! fixed-size arrays. Anything outside that set fails fast with
//! [`StoreError::UnsupportedType`] rather than attempt undefined layout.

use std::fmt;

use crate::error::{Result, StoreError};
use crate::value::TypeClass;

/// Character set of string data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CharacterSet {
    /// 7-bit ASCII. Writes reject bytes above 0x7F.
    Ascii,

    /// UTF-8.
    Utf8,
}

/// Padding mode for fixed-length strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StringPadding {
    /// Null-terminated; remaining capacity is zero-filled.
    NullTerminate,

    /// Zero-filled to capacity, no terminator guarantee.
    NullPad,

    /// Space-filled to capacity.
    SpacePad,
}

/// A member of an enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnumMember {
    /// Member name.
    pub name: String,

    /// Member value, widened to i64 regardless of base width.
    pub value: i64,
}

/// A member of a compound type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompoundMember {
    /// Member name, unique within the compound.
    pub name: String,

    /// Byte offset within the compound.
    pub offset: usize,

    /// Member type.
    pub ty: TypeDescriptor,
}

/// Describes the binary layout and semantic class of stored values.
///
/// Descriptors are immutable after creation and compare structurally: two
/// descriptors are equal iff the store would define them identically, not
/// iff they are the same host object.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeDescriptor {
    /// Fixed-width integer.
    Integer {
        /// Byte size: 1, 2, 4, or 8.
        size: usize,
        /// Signedness.
        signed: bool,
    },

    /// IEEE floating point.
    Float {
        /// Byte size: 4 or 8.
        size: usize,
    },

    /// String, fixed-capacity or variable-length.
    String {
        /// Declared byte capacity; `None` for variable-length.
        capacity: Option<usize>,
        /// Character set of the stored bytes.
        charset: CharacterSet,
        /// Padding mode (meaningful for fixed capacity only).
        padding: StringPadding,
    },

    /// Enumeration over an integer base type.
    Enum {
        /// Base integer type.
        base: Box<TypeDescriptor>,
        /// Members in declaration order.
        members: Vec<EnumMember>,
    },

    /// Compound (struct) of named, offset-positioned members.
    Compound {
        /// Total byte size, including any interior padding.
        size: usize,
        /// Members in insertion order.
        members: Vec<CompoundMember>,
    },

    /// Fixed-size homogeneous array embedded as one element.
    Array {
        /// Element type.
        base: Box<TypeDescriptor>,
        /// Array dimensions, all nonzero.
        dims: Vec<usize>,
    },
}

impl TypeDescriptor {
    /// Creates a fixed-width integer descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedType`] for byte sizes other than
    /// 1, 2, 4, or 8.
    pub fn integer(size: usize, signed: bool) -> Result<Self> {
        match size {
            1 | 2 | 4 | 8 => Ok(TypeDescriptor::Integer { size, signed }),
            _ => Err(StoreError::unsupported(format!(
                "{}-byte integer",
                size
            ))),
        }
    }

    /// Creates a floating-point descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedType`] for byte sizes other than 4 or 8.
    pub fn float(size: usize) -> Result<Self> {
        match size {
            4 | 8 => Ok(TypeDescriptor::Float { size }),
            _ => Err(StoreError::unsupported(format!("{}-byte float", size))),
        }
    }

    /// Creates a fixed-capacity string descriptor.
    ///
    /// `capacity` is the byte capacity of the stored buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedType`] for zero capacity.
    pub fn fixed_string(
        capacity: usize,
        charset: CharacterSet,
        padding: StringPadding,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(StoreError::unsupported("zero-capacity string"));
        }
        Ok(TypeDescriptor::String {
            capacity: Some(capacity),
            charset,
            padding,
        })
    }

    /// Creates a variable-length string descriptor.
    pub fn variable_string(charset: CharacterSet) -> Self {
        TypeDescriptor::String {
            capacity: None,
            charset,
            padding: StringPadding::NullTerminate,
        }
    }

    /// Creates an enumeration descriptor over an integer base.
    ///
    /// Members are recorded in declaration order.
    ///
    /// # Errors
    ///
    /// * [`StoreError::UnsupportedType`] — base is not a supported-width
    ///   integer, or a member value does not fit the base width.
    /// * [`StoreError::NameNotUnique`] — duplicate member name.
    /// * [`StoreError::DuplicateEnumValue`] — duplicate member value.
    /// * [`StoreError::EmptyName`] — empty member name.
    pub fn enumeration(base: TypeDescriptor, members: &[(&str, i64)]) -> Result<Self> {
        let (size, signed) = base
            .int_width()
            .ok_or_else(|| StoreError::unsupported(format!("enum base {}", base)))?;

        let mut out = Vec::with_capacity(members.len());
        for &(name, value) in members {
            if name.is_empty() {
                return Err(StoreError::EmptyName("enum member"));
            }
            if out.iter().any(|m: &EnumMember| m.name == name) {
                return Err(StoreError::NameNotUnique(name.to_string()));
            }
            if out.iter().any(|m: &EnumMember| m.value == value) {
                return Err(StoreError::DuplicateEnumValue {
                    name: name.to_string(),
                    value,
                });
            }
            if !value_fits_int(value, size, signed) {
                return Err(StoreError::unsupported(format!(
                    "enum value {} out of range for {}-byte {} base",
                    value,
                    size,
                    if signed { "signed" } else { "unsigned" }
                )));
            }
            out.push(EnumMember {
                name: name.to_string(),
                value,
            });
        }
        Ok(TypeDescriptor::Enum {
            base: Box::new(base),
            members: out,
        })
    }

    /// The 1-byte boolean enum: `{FALSE = 0, TRUE = 1}`.
    ///
    /// This is how `bool` host values are stored; I/O converts through the
    /// equivalent native byte type.
    pub fn boolean() -> Self {
        TypeDescriptor::Enum {
            base: Box::new(TypeDescriptor::Integer {
                size: 1,
                signed: false,
            }),
            members: vec![
                EnumMember {
                    name: "FALSE".to_string(),
                    value: 0,
                },
                EnumMember {
                    name: "TRUE".to_string(),
                    value: 1,
                },
            ],
        }
    }

    /// Starts building a compound descriptor of the given total byte size.
    pub fn compound(total_size: usize) -> CompoundBuilder {
        CompoundBuilder {
            size: total_size,
            members: Vec::new(),
        }
    }

    /// Creates a fixed-size array descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedType`] if `dims` is empty, any
    /// dimension is zero, or the element type is variable-length.
    pub fn array(element: TypeDescriptor, dims: &[usize]) -> Result<Self> {
        if dims.is_empty() || dims.contains(&0) {
            return Err(StoreError::unsupported("array with empty or zero dimensions"));
        }
        if element.is_variable() {
            return Err(StoreError::unsupported(
                "array of variable-length elements",
            ));
        }
        Ok(TypeDescriptor::Array {
            base: Box::new(element),
            dims: dims.to_vec(),
        })
    }

    /// Maps a host primitive type to its store descriptor.
    pub fn of<T: HostScalar>() -> Self {
        T::type_descriptor()
    }

    /// Semantic class of this descriptor.
    pub fn class(&self) -> TypeClass {
        match self {
            TypeDescriptor::Integer { .. } => TypeClass::Integer,
            TypeDescriptor::Float { .. } => TypeClass::Float,
            TypeDescriptor::String { .. } => TypeClass::String,
            TypeDescriptor::Enum { .. } => TypeClass::Enum,
            TypeDescriptor::Compound { .. } => TypeClass::Compound,
            TypeDescriptor::Array { .. } => TypeClass::Array,
        }
    }

    /// Fixed byte size of one element, or `None` for variable-length strings.
    pub fn byte_size(&self) -> Option<usize> {
        match self {
            TypeDescriptor::Integer { size, .. } | TypeDescriptor::Float { size } => Some(*size),
            TypeDescriptor::String { capacity, .. } => *capacity,
            TypeDescriptor::Enum { base, .. } => base.byte_size(),
            TypeDescriptor::Compound { size, .. } => Some(*size),
            TypeDescriptor::Array { base, dims } => {
                let n: usize = dims.iter().product();
                base.byte_size().map(|s| s * n)
            }
        }
    }

    /// Returns true for variable-length storage (no fixed element size).
    pub fn is_variable(&self) -> bool {
        self.byte_size().is_none()
    }

    /// Integer width of this type, if it is an integer: `(size, signed)`.
    pub fn int_width(&self) -> Option<(usize, bool)> {
        match self {
            TypeDescriptor::Integer { size, signed } => Some((*size, *signed)),
            _ => None,
        }
    }

    /// Finds the native counterpart used for I/O buffer conversion.
    ///
    /// Enumerations (including the stored boolean) convert through their
    /// integer base; arrays convert element-wise; compounds convert
    /// member-wise; everything else transfers as itself.
    pub fn equivalent_native_type(&self) -> TypeDescriptor {
        match self {
            TypeDescriptor::Enum { base, .. } => (**base).clone(),
            TypeDescriptor::Array { base, dims } => TypeDescriptor::Array {
                base: Box::new(base.equivalent_native_type()),
                dims: dims.clone(),
            },
            TypeDescriptor::Compound { size, members } => TypeDescriptor::Compound {
                size: *size,
                members: members
                    .iter()
                    .map(|m| CompoundMember {
                        name: m.name.clone(),
                        offset: m.offset,
                        ty: m.ty.equivalent_native_type(),
                    })
                    .collect(),
            },
            other => other.clone(),
        }
    }

    /// Store-defined structural equality.
    pub fn is_equal_to(&self, other: &TypeDescriptor) -> bool {
        self == other
    }

    /// Looks up an enum member by value.
    pub fn enum_member_by_value(&self, value: i64) -> Option<&EnumMember> {
        match self {
            TypeDescriptor::Enum { members, .. } => members.iter().find(|m| m.value == value),
            _ => None,
        }
    }

    /// Looks up an enum member by name.
    pub fn enum_member_by_name(&self, name: &str) -> Option<&EnumMember> {
        match self {
            TypeDescriptor::Enum { members, .. } => members.iter().find(|m| m.name == name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Integer { size, signed } => {
                write!(f, "{}{}", if *signed { "i" } else { "u" }, size * 8)
            }
            TypeDescriptor::Float { size } => write!(f, "f{}", size * 8),
            TypeDescriptor::String {
                capacity: Some(c), ..
            } => write!(f, "string[{}]", c),
            TypeDescriptor::String { capacity: None, .. } => write!(f, "string[var]"),
            TypeDescriptor::Enum { base, members } => {
                write!(f, "enum<{}>({} members)", base, members.len())
            }
            TypeDescriptor::Compound { size, members } => {
                write!(f, "compound[{}]({} members)", size, members.len())
            }
            TypeDescriptor::Array { base, dims } => write!(f, "array<{}>{:?}", base, dims),
        }
    }
}

fn value_fits_int(value: i64, size: usize, signed: bool) -> bool {
    match (size, signed) {
        (1, true) => i8::try_from(value).is_ok(),
        (2, true) => i16::try_from(value).is_ok(),
        (4, true) => i32::try_from(value).is_ok(),
        (8, true) => true,
        (1, false) => u8::try_from(value).is_ok(),
        (2, false) => u16::try_from(value).is_ok(),
        (4, false) => u32::try_from(value).is_ok(),
        (8, false) => value >= 0,
        _ => false,
    }
}

/// Builder for compound descriptors.
///
/// Members are inserted at explicit byte offsets; byte ranges must not
/// overlap and names must be unique. Chains through `Result`:
///
/// ```
/// use strata::datatype::TypeDescriptor;
///
/// # fn main() -> strata::Result<()> {
/// let ty = TypeDescriptor::compound(12)
///     .insert("id", 0, TypeDescriptor::of::<i32>())?
///     .insert("score", 4, TypeDescriptor::of::<f64>())?
///     .build()?;
/// assert_eq!(ty.byte_size(), Some(12));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CompoundBuilder {
    size: usize,
    members: Vec<CompoundMember>,
}

impl CompoundBuilder {
    /// Inserts a member at the given byte offset.
    ///
    /// # Errors
    ///
    /// * [`StoreError::EmptyName`] — empty member name.
    /// * [`StoreError::NameNotUnique`] — name already inserted.
    /// * [`StoreError::UnsupportedType`] — variable-length member type.
    /// * [`StoreError::InsufficientStorage`] — member extends past the
    ///   compound's total size.
    /// * [`StoreError::OverlappingMember`] — byte range collides with a
    ///   previously inserted member.
    pub fn insert(mut self, name: &str, offset: usize, ty: TypeDescriptor) -> Result<Self> {
        if name.is_empty() {
            return Err(StoreError::EmptyName("compound member"));
        }
        if self.members.iter().any(|m| m.name == name) {
            return Err(StoreError::NameNotUnique(name.to_string()));
        }
        let member_size = ty
            .byte_size()
            .ok_or_else(|| StoreError::unsupported("variable-length member in compound"))?;
        let end = offset + member_size;
        if end > self.size {
            return Err(StoreError::InsufficientStorage {
                needed: end,
                capacity: self.size,
            });
        }
        for existing in &self.members {
            let existing_size = existing.ty.byte_size().unwrap_or(0);
            let existing_end = existing.offset + existing_size;
            if offset < existing_end && existing.offset < end {
                return Err(StoreError::OverlappingMember {
                    name: name.to_string(),
                    offset,
                    end,
                    other: existing.name.clone(),
                });
            }
        }
        self.members.push(CompoundMember {
            name: name.to_string(),
            offset,
            ty,
        });
        Ok(self)
    }

    /// Finishes the compound.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedType`] for a compound with no members.
    pub fn build(self) -> Result<TypeDescriptor> {
        if self.members.is_empty() {
            return Err(StoreError::unsupported("compound with no members"));
        }
        Ok(TypeDescriptor::Compound {
            size: self.size,
            members: self.members,
        })
    }
}

/// Host primitive types with a store-native descriptor.
///
/// Only fixed-width numerics and `bool` implement this; the trait bound is
/// what keeps reference-containing host types out of the algebra.
pub trait HostScalar: Copy {
    /// The store descriptor for this host type.
    fn type_descriptor() -> TypeDescriptor;
}

macro_rules! impl_host_int {
    ($($t:ty => ($size:expr, $signed:expr)),* $(,)?) => {
        $(impl HostScalar for $t {
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::Integer { size: $size, signed: $signed }
            }
        })*
    };
}

impl_host_int!(
    i8 => (1, true),
    i16 => (2, true),
    i32 => (4, true),
    i64 => (8, true),
    u8 => (1, false),
    u16 => (2, false),
    u32 => (4, false),
    u64 => (8, false),
);

impl HostScalar for f32 {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Float { size: 4 }
    }
}

impl HostScalar for f64 {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Float { size: 8 }
    }
}

impl HostScalar for bool {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::boolean()
    }
}
