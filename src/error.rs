//! Error types for container operations.
//!
//! Every failure surfaced by this crate is one of the kinds below. Validation
//! errors (name well-formedness, handle kinds, type/shape checks) are raised
//! before the engine is touched; engine failures are mapped to a kind at the
//! call site and never escape as raw status values.

use thiserror::Error;

use crate::handle::{Handle, HandleKind};
use crate::value::TypeClass;

/// Result type alias for container operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur when operating on a container.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error from the buffer layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Handle is not tracked by the registry (never registered, or its
    /// target object has been deleted out from under it).
    #[error("Invalid handle: {0}")]
    InvalidHandle(Handle),

    /// Handle is live but has the wrong kind for the attempted operation.
    #[error("Wrong handle kind: {found:?} (expected one of {allowed:?})")]
    WrongHandleKind {
        /// Kind recorded for the handle.
        found: HandleKind,
        /// Kinds the operation accepts.
        allowed: Vec<HandleKind>,
    },

    /// Handle was registered twice without an intervening release.
    #[error("Duplicate handle: {0} is already registered")]
    DuplicateHandle(Handle),

    /// Handle (or wrapper) was closed twice.
    #[error("Already closed: {0}")]
    AlreadyClosed(Handle),

    /// Backing store already exists and overwriting was not requested.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Named object not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Name is empty.
    #[error("Empty name for {0}")]
    EmptyName(&'static str),

    /// Name is malformed for this operation (e.g. contains a path separator
    /// where a simple name is required).
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// A child with this name already exists under the parent.
    #[error("Duplicate child: {0}")]
    DuplicateChild(String),

    /// Compound member byte ranges overlap.
    #[error("Overlapping member {name:?}: [{offset}, {end}) collides with {other:?}")]
    OverlappingMember {
        /// Member being inserted.
        name: String,
        /// Start of its byte range.
        offset: usize,
        /// End of its byte range (exclusive).
        end: usize,
        /// Previously inserted member it collides with.
        other: String,
    },

    /// Member name already used in this compound or enum.
    #[error("Member name not unique: {0:?}")]
    NameNotUnique(String),

    /// Enum value already mapped to another member.
    #[error("Duplicate enum value {value} for member {name:?}")]
    DuplicateEnumValue {
        /// Member being inserted.
        name: String,
        /// The value that is already taken.
        value: i64,
    },

    /// Host type shape falls outside the supported type algebra.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Element count does not match the declared space.
    #[error("Shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Element count the space declares.
        expected: u64,
        /// Element count the caller supplied or requested.
        actual: u64,
    },

    /// Stored type class differs from the requested host class.
    #[error("Type class mismatch: stored {stored:?}, requested {requested:?}")]
    TypeClassMismatch {
        /// Class of the stored type.
        stored: TypeClass,
        /// Class the host side asked for.
        requested: TypeClass,
    },

    /// Fixed-width byte sizes differ between the stored type and the host type.
    #[error("Storage size mismatch: stored {stored} bytes, host {host} bytes")]
    StorageSizeMismatch {
        /// Byte size of the stored type.
        stored: usize,
        /// Byte size of the host type.
        host: usize,
    },

    /// Value does not fit the fixed storage capacity.
    #[error("Insufficient storage: need {needed} bytes, capacity is {capacity}")]
    InsufficientStorage {
        /// Bytes the value would occupy.
        needed: usize,
        /// Declared fixed capacity.
        capacity: usize,
    },

    /// String bytes are not valid in the declared character set.
    #[error("String encoding error: {0}")]
    StringEncoding(&'static str),

    /// Property was set on a list of the wrong class.
    #[error("Wrong property list class: {found:?} (expected {expected:?})")]
    WrongPropertyClass {
        /// Class of the list the property was set on.
        found: crate::proplist::PropertyListClass,
        /// Class the property requires.
        expected: crate::proplist::PropertyListClass,
    },

    /// Write attempted through a read-only file handle.
    #[error("Store {0:?} is open read-only")]
    ReadOnly(String),

    /// Extend attempted on a dataset without chunked layout.
    #[error("Dataset {0:?} is not chunked and cannot be extended")]
    NotExtendable(String),
}

impl StoreError {
    /// Creates a not-found error with context about what was being looked up.
    ///
    /// # Arguments
    ///
    /// * `item_type` - Type of item (e.g., "group", "attribute")
    /// * `name` - Name of the item that wasn't found
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Creates an invalid-name error.
    pub fn invalid_name(name: &str, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason,
        }
    }

    /// Creates an unsupported-type error.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::UnsupportedType(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StoreError::not_found("group", "grp");
        assert_eq!(err.to_string(), "Not found: group 'grp'");
    }

    #[test]
    fn test_invalid_name_message() {
        let err = StoreError::invalid_name("a/b", "path separator in simple name");
        assert!(err.to_string().contains("a/b"));
        assert!(err.to_string().contains("path separator"));
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = StoreError::ShapeMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected 4 elements, got 3"
        );
    }
}
