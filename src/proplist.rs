//! Property lists: creation-time configuration bags.
//!
//! A [`PropertyList`] belongs to one list class and only accepts the
//! properties that class understands. It is consumed logically at the moment
//! an object is created — the created object snapshots the settings — and
//! remains independently usable afterwards.

use crate::datatype::CharacterSet;
use crate::error::{Result, StoreError};

/// Class of a property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyListClass {
    /// File creation properties.
    FileCreate,

    /// File access properties.
    FileAccess,

    /// Dataset creation properties (chunking, compression).
    DatasetCreate,

    /// Attribute creation properties (character encoding).
    AttributeCreate,
}

/// A mutable bag of creation/access options for one list class.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyList {
    class: PropertyListClass,
    chunk_dims: Option<Vec<u64>>,
    compression_level: Option<u32>,
    char_encoding: Option<CharacterSet>,
}

impl PropertyList {
    /// Creates an empty property list of the given class.
    pub fn create(class: PropertyListClass) -> Self {
        Self {
            class,
            chunk_dims: None,
            compression_level: None,
            char_encoding: None,
        }
    }

    /// Returns this list's class.
    pub fn class(&self) -> PropertyListClass {
        self.class
    }

    /// Sets chunk dimensions, enabling chunked storage.
    ///
    /// # Errors
    ///
    /// * [`StoreError::WrongPropertyClass`] — not a dataset-creation list.
    /// * [`StoreError::UnsupportedType`] — empty dims or a zero dimension.
    pub fn set_chunk_dimensions(&mut self, dims: &[u64]) -> Result<()> {
        self.require_class(PropertyListClass::DatasetCreate)?;
        if dims.is_empty() || dims.contains(&0) {
            return Err(StoreError::unsupported(
                "chunk dimensions must be nonempty and nonzero",
            ));
        }
        self.chunk_dims = Some(dims.to_vec());
        Ok(())
    }

    /// Enables compression at the given level (0–9).
    ///
    /// The level is recorded and validated; byte transformation is the
    /// storage engine's concern.
    ///
    /// # Errors
    ///
    /// * [`StoreError::WrongPropertyClass`] — not a dataset-creation list.
    /// * [`StoreError::UnsupportedType`] — level above 9.
    pub fn enable_compression(&mut self, level: u32) -> Result<()> {
        self.require_class(PropertyListClass::DatasetCreate)?;
        if level > 9 {
            return Err(StoreError::unsupported(format!(
                "compression level {} (max 9)",
                level
            )));
        }
        self.compression_level = Some(level);
        Ok(())
    }

    /// Sets the character encoding for attribute names/values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongPropertyClass`] on a non-attribute-creation
    /// list.
    pub fn set_character_encoding(&mut self, charset: CharacterSet) -> Result<()> {
        self.require_class(PropertyListClass::AttributeCreate)?;
        self.char_encoding = Some(charset);
        Ok(())
    }

    /// Recorded chunk dimensions, if any.
    pub fn chunk_dimensions(&self) -> Option<&[u64]> {
        self.chunk_dims.as_deref()
    }

    /// Recorded compression level, if any.
    pub fn compression_level(&self) -> Option<u32> {
        self.compression_level
    }

    /// Recorded character encoding, if any.
    pub fn character_encoding(&self) -> Option<CharacterSet> {
        self.char_encoding
    }

    /// Structural equality, used for verifying get-after-create round trips.
    pub fn is_equal_to(&self, other: &PropertyList) -> bool {
        self == other
    }

    fn require_class(&self, expected: PropertyListClass) -> Result<()> {
        if self.class != expected {
            return Err(StoreError::WrongPropertyClass {
                found: self.class,
                expected,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_create_properties() {
        let mut plist = PropertyList::create(PropertyListClass::DatasetCreate);
        plist.set_chunk_dimensions(&[10, 10]).unwrap();
        plist.enable_compression(6).unwrap();
        assert_eq!(plist.chunk_dimensions(), Some(&[10u64, 10][..]));
        assert_eq!(plist.compression_level(), Some(6));
    }

    #[test]
    fn test_wrong_class_rejected() {
        let mut plist = PropertyList::create(PropertyListClass::FileCreate);
        let err = plist.set_chunk_dimensions(&[4]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::WrongPropertyClass {
                found: PropertyListClass::FileCreate,
                expected: PropertyListClass::DatasetCreate,
            }
        ));
    }

    #[test]
    fn test_invalid_settings() {
        let mut plist = PropertyList::create(PropertyListClass::DatasetCreate);
        assert!(plist.set_chunk_dimensions(&[]).is_err());
        assert!(plist.set_chunk_dimensions(&[4, 0]).is_err());
        assert!(plist.enable_compression(10).is_err());
    }

    #[test]
    fn test_structural_equality() {
        let mut a = PropertyList::create(PropertyListClass::DatasetCreate);
        let mut b = PropertyList::create(PropertyListClass::DatasetCreate);
        assert!(a.is_equal_to(&b));
        a.set_chunk_dimensions(&[8]).unwrap();
        assert!(!a.is_equal_to(&b));
        b.set_chunk_dimensions(&[8]).unwrap();
        assert!(a.is_equal_to(&b));
    }

    #[test]
    fn test_attribute_encoding() {
        let mut plist = PropertyList::create(PropertyListClass::AttributeCreate);
        plist
            .set_character_encoding(crate::datatype::CharacterSet::Utf8)
            .unwrap();
        assert_eq!(
            plist.character_encoding(),
            Some(crate::datatype::CharacterSet::Utf8)
        );
    }
}
