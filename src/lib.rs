//! # Strata
//!
//! A typed, self-describing hierarchical container store written in Rust.
//!
//! ## Features
//!
//! - **Hierarchical namespace**: Files hold groups, groups hold groups,
//!   datasets, and committed named types
//! - **Self-describing data**: Every dataset and attribute carries its own
//!   type descriptor and space descriptor
//! - **Closed type algebra**: Fixed-width integers and floats, fixed and
//!   variable-length strings, enums, compounds, and fixed-size arrays
//! - **Checked typed I/O**: Class and size validation before any byte moves
//! - **Strict handle discipline**: Every open object is a registered handle;
//!   leaks are observable and double-closes are errors
//!
//! ## Architecture
//!
//! The crate is built on several layers:
//!
//! 1. **Handle registry**: Tracks every open handle with its kind
//! 2. **Type descriptors**: The declared shape of stored elements
//! 3. **Space descriptors**: Dimensionality, extents, and selections
//! 4. **Codec**: Byte-level translation between host values and storage
//! 5. **Store engine**: The namespace, object arena, and object wrappers
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```
//! use strata::{AttributeHost, Location, SpaceDescriptor, Store, TypeDescriptor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new();
//!
//! // Create a backing store and a group inside it.
//! let file = store.create_file("experiment", true)?;
//! let run = file.create_group("run-1")?;
//!
//! // Attach a scalar attribute and read it back through the typed path.
//! let attr = run.create_attribute(
//!     "version",
//!     &TypeDescriptor::of::<i32>(),
//!     &SpaceDescriptor::scalar(),
//! )?;
//! attr.write_i32(3)?;
//! assert_eq!(attr.read_i32()?, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ### Datasets and Partial I/O
//!
//! ```
//! use strata::{Location, SpaceDescriptor, Store, TypeDescriptor, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new();
//! let file = store.create_file("grids", true)?;
//!
//! let ds = file.create_data_set(
//!     "temperature",
//!     &TypeDescriptor::of::<f64>(),
//!     &SpaceDescriptor::simple_fixed(&[2, 2]),
//! )?;
//! ds.write(&Value::Array(vec![
//!     Value::F64(1.0),
//!     Value::F64(2.0),
//!     Value::F64(3.0),
//!     Value::F64(4.0),
//! ]))?;
//!
//! // Read the second row only.
//! let row = ds.read_slab(&[1, 0], &[1, 2])?;
//! assert_eq!(row, Value::Array(vec![Value::F64(3.0), Value::F64(4.0)]));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub(crate) mod codec;
pub mod dataset;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod handle;
pub mod proplist;
pub mod store;
pub mod value;

// Re-export main types for convenience
pub use attribute::Attribute;
pub use dataset::DataSet;
pub use dataspace::{Dimension, Extent, Hyperslab, SpaceDescriptor};
pub use datatype::{
    CharacterSet, CompoundBuilder, CompoundMember, EnumMember, HostScalar, StringPadding,
    TypeDescriptor,
};
pub use error::{Result, StoreError};
pub use handle::{Handle, HandleKind, HandleRegistry};
pub use proplist::{PropertyList, PropertyListClass};
pub use store::{AttributeHost, ChildKind, File, Group, Location, ObjectHandle, Store};
pub use value::{TypeClass, Value};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
