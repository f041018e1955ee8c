//! Space descriptors: dimensionality and extents of stored data.
//!
//! A [`SpaceDescriptor`] is either scalar (rank 0, one element) or simple
//! (an N-dimensional array with a current and an upper-limit extent per
//! dimension). Dimensions whose upper limit is [`Extent::Unlimited`] may be
//! grown later by chunked datasets.

use crate::error::{Result, StoreError};

/// Upper-limit extent of one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Extent {
    /// Fixed upper limit.
    Fixed(u64),

    /// No upper limit; the dimension may grow without bound.
    Unlimited,
}

impl Extent {
    /// Returns true if `current` is admissible under this limit.
    fn admits(&self, current: u64) -> bool {
        match *self {
            Extent::Fixed(max) => current <= max,
            Extent::Unlimited => true,
        }
    }
}

/// One dimension: current extent plus upper limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimension {
    /// Current extent.
    pub current: u64,

    /// Upper-limit extent.
    pub max: Extent,
}

/// A rectangular sub-region selection (one contiguous block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    /// Start coordinate per dimension.
    pub offset: Vec<u64>,

    /// Block extent per dimension.
    pub count: Vec<u64>,
}

/// Describes the dimensionality and extents of a dataset or attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceDescriptor {
    dims: Vec<Dimension>,
    scalar: bool,
    selection: Option<Hyperslab>,
}

impl SpaceDescriptor {
    /// Creates a scalar space: rank 0, exactly one element.
    pub fn scalar() -> Self {
        Self {
            dims: Vec::new(),
            scalar: true,
            selection: None,
        }
    }

    /// Creates a simple (N-dimensional) space.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShapeMismatch`] if any current extent exceeds
    /// its fixed upper limit.
    pub fn simple(dims: &[(u64, Extent)]) -> Result<Self> {
        for &(current, max) in dims {
            if !max.admits(current) {
                return Err(StoreError::ShapeMismatch {
                    expected: match max {
                        Extent::Fixed(m) => m,
                        Extent::Unlimited => u64::MAX,
                    },
                    actual: current,
                });
            }
        }
        Ok(Self {
            dims: dims
                .iter()
                .map(|&(current, max)| Dimension { current, max })
                .collect(),
            scalar: false,
            selection: None,
        })
    }

    /// Creates a simple space where every upper limit equals the current extent.
    pub fn simple_fixed(dims: &[u64]) -> Self {
        Self {
            dims: dims
                .iter()
                .map(|&d| Dimension {
                    current: d,
                    max: Extent::Fixed(d),
                })
                .collect(),
            scalar: false,
            selection: None,
        }
    }

    /// Returns true for a scalar space.
    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    /// Number of dimensions (0 for scalar).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of current extents. Scalar = 1.
    pub fn element_count(&self) -> u64 {
        if self.scalar {
            1
        } else {
            self.dims.iter().map(|d| d.current).product()
        }
    }

    /// Ordered `(current, upper limit)` pairs.
    pub fn dimensions(&self) -> Vec<(u64, Extent)> {
        self.dims.iter().map(|d| (d.current, d.max)).collect()
    }

    /// Current extents only.
    pub fn current_dims(&self) -> Vec<u64> {
        self.dims.iter().map(|d| d.current).collect()
    }

    /// Marks a rectangular sub-region as the active selection for a
    /// subsequent partial read or write. Only one contiguous block selection
    /// is supported; a new call replaces the previous selection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShapeMismatch`] if the rank of `offset` or
    /// `count` differs from the space's rank, or if `offset + count` exceeds
    /// the current extent in any dimension.
    pub fn select_hyperslab(&mut self, offset: &[u64], count: &[u64]) -> Result<()> {
        if self.scalar || offset.len() != self.dims.len() || count.len() != self.dims.len() {
            return Err(StoreError::ShapeMismatch {
                expected: self.dims.len() as u64,
                actual: offset.len().max(count.len()) as u64,
            });
        }
        for (i, dim) in self.dims.iter().enumerate() {
            let end = offset[i]
                .checked_add(count[i])
                .ok_or(StoreError::ShapeMismatch {
                    expected: dim.current,
                    actual: u64::MAX,
                })?;
            if end > dim.current {
                return Err(StoreError::ShapeMismatch {
                    expected: dim.current,
                    actual: end,
                });
            }
        }
        self.selection = Some(Hyperslab {
            offset: offset.to_vec(),
            count: count.to_vec(),
        });
        Ok(())
    }

    /// Returns the active selection, if any.
    pub fn selection(&self) -> Option<&Hyperslab> {
        self.selection.as_ref()
    }

    /// Clears the active selection (the whole space is selected again).
    pub fn select_all(&mut self) {
        self.selection = None;
    }

    /// Grows current extents in place. Caller has already validated that the
    /// new extents are admissible; used by dataset extension.
    pub(crate) fn set_current_dims(&mut self, dims: &[u64]) {
        debug_assert_eq!(dims.len(), self.dims.len());
        for (d, &new) in self.dims.iter_mut().zip(dims) {
            d.current = new;
        }
    }
}
