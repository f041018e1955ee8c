//! Datasets: N-dimensional typed arrays with whole and partial I/O.
//!
//! Dataset elements are always fixed-width; row-major layout with the last
//! dimension contiguous. Partial I/O moves one rectangular block per call,
//! either through explicit offset/count pairs or through the active
//! selection on a [`SpaceDescriptor`].

use tracing::debug;

use crate::codec;
use crate::datatype::TypeDescriptor;
use crate::dataspace::SpaceDescriptor;
use crate::error::{Result, StoreError};
use crate::handle::Handle;
use crate::store::{AttributeHost, ObjectHandle, Store};
use crate::value::Value;

/// An open dataset.
#[derive(Debug)]
pub struct DataSet<'s> {
    store: &'s Store,
    handle: Handle,
    name: String,
    open: bool,
}

impl<'s> DataSet<'s> {
    pub(crate) fn bind(store: &'s Store, handle: Handle, name: String) -> Self {
        Self {
            store,
            handle,
            name,
            open: true,
        }
    }

    /// Simple name of this dataset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared element type.
    pub fn dtype(&self) -> Result<TypeDescriptor> {
        self.store
            .with_dataset(self.handle, |dtype, _, _| Ok(dtype.clone()))
    }

    /// The current space (dimensions reflect any extension).
    pub fn space(&self) -> Result<SpaceDescriptor> {
        self.store
            .with_dataset(self.handle, |_, space, _| Ok(space.clone()))
    }

    /// Chunk dimensions recorded at creation, if the dataset is chunked.
    pub fn chunk_dimensions(&self) -> Result<Option<Vec<u64>>> {
        self.store.dataset_chunk_dims(self.handle)
    }

    /// Compression level recorded at creation, if any.
    pub fn compression_level(&self) -> Result<Option<u32>> {
        self.store.dataset_compression(self.handle)
    }

    /// Writes the whole dataset.
    ///
    /// A one-element space takes a scalar value; larger spaces take a
    /// [`Value::Array`] with one entry per element in row-major order.
    pub fn write(&self, value: &Value) -> Result<()> {
        self.store.with_dataset_mut(self.handle, |state| {
            let bytes = codec::encode(value, state.dtype, state.space)?;
            *state.data = bytes;
            Ok(())
        })
    }

    /// Reads the whole dataset.
    pub fn read(&self) -> Result<Value> {
        self.store
            .with_dataset(self.handle, |dtype, space, data| {
                codec::decode(data, dtype, space)
            })
    }

    /// Writes one rectangular block.
    ///
    /// `offset` and `count` must have the dataset's rank, and the block must
    /// lie inside the current extents. The value carries `count.product()`
    /// elements in row-major order.
    pub fn write_slab(&self, offset: &[u64], count: &[u64], value: &Value) -> Result<()> {
        self.store.with_dataset_mut(self.handle, |state| {
            let dims = state.space.current_dims();
            validate_block(&dims, offset, count)?;
            let elem = elem_size(state.dtype)?;
            let block_space = SpaceDescriptor::simple_fixed(count);
            let block = codec::encode(value, state.dtype, &block_space)?;
            for_each_row(&dims, offset, count, elem, |dst, src, len| {
                state.data[dst..dst + len].copy_from_slice(&block[src..src + len]);
            });
            Ok(())
        })
    }

    /// Reads one rectangular block, returned in row-major order.
    pub fn read_slab(&self, offset: &[u64], count: &[u64]) -> Result<Value> {
        self.store
            .with_dataset(self.handle, |dtype, space, data| {
                let dims = space.current_dims();
                validate_block(&dims, offset, count)?;
                let elem = elem_size(dtype)?;
                let total: u64 = count.iter().product();
                let mut block = vec![0u8; elem * total as usize];
                for_each_row(&dims, offset, count, elem, |dst, src, len| {
                    block[src..src + len].copy_from_slice(&data[dst..dst + len]);
                });
                codec::decode(&block, dtype, &SpaceDescriptor::simple_fixed(count))
            })
    }

    /// Writes through a space: the active selection picks the block, no
    /// selection writes the whole dataset.
    pub fn write_with(&self, space: &SpaceDescriptor, value: &Value) -> Result<()> {
        match space.selection() {
            Some(slab) => self.write_slab(&slab.offset, &slab.count, value),
            None => self.write(value),
        }
    }

    /// Reads through a space, honoring its active selection.
    pub fn read_with(&self, space: &SpaceDescriptor) -> Result<Value> {
        match space.selection() {
            Some(slab) => self.read_slab(&slab.offset, &slab.count),
            None => self.read(),
        }
    }

    /// Grows the dataset to `new_dims`. Only chunked datasets can be
    /// extended; new extents must not shrink any dimension and must stay
    /// within each dimension's upper limit. New cells read back as zero.
    pub fn extend(&self, new_dims: &[u64]) -> Result<()> {
        let name = self.name.clone();
        self.store.with_dataset_mut(self.handle, |state| {
            if state.chunk_dims.is_none() {
                return Err(StoreError::NotExtendable(name.clone()));
            }
            let old_dims = state.space.current_dims();
            if new_dims.len() != old_dims.len() {
                return Err(StoreError::ShapeMismatch {
                    expected: old_dims.len() as u64,
                    actual: new_dims.len() as u64,
                });
            }
            for (i, (&old, &(current, max))) in old_dims
                .iter()
                .zip(state.space.dimensions().iter())
                .enumerate()
            {
                debug_assert_eq!(old, current);
                if new_dims[i] < old {
                    return Err(StoreError::ShapeMismatch {
                        expected: old,
                        actual: new_dims[i],
                    });
                }
                if let crate::dataspace::Extent::Fixed(limit) = max {
                    if new_dims[i] > limit {
                        return Err(StoreError::ShapeMismatch {
                            expected: limit,
                            actual: new_dims[i],
                        });
                    }
                }
            }
            let elem = elem_size(state.dtype)?;
            let total: u64 = new_dims.iter().product();
            let mut grown = vec![0u8; elem * total as usize];
            // Remap existing rows into the new layout; new cells stay zero.
            remap_rows(&old_dims, new_dims, elem, state.data, &mut grown);
            *state.data = grown;
            state.space.set_current_dims(new_dims);
            debug!(?new_dims, "extended dataset");
            Ok(())
        })
    }

    /// Closes this dataset handle.
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
}

impl<'s> ObjectHandle<'s> for DataSet<'s> {
    fn store(&self) -> &'s Store {
        self.store
    }

    fn handle(&self) -> Handle {
        self.handle
    }
}

impl<'s> AttributeHost<'s> for DataSet<'s> {}

impl Drop for DataSet<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.store.close_handle(self.handle);
        }
    }
}

fn elem_size(dtype: &TypeDescriptor) -> Result<usize> {
    dtype
        .byte_size()
        .ok_or_else(|| StoreError::unsupported("variable-length dataset element type"))
}

/// Checks one rectangular block against the current extents.
fn validate_block(dims: &[u64], offset: &[u64], count: &[u64]) -> Result<()> {
    if dims.is_empty() || offset.len() != dims.len() || count.len() != dims.len() {
        return Err(StoreError::ShapeMismatch {
            expected: dims.len() as u64,
            actual: offset.len().max(count.len()) as u64,
        });
    }
    for i in 0..dims.len() {
        let end = offset[i]
            .checked_add(count[i])
            .ok_or(StoreError::ShapeMismatch {
                expected: dims[i],
                actual: u64::MAX,
            })?;
        if end > dims[i] {
            return Err(StoreError::ShapeMismatch {
                expected: dims[i],
                actual: end,
            });
        }
    }
    Ok(())
}

/// Visits each contiguous row of a block, calling `f(dataset_byte_offset,
/// block_byte_offset, row_byte_len)`. The last dimension is contiguous.
fn for_each_row(
    dims: &[u64],
    offset: &[u64],
    count: &[u64],
    elem: usize,
    mut f: impl FnMut(usize, usize, usize),
) {
    let rank = dims.len();
    let row_len = count[rank - 1] as usize * elem;
    if row_len == 0 {
        return;
    }
    // Row-major strides in elements.
    let mut strides = vec![1u64; rank];
    for d in (0..rank - 1).rev() {
        strides[d] = strides[d + 1] * dims[d + 1];
    }
    let mut index = vec![0u64; rank - 1];
    let mut block_pos = 0usize;
    loop {
        let mut linear = offset[rank - 1];
        for d in 0..rank - 1 {
            linear += (offset[d] + index[d]) * strides[d];
        }
        f(linear as usize * elem, block_pos, row_len);
        block_pos += row_len;

        // Odometer over the leading dimensions.
        let mut d = rank - 1;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            index[d] += 1;
            if index[d] < count[d] {
                break;
            }
            index[d] = 0;
        }
    }
}

/// Copies a dataset's rows from an old row-major layout to a larger one,
/// leaving newly exposed cells zeroed.
fn remap_rows(old_dims: &[u64], new_dims: &[u64], elem: usize, old: &[u8], new: &mut [u8]) {
    let rank = old_dims.len();
    let row_len = old_dims[rank - 1] as usize * elem;
    if row_len == 0 || old_dims.contains(&0) {
        return;
    }
    let mut old_strides = vec![1u64; rank];
    let mut new_strides = vec![1u64; rank];
    for d in (0..rank - 1).rev() {
        old_strides[d] = old_strides[d + 1] * old_dims[d + 1];
        new_strides[d] = new_strides[d + 1] * new_dims[d + 1];
    }
    let mut index = vec![0u64; rank - 1];
    loop {
        let mut src = 0u64;
        let mut dst = 0u64;
        for d in 0..rank - 1 {
            src += index[d] * old_strides[d];
            dst += index[d] * new_strides[d];
        }
        let src = src as usize * elem;
        let dst = dst as usize * elem;
        new[dst..dst + row_len].copy_from_slice(&old[src..src + row_len]);

        let mut d = rank - 1;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            index[d] += 1;
            if index[d] < old_dims[d] {
                break;
            }
            index[d] = 0;
        }
    }
}
