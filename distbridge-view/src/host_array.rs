//! Host-side strided arrays.
//!
//! [`HostArray`] models an array object of a dynamically typed host: it
//! either owns its elements or aliases memory kept alive by a base object,
//! it has byte strides, and it has a writeable flag that is enforced on
//! every write. A flag that was cleared because the memory is read-only can
//! never be turned back on.

use std::fmt;

use distbridge_traits::{Scalar, ScalarKind};

use crate::buffer::BufferInfo;
use crate::owner::{Owner, Storage};
use crate::{Result, ViewError};

/// Memory order used when building an owned array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Row-major (last index varies fastest).
    C,
    /// Column-major (first index varies fastest).
    F,
}

// ============================================================================
// Layout helpers
// ============================================================================

/// Validate that all accessed element offsets stay within `[0, len)`.
fn validate_bounds(len: usize, dims: &[usize], strides: &[isize]) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(ViewError::StrideLengthMismatch);
    }
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let mut min_offset = 0isize;
    let mut max_offset = 0isize;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(ViewError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(ViewError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(ViewError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset as usize >= len {
        return Err(ViewError::OffsetOverflow);
    }
    Ok(())
}

/// Element strides for a contiguous array.
///
/// Zero-length axes count as length one so that strides stay positive and
/// a column-major matrix keeps a leading dimension of at least one.
pub fn contiguous_strides(dims: &[usize], order: Order) -> Vec<isize> {
    let rank = dims.len();
    let mut strides = vec![1isize; rank];
    match order {
        Order::F => {
            for i in 1..rank {
                strides[i] = strides[i - 1] * dims[i - 1].max(1) as isize;
            }
        }
        Order::C => {
            for i in (0..rank.saturating_sub(1)).rev() {
                strides[i] = strides[i + 1] * dims[i + 1].max(1) as isize;
            }
        }
    }
    strides
}

/// Visit every multi-index of `dims`, first axis fastest for `Order::F`.
pub(crate) fn for_each_index(dims: &[usize], order: Order, mut f: impl FnMut(&[usize])) {
    if dims.iter().any(|&d| d == 0) {
        return;
    }
    let rank = dims.len();
    let mut idx = vec![0usize; rank];
    loop {
        f(&idx);
        let mut step = 0;
        loop {
            if step == rank {
                return;
            }
            let axis = match order {
                Order::F => step,
                Order::C => rank - 1 - step,
            };
            idx[axis] += 1;
            if idx[axis] < dims[axis] {
                break;
            }
            idx[axis] = 0;
            step += 1;
        }
    }
}

// ============================================================================
// HostArray
// ============================================================================

/// Strided n-dimensional host array.
pub struct HostArray<T: Scalar> {
    ptr: *mut T,
    shape: Vec<usize>,
    strides: Vec<isize>,
    writeable: bool,
    writeable_allowed: bool,
    owns_data: bool,
    base: Owner,
    anchor: Option<Owner>,
}

impl<T: Scalar> fmt::Debug for HostArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostArray")
            .field("kind", &T::KIND)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("writeable", &self.writeable)
            .field("owns_data", &self.owns_data)
            .finish()
    }
}

impl<T: Scalar> HostArray<T> {
    /// Create an owned contiguous array from elements listed in `order`.
    pub fn from_vec(shape: &[usize], data: Vec<T>, order: Order) -> Result<Self> {
        let len: usize = shape.iter().product();
        if data.len() != len {
            return Err(ViewError::DataLength {
                len: data.len(),
                shape: shape.to_vec(),
            });
        }
        Self::from_parts(data, shape, &contiguous_strides(shape, order))
    }

    /// Create an owned array with arbitrary element strides over `data`.
    pub fn from_parts(data: Vec<T>, shape: &[usize], strides: &[isize]) -> Result<Self> {
        validate_bounds(data.len(), shape, strides)?;
        let itemsize = T::KIND.byte_size() as isize;
        let storage = Storage::from_vec(data);
        Ok(Self {
            ptr: storage.as_mut_ptr(),
            shape: shape.to_vec(),
            strides: strides.iter().map(|&s| s * itemsize).collect(),
            writeable: true,
            writeable_allowed: true,
            owns_data: true,
            base: Owner::new(storage),
            anchor: None,
        })
    }

    pub fn zeros(shape: &[usize], order: Order) -> Self {
        let len: usize = shape.iter().product();
        let storage = Storage::from_vec(vec![T::zero(); len]);
        let itemsize = T::KIND.byte_size() as isize;
        Self {
            ptr: storage.as_mut_ptr(),
            shape: shape.to_vec(),
            strides: contiguous_strides(shape, order)
                .into_iter()
                .map(|s| s * itemsize)
                .collect(),
            writeable: true,
            writeable_allowed: true,
            owns_data: true,
            base: Owner::new(storage),
            anchor: None,
        }
    }

    /// Create an owned array filled by `f(index)`.
    pub fn from_fn(shape: &[usize], order: Order, mut f: impl FnMut(&[usize]) -> T) -> Self {
        let array = Self::zeros(shape, order);
        let ptr = array.ptr;
        let strides = array.strides.clone();
        for_each_index(shape, order, |idx| {
            let off = byte_offset(&strides, idx);
            // SAFETY: `idx` is in bounds of the freshly allocated storage.
            unsafe { ptr.cast::<u8>().offset(off).cast::<T>().write(f(idx)) };
        });
        array
    }

    /// Wrap memory owned by `base`.
    ///
    /// # Safety
    /// `ptr` with `shape` and byte `strides` must address valid, aligned
    /// elements for as long as `base` is alive.
    pub unsafe fn from_raw(
        ptr: *mut T,
        shape: Vec<usize>,
        strides: Vec<isize>,
        readonly: bool,
        base: Owner,
        anchor: Option<Owner>,
    ) -> Self {
        Self {
            ptr,
            shape,
            strides,
            writeable: !readonly,
            writeable_allowed: !readonly,
            owns_data: false,
            base,
            anchor,
        }
    }

    #[inline]
    pub fn kind(&self) -> ScalarKind {
        T::KIND
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte strides.
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn itemsize(&self) -> usize {
        T::KIND.byte_size()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    #[inline]
    pub fn is_writeable(&self) -> bool {
        self.writeable
    }

    #[inline]
    pub fn owns_data(&self) -> bool {
        self.owns_data
    }

    /// The object keeping this array's memory alive.
    #[inline]
    pub fn base(&self) -> &Owner {
        &self.base
    }

    /// Extra object this array keeps alive, if it was exported from one.
    #[inline]
    pub fn anchor(&self) -> Option<&Owner> {
        self.anchor.as_ref()
    }

    /// Change the writeable flag.
    ///
    /// Clearing always succeeds. Setting fails with [`ViewError::ReadOnly`]
    /// when the memory itself is read-only.
    pub fn set_writeable(&mut self, writeable: bool) -> Result<()> {
        if writeable && !self.writeable_allowed {
            return Err(ViewError::ReadOnly);
        }
        self.writeable = writeable;
        Ok(())
    }

    pub fn is_f_contiguous(&self) -> bool {
        self.is_contiguous(Order::F)
    }

    pub fn is_c_contiguous(&self) -> bool {
        self.is_contiguous(Order::C)
    }

    fn is_contiguous(&self, order: Order) -> bool {
        let itemsize = self.itemsize() as isize;
        contiguous_strides(&self.shape, order)
            .into_iter()
            .zip(self.shape.iter().zip(self.strides.iter()))
            .all(|(expected, (&dim, &stride))| dim <= 1 || expected * itemsize == stride)
    }

    fn element_ptr(&self, indices: &[usize]) -> *mut T {
        assert_eq!(indices.len(), self.shape.len(), "wrong number of indices");
        for (&index, &dim) in indices.iter().zip(self.shape.iter()) {
            assert!(index < dim, "index {} out of bounds for dim {}", index, dim);
        }
        let off = byte_offset(&self.strides, indices);
        // SAFETY: in-bounds indices stay inside the memory kept alive by `base`.
        unsafe { self.ptr.cast::<u8>().offset(off).cast::<T>() }
    }

    /// Get an element by multi-dimensional index.
    pub fn get(&self, indices: &[usize]) -> T {
        unsafe { self.element_ptr(indices).read() }
    }

    /// Set an element; fails if the array is not writeable.
    pub fn set(&mut self, indices: &[usize], value: T) -> Result<()> {
        if !self.writeable {
            return Err(ViewError::ReadOnly);
        }
        unsafe { self.element_ptr(indices).write(value) };
        Ok(())
    }

    /// Copy the elements out, listed in `order`.
    pub fn to_vec(&self, order: Order) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        for_each_index(&self.shape, order, |idx| out.push(self.get(idx)));
        out
    }

    /// A second array aliasing the same memory.
    pub fn view(&self) -> Self {
        Self {
            ptr: self.ptr,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            writeable: self.writeable,
            writeable_allowed: self.writeable_allowed,
            owns_data: false,
            base: self.base.clone(),
            anchor: self.anchor.clone(),
        }
    }

    /// Describe this array for a consumer that only reads.
    pub fn buffer_info(&self) -> BufferInfo {
        BufferInfo::of(
            self.ptr,
            self.shape.clone(),
            self.strides.clone(),
            !self.writeable,
        )
    }

    /// Describe this array for a consumer, refusing writable requests on a
    /// read-only array.
    pub fn request(&self, writable: bool) -> Result<BufferInfo> {
        if writable && !self.writeable {
            return Err(ViewError::ReadOnly);
        }
        Ok(self.buffer_info())
    }
}

#[inline]
fn byte_offset(strides: &[isize], indices: &[usize]) -> isize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&i, &s)| i as isize * s)
        .sum()
}
