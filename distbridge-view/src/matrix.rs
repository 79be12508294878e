//! Native column-major matrices and vectors.
//!
//! An [`ElMatrix`] addresses `height x width` elements at `ptr`, column `j`
//! starting `j * ldim` elements after column 0. It either owns its storage
//! or aliases memory kept alive by its [`Owner`]. A locked matrix refuses
//! writes.
//!
//! Vectors are matrices whose [`Shape`] pins one extent to one; the same
//! code serves all three entity kinds.

use std::fmt;
use std::marker::PhantomData;

use distbridge_traits::Scalar;

use crate::bridge::EntityKind;
use crate::owner::{Owner, Storage};
use crate::{Result, ViewError};

// ============================================================================
// Shape markers
// ============================================================================

/// Compile-time entity kind of a native matrix.
pub trait Shape: Copy + Default + fmt::Debug + 'static {
    const ENTITY: EntityKind;

    /// Whether a `height x width` matrix is a valid value of this shape.
    fn admits(height: usize, width: usize) -> bool;
}

/// A shape with exactly one non-degenerate axis.
pub trait VectorShape: Shape {
    /// `(height, width)` of a vector of `length` entries.
    fn dims(length: usize) -> (usize, usize);

    fn length(height: usize, width: usize) -> usize;

    /// Element distance between consecutive entries.
    fn step(ldim: usize) -> usize;
}

/// Any `height x width`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct General;

/// `n x 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Column;

/// `1 x n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Row;

impl Shape for General {
    const ENTITY: EntityKind = EntityKind::Matrix;

    fn admits(_height: usize, _width: usize) -> bool {
        true
    }
}

impl Shape for Column {
    const ENTITY: EntityKind = EntityKind::ColumnVector;

    fn admits(_height: usize, width: usize) -> bool {
        width == 1
    }
}

impl Shape for Row {
    const ENTITY: EntityKind = EntityKind::RowVector;

    fn admits(height: usize, _width: usize) -> bool {
        height == 1
    }
}

impl VectorShape for Column {
    fn dims(length: usize) -> (usize, usize) {
        (length, 1)
    }

    fn length(height: usize, _width: usize) -> usize {
        height
    }

    fn step(_ldim: usize) -> usize {
        1
    }
}

impl VectorShape for Row {
    fn dims(length: usize) -> (usize, usize) {
        (1, length)
    }

    fn length(_height: usize, width: usize) -> usize {
        width
    }

    fn step(ldim: usize) -> usize {
        ldim
    }
}

// ============================================================================
// MatrixSize
// ============================================================================

/// Global extents `m x n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MatrixSize {
    pub m: usize,
    pub n: usize,
}

impl MatrixSize {
    pub const fn new(m: usize, n: usize) -> Self {
        Self { m, n }
    }

    /// Number of elements.
    #[inline]
    pub const fn count(self) -> usize {
        self.m * self.n
    }
}

impl fmt::Display for MatrixSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.m, self.n)
    }
}

// ============================================================================
// ElMatrix
// ============================================================================

/// Column-major matrix over a raw buffer with a leading dimension.
pub struct ElMatrix<T: Scalar, S: Shape = General> {
    ptr: *mut T,
    height: usize,
    width: usize,
    ldim: usize,
    locked: bool,
    owner: Owner,
    _shape: PhantomData<S>,
}

pub type ElColumnVector<T> = ElMatrix<T, Column>;
pub type ElRowVector<T> = ElMatrix<T, Row>;

impl<T: Scalar, S: Shape> fmt::Debug for ElMatrix<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElMatrix")
            .field("entity", &S::ENTITY)
            .field("kind", &T::KIND)
            .field("height", &self.height)
            .field("width", &self.width)
            .field("ldim", &self.ldim)
            .field("locked", &self.locked)
            .finish()
    }
}

impl<T: Scalar, S: Shape> ElMatrix<T, S> {
    fn check_shape(height: usize, width: usize) -> Result<()> {
        if S::admits(height, width) {
            Ok(())
        } else {
            Err(ViewError::NotAVector {
                entity: S::ENTITY,
                height,
                width,
            })
        }
    }

    /// Owned matrix from column-major elements.
    pub fn from_col_major(height: usize, width: usize, data: Vec<T>) -> Result<Self> {
        Self::check_shape(height, width)?;
        if data.len() != height * width {
            return Err(ViewError::DataLength {
                len: data.len(),
                shape: vec![height, width],
            });
        }
        let storage = Storage::from_vec(data);
        Ok(Self {
            ptr: storage.as_mut_ptr(),
            height,
            width,
            ldim: height.max(1),
            locked: false,
            owner: Owner::new(storage),
            _shape: PhantomData,
        })
    }

    /// Owned zero-filled matrix.
    pub fn zeros(height: usize, width: usize) -> Result<Self> {
        Self::from_col_major(height, width, vec![T::zero(); height * width])
    }

    /// Alias memory owned by `owner`.
    ///
    /// # Safety
    /// For every `i < height`, `j < width`, `ptr + i + j * ldim` must be a
    /// valid, aligned element for as long as `owner` is alive.
    pub unsafe fn attach(
        height: usize,
        width: usize,
        ptr: *mut T,
        ldim: usize,
        owner: Owner,
    ) -> Result<Self> {
        Self::attach_impl(height, width, ptr, ldim, owner, false)
    }

    /// Like [`attach`](Self::attach) but the result refuses writes.
    ///
    /// # Safety
    /// Same contract as [`attach`](Self::attach), for reads only.
    pub unsafe fn locked_attach(
        height: usize,
        width: usize,
        ptr: *const T,
        ldim: usize,
        owner: Owner,
    ) -> Result<Self> {
        Self::attach_impl(height, width, ptr.cast_mut(), ldim, owner, true)
    }

    unsafe fn attach_impl(
        height: usize,
        width: usize,
        ptr: *mut T,
        ldim: usize,
        owner: Owner,
        locked: bool,
    ) -> Result<Self> {
        Self::check_shape(height, width)?;
        if ldim < height.max(1) {
            let itemsize = T::KIND.byte_size();
            return Err(ViewError::IncompatibleLayout {
                entity: S::ENTITY,
                reason: crate::LayoutMismatch::Order {
                    shape: vec![height, width],
                    strides: vec![itemsize as isize, (ldim * itemsize) as isize],
                    itemsize,
                },
            });
        }
        Ok(Self {
            ptr,
            height,
            width,
            ldim,
            locked,
            owner,
            _shape: PhantomData,
        })
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn ldim(&self) -> usize {
        self.ldim
    }

    #[inline]
    pub fn size(&self) -> MatrixSize {
        MatrixSize::new(self.height, self.width)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    #[inline]
    pub fn locked(&self) -> bool {
        self.locked
    }

    #[inline]
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Writable pointer to the first element.
    pub fn buffer(&self) -> Result<*mut T> {
        if self.locked {
            return Err(ViewError::Locked);
        }
        Ok(self.ptr)
    }

    #[inline]
    pub fn locked_buffer(&self) -> *const T {
        self.ptr
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.height && j < self.width,
            "index ({}, {}) out of bounds for {}x{}",
            i,
            j,
            self.height,
            self.width
        );
        i + j * self.ldim
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        let off = self.offset(i, j);
        // SAFETY: in bounds by `offset`, memory kept alive by `owner`.
        unsafe { self.ptr.add(off).read() }
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) -> Result<()> {
        if self.locked {
            return Err(ViewError::Locked);
        }
        let off = self.offset(i, j);
        unsafe { self.ptr.add(off).write(value) };
        Ok(())
    }

    /// A second handle on the same memory with the same lock state.
    pub fn view(&self) -> Self {
        Self {
            ptr: self.ptr,
            height: self.height,
            width: self.width,
            ldim: self.ldim,
            locked: self.locked,
            owner: self.owner.clone(),
            _shape: PhantomData,
        }
    }

    /// A second handle on the same memory that refuses writes.
    pub fn locked_view(&self) -> Self {
        let mut view = self.view();
        view.locked = true;
        view
    }

    /// Owned, unlocked copy of the elements.
    pub fn deep_copy(&self) -> Self {
        let storage = Storage::from_vec(self.to_vec());
        Self {
            ptr: storage.as_mut_ptr(),
            height: self.height,
            width: self.width,
            ldim: self.height.max(1),
            locked: false,
            owner: Owner::new(storage),
            _shape: PhantomData,
        }
    }

    /// Elements in column-major order.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.height * self.width);
        for j in 0..self.width {
            for i in 0..self.height {
                out.push(self.get(i, j));
            }
        }
        out
    }

    /// Reinterpret as another shape, sharing memory.
    pub fn into_shape<S2: Shape>(self) -> Result<ElMatrix<T, S2>> {
        ElMatrix::<T, S2>::check_shape(self.height, self.width)?;
        Ok(ElMatrix {
            ptr: self.ptr,
            height: self.height,
            width: self.width,
            ldim: self.ldim,
            locked: self.locked,
            owner: self.owner,
            _shape: PhantomData,
        })
    }

    /// General-matrix view of the same memory.
    pub fn as_general(&self) -> ElMatrix<T, General> {
        ElMatrix {
            ptr: self.ptr,
            height: self.height,
            width: self.width,
            ldim: self.ldim,
            locked: self.locked,
            owner: self.owner.clone(),
            _shape: PhantomData,
        }
    }
}

impl<T: Scalar> ElMatrix<T, General> {
    /// Owned zero-filled `height x width` matrix.
    pub fn new(height: usize, width: usize) -> Self {
        let storage = Storage::from_vec(vec![T::zero(); height.max(1) * width]);
        Self {
            ptr: storage.as_mut_ptr(),
            height,
            width,
            ldim: height.max(1),
            locked: false,
            owner: Owner::new(storage),
            _shape: PhantomData,
        }
    }

    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(height * width);
        for j in 0..width {
            for i in 0..height {
                data.push(f(i, j));
            }
        }
        let storage = Storage::from_vec(data);
        Self {
            ptr: storage.as_mut_ptr(),
            height,
            width,
            ldim: height.max(1),
            locked: false,
            owner: Owner::new(storage),
            _shape: PhantomData,
        }
    }
}

impl<T: Scalar, S: VectorShape> ElMatrix<T, S> {
    /// Owned zero-filled vector.
    pub fn with_length(length: usize) -> Self {
        Self::from_vec(vec![T::zero(); length])
    }

    pub fn from_vec(data: Vec<T>) -> Self {
        let (height, width) = S::dims(data.len());
        let storage = Storage::from_vec(data);
        Self {
            ptr: storage.as_mut_ptr(),
            height,
            width,
            ldim: height.max(1),
            locked: false,
            owner: Owner::new(storage),
            _shape: PhantomData,
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        S::length(self.height, self.width)
    }

    pub fn get_at(&self, k: usize) -> T {
        let (i, j) = Self::coords(k);
        self.get(i, j)
    }

    pub fn set_at(&mut self, k: usize, value: T) -> Result<()> {
        let (i, j) = Self::coords(k);
        self.set(i, j, value)
    }

    /// Element distance between consecutive entries.
    #[inline]
    pub fn step(&self) -> usize {
        S::step(self.ldim)
    }

    fn coords(k: usize) -> (usize, usize) {
        match S::ENTITY {
            EntityKind::RowVector => (0, k),
            _ => (k, 0),
        }
    }
}
