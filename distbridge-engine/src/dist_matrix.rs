//! Distributed matrices and vectors.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use distbridge_traits::{Distribution, DistributionDescriptor, Scalar};
use distbridge_view::{Column, ElMatrix, General, MatrixSize, Row, Shape, VectorShape, ViewError};
use num_traits::Zero;

use crate::grid::Grid;
use crate::layout::{AxisLayout, DistLayout};
use crate::{EngineError, Result};

/// A global matrix distributed over a grid under `D`.
///
/// Each rank stores the entries `D` assigns to it in a local column-major
/// matrix. The grid is kept alive for as long as the matrix exists.
pub struct DistMatrix<T: Scalar, D: Distribution, S: Shape = General> {
    grid: Rc<Grid>,
    height: usize,
    width: usize,
    layout: DistLayout,
    local: ElMatrix<T, General>,
    _marker: PhantomData<(D, S)>,
}

pub type DistColumnVector<T, D> = DistMatrix<T, D, Column>;
pub type DistRowVector<T, D> = DistMatrix<T, D, Row>;

impl<T: Scalar, D: Distribution, S: Shape> fmt::Debug for DistMatrix<T, D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistMatrix")
            .field("entity", &S::ENTITY)
            .field("kind", &T::KIND)
            .field("distribution", &D::DESCRIPTOR)
            .field("height", &self.height)
            .field("width", &self.width)
            .field("local", &self.local)
            .finish()
    }
}

fn check_shape<S: Shape>(height: usize, width: usize) -> Result<()> {
    if S::admits(height, width) {
        Ok(())
    } else {
        Err(ViewError::NotAVector {
            entity: S::ENTITY,
            height,
            width,
        }
        .into())
    }
}

impl<T: Scalar, D: Distribution, S: Shape> DistMatrix<T, D, S> {
    /// Zero-filled distributed matrix of global size `height x width`.
    pub fn new(grid: &Rc<Grid>, height: usize, width: usize) -> Result<Self> {
        check_shape::<S>(height, width)?;
        let layout = DistLayout::new(D::DESCRIPTOR, &grid.layout());
        let local_size = layout.local_size(MatrixSize::new(height, width));
        tracing::debug!(
            distribution = %D::DESCRIPTOR,
            kind = %T::KIND,
            height,
            width,
            local_height = local_size.m,
            local_width = local_size.n,
            "distributed matrix created"
        );
        Ok(Self {
            grid: Rc::clone(grid),
            height,
            width,
            layout,
            local: ElMatrix::new(local_size.m, local_size.n),
            _marker: PhantomData,
        })
    }

    /// Wrap an existing local matrix as this rank's part of a global
    /// `height x width` matrix.
    ///
    /// The local matrix is aliased, not copied, and keeps its lock state.
    pub fn attach(
        grid: &Rc<Grid>,
        height: usize,
        width: usize,
        local: ElMatrix<T, General>,
    ) -> Result<Self> {
        check_shape::<S>(height, width)?;
        let layout = DistLayout::new(D::DESCRIPTOR, &grid.layout());
        let expected = layout.local_size(MatrixSize::new(height, width));
        if local.size() != expected {
            return Err(EngineError::AttachSizeMismatch {
                distribution: D::DESCRIPTOR,
                expected,
                found: local.size(),
            });
        }
        tracing::trace!(distribution = %D::DESCRIPTOR, height, width, locked = local.locked(), "attached local matrix");
        Ok(Self {
            grid: Rc::clone(grid),
            height,
            width,
            layout,
            local,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn grid(&self) -> &Rc<Grid> {
        &self.grid
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
    pub fn size(&self) -> MatrixSize {
        MatrixSize::new(self.height, self.width)
    }

    #[inline]
    pub fn distribution(&self) -> DistributionDescriptor {
        D::DESCRIPTOR
    }

    #[inline]
    pub fn layout(&self) -> &DistLayout {
        &self.layout
    }

    #[inline]
    pub fn local_size(&self) -> MatrixSize {
        self.local.size()
    }

    /// Whether this rank holds part of the matrix.
    #[inline]
    pub fn participating(&self) -> bool {
        self.layout.participating()
    }

    #[inline]
    pub fn locked(&self) -> bool {
        self.local.locked()
    }

    /// A second handle on the same local storage and grid.
    pub fn view(&self) -> Self {
        Self {
            grid: Rc::clone(&self.grid),
            height: self.height,
            width: self.width,
            layout: self.layout,
            local: self.local.view(),
            _marker: PhantomData,
        }
    }

    /// This rank's entries as a general matrix, aliasing the storage.
    pub fn local_matrix(&self) -> ElMatrix<T, General> {
        self.local.view()
    }

    /// This rank's entries as a value of the entity's own shape.
    ///
    /// Fails for vectors on ranks whose local part is not vector-shaped.
    pub fn local(&self) -> Result<ElMatrix<T, S>> {
        Ok(self.local.view().into_shape::<S>()?)
    }

    /// Global entry `(i, j)` if this rank stores it.
    pub fn get_global(&self, i: usize, j: usize) -> Option<T> {
        let li = self.local_row(i)?;
        let lj = self.local_col(j)?;
        Some(self.local.get(li, lj))
    }

    /// Set global entry `(i, j)` if this rank stores it; returns whether it did.
    pub fn set_global(&mut self, i: usize, j: usize, value: T) -> Result<bool> {
        match (self.local_row(i), self.local_col(j)) {
            (Some(li), Some(lj)) => {
                self.local.set(li, lj, value)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn local_row(&self, i: usize) -> Option<usize> {
        local_index(&self.layout.rows, i, self.local.height())
    }

    fn local_col(&self, j: usize) -> Option<usize> {
        local_index(&self.layout.cols, j, self.local.width())
    }

    /// Copy into a new matrix of the same global size under `D2`.
    ///
    /// Every rank contributes its entries with their global coordinates; the
    /// result is unlocked and owns its storage.
    pub fn redistribute<D2: Distribution>(&self) -> Result<DistMatrix<T, D2, S>> {
        let mut entries = Vec::with_capacity(self.local.height() * self.local.width());
        if self.participating() {
            for lj in 0..self.local.width() {
                let j = self.layout.cols.global_index(lj);
                for li in 0..self.local.height() {
                    let i = self.layout.rows.global_index(li);
                    entries.push((i, j, self.local.get(li, lj)));
                }
            }
        }
        let gathered = self.grid.comm().all_gather(entries);

        let mut global = vec![T::zero(); self.height * self.width];
        for (i, j, value) in gathered.into_iter().flatten() {
            global[i + j * self.height] = value;
        }

        let mut target = DistMatrix::<T, D2, S>::new(&self.grid, self.height, self.width)?;
        let rows = target.layout.rows;
        let cols = target.layout.cols;
        for lj in 0..target.local.width() {
            let j = cols.global_index(lj);
            for li in 0..target.local.height() {
                let i = rows.global_index(li);
                target.local.set(li, lj, global[i + j * self.height])?;
            }
        }
        tracing::debug!(from = %D::DESCRIPTOR, to = %D2::DESCRIPTOR, "redistributed");
        Ok(target)
    }

    /// Deep copy under the same distribution.
    pub fn copy(&self) -> Result<Self> {
        self.redistribute::<D>()
    }
}

fn local_index(axis: &AxisLayout, global: usize, local_len: usize) -> Option<usize> {
    if !axis.active || global < axis.shift || (global - axis.shift) % axis.stride != 0 {
        return None;
    }
    let local = (global - axis.shift) / axis.stride;
    (local < local_len).then_some(local)
}

impl<T: Scalar, D: Distribution, S: VectorShape> DistMatrix<T, D, S> {
    /// Zero-filled distributed vector of `length` entries.
    pub fn with_length(grid: &Rc<Grid>, length: usize) -> Result<Self> {
        let (height, width) = S::dims(length);
        Self::new(grid, height, width)
    }

    #[inline]
    pub fn length(&self) -> usize {
        S::length(self.height, self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::Comm;
    use approx::assert_abs_diff_eq;
    use distbridge_traits::{
        for_each_distribution, CircCirc, DistributionVisitor, McMr, MdStar, StarStar, StarVc,
    };
    use num_complex::Complex64;

    fn grid() -> Rc<Grid> {
        Rc::new(Grid::new(Comm::world()))
    }

    fn filled<D: Distribution>(g: &Rc<Grid>, h: usize, w: usize) -> DistMatrix<f64, D> {
        let mut m = DistMatrix::<f64, D>::new(g, h, w).unwrap();
        for j in 0..w {
            for i in 0..h {
                m.set_global(i, j, (i * 10 + j) as f64).unwrap();
            }
        }
        m
    }

    #[test]
    fn test_new_star_star() {
        let g = grid();
        let m = DistMatrix::<f64, StarStar>::new(&g, 4, 4).unwrap();
        assert_eq!(m.size().count(), 16);
        assert_eq!(m.local_size(), MatrixSize::new(4, 4));
        assert!(m.participating());
        assert_eq!(m.distribution(), StarStar::DESCRIPTOR);
    }

    #[test]
    fn test_grid_kept_alive() {
        let g = grid();
        let weak = Rc::downgrade(&g);
        let m = DistMatrix::<i32, McMr>::new(&g, 2, 2).unwrap();
        drop(g);
        assert!(weak.upgrade().is_some());
        assert_eq!(m.grid().size(), 1);
        drop(m);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_local_aliases_storage() {
        let g = grid();
        let m = DistMatrix::<f64, StarStar>::new(&g, 2, 3).unwrap();
        let mut local = m.local().unwrap();
        local.set(1, 2, 5.0).unwrap();
        assert_eq!(m.get_global(1, 2), Some(5.0));
        let mut alias = m.view();
        alias.set_global(0, 0, -2.0).unwrap();
        assert_eq!(m.get_global(0, 0), Some(-2.0));
    }

    #[test]
    fn test_attach_checks_local_size() {
        let g = grid();
        let local = ElMatrix::<f64>::from_fn(3, 2, |i, j| (i + j) as f64);
        let m = DistMatrix::<f64, McMr>::attach(&g, 3, 2, local.view()).unwrap();
        assert_eq!(m.get_global(2, 1), Some(3.0));
        let err = DistMatrix::<f64, McMr>::attach(&g, 4, 2, local.view()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::AttachSizeMismatch {
                expected: MatrixSize { m: 4, n: 2 },
                found: MatrixSize { m: 3, n: 2 },
                ..
            }
        ));
    }

    #[test]
    fn test_attach_keeps_lock() {
        let g = grid();
        let local = ElMatrix::<u32>::new(2, 2).locked_view();
        let mut m = DistMatrix::<u32, StarStar>::attach(&g, 2, 2, local).unwrap();
        assert!(m.locked());
        assert!(m.set_global(0, 0, 1).is_err());
        let copy = m.copy().unwrap();
        assert!(!copy.locked());
    }

    #[test]
    fn test_redistribute_preserves_entries() {
        struct Check<'a> {
            src: &'a DistMatrix<f64, McMr>,
        }
        impl DistributionVisitor for Check<'_> {
            fn visit<D2: Distribution>(&mut self) {
                let out = self.src.redistribute::<D2>().unwrap();
                assert_eq!(out.size(), self.src.size());
                assert_eq!(out.distribution(), D2::DESCRIPTOR);
                for j in 0..out.width() {
                    for i in 0..out.height() {
                        let v = out.get_global(i, j).unwrap();
                        assert_abs_diff_eq!(v, (i * 10 + j) as f64);
                    }
                }
            }
        }
        let g = grid();
        let src = filled::<McMr>(&g, 3, 4);
        for_each_distribution(&mut Check { src: &src });
    }

    #[test]
    fn test_copy_is_deep() {
        let g = grid();
        let src = filled::<CircCirc>(&g, 2, 2);
        let mut copy = src.copy().unwrap();
        copy.set_global(0, 0, -1.0).unwrap();
        assert_eq!(src.get_global(0, 0), Some(0.0));
    }

    #[test]
    fn test_vectors() {
        let g = grid();
        let mut v = DistColumnVector::<Complex64, MdStar>::with_length(&g, 5).unwrap();
        assert_eq!(v.length(), 5);
        assert_eq!(v.size(), MatrixSize::new(5, 1));
        v.set_global(4, 0, Complex64::new(1.0, -1.0)).unwrap();
        let local = v.local().unwrap();
        assert_eq!(local.get_at(4), Complex64::new(1.0, -1.0));

        let r = DistRowVector::<i64, StarVc>::with_length(&g, 3).unwrap();
        assert_eq!(r.size(), MatrixSize::new(1, 3));
        assert_eq!(r.redistribute::<StarStar>().unwrap().length(), 3);
    }

    #[test]
    fn test_vector_shape_checked() {
        let g = grid();
        let err = DistColumnVector::<f32, StarStar>::new(&g, 2, 2).unwrap_err();
        assert!(matches!(err, EngineError::View(ViewError::NotAVector { .. })));
    }
}
