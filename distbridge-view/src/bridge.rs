//! Conversions between host buffers and native matrices.
//!
//! Inbound, a buffer becomes a native view only if its strides already
//! express native order; nothing is ever transposed or copied. Outbound, a
//! native view becomes a buffer describing exactly its memory, read-only
//! whenever the native side is locked.

use std::fmt;

use distbridge_traits::Scalar;

use crate::buffer::BufferInfo;
use crate::host_array::HostArray;
use crate::matrix::{ElMatrix, Shape};
use crate::owner::Owner;
use crate::{LayoutMismatch, Result, ViewError};

/// Kind of native local entity a buffer is converted to or from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Matrix,
    ColumnVector,
    RowVector,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Matrix,
        EntityKind::ColumnVector,
        EntityKind::RowVector,
    ];

    /// Host-side array rank.
    pub const fn rank(self) -> usize {
        match self {
            EntityKind::Matrix => 2,
            EntityKind::ColumnVector | EntityKind::RowVector => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Matrix => "el_matrix",
            EntityKind::ColumnVector => "el_column_vector",
            EntityKind::RowVector => "el_row_vector",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Requested mutability of an inbound view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Writable iff the buffer is writable.
    #[default]
    Inherit,
    /// Always locked.
    ReadOnly,
}

/// Native extents implied by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeLayout {
    pub height: usize,
    pub width: usize,
    pub ldim: usize,
}

/// Check a buffer's rank and strides against `entity` and derive the
/// native extents.
pub fn native_layout(info: &BufferInfo, entity: EntityKind) -> Result<NativeLayout> {
    let mismatch = |reason| ViewError::IncompatibleLayout { entity, reason };
    if info.ndim() != entity.rank() || info.strides.len() != info.ndim() {
        return Err(mismatch(LayoutMismatch::Rank {
            expected: entity.rank(),
            found: info.ndim(),
        }));
    }
    let order = || {
        mismatch(LayoutMismatch::Order {
            shape: info.shape.clone(),
            strides: info.strides.clone(),
            itemsize: info.itemsize,
        })
    };
    let item = info.itemsize as isize;
    // Leading dimension encoded by a byte stride, if it is a positive
    // multiple of the item size.
    let ldim_of = |stride: isize| {
        if item > 0 && stride > 0 && stride % item == 0 {
            Some((stride / item) as usize)
        } else {
            None
        }
    };

    match entity {
        // Strides of axes with at most one entry never address memory and
        // are not checked.
        EntityKind::Matrix => {
            let (height, width) = (info.shape[0], info.shape[1]);
            if height > 1 && info.strides[0] != item {
                return Err(order());
            }
            if width <= 1 {
                return Ok(NativeLayout {
                    height,
                    width,
                    ldim: height.max(1),
                });
            }
            match ldim_of(info.strides[1]) {
                Some(ldim) if ldim >= height.max(1) => Ok(NativeLayout {
                    height,
                    width,
                    ldim,
                }),
                _ => Err(order()),
            }
        }
        EntityKind::ColumnVector => {
            let height = info.shape[0];
            if height > 1 && info.strides[0] != item {
                return Err(order());
            }
            Ok(NativeLayout {
                height,
                width: 1,
                ldim: height.max(1),
            })
        }
        EntityKind::RowVector => {
            let width = info.shape[0];
            let ldim = if width <= 1 {
                Some(1)
            } else {
                ldim_of(info.strides[0])
            };
            match ldim {
                Some(ldim) => Ok(NativeLayout {
                    height: 1,
                    width,
                    ldim,
                }),
                None => Err(order()),
            }
        }
    }
}

/// Build a native view over the memory a buffer describes.
///
/// The view is locked if the buffer is read-only or `access` asks for it.
///
/// # Safety
/// `info` must describe memory that stays valid while `owner` is alive.
pub unsafe fn view_from_buffer<T: Scalar, S: Shape>(
    info: &BufferInfo,
    access: Access,
    owner: Owner,
) -> Result<ElMatrix<T, S>> {
    if info.kind() != Some(T::KIND) {
        return Err(ViewError::IncompatibleLayout {
            entity: S::ENTITY,
            reason: LayoutMismatch::Element {
                expected: T::KIND,
                format: info.format.clone(),
                itemsize: info.itemsize,
            },
        });
    }
    let layout = native_layout(info, S::ENTITY)?;
    let locked = info.readonly || access == Access::ReadOnly;
    if info.readonly && access == Access::Inherit {
        tracing::debug!(entity = %S::ENTITY, "read-only buffer yields a locked view");
    }
    tracing::trace!(
        entity = %S::ENTITY,
        kind = %T::KIND,
        height = layout.height,
        width = layout.width,
        ldim = layout.ldim,
        locked,
        "view from buffer"
    );
    let ptr = info.ptr.cast::<T>();
    if locked {
        ElMatrix::locked_attach(layout.height, layout.width, ptr, layout.ldim, owner)
    } else {
        ElMatrix::attach(layout.height, layout.width, ptr, layout.ldim, owner)
    }
}

/// Describe a native view's memory; vectors drop their degenerate axis.
pub fn buffer_from_view<T: Scalar, S: Shape>(view: &ElMatrix<T, S>) -> BufferInfo {
    let item = T::KIND.byte_size() as isize;
    let ldim = view.ldim() as isize;
    let (shape, strides) = match S::ENTITY {
        EntityKind::Matrix => (vec![view.height(), view.width()], vec![item, item * ldim]),
        EntityKind::ColumnVector => (vec![view.height()], vec![item]),
        EntityKind::RowVector => (vec![view.width()], vec![item * ldim]),
    };
    BufferInfo::of(
        view.locked_buffer().cast_mut(),
        shape,
        strides,
        view.locked(),
    )
}

/// Native view of a host array, keeping the array's base alive.
pub fn matrix_from_array<T: Scalar, S: Shape>(
    array: &HostArray<T>,
    access: Access,
) -> Result<ElMatrix<T, S>> {
    let info = array.buffer_info();
    // SAFETY: the array's base owns the memory `info` describes.
    unsafe { view_from_buffer(&info, access, array.base().clone()) }
}

/// Host array aliasing a native view.
///
/// The array keeps the view's storage alive, plus `anchor` if given.
pub fn array_from_matrix<T: Scalar, S: Shape>(
    view: &ElMatrix<T, S>,
    anchor: Option<Owner>,
) -> HostArray<T> {
    let info = buffer_from_view(view);
    tracing::trace!(entity = %S::ENTITY, readonly = info.readonly, "array from view");
    // SAFETY: the view's owner keeps its memory alive and is cloned into
    // the array as its base.
    unsafe {
        HostArray::from_raw(
            info.ptr.cast::<T>(),
            info.shape,
            info.strides,
            info.readonly,
            view.owner().clone(),
            anchor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_array::Order;
    use crate::matrix::{Column, General, Row};
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::rc::Rc;

    fn buffer(shape: Vec<usize>, strides: Vec<isize>, itemsize: usize, format: &str) -> BufferInfo {
        BufferInfo {
            ptr: std::ptr::NonNull::<u8>::dangling().as_ptr(),
            itemsize,
            format: format.into(),
            shape,
            strides,
            readonly: false,
        }
    }

    #[test]
    fn test_native_layout_matrix() {
        let l = native_layout(&buffer(vec![3, 5], vec![4, 12], 4, "f"), EntityKind::Matrix)
            .unwrap();
        assert_eq!(
            l,
            NativeLayout {
                height: 3,
                width: 5,
                ldim: 3
            }
        );
        let padded =
            native_layout(&buffer(vec![3, 5], vec![4, 32], 4, "f"), EntityKind::Matrix).unwrap();
        assert_eq!(padded.ldim, 8);
    }

    #[test]
    fn test_native_layout_rejects_row_major() {
        let err = native_layout(&buffer(vec![3, 5], vec![20, 4], 4, "f"), EntityKind::Matrix)
            .unwrap_err();
        match err {
            ViewError::IncompatibleLayout {
                entity: EntityKind::Matrix,
                reason: LayoutMismatch::Order { strides, .. },
            } => assert_eq!(strides, vec![20, 4]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_native_layout_rejects_small_ldim() {
        assert!(
            native_layout(&buffer(vec![3, 2], vec![8, 16], 8, "d"), EntityKind::Matrix).is_err()
        );
    }

    #[test]
    fn test_native_layout_rank() {
        let err = native_layout(&buffer(vec![3], vec![8], 8, "d"), EntityKind::Matrix).unwrap_err();
        assert!(matches!(
            err,
            ViewError::IncompatibleLayout {
                reason: LayoutMismatch::Rank {
                    expected: 2,
                    found: 1
                },
                ..
            }
        ));
        assert!(native_layout(
            &buffer(vec![2, 2], vec![8, 16], 8, "d"),
            EntityKind::ColumnVector
        )
        .is_err());
    }

    #[test]
    fn test_native_layout_vectors() {
        let col = native_layout(&buffer(vec![4], vec![8], 8, "d"), EntityKind::ColumnVector)
            .unwrap();
        assert_eq!((col.height, col.width, col.ldim), (4, 1, 4));
        assert!(
            native_layout(&buffer(vec![4], vec![16], 8, "d"), EntityKind::ColumnVector).is_err()
        );
        let row =
            native_layout(&buffer(vec![4], vec![24], 8, "d"), EntityKind::RowVector).unwrap();
        assert_eq!((row.height, row.width, row.ldim), (1, 4, 3));
        assert!(native_layout(&buffer(vec![4], vec![-8], 8, "d"), EntityKind::RowVector).is_err());
    }

    #[test]
    fn test_native_layout_ignores_degenerate_axes() {
        // n x 1 and 1 x n in C order.
        let l = native_layout(&buffer(vec![3, 1], vec![8, 8], 8, "d"), EntityKind::Matrix).unwrap();
        assert_eq!((l.height, l.width, l.ldim), (3, 1, 3));
        let l = native_layout(&buffer(vec![1, 5], vec![40, 8], 8, "d"), EntityKind::Matrix).unwrap();
        assert_eq!((l.height, l.width, l.ldim), (1, 5, 1));
        let l = native_layout(&buffer(vec![1, 1], vec![0, 0], 8, "d"), EntityKind::Matrix).unwrap();
        assert_eq!(l.ldim, 1);
        // A stride on a non-degenerate axis is still checked.
        assert!(native_layout(&buffer(vec![1, 5], vec![40, 4], 8, "d"), EntityKind::Matrix).is_err());
        assert!(native_layout(&buffer(vec![3, 1], vec![16, 8], 8, "d"), EntityKind::Matrix).is_err());

        let col = native_layout(&buffer(vec![1], vec![64], 8, "d"), EntityKind::ColumnVector)
            .unwrap();
        assert_eq!((col.height, col.ldim), (1, 1));
        let row = native_layout(&buffer(vec![1], vec![-8], 8, "d"), EntityKind::RowVector).unwrap();
        assert_eq!((row.width, row.ldim), (1, 1));
    }

    #[test]
    fn test_element_mismatch() {
        let a = HostArray::<f64>::zeros(&[2, 2], Order::F);
        let err = matrix_from_array::<f64, General>(&a, Access::Inherit).map(|_| ());
        assert!(err.is_ok());
        let info = a.buffer_info();
        let err = unsafe { view_from_buffer::<f32, General>(&info, Access::Inherit, a.base().clone()) }
            .unwrap_err();
        assert!(matches!(
            err,
            ViewError::IncompatibleLayout {
                reason: LayoutMismatch::Element { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_f32_3x5_descriptor() {
        let a = HostArray::<f32>::from_fn(&[3, 5], Order::F, |i| (i[0] + 3 * i[1]) as f32);
        let info = a.buffer_info();
        assert_eq!(info.strides, vec![4, 12]);
        let m = matrix_from_array::<f32, General>(&a, Access::Inherit).unwrap();
        assert_eq!((m.height(), m.width(), m.ldim()), (3, 5, 3));
        assert_abs_diff_eq!(m.get(2, 4), 14.0);
        assert_eq!(buffer_from_view(&m), info);
    }

    #[test]
    fn test_roundtrip_random_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let h = rng.gen_range(1..6);
            let w = rng.gen_range(1..6);
            let a = HostArray::<i64>::from_fn(&[h, w], Order::F, |i| (i[0] * 100 + i[1]) as i64);
            let info = a.buffer_info();
            let m = matrix_from_array::<i64, General>(&a, Access::Inherit).unwrap();
            assert_eq!(buffer_from_view(&m), info);

            let c = HostArray::<i64>::zeros(&[h], Order::F);
            let v = matrix_from_array::<i64, Column>(&c, Access::Inherit).unwrap();
            assert_eq!(buffer_from_view(&v), c.buffer_info());

            let r = HostArray::<i64>::from_parts(vec![0; h * w], &[w], &[h as isize]).unwrap();
            let v = matrix_from_array::<i64, Row>(&r, Access::Inherit).unwrap();
            assert_eq!(v.ldim(), h);
            assert_eq!(buffer_from_view(&v), r.buffer_info());
        }
    }

    #[test]
    fn test_readonly_buffer_yields_locked_view() {
        let mut a = HostArray::<f64>::zeros(&[2, 2], Order::F);
        a.set_writeable(false).unwrap();
        let mut m = matrix_from_array::<f64, General>(&a, Access::Inherit).unwrap();
        assert!(m.locked());
        assert!(matches!(m.set(0, 0, 1.0), Err(ViewError::Locked)));

        let back = array_from_matrix(&m, None);
        assert!(!back.is_writeable());
    }

    #[test]
    fn test_requested_readonly() {
        let a = HostArray::<u32>::zeros(&[3], Order::F);
        let v = matrix_from_array::<u32, Column>(&a, Access::ReadOnly).unwrap();
        assert!(v.locked());
        let mut out = array_from_matrix(&v, None);
        assert!(matches!(out.set(&[0], 1), Err(ViewError::ReadOnly)));
        assert!(matches!(out.set_writeable(true), Err(ViewError::ReadOnly)));
    }

    #[test]
    fn test_writes_are_shared() {
        let a = HostArray::<f64>::zeros(&[2, 3], Order::F);
        let mut m = matrix_from_array::<f64, General>(&a, Access::Inherit).unwrap();
        m.set(1, 2, 8.0).unwrap();
        assert_abs_diff_eq!(a.get(&[1, 2]), 8.0);
        let mut back = array_from_matrix(&m, None);
        back.set(&[0, 1], -3.0).unwrap();
        assert_abs_diff_eq!(m.get(0, 1), -3.0);
    }

    #[test]
    fn test_view_keeps_buffer_alive() {
        let a = HostArray::<f64>::from_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0], Order::F).unwrap();
        let weak = a.base().downgrade();
        let m = matrix_from_array::<f64, General>(&a, Access::Inherit).unwrap();
        drop(a);
        assert!(weak.is_alive());
        assert_abs_diff_eq!(m.get(1, 1), 4.0);
        drop(m);
        assert!(!weak.is_alive());
    }

    #[test]
    fn test_array_holds_anchor() {
        let m = ElMatrix::<i32>::new(2, 2);
        let anchor = Rc::new(());
        let arr = array_from_matrix(&m, Some(Owner::new(anchor.clone())));
        assert_eq!(Rc::strong_count(&anchor), 2);
        drop(arr);
        assert_eq!(Rc::strong_count(&anchor), 1);
    }
}
