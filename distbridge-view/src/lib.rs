//! Zero-copy bridging between host arrays and native matrices.
//!
//! The crate provides:
//!
//! - [`HostArray`]: a strided n-dimensional array as a dynamically typed host
//!   sees it (byte strides, writeable flag, base object)
//! - [`ElMatrix`]: a native column-major matrix over a raw buffer with a
//!   leading dimension, parametrized by a [`Shape`] marker so that column and
//!   row vectors share one implementation
//! - [`BufferInfo`]: the descriptor exchanged in both directions
//! - [`bridge`]: the inbound/outbound conversions and their layout checks
//!
//! Every view carries an [`Owner`], a strong reference to whatever object
//! owns the aliased memory, handed over at construction.

pub mod bridge;
pub mod buffer;
mod dyn_array;
pub mod host_array;
pub mod matrix;
pub mod owner;

pub use bridge::{
    array_from_matrix, buffer_from_view, matrix_from_array, native_layout, view_from_buffer,
    Access, EntityKind, NativeLayout,
};
pub use buffer::BufferInfo;
pub use dyn_array::DynArray;
pub use host_array::{HostArray, Order};
pub use matrix::{
    Column, ElColumnVector, ElMatrix, ElRowVector, General, MatrixSize, Row, Shape, VectorShape,
};
pub use owner::{Owner, Storage, WeakOwner};

use distbridge_traits::ScalarKind;

/// Errors raised while building or using views.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("incompatible layout for {entity}: {reason}")]
    IncompatibleLayout {
        entity: EntityKind,
        reason: LayoutMismatch,
    },

    #[error("array is read-only")]
    ReadOnly,

    #[error("matrix storage is locked")]
    Locked,

    #[error("{entity} requires a vector shape, found {height}x{width}")]
    NotAVector {
        entity: EntityKind,
        height: usize,
        width: usize,
    },

    #[error("data length {len} does not match shape {shape:?}")]
    DataLength { len: usize, shape: Vec<usize> },

    #[error("value {value} cannot be stored as {kind}")]
    ScalarConversion { value: String, kind: ScalarKind },

    #[error("element type mismatch: expected {expected}, found {found}")]
    ElementMismatch {
        expected: ScalarKind,
        found: ScalarKind,
    },

    #[error("stride length mismatch")]
    StrideLengthMismatch,

    #[error("offset overflow while computing pointer")]
    OffsetOverflow,
}

/// What exactly was wrong with an inbound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutMismatch {
    Rank {
        expected: usize,
        found: usize,
    },
    Order {
        shape: Vec<usize>,
        strides: Vec<isize>,
        itemsize: usize,
    },
    Element {
        expected: ScalarKind,
        format: String,
        itemsize: usize,
    },
}

impl std::fmt::Display for LayoutMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutMismatch::Rank { expected, found } => {
                write!(f, "expected rank {expected}, found rank {found}")
            }
            LayoutMismatch::Order {
                shape,
                strides,
                itemsize,
            } => write!(
                f,
                "shape {shape:?} with byte strides {strides:?} (itemsize {itemsize}) is not in native order"
            ),
            LayoutMismatch::Element {
                expected,
                format,
                itemsize,
            } => write!(
                f,
                "expected {expected} elements, found format '{format}' with itemsize {itemsize}"
            ),
        }
    }
}

/// Convenience alias for `Result<T, ViewError>`.
pub type Result<T> = std::result::Result<T, ViewError>;
