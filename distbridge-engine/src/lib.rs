//! Reference numeric engine for distbridge.
//!
//! Processes form a [`Grid`] of `height x width` ranks over a [`Comm`]. A
//! [`DistMatrix`] stores the part of a global matrix its rank owns under a
//! compile-time [`Distribution`](distbridge_traits::Distribution); layout
//! arithmetic for every supported distribution lives in [`layout`].
//!
//! The communicator is in-process and has a single rank. The layout
//! arithmetic itself is rank-agnostic and is tested on larger grids.

pub mod comm;
pub mod dist_matrix;
pub mod grid;
pub mod layout;

pub use comm::Comm;
pub use dist_matrix::{DistColumnVector, DistMatrix, DistRowVector};
pub use grid::{Grid, GridLayout};
pub use layout::{AxisLayout, DistLayout};

use distbridge_traits::DistributionDescriptor;
use distbridge_view::{MatrixSize, ViewError};

/// Errors raised by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("grid height {height} does not divide {size} processes")]
    InvalidGridHeight { height: usize, size: usize },

    #[error("local buffer is {found} but {distribution} assigns {expected} to this process")]
    AttachSizeMismatch {
        distribution: DistributionDescriptor,
        expected: MatrixSize,
        found: MatrixSize,
    },

    #[error(transparent)]
    View(#[from] ViewError),
}

/// Convenience alias for `Result<T, EngineError>`.
pub type Result<T> = std::result::Result<T, EngineError>;
