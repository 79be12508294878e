//! Generic dispatch and zero-copy views for a distributed matrix engine.
//!
//! A dynamically typed caller cannot name `DistMatrix<f64, McMr>`; it holds
//! a run-time scalar tag and a run-time distribution triple. This crate
//! closes that gap:
//!
//! - [`Registry`]: one entry per compiled (entity, scalar, distribution)
//!   combination, each with a unique identifier-safe display name and a
//!   bound [`Operations`] set. Built once, published through
//!   [`Registry::global`].
//! - [`DispatchTable`]: run-time `(scalar, distribution)` to typed factory,
//!   rejecting triples outside the supported set with
//!   [`BridgeError::DistributionNotSupported`].
//! - View bridging ([`Registry::view_from_array`],
//!   [`Registry::view_to_array`]): host arrays become native views and
//!   back without copying; every view keeps its buffer's owner alive.
//! - [`BridgeError`] and its [`ErrorClass`] hierarchy.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use distbridge::{Registry, Access, Order};
//! use distbridge::engine::{Comm, Grid};
//! use distbridge::traits::{Dist, DistWrap};
//! use distbridge::view::{EntityKind, HostArray};
//!
//! let registry = Registry::global()?;
//! let grid = Rc::new(Grid::new(Comm::world()));
//!
//! let array = HostArray::<f64>::zeros(&[4, 4], Order::F);
//! let local = registry.view_from_array(EntityKind::Matrix, &array.into(), Access::Inherit)?;
//! let dist = registry.make(Dist::Star, Dist::Star, DistWrap::Element)?;
//! let global = registry.make_view(&grid, &local, &dist)?;
//! assert_eq!(registry.size(&global)?.count(), 16);
//! # Ok::<(), distbridge::BridgeError>(())
//! ```

pub mod dispatch;
pub mod entity;
pub mod error;
pub mod host;
pub mod naming;
pub mod object;
pub mod operations;
pub mod registry;

pub use dispatch::{DispatchTable, DistFactory};
pub use entity::{
    Entity, Locality, MatrixDistribution, MatrixIndex, PcaControl, PcaResult, Range, RangeEnd,
    TypeKey,
};
pub use error::{BridgeError, ErrorClass, Result};
pub use object::{Attr, DistPcaResult, LocalPcaResult, Native, Object, Share};
pub use operations::{CtorArgs, Operations};
pub use registry::{Registration, Registry, RegistryBuilder, TypeKeyEntry};

pub use distbridge_engine as engine;
pub use distbridge_traits as traits;
pub use distbridge_view as view;
pub use distbridge_view::{Access, DynArray, MatrixSize, Order};
