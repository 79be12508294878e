//! Run-time distribution dispatch.
//!
//! The table maps `(entity, scalar, distribution)` to a factory for the one
//! compiled specialization with those parameters. It is filled once while
//! the registry is built, in scalar-major then distribution order, and only
//! read afterwards.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use distbridge_engine::{DistMatrix, Grid};
use distbridge_traits::{
    Dist, DistWrap, Distribution, DistributionDescriptor, Scalar, ScalarKind,
    SUPPORTED_DISTRIBUTIONS,
};
use distbridge_view::{ElMatrix, EntityKind, General, MatrixSize, Shape};

use crate::entity::TypeKey;
use crate::object::Object;
use crate::{BridgeError, Result};

pub type DistConstructFn = fn(&Rc<Grid>, MatrixSize) -> Result<Object>;
pub type MakeViewFn = fn(&Rc<Grid>, &Object) -> Result<Object>;

fn construct<T: Scalar, D: Distribution, S: Shape>(
    grid: &Rc<Grid>,
    size: MatrixSize,
) -> Result<Object> {
    Ok(Object::new(DistMatrix::<T, D, S>::new(grid, size.m, size.n)?))
}

/// Distributed view of a local matrix; the global size is the local size.
fn make_view<T: Scalar, D: Distribution, S: Shape>(
    grid: &Rc<Grid>,
    local: &Object,
) -> Result<Object> {
    let local = match local.downcast::<ElMatrix<T, S>>() {
        Ok(m) => m.as_general(),
        Err(_) => local.downcast::<ElMatrix<T, General>>()?.view(),
    };
    let (height, width) = (local.height(), local.width());
    Ok(Object::new(DistMatrix::<T, D, S>::attach(
        grid, height, width, local,
    )?))
}

/// Factory for one distributed specialization.
#[derive(Clone, Copy)]
pub struct DistFactory {
    key: TypeKey,
    construct: DistConstructFn,
    make_view: MakeViewFn,
}

impl DistFactory {
    pub fn of<T: Scalar, D: Distribution, S: Shape>() -> Self {
        Self {
            key: TypeKey::distributed(S::ENTITY, T::KIND, D::DESCRIPTOR),
            construct: construct::<T, D, S>,
            make_view: make_view::<T, D, S>,
        }
    }

    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn entity(&self) -> EntityKind {
        match self.key.entity {
            crate::Entity::Distributed(kind) => kind,
            _ => EntityKind::Matrix,
        }
    }

    pub fn scalar(&self) -> Option<ScalarKind> {
        self.key.scalar_kind()
    }

    pub fn distribution(&self) -> Option<DistributionDescriptor> {
        self.key.distribution
    }

    /// Zero-filled object of global size `size` on `grid`.
    pub fn construct(&self, grid: &Rc<Grid>, size: MatrixSize) -> Result<Object> {
        (self.construct)(grid, size)
    }

    /// Distributed object aliasing the local matrix or vector `local`.
    pub fn make_view(&self, grid: &Rc<Grid>, local: &Object) -> Result<Object> {
        (self.make_view)(grid, local)
    }
}

impl fmt::Debug for DistFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DistFactory")
            .field(&format_args!("{}", self.key))
            .finish()
    }
}

type DispatchKey = (EntityKind, ScalarKind, DistributionDescriptor);

/// Lookup from run-time parameters to distributed factories.
#[derive(Debug, Default)]
pub struct DispatchTable {
    factories: Vec<DistFactory>,
    index: HashMap<DispatchKey, usize>,
}

impl DispatchTable {
    pub(crate) fn insert(&mut self, factory: DistFactory) {
        let (Some(scalar), Some(distribution)) = (factory.scalar(), factory.distribution()) else {
            return;
        };
        let key = (factory.entity(), scalar, distribution);
        if self.index.contains_key(&key) {
            tracing::debug!(factory = %factory.key, "factory already present");
            return;
        }
        self.index.insert(key, self.factories.len());
        self.factories.push(factory);
    }

    /// Validate a run-time triple.
    pub fn make(
        &self,
        columnwise: Dist,
        rowwise: Dist,
        wrapping: DistWrap,
    ) -> Result<DistributionDescriptor> {
        let distribution = DistributionDescriptor::new(columnwise, rowwise, wrapping);
        if distribution.is_supported() {
            Ok(distribution)
        } else {
            Err(BridgeError::DistributionNotSupported { distribution })
        }
    }

    /// The supported distributions, in stable order.
    pub fn supported_distributions(&self) -> &'static [DistributionDescriptor] {
        SUPPORTED_DISTRIBUTIONS
    }

    /// Factory for a distributed matrix of `scalar` under `distribution`.
    pub fn resolve(
        &self,
        scalar: ScalarKind,
        distribution: DistributionDescriptor,
    ) -> Result<&DistFactory> {
        self.resolve_entity(EntityKind::Matrix, scalar, distribution)
    }

    pub fn resolve_entity(
        &self,
        entity: EntityKind,
        scalar: ScalarKind,
        distribution: DistributionDescriptor,
    ) -> Result<&DistFactory> {
        if !distribution.is_supported() {
            return Err(BridgeError::DistributionNotSupported { distribution });
        }
        self.index
            .get(&(entity, scalar, distribution))
            .map(|&i| &self.factories[i])
            .ok_or_else(|| BridgeError::NotRegistered {
                name: TypeKey::distributed(entity, scalar, distribution).to_string(),
            })
    }

    /// Every factory in registration order.
    pub fn factories(&self) -> &[DistFactory] {
        &self.factories
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
