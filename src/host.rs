//! The host-facing API.
//!
//! These are the calls a dynamically typed binding makes. Everything is
//! selected at run time from the registry: objects by their type key,
//! distributed specializations through the dispatch table.

use std::rc::Rc;

use distbridge_engine::Grid;
use distbridge_traits::{
    Dist, DistWrap, DistributionDescriptor, HostNumeric, HostValue, ScalarKind,
    ScalarTypeDescriptor,
};
use distbridge_view::{Access, DynArray, EntityKind, MatrixSize, Order};

use crate::entity::{Entity, TypeKey};
use crate::object::{Attr, Object};
use crate::operations::{CtorArgs, Operations};
use crate::registry::Registry;
use crate::{BridgeError, Result};

impl Registry {
    fn operation<F>(
        &self,
        obj: &Object,
        operation: &'static str,
        select: impl FnOnce(&Operations) -> Option<F>,
    ) -> Result<F> {
        let entry = self.entry_of(obj)?;
        select(entry.ops()).ok_or_else(|| BridgeError::UnsupportedOperation {
            type_name: entry.name().to_string(),
            operation,
        })
    }

    // ------------------------------------------------------------------------
    // Distributions
    // ------------------------------------------------------------------------

    /// Distribution object for a run-time triple.
    pub fn make(&self, columnwise: Dist, rowwise: Dist, wrapping: DistWrap) -> Result<Object> {
        let distribution = self.dispatch().make(columnwise, rowwise, wrapping)?;
        let key = TypeKey::matrix_distribution(distribution);
        let construct = self
            .entry(&key)
            .and_then(|entry| entry.ops().construct)
            .ok_or_else(|| BridgeError::NotRegistered {
                name: key.to_string(),
            })?;
        construct(&CtorArgs::Empty)
    }

    /// The triple a distribution object stands for.
    pub fn distribution_of(&self, obj: &Object) -> Result<DistributionDescriptor> {
        match (obj.key().entity, obj.key().distribution) {
            (Entity::MatrixDistribution, Some(distribution)) => Ok(distribution),
            _ => Err(BridgeError::TypeMismatch {
                expected: "matrix_distribution".to_string(),
                found: obj.key().to_string(),
            }),
        }
    }

    pub fn supported_distributions(&self) -> &'static [DistributionDescriptor] {
        self.dispatch().supported_distributions()
    }

    // ------------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------------

    /// Compiled real scalar kinds, in declaration order.
    pub fn scalars(&self) -> Vec<ScalarKind> {
        ScalarKind::enabled()
            .into_iter()
            .filter(|k| !k.is_complex())
            .collect()
    }

    /// Compiled complex scalar kinds, in declaration order.
    pub fn complex_scalars(&self) -> Vec<ScalarKind> {
        ScalarKind::enabled()
            .into_iter()
            .filter(|k| k.is_complex())
            .collect()
    }

    /// Kind a host number of category `host` binds to.
    ///
    /// The first local matrix type registered for that category wins.
    pub fn resolve_host_scalar(&self, host: HostNumeric) -> Option<ScalarKind> {
        self.entries().iter().find_map(|entry| {
            let key = entry.key();
            let scalar = key.scalar?;
            (key.entity == Entity::Local(EntityKind::Matrix)
                && !scalar.is_const()
                && scalar.kind().host_numeric() == host)
                .then_some(scalar.kind())
        })
    }

    /// Owned host array of the kind host `values` bind to.
    pub fn array_from_host_values(
        &self,
        shape: &[usize],
        values: &[HostValue],
        order: Order,
    ) -> Result<DynArray> {
        let host = DynArray::host_numeric_of(values);
        let kind = self
            .resolve_host_scalar(host)
            .ok_or_else(|| BridgeError::NotRegistered {
                name: format!("{host:?}"),
            })?;
        Ok(DynArray::from_host_values_as(kind, shape, values, order)?)
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Call the constructor of the type registered as `name`.
    pub fn construct(&self, name: &str, args: &CtorArgs<'_>) -> Result<Object> {
        let entry = self
            .entry_by_name(name)
            .ok_or_else(|| BridgeError::NotRegistered {
                name: name.to_string(),
            })?;
        let construct = entry
            .ops()
            .construct
            .ok_or_else(|| BridgeError::UnsupportedOperation {
                type_name: entry.name().to_string(),
                operation: "construct",
            })?;
        construct(args)
    }

    /// Zero-filled distributed object selected at run time.
    pub fn new_distributed(
        &self,
        grid: &Rc<Grid>,
        entity: EntityKind,
        scalar: ScalarKind,
        distribution: DistributionDescriptor,
        size: MatrixSize,
    ) -> Result<Object> {
        self.dispatch()
            .resolve_entity(entity, scalar, distribution)?
            .construct(grid, size)
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    /// Native local `entity` aliasing `array`.
    pub fn view_from_array(
        &self,
        entity: EntityKind,
        array: &DynArray,
        access: Access,
    ) -> Result<Object> {
        let key = TypeKey::local(entity, ScalarTypeDescriptor::mutable(array.kind()));
        let entry = self.entry(&key).ok_or_else(|| BridgeError::NotRegistered {
            name: key.to_string(),
        })?;
        let view_from_array =
            entry
                .ops()
                .view_from_array
                .ok_or_else(|| BridgeError::UnsupportedOperation {
                    type_name: entry.name().to_string(),
                    operation: "view_from_array",
                })?;
        view_from_array(array, access)
    }

    /// Host array aliasing a local object's storage.
    ///
    /// The array keeps `obj` alive.
    pub fn view_to_array(&self, obj: &Object) -> Result<DynArray> {
        (self.operation(obj, "view_to_array", |o| o.view_to_array)?)(obj)
    }

    /// Distributed object over `local` under the distribution `distribution`.
    pub fn make_view(&self, grid: &Rc<Grid>, local: &Object, distribution: &Object) -> Result<Object> {
        let distribution = self.distribution_of(distribution)?;
        let (entity, scalar) = match (local.key().entity, local.key().scalar) {
            (Entity::Local(entity), Some(scalar)) => (entity, scalar.kind()),
            _ => {
                return Err(BridgeError::TypeMismatch {
                    expected: "local matrix or vector".to_string(),
                    found: local.key().to_string(),
                })
            }
        };
        tracing::trace!(%entity, %scalar, %distribution, "make_view");
        self.dispatch()
            .resolve_entity(entity, scalar, distribution)?
            .make_view(grid, local)
    }

    /// Local part of a distributed object, shaped like the object.
    pub fn local(&self, obj: &Object) -> Result<Object> {
        (self.operation(obj, "local", |o| o.local)?)(obj)
    }

    /// Local part of a distributed object as a general matrix.
    pub fn local_matrix(&self, obj: &Object) -> Result<Object> {
        (self.operation(obj, "local_matrix", |o| o.local_matrix)?)(obj)
    }

    /// Deep copy under `to`, or under the object's own distribution.
    pub fn copy(&self, obj: &Object, to: Option<&Object>) -> Result<Object> {
        let copy = self.operation(obj, "copy", |o| o.copy)?;
        let target = match to {
            Some(d) => self.distribution_of(d)?,
            None => obj
                .key()
                .distribution
                .ok_or_else(|| BridgeError::UnsupportedOperation {
                    type_name: obj.key().to_string(),
                    operation: "copy",
                })?,
        };
        copy(obj, target)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn size(&self, obj: &Object) -> Result<MatrixSize> {
        (self.operation(obj, "size", |o| o.size)?)(obj)
    }

    pub fn length(&self, obj: &Object) -> Result<usize> {
        (self.operation(obj, "length", |o| o.length)?)(obj)
    }

    pub fn participating(&self, obj: &Object) -> Result<bool> {
        (self.operation(obj, "participating", |o| o.participating)?)(obj)
    }

    pub fn attr(&self, obj: &Object, name: &str) -> Result<Attr> {
        (self.operation(obj, "attr", |o| o.attr)?)(obj, name)
    }

    /// Host name of the object's registered type.
    pub fn type_name(&self, obj: &Object) -> Result<&str> {
        Ok(self.entry_of(obj)?.name())
    }
}
