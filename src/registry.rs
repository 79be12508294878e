//! The type-key registry.
//!
//! Building the registry walks the compiled scalar domain (outer) and the
//! supported distributions (inner) once, registering one entry per native
//! type with a unique host name and its operation set, and filling the
//! [`DispatchTable`] on the way. Any collision aborts the build; the global
//! registry is published only if the whole walk succeeds.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;

use distbridge_engine::{DistColumnVector, DistMatrix, DistRowVector};
use distbridge_traits::{
    for_each_distribution, for_each_scalar, Distribution, DistributionVisitor, MdStar, Scalar,
    ScalarTypeDescriptor, ScalarVisitor, StarVc,
};
use distbridge_view::{Column, ElMatrix, EntityKind, General, MatrixSize, Row, Shape, VectorShape};
use once_cell::sync::OnceCell;

use crate::dispatch::{DispatchTable, DistFactory};
use crate::entity::{
    Entity, MatrixDistribution, MatrixIndex, PcaControl, Range, RangeEnd, TypeKey,
};
use crate::naming;
use crate::object::{DistPcaResult, LocalPcaResult, Object};
use crate::operations::{
    dist_ops, dist_vector_ops, distribution_ops, index_ops, local_ops, local_vector_ops,
    pca_control_ops, pca_result_ops, range_ops, size_ops, Operations,
};
use crate::{BridgeError, Result};

/// One registered type.
#[derive(Debug, Clone)]
pub struct TypeKeyEntry {
    key: TypeKey,
    type_id: TypeId,
    rust_type: &'static str,
    template_name: String,
    name: String,
    ops: Operations,
}

impl TypeKeyEntry {
    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// `TypeId` of the native type behind the entry.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Template spelling, e.g. `el_matrix<f64 const>`.
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Host name, e.g. `ElMatrix_F64_Const`.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ops(&self) -> &Operations {
        &self.ops
    }
}

/// Outcome of a successful [`RegistryBuilder::register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// The same native type was already registered under the same key.
    AlreadyRegistered,
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates entries before they are published as a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<TypeKeyEntry>,
    by_key: HashMap<TypeKey, usize>,
    by_name: HashMap<String, usize>,
    dispatch: DispatchTable,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register native type `V` under `key`.
    ///
    /// Registering the same type under the same key again is a no-op. A key
    /// held by another type, a host name held by another key, or a key with
    /// no valid host name is an error.
    pub fn register<V: Any>(&mut self, key: TypeKey, ops: Operations) -> Result<Registration> {
        let type_id = TypeId::of::<V>();
        if let Some(&i) = self.by_key.get(&key) {
            let existing = &self.entries[i];
            if existing.type_id == type_id {
                tracing::debug!(name = %existing.name, "type already registered");
                return Ok(Registration::AlreadyRegistered);
            }
            return Err(BridgeError::DuplicateRegistration {
                name: existing.name.clone(),
                existing: existing.rust_type.to_string(),
                attempted: type_name::<V>().to_string(),
            });
        }

        let template_name = key
            .template_name()
            .ok_or_else(|| BridgeError::UnrepresentableType {
                key: format!("{key:?}"),
            })?;
        let name = naming::identifier(&template_name)?;
        if !naming::is_identifier(&name)? {
            return Err(BridgeError::UnrepresentableType { key: template_name });
        }
        if let Some(&i) = self.by_name.get(&name) {
            return Err(BridgeError::DuplicateRegistration {
                name,
                existing: self.entries[i].template_name.clone(),
                attempted: template_name,
            });
        }

        tracing::trace!(%name, template = %template_name, "registered type");
        let index = self.entries.len();
        self.by_key.insert(key, index);
        self.by_name.insert(name.clone(), index);
        self.entries.push(TypeKeyEntry {
            key,
            type_id,
            rust_type: type_name::<V>(),
            template_name,
            name,
            ops,
        });
        Ok(Registration::Added)
    }

    /// Make a distributed specialization reachable through the dispatch table.
    pub fn add_factory(&mut self, factory: DistFactory) {
        self.dispatch.insert(factory);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn register_local<T: Scalar>(&mut self) -> Result<()> {
        for is_const in [false, true] {
            let scalar = ScalarTypeDescriptor::new(T::KIND, is_const);
            self.register::<ElMatrix<T, General>>(
                TypeKey::local(EntityKind::Matrix, scalar),
                local_ops::<T, General>(is_const),
            )?;
            self.register::<ElMatrix<T, Column>>(
                TypeKey::local(EntityKind::ColumnVector, scalar),
                local_vector_ops::<T, Column>(is_const),
            )?;
            self.register::<ElMatrix<T, Row>>(
                TypeKey::local(EntityKind::RowVector, scalar),
                local_vector_ops::<T, Row>(is_const),
            )?;
        }
        Ok(())
    }

    fn register_dist_entity<T: Scalar, D: Distribution, S: Shape>(
        &mut self,
        ops: Operations,
    ) -> Result<Registration> {
        let registration = self.register::<DistMatrix<T, D, S>>(
            TypeKey::distributed(S::ENTITY, T::KIND, D::DESCRIPTOR),
            ops,
        )?;
        self.add_factory(DistFactory::of::<T, D, S>());
        Ok(registration)
    }

    fn register_dist_vector<T: Scalar, D: Distribution, S: VectorShape>(
        &mut self,
    ) -> Result<Registration> {
        self.register_dist_entity::<T, D, S>(dist_vector_ops::<T, D, S>())
    }

    fn register_distributed<T: Scalar, D: Distribution>(&mut self) -> Result<()> {
        self.register_dist_entity::<T, D, General>(dist_ops::<T, D, General>())?;
        self.register_dist_vector::<T, D, Column>()?;
        self.register_dist_vector::<T, D, Row>()?;
        Ok(())
    }

    fn register_helpers(&mut self) -> Result<()> {
        self.register::<MatrixIndex>(TypeKey::plain(Entity::MatrixIndex), index_ops())?;
        self.register::<MatrixSize>(TypeKey::plain(Entity::MatrixSize), size_ops())?;
        self.register::<Range<MatrixIndex>>(
            TypeKey::plain(Entity::Range(RangeEnd::Index)),
            range_ops::<MatrixIndex>(),
        )?;
        self.register::<Range<MatrixSize>>(
            TypeKey::plain(Entity::Range(RangeEnd::Size)),
            range_ops::<MatrixSize>(),
        )?;
        self.register::<PcaControl>(TypeKey::plain(Entity::PcaControl), pca_control_ops())?;
        Ok(())
    }

    fn register_local_pca<T: Scalar>(&mut self) -> Result<()> {
        // Component types first; they are normally present already.
        self.register_local::<T>()?;
        self.register::<LocalPcaResult<T>>(
            TypeKey::local_pca_result(T::KIND),
            pca_result_ops::<ElMatrix<T>, ElMatrix<T>, ElMatrix<T, Column>, ElMatrix<T, Row>>(),
        )?;
        Ok(())
    }

    fn register_dist_pca<T: Scalar, D: Distribution>(&mut self) -> Result<()> {
        self.register_dist_entity::<T, D, General>(dist_ops::<T, D, General>())?;
        self.register_dist_vector::<T, MdStar, Column>()?;
        self.register_dist_vector::<T, StarVc, Row>()?;
        self.register::<DistPcaResult<T, D>>(
            TypeKey::dist_pca_result(T::KIND, D::DESCRIPTOR),
            pca_result_ops::<
                DistMatrix<T, D>,
                DistMatrix<T, D>,
                DistColumnVector<T, MdStar>,
                DistRowVector<T, StarVc>,
            >(),
        )?;
        Ok(())
    }

    /// Register every compiled type in stable order.
    pub fn register_defaults(&mut self) -> Result<()> {
        let mut locals = ScalarPass {
            builder: self,
            result: Ok(()),
            step: Step::Local,
        };
        for_each_scalar(&mut locals);
        locals.result?;

        let mut tags = DistributionTags {
            builder: self,
            result: Ok(()),
        };
        for_each_distribution(&mut tags);
        tags.result?;

        for step in [Step::Distributed, Step::LocalPca, Step::DistPca] {
            let mut pass = ScalarPass {
                builder: self,
                result: Ok(()),
                step,
            };
            for_each_scalar(&mut pass);
            pass.result?;
            if step == Step::Distributed {
                self.register_helpers()?;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Registry {
        tracing::debug!(
            entries = self.entries.len(),
            factories = self.dispatch.len(),
            "registry built"
        );
        Registry {
            entries: self.entries,
            by_key: self.by_key,
            by_name: self.by_name,
            dispatch: self.dispatch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Local,
    Distributed,
    LocalPca,
    DistPca,
}

struct ScalarPass<'a> {
    builder: &'a mut RegistryBuilder,
    result: Result<()>,
    step: Step,
}

impl ScalarVisitor for ScalarPass<'_> {
    fn visit<T: Scalar>(&mut self) {
        if self.result.is_err() {
            return;
        }
        self.result = match self.step {
            Step::Local => self.builder.register_local::<T>(),
            Step::LocalPca => self.builder.register_local_pca::<T>(),
            Step::Distributed | Step::DistPca => {
                let mut pass = DistributionPass::<T> {
                    builder: &mut *self.builder,
                    result: Ok(()),
                    step: self.step,
                    _scalar: PhantomData,
                };
                for_each_distribution(&mut pass);
                pass.result
            }
        };
    }
}

/// Registers the value type of every supported distribution.
struct DistributionTags<'a> {
    builder: &'a mut RegistryBuilder,
    result: Result<()>,
}

impl DistributionVisitor for DistributionTags<'_> {
    fn visit<D: Distribution>(&mut self) {
        if self.result.is_ok() {
            self.result = self
                .builder
                .register::<MatrixDistribution<D>>(
                    TypeKey::matrix_distribution(D::DESCRIPTOR),
                    distribution_ops::<D>(),
                )
                .map(|_| ());
        }
    }
}

/// Walks the distributions for scalar `T`.
struct DistributionPass<'a, T> {
    builder: &'a mut RegistryBuilder,
    result: Result<()>,
    step: Step,
    _scalar: PhantomData<T>,
}

impl<T: Scalar> DistributionVisitor for DistributionPass<'_, T> {
    fn visit<D: Distribution>(&mut self) {
        if self.result.is_err() {
            return;
        }
        self.result = match self.step {
            Step::DistPca => self.builder.register_dist_pca::<T, D>(),
            _ => self.builder.register_distributed::<T, D>(),
        };
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Every registered type plus the distribution dispatch table.
///
/// Immutable once built.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<TypeKeyEntry>,
    by_key: HashMap<TypeKey, usize>,
    by_name: HashMap<String, usize>,
    dispatch: DispatchTable,
}

static GLOBAL: OnceCell<Registry> = OnceCell::new();

impl Registry {
    /// The process-wide registry, built on first use.
    pub fn global() -> Result<&'static Registry> {
        GLOBAL.get_or_try_init(Registry::build)
    }

    /// Build a fresh registry of every compiled type.
    pub fn build() -> Result<Registry> {
        let mut builder = RegistryBuilder::new();
        builder.register_defaults()?;
        Ok(builder.finish())
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[TypeKeyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, key: &TypeKey) -> Option<&TypeKeyEntry> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    pub fn entry_by_name(&self, name: &str) -> Option<&TypeKeyEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// The entry an object was registered under.
    ///
    /// The object's key selects the entry; its native type must be the
    /// entry's type.
    pub fn entry_of(&self, obj: &Object) -> Result<&TypeKeyEntry> {
        let entry = self
            .entry(obj.key())
            .ok_or_else(|| BridgeError::NotRegistered {
                name: obj.key().to_string(),
            })?;
        if entry.type_id != obj.value_type_id() {
            return Err(BridgeError::TypeMismatch {
                expected: entry.rust_type.to_string(),
                found: obj.key().to_string(),
            });
        }
        Ok(entry)
    }

    #[inline]
    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distbridge_traits::{Dist, DistWrap, DistributionDescriptor, McMr, ScalarKind, StarStar};

    #[test]
    fn test_register_twice_is_noop() {
        let mut b = RegistryBuilder::new();
        let key = TypeKey::plain(Entity::MatrixIndex);
        assert_eq!(
            b.register::<MatrixIndex>(key, index_ops()).unwrap(),
            Registration::Added
        );
        assert_eq!(
            b.register::<MatrixIndex>(key, index_ops()).unwrap(),
            Registration::AlreadyRegistered
        );
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_key_taken_by_other_type() {
        let mut b = RegistryBuilder::new();
        let key = TypeKey::plain(Entity::MatrixIndex);
        b.register::<MatrixIndex>(key, index_ops()).unwrap();
        let err = b.register::<MatrixSize>(key, size_ops()).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateRegistration { .. }));
    }

    #[test]
    fn test_unrepresentable_key() {
        let mut b = RegistryBuilder::new();
        let block = DistributionDescriptor::new(Dist::Circ, Dist::Circ, DistWrap::Block);
        let err = b
            .register::<()>(TypeKey::matrix_distribution(block), Operations::default())
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnrepresentableType { .. }));
        assert!(b.is_empty());
    }

    #[test]
    fn test_defaults() {
        let registry = Registry::build().unwrap();
        let scalars = ScalarKind::enabled().len();
        let dists = distbridge_traits::SUPPORTED_DISTRIBUTIONS.len();
        // local x const, distributions, distributed, helpers, PCA results
        let expected = scalars * 6 + dists + scalars * dists * 3 + 5 + scalars + scalars * dists;
        assert_eq!(registry.len(), expected);
        assert_eq!(registry.dispatch().len(), scalars * dists * 3);

        let entry = registry
            .entry(&TypeKey::distributed(
                EntityKind::Matrix,
                ScalarKind::F64,
                StarStar::DESCRIPTOR,
            ))
            .unwrap();
        assert_eq!(entry.name(), "ElDistMatrix_F64_STAR_STAR_ELEMENT");
        assert_eq!(entry.type_id(), TypeId::of::<DistMatrix<f64, StarStar>>());
        assert!(registry.entry_by_name("ElMatrix_F64_Const").is_some());
        assert!(registry.entry_by_name("MatrixDistribution_MC_MR_ELEMENT").is_some());
        assert!(registry
            .entry_by_name("PcaResult_ElDistMatrix_F32_MC_MR_ELEMENT_ElDistMatrix_F32_MC_MR_ELEMENT_ElDistColumnVector_F32_MD_STAR_ELEMENT_ElDistRowVector_F32_STAR_VC_ELEMENT")
            .is_some());
    }

    #[test]
    fn test_entry_of_checks_type() {
        let registry = Registry::build().unwrap();
        let obj = Object::new(ElMatrix::<i32>::new(2, 2).locked_view());
        let entry = registry.entry_of(&obj).unwrap();
        assert_eq!(entry.name(), "ElMatrix_I32_Const");
        assert!(entry.ops().construct.is_none());

        let dist = Object::new(MatrixDistribution::<McMr>::new());
        assert_eq!(
            registry.entry_of(&dist).unwrap().template_name(),
            "matrix_distribution<MC,MR,ELEMENT>"
        );
    }
}
