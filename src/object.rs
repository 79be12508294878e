//! Host-visible values.
//!
//! An [`Object`] is what a dynamically typed caller holds: a reference
//! counted native value plus the key of its registered type. Cloning an
//! object clones the reference, never the value.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::rc::Rc;

use distbridge_engine::{DistColumnVector, DistMatrix, DistRowVector};
use distbridge_traits::{Distribution, MdStar, Scalar, ScalarTypeDescriptor, StarVc};
use distbridge_view::{ElColumnVector, ElMatrix, ElRowVector, MatrixSize, Owner, Shape};

use crate::entity::{
    Entity, MatrixDistribution, MatrixIndex, PcaControl, PcaResult, Range, RangeEnd, TypeKey,
};
use crate::{BridgeError, Result};

/// A native type that can be handed to the host.
pub trait Native: Any {
    /// Key of the registered type this value is exposed as.
    fn type_key(&self) -> TypeKey;
}

/// Duplicate a handle without copying the data behind it.
pub trait Share {
    fn share(&self) -> Self;
}

/// PCA result over local matrices and vectors.
pub type LocalPcaResult<T> =
    PcaResult<ElMatrix<T>, ElMatrix<T>, ElColumnVector<T>, ElRowVector<T>>;

/// PCA result over distributed matrices and vectors.
pub type DistPcaResult<T, D> = PcaResult<
    DistMatrix<T, D>,
    DistMatrix<T, D>,
    DistColumnVector<T, MdStar>,
    DistRowVector<T, StarVc>,
>;

impl<T: Scalar, S: Shape> Native for ElMatrix<T, S> {
    /// Locked matrices are exposed as their const-qualified variant.
    fn type_key(&self) -> TypeKey {
        TypeKey::local(S::ENTITY, ScalarTypeDescriptor::new(T::KIND, self.locked()))
    }
}

impl<T: Scalar, S: Shape> Share for ElMatrix<T, S> {
    fn share(&self) -> Self {
        self.view()
    }
}

impl<T: Scalar, D: Distribution, S: Shape> Native for DistMatrix<T, D, S> {
    fn type_key(&self) -> TypeKey {
        TypeKey::distributed(S::ENTITY, T::KIND, D::DESCRIPTOR)
    }
}

impl<T: Scalar, D: Distribution, S: Shape> Share for DistMatrix<T, D, S> {
    fn share(&self) -> Self {
        self.view()
    }
}

impl<D: Distribution> Native for MatrixDistribution<D> {
    fn type_key(&self) -> TypeKey {
        TypeKey::matrix_distribution(D::DESCRIPTOR)
    }
}

impl Native for MatrixIndex {
    fn type_key(&self) -> TypeKey {
        TypeKey::plain(Entity::MatrixIndex)
    }
}

impl Native for MatrixSize {
    fn type_key(&self) -> TypeKey {
        TypeKey::plain(Entity::MatrixSize)
    }
}

impl Native for Range<MatrixIndex> {
    fn type_key(&self) -> TypeKey {
        TypeKey::plain(Entity::Range(RangeEnd::Index))
    }
}

impl Native for Range<MatrixSize> {
    fn type_key(&self) -> TypeKey {
        TypeKey::plain(Entity::Range(RangeEnd::Size))
    }
}

impl Native for PcaControl {
    fn type_key(&self) -> TypeKey {
        TypeKey::plain(Entity::PcaControl)
    }
}

impl<T: Scalar> Native for LocalPcaResult<T> {
    fn type_key(&self) -> TypeKey {
        TypeKey::local_pca_result(T::KIND)
    }
}

impl<T: Scalar, D: Distribution> Native for DistPcaResult<T, D> {
    fn type_key(&self) -> TypeKey {
        TypeKey::dist_pca_result(T::KIND, D::DESCRIPTOR)
    }
}

// ============================================================================
// Object
// ============================================================================

/// A reference-counted native value tagged with its type key.
#[derive(Clone)]
pub struct Object {
    key: TypeKey,
    value: Rc<dyn Any>,
}

impl Object {
    pub fn new<V: Native>(value: V) -> Self {
        Self {
            key: value.type_key(),
            value: Rc::new(value),
        }
    }

    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// `TypeId` of the wrapped native value.
    pub fn value_type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    /// Borrow the native value as `V`.
    pub fn downcast<V: Any>(&self) -> Result<&V> {
        self.value
            .downcast_ref::<V>()
            .ok_or_else(|| BridgeError::TypeMismatch {
                expected: type_name::<V>().to_string(),
                found: self.key.to_string(),
            })
    }

    pub fn is<V: Any>(&self) -> bool {
        self.value.is::<V>()
    }

    /// An owner handle keeping this object's value alive.
    pub fn anchor(&self) -> Owner {
        Owner::from_rc(Rc::clone(&self.value))
    }

    /// Number of strong references to the value, this one included.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.value)
    }

    /// Whether both objects refer to the same value.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("key", &format_args!("{}", self.key))
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Value of an attribute read through the host API.
#[derive(Debug, Clone)]
pub enum Attr {
    Object(Object),
    Index(usize),
    Flag(bool),
}

impl Attr {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Attr::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Attr::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Object> {
        match self {
            Attr::Object(o) => Some(o),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distbridge_traits::ScalarKind;
    use distbridge_view::EntityKind;

    #[test]
    fn test_object_key_follows_lock() {
        let m = ElMatrix::<f64>::new(2, 2);
        let mutable = Object::new(m.view());
        let locked = Object::new(m.locked_view());
        assert_eq!(
            mutable.key(),
            &TypeKey::local(EntityKind::Matrix, ScalarTypeDescriptor::mutable(ScalarKind::F64))
        );
        assert!(locked.key().scalar.unwrap().is_const());
        assert_eq!(mutable.value_type_id(), locked.value_type_id());
        assert_eq!(mutable.value_type_id(), TypeId::of::<ElMatrix<f64>>());
    }

    #[test]
    fn test_downcast() {
        let o = Object::new(MatrixIndex::new(1, 2));
        assert!(o.is::<MatrixIndex>());
        assert_eq!(o.downcast::<MatrixIndex>().unwrap().j, 2);
        let err = o.downcast::<MatrixSize>().unwrap_err();
        assert!(matches!(err, BridgeError::TypeMismatch { .. }));
        assert!(err.to_string().contains("matrix_index<usize,usize>"));
    }

    #[test]
    fn test_anchor_shares_value() {
        let o = Object::new(PcaControl::default());
        let copy = o.clone();
        assert!(o.ptr_eq(&copy));
        let anchor = o.anchor();
        assert_eq!(o.ref_count(), 3);
        drop(anchor);
        drop(copy);
        assert_eq!(o.ref_count(), 1);
    }
}
