//! Operation sets bound to registered types.
//!
//! Every registry entry carries an [`Operations`] table of plain function
//! pointers, each a monomorphized instance for the entry's native type. A
//! missing pointer means the type does not support that operation.

use std::fmt;
use std::rc::Rc;

use distbridge_engine::{DistMatrix, Grid};
use distbridge_traits::{
    for_each_distribution, Distribution, DistributionDescriptor, DistributionVisitor, Scalar,
    ScalarTypeDescriptor,
};
use distbridge_view::{
    array_from_matrix, matrix_from_array, Access, DynArray, ElMatrix, MatrixSize, Shape,
    VectorShape,
};

use crate::entity::{
    Entity, MatrixDistribution, MatrixIndex, PcaControl, PcaResult, Range, RangeEnd, TypeKey,
};
use crate::object::{Attr, Native, Object, Share};
use crate::{BridgeError, Result};

/// Arguments of a host-side constructor call.
#[derive(Debug, Clone, Copy)]
pub enum CtorArgs<'a> {
    Empty,
    Size {
        height: usize,
        width: usize,
    },
    Length(usize),
    Grid {
        grid: &'a Rc<Grid>,
        height: usize,
        width: usize,
    },
    GridLength {
        grid: &'a Rc<Grid>,
        length: usize,
    },
    Index {
        i: usize,
        j: usize,
    },
    Range {
        first: &'a Object,
        last: &'a Object,
    },
    Flags {
        economy: bool,
        center: bool,
        normalize: bool,
    },
    /// `coeff`, `score`, `latent`, `mean`.
    Parts(&'a [Object; 4]),
}

pub type ConstructFn = fn(&CtorArgs<'_>) -> Result<Object>;
pub type SizeFn = fn(&Object) -> Result<MatrixSize>;
pub type LengthFn = fn(&Object) -> Result<usize>;
pub type ParticipatingFn = fn(&Object) -> Result<bool>;
pub type LocalFn = fn(&Object) -> Result<Object>;
pub type CopyFn = fn(&Object, DistributionDescriptor) -> Result<Object>;
pub type ViewFromArrayFn = fn(&DynArray, Access) -> Result<Object>;
pub type ViewToArrayFn = fn(&Object) -> Result<DynArray>;
pub type AttrFn = fn(&Object, &str) -> Result<Attr>;

/// Entry points bound to one registered type.
#[derive(Clone, Copy, Default)]
pub struct Operations {
    pub construct: Option<ConstructFn>,
    pub size: Option<SizeFn>,
    pub length: Option<LengthFn>,
    pub participating: Option<ParticipatingFn>,
    /// Local part as a value of the entity's own shape.
    pub local: Option<LocalFn>,
    /// Local part as a general matrix.
    pub local_matrix: Option<LocalFn>,
    pub copy: Option<CopyFn>,
    pub view_from_array: Option<ViewFromArrayFn>,
    pub view_to_array: Option<ViewToArrayFn>,
    pub attr: Option<AttrFn>,
}

impl Operations {
    /// Names of the operations present, in field order.
    pub fn names(&self) -> Vec<&'static str> {
        let present = [
            ("construct", self.construct.is_some()),
            ("size", self.size.is_some()),
            ("length", self.length.is_some()),
            ("participating", self.participating.is_some()),
            ("local", self.local.is_some()),
            ("local_matrix", self.local_matrix.is_some()),
            ("copy", self.copy.is_some()),
            ("view_from_array", self.view_from_array.is_some()),
            ("view_to_array", self.view_to_array.is_some()),
            ("attr", self.attr.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect()
    }
}

impl fmt::Debug for Operations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn invalid(key: TypeKey, expected: &'static str) -> BridgeError {
    BridgeError::InvalidArguments {
        type_name: key.to_string(),
        expected,
    }
}

fn no_attr(obj: &Object, attr: &str) -> BridgeError {
    BridgeError::NoSuchAttribute {
        type_name: obj.key().to_string(),
        attr: attr.to_string(),
    }
}

// ============================================================================
// Local matrices and vectors
// ============================================================================

fn local_key<T: Scalar, S: Shape>() -> TypeKey {
    TypeKey::local(S::ENTITY, ScalarTypeDescriptor::mutable(T::KIND))
}

fn construct_local<T: Scalar, S: Shape>(args: &CtorArgs<'_>) -> Result<Object> {
    match *args {
        CtorArgs::Size { height, width } => Ok(Object::new(ElMatrix::<T, S>::zeros(height, width)?)),
        _ => Err(invalid(local_key::<T, S>(), "(height, width)")),
    }
}

fn construct_local_vector<T: Scalar, S: VectorShape>(args: &CtorArgs<'_>) -> Result<Object> {
    match *args {
        CtorArgs::Length(length) => Ok(Object::new(ElMatrix::<T, S>::with_length(length))),
        CtorArgs::Size { .. } => construct_local::<T, S>(args),
        _ => Err(invalid(local_key::<T, S>(), "(length) or (height, width)")),
    }
}

fn local_size<T: Scalar, S: Shape>(obj: &Object) -> Result<MatrixSize> {
    Ok(obj.downcast::<ElMatrix<T, S>>()?.size())
}

fn local_length<T: Scalar, S: VectorShape>(obj: &Object) -> Result<usize> {
    Ok(obj.downcast::<ElMatrix<T, S>>()?.length())
}

fn view_local<T: Scalar, S: Shape>(array: &DynArray, access: Access) -> Result<Object> {
    let array = array
        .as_array::<T>()
        .ok_or_else(|| BridgeError::TypeMismatch {
            expected: T::KIND.to_string(),
            found: array.kind().to_string(),
        })?;
    Ok(Object::new(matrix_from_array::<T, S>(array, access)?))
}

fn view_local_locked<T: Scalar, S: Shape>(array: &DynArray, _access: Access) -> Result<Object> {
    view_local::<T, S>(array, Access::ReadOnly)
}

fn local_to_array<T: Scalar, S: Shape>(obj: &Object) -> Result<DynArray> {
    let view = obj.downcast::<ElMatrix<T, S>>()?;
    let array = array_from_matrix(view, Some(obj.anchor()));
    DynArray::from_array(array).ok_or_else(|| BridgeError::UnsupportedOperation {
        type_name: obj.key().to_string(),
        operation: "view_to_array",
    })
}

fn local_attr<T: Scalar, S: Shape>(obj: &Object, attr: &str) -> Result<Attr> {
    let m = obj.downcast::<ElMatrix<T, S>>()?;
    match attr {
        "height" => Ok(Attr::Index(m.height())),
        "width" => Ok(Attr::Index(m.width())),
        "ldim" => Ok(Attr::Index(m.ldim())),
        "locked" => Ok(Attr::Flag(m.locked())),
        _ => Err(no_attr(obj, attr)),
    }
}

/// Operations of a local matrix, or of a vector when called through
/// [`local_vector_ops`].
pub fn local_ops<T: Scalar, S: Shape>(is_const: bool) -> Operations {
    Operations {
        construct: (!is_const).then_some(construct_local::<T, S> as ConstructFn),
        size: Some(local_size::<T, S>),
        view_from_array: Some(if is_const {
            view_local_locked::<T, S> as ViewFromArrayFn
        } else {
            view_local::<T, S>
        }),
        view_to_array: Some(local_to_array::<T, S>),
        attr: Some(local_attr::<T, S>),
        ..Operations::default()
    }
}

pub fn local_vector_ops<T: Scalar, S: VectorShape>(is_const: bool) -> Operations {
    Operations {
        construct: (!is_const).then_some(construct_local_vector::<T, S> as ConstructFn),
        length: Some(local_length::<T, S>),
        ..local_ops::<T, S>(is_const)
    }
}

// ============================================================================
// Distributed matrices and vectors
// ============================================================================

fn dist_key<T: Scalar, D: Distribution, S: Shape>() -> TypeKey {
    TypeKey::distributed(S::ENTITY, T::KIND, D::DESCRIPTOR)
}

fn construct_dist<T: Scalar, D: Distribution, S: Shape>(args: &CtorArgs<'_>) -> Result<Object> {
    match *args {
        CtorArgs::Grid {
            grid,
            height,
            width,
        } => Ok(Object::new(DistMatrix::<T, D, S>::new(grid, height, width)?)),
        _ => Err(invalid(dist_key::<T, D, S>(), "(grid, height, width)")),
    }
}

fn construct_dist_vector<T: Scalar, D: Distribution, S: VectorShape>(
    args: &CtorArgs<'_>,
) -> Result<Object> {
    match *args {
        CtorArgs::GridLength { grid, length } => {
            Ok(Object::new(DistMatrix::<T, D, S>::with_length(grid, length)?))
        }
        CtorArgs::Grid { .. } => construct_dist::<T, D, S>(args),
        _ => Err(invalid(
            dist_key::<T, D, S>(),
            "(grid, length) or (grid, height, width)",
        )),
    }
}

fn dist_size<T: Scalar, D: Distribution, S: Shape>(obj: &Object) -> Result<MatrixSize> {
    Ok(obj.downcast::<DistMatrix<T, D, S>>()?.size())
}

fn dist_length<T: Scalar, D: Distribution, S: VectorShape>(obj: &Object) -> Result<usize> {
    Ok(obj.downcast::<DistMatrix<T, D, S>>()?.length())
}

fn dist_participating<T: Scalar, D: Distribution, S: Shape>(obj: &Object) -> Result<bool> {
    Ok(obj.downcast::<DistMatrix<T, D, S>>()?.participating())
}

fn dist_local<T: Scalar, D: Distribution, S: Shape>(obj: &Object) -> Result<Object> {
    Ok(Object::new(obj.downcast::<DistMatrix<T, D, S>>()?.local()?))
}

fn dist_local_matrix<T: Scalar, D: Distribution, S: Shape>(obj: &Object) -> Result<Object> {
    Ok(Object::new(
        obj.downcast::<DistMatrix<T, D, S>>()?.local_matrix(),
    ))
}

/// Runs the redistribution whose target marker matches `target`.
struct Redistribute<'a, T: Scalar, D: Distribution, S: Shape> {
    source: &'a DistMatrix<T, D, S>,
    target: DistributionDescriptor,
    result: Option<Result<Object>>,
}

impl<T: Scalar, D: Distribution, S: Shape> DistributionVisitor for Redistribute<'_, T, D, S> {
    fn visit<D2: Distribution>(&mut self) {
        if self.result.is_none() && D2::DESCRIPTOR == self.target {
            self.result = Some(
                self.source
                    .redistribute::<D2>()
                    .map(Object::new)
                    .map_err(BridgeError::from),
            );
        }
    }
}

fn dist_copy<T: Scalar, D: Distribution, S: Shape>(
    obj: &Object,
    target: DistributionDescriptor,
) -> Result<Object> {
    let mut visitor = Redistribute {
        source: obj.downcast::<DistMatrix<T, D, S>>()?,
        target,
        result: None,
    };
    for_each_distribution(&mut visitor);
    visitor
        .result
        .unwrap_or(Err(BridgeError::DistributionNotSupported {
            distribution: target,
        }))
}

fn dist_attr<T: Scalar, D: Distribution, S: Shape>(obj: &Object, attr: &str) -> Result<Attr> {
    let m = obj.downcast::<DistMatrix<T, D, S>>()?;
    match attr {
        "height" => Ok(Attr::Index(m.height())),
        "width" => Ok(Attr::Index(m.width())),
        "participating" => Ok(Attr::Flag(m.participating())),
        "locked" => Ok(Attr::Flag(m.locked())),
        "distribution" => Ok(Attr::Object(Object::new(MatrixDistribution::<D>::new()))),
        _ => Err(no_attr(obj, attr)),
    }
}

pub fn dist_ops<T: Scalar, D: Distribution, S: Shape>() -> Operations {
    Operations {
        construct: Some(construct_dist::<T, D, S>),
        size: Some(dist_size::<T, D, S>),
        participating: Some(dist_participating::<T, D, S>),
        local: Some(dist_local::<T, D, S>),
        local_matrix: Some(dist_local_matrix::<T, D, S>),
        copy: Some(dist_copy::<T, D, S>),
        attr: Some(dist_attr::<T, D, S>),
        ..Operations::default()
    }
}

pub fn dist_vector_ops<T: Scalar, D: Distribution, S: VectorShape>() -> Operations {
    Operations {
        construct: Some(construct_dist_vector::<T, D, S>),
        length: Some(dist_length::<T, D, S>),
        ..dist_ops::<T, D, S>()
    }
}

// ============================================================================
// Helper entities
// ============================================================================

fn construct_distribution<D: Distribution>(args: &CtorArgs<'_>) -> Result<Object> {
    match args {
        CtorArgs::Empty => Ok(Object::new(MatrixDistribution::<D>::new())),
        _ => Err(invalid(TypeKey::matrix_distribution(D::DESCRIPTOR), "()")),
    }
}

pub fn distribution_ops<D: Distribution>() -> Operations {
    Operations {
        construct: Some(construct_distribution::<D>),
        ..Operations::default()
    }
}

fn construct_index(args: &CtorArgs<'_>) -> Result<Object> {
    match *args {
        CtorArgs::Index { i, j } => Ok(Object::new(MatrixIndex::new(i, j))),
        _ => Err(invalid(TypeKey::plain(Entity::MatrixIndex), "(i, j)")),
    }
}

fn index_attr(obj: &Object, attr: &str) -> Result<Attr> {
    let index = obj.downcast::<MatrixIndex>()?;
    match attr {
        "i" => Ok(Attr::Index(index.i)),
        "j" => Ok(Attr::Index(index.j)),
        _ => Err(no_attr(obj, attr)),
    }
}

pub fn index_ops() -> Operations {
    Operations {
        construct: Some(construct_index),
        attr: Some(index_attr),
        ..Operations::default()
    }
}

fn construct_size(args: &CtorArgs<'_>) -> Result<Object> {
    match *args {
        CtorArgs::Size { height, width } => Ok(Object::new(MatrixSize::new(height, width))),
        _ => Err(invalid(TypeKey::plain(Entity::MatrixSize), "(m, n)")),
    }
}

fn size_attr(obj: &Object, attr: &str) -> Result<Attr> {
    let size = obj.downcast::<MatrixSize>()?;
    match attr {
        "m" => Ok(Attr::Index(size.m)),
        "n" => Ok(Attr::Index(size.n)),
        _ => Err(no_attr(obj, attr)),
    }
}

pub fn size_ops() -> Operations {
    Operations {
        construct: Some(construct_size),
        attr: Some(size_attr),
        ..Operations::default()
    }
}

fn construct_range<L>(args: &CtorArgs<'_>) -> Result<Object>
where
    L: Copy + 'static,
    Range<L>: Native,
{
    match *args {
        CtorArgs::Range { first, last } => Ok(Object::new(Range::new(
            *first.downcast::<MatrixIndex>()?,
            *last.downcast::<L>()?,
        ))),
        _ => Err(invalid(
            TypeKey::plain(Entity::Range(RangeEnd::Index)),
            "(first, last)",
        )),
    }
}

fn range_attr<L>(obj: &Object, attr: &str) -> Result<Attr>
where
    L: Native + Copy,
    Range<L>: Native,
{
    let range = obj.downcast::<Range<L>>()?;
    match attr {
        "first" => Ok(Attr::Object(Object::new(range.first))),
        "last" => Ok(Attr::Object(Object::new(range.last))),
        _ => Err(no_attr(obj, attr)),
    }
}

pub fn range_ops<L>() -> Operations
where
    L: Native + Copy,
    Range<L>: Native,
{
    Operations {
        construct: Some(construct_range::<L>),
        attr: Some(range_attr::<L>),
        ..Operations::default()
    }
}

fn construct_pca_control(args: &CtorArgs<'_>) -> Result<Object> {
    match *args {
        CtorArgs::Flags {
            economy,
            center,
            normalize,
        } => Ok(Object::new(PcaControl {
            economy,
            center,
            normalize,
        })),
        _ => Err(invalid(
            TypeKey::plain(Entity::PcaControl),
            "(economy, center, normalize)",
        )),
    }
}

fn pca_control_attr(obj: &Object, attr: &str) -> Result<Attr> {
    let control = obj.downcast::<PcaControl>()?;
    match attr {
        "economy" => Ok(Attr::Flag(control.economy)),
        "center" => Ok(Attr::Flag(control.center)),
        "normalize" => Ok(Attr::Flag(control.normalize)),
        _ => Err(no_attr(obj, attr)),
    }
}

pub fn pca_control_ops() -> Operations {
    Operations {
        construct: Some(construct_pca_control),
        attr: Some(pca_control_attr),
        ..Operations::default()
    }
}

fn construct_pca_result<C, S, L, M>(args: &CtorArgs<'_>) -> Result<Object>
where
    C: Native + Share,
    S: Native + Share,
    L: Native + Share,
    M: Native + Share,
    PcaResult<C, S, L, M>: Native,
{
    match args {
        CtorArgs::Parts([coeff, score, latent, mean]) => Ok(Object::new(PcaResult {
            coeff: coeff.downcast::<C>()?.share(),
            score: score.downcast::<S>()?.share(),
            latent: latent.downcast::<L>()?.share(),
            mean: mean.downcast::<M>()?.share(),
        })),
        _ => Err(BridgeError::InvalidArguments {
            type_name: std::any::type_name::<PcaResult<C, S, L, M>>().to_string(),
            expected: "(coeff, score, latent, mean)",
        }),
    }
}

fn pca_result_attr<C, S, L, M>(obj: &Object, attr: &str) -> Result<Attr>
where
    C: Native + Share,
    S: Native + Share,
    L: Native + Share,
    M: Native + Share,
    PcaResult<C, S, L, M>: Native,
{
    let result = obj.downcast::<PcaResult<C, S, L, M>>()?;
    let part = match attr {
        "coeff" => Object::new(result.coeff.share()),
        "score" => Object::new(result.score.share()),
        "latent" => Object::new(result.latent.share()),
        "mean" => Object::new(result.mean.share()),
        _ => return Err(no_attr(obj, attr)),
    };
    Ok(Attr::Object(part))
}

pub fn pca_result_ops<C, S, L, M>() -> Operations
where
    C: Native + Share,
    S: Native + Share,
    L: Native + Share,
    M: Native + Share,
    PcaResult<C, S, L, M>: Native,
{
    Operations {
        construct: Some(construct_pca_result::<C, S, L, M>),
        attr: Some(pca_result_attr::<C, S, L, M>),
        ..Operations::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distbridge_engine::Comm;
    use distbridge_traits::{McMr, StarStar, SUPPORTED_DISTRIBUTIONS};
    use distbridge_view::{Column, General, HostArray, Order};

    fn grid() -> Rc<Grid> {
        Rc::new(Grid::new(Comm::world()))
    }

    #[test]
    fn test_operation_names() {
        let ops = local_ops::<f64, General>(true);
        assert_eq!(
            ops.names(),
            vec!["size", "view_from_array", "view_to_array", "attr"]
        );
        let ops = dist_vector_ops::<i32, McMr, Column>();
        assert!(ops.names().contains(&"length"));
        assert!(ops.names().contains(&"copy"));
        assert_eq!(format!("{:?}", Operations::default()), "[]");
    }

    #[test]
    fn test_local_construct_and_attrs() {
        let ops = local_vector_ops::<u32, Column>(false);
        let construct = ops.construct.unwrap();
        let v = construct(&CtorArgs::Length(4)).unwrap();
        assert_eq!((ops.length.unwrap())(&v).unwrap(), 4);
        assert_eq!((ops.size.unwrap())(&v).unwrap(), MatrixSize::new(4, 1));
        assert!(construct(&CtorArgs::Size { height: 2, width: 2 }).is_err());
        let err = construct(&CtorArgs::Empty).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));

        let attr = ops.attr.unwrap();
        assert_eq!(attr(&v, "height").unwrap().as_index(), Some(4));
        assert_eq!(attr(&v, "locked").unwrap().as_flag(), Some(false));
        assert!(matches!(
            attr(&v, "depth"),
            Err(BridgeError::NoSuchAttribute { .. })
        ));
    }

    #[test]
    fn test_const_view_is_locked() {
        let ops = local_ops::<f32, General>(true);
        let array: DynArray = HostArray::<f32>::zeros(&[2, 3], Order::F).into();
        let obj = (ops.view_from_array.unwrap())(&array, Access::Inherit).unwrap();
        assert!(obj.key().scalar.unwrap().is_const());
        let back = (ops.view_to_array.unwrap())(&obj).unwrap();
        assert!(!back.is_writeable());

        let wrong: DynArray = HostArray::<f64>::zeros(&[2, 3], Order::F).into();
        assert!(matches!(
            (ops.view_from_array.unwrap())(&wrong, Access::Inherit),
            Err(BridgeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_dist_copy_to_every_distribution() {
        let g = grid();
        let ops = dist_ops::<f64, McMr, General>();
        let obj = (ops.construct.unwrap())(&CtorArgs::Grid {
            grid: &g,
            height: 3,
            width: 2,
        })
        .unwrap();
        for &target in SUPPORTED_DISTRIBUTIONS {
            let copy = (ops.copy.unwrap())(&obj, target).unwrap();
            assert_eq!(copy.key().distribution, Some(target));
            assert!(!copy.ptr_eq(&obj));
        }
        let local = (ops.local.unwrap())(&obj).unwrap();
        assert!(local.is::<ElMatrix<f64, General>>());
        let dist = (ops.attr.unwrap())(&obj, "distribution")
            .unwrap()
            .into_object()
            .unwrap();
        assert!(dist.is::<MatrixDistribution<McMr>>());
    }

    #[test]
    fn test_helper_entities() {
        let first = (index_ops().construct.unwrap())(&CtorArgs::Index { i: 1, j: 2 }).unwrap();
        let last = (size_ops().construct.unwrap())(&CtorArgs::Size {
            height: 3,
            width: 4,
        })
        .unwrap();
        let ops = range_ops::<MatrixSize>();
        let range = (ops.construct.unwrap())(&CtorArgs::Range {
            first: &first,
            last: &last,
        })
        .unwrap();
        assert_eq!(
            range.downcast::<Range<MatrixSize>>().unwrap().end(),
            MatrixIndex::new(4, 6)
        );
        let back = (ops.attr.unwrap())(&range, "last")
            .unwrap()
            .into_object()
            .unwrap();
        assert_eq!(*back.downcast::<MatrixSize>().unwrap(), MatrixSize::new(3, 4));

        // A range ending in an index rejects a size.
        let err = (range_ops::<MatrixIndex>().construct.unwrap())(&CtorArgs::Range {
            first: &first,
            last: &last,
        })
        .unwrap_err();
        assert!(matches!(err, BridgeError::TypeMismatch { .. }));

        let d = (distribution_ops::<StarStar>().construct.unwrap())(&CtorArgs::Empty).unwrap();
        assert_eq!(d.key().distribution, Some(StarStar::DESCRIPTOR));
    }
}
