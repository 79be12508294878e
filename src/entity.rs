//! Entities and the type keys that identify their registered variants.
//!
//! A [`TypeKey`] is the run-time spelling of one compiled type: an entity
//! plus, where the entity is generic over them, a scalar descriptor and a
//! distribution. Its template name (`el_matrix<f64 const>`) is the input to
//! [`identifier`](crate::naming::identifier).

use std::fmt;
use std::marker::PhantomData;

use distbridge_traits::{
    Dist, DistWrap, Distribution, DistributionDescriptor, ScalarKind, ScalarTypeDescriptor,
};
use distbridge_view::{EntityKind, MatrixSize};

/// Whether an entity lives on one process or over a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    Local,
    Distributed,
}

/// Type of the `last` member of a [`Range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeEnd {
    Index,
    Size,
}

/// Every entity kind a key can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Local(EntityKind),
    Distributed(EntityKind),
    MatrixDistribution,
    MatrixIndex,
    MatrixSize,
    Range(RangeEnd),
    PcaControl,
    PcaResult(Locality),
}

fn dist_entity_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Matrix => "el_dist_matrix",
        EntityKind::ColumnVector => "el_dist_column_vector",
        EntityKind::RowVector => "el_dist_row_vector",
    }
}

/// Distribution of the `latent` member of a distributed PCA result.
pub const LATENT_DISTRIBUTION: DistributionDescriptor =
    DistributionDescriptor::new(Dist::Md, Dist::Star, DistWrap::Element);

/// Distribution of the `mean` member of a distributed PCA result.
pub const MEAN_DISTRIBUTION: DistributionDescriptor =
    DistributionDescriptor::new(Dist::Star, Dist::Vc, DistWrap::Element);

const INDEX_TEMPLATE: &str = "matrix_index<usize,usize>";
const SIZE_TEMPLATE: &str = "matrix_size<usize,usize>";

/// Identity of one registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub entity: Entity,
    pub scalar: Option<ScalarTypeDescriptor>,
    pub distribution: Option<DistributionDescriptor>,
}

impl TypeKey {
    pub const fn new(
        entity: Entity,
        scalar: Option<ScalarTypeDescriptor>,
        distribution: Option<DistributionDescriptor>,
    ) -> Self {
        Self {
            entity,
            scalar,
            distribution,
        }
    }

    pub const fn local(kind: EntityKind, scalar: ScalarTypeDescriptor) -> Self {
        Self::new(Entity::Local(kind), Some(scalar), None)
    }

    pub const fn distributed(
        kind: EntityKind,
        scalar: ScalarKind,
        distribution: DistributionDescriptor,
    ) -> Self {
        Self::new(
            Entity::Distributed(kind),
            Some(ScalarTypeDescriptor::mutable(scalar)),
            Some(distribution),
        )
    }

    pub const fn matrix_distribution(distribution: DistributionDescriptor) -> Self {
        Self::new(Entity::MatrixDistribution, None, Some(distribution))
    }

    pub const fn plain(entity: Entity) -> Self {
        Self::new(entity, None, None)
    }

    pub const fn local_pca_result(scalar: ScalarKind) -> Self {
        Self::new(
            Entity::PcaResult(Locality::Local),
            Some(ScalarTypeDescriptor::mutable(scalar)),
            None,
        )
    }

    pub const fn dist_pca_result(scalar: ScalarKind, distribution: DistributionDescriptor) -> Self {
        Self::new(
            Entity::PcaResult(Locality::Distributed),
            Some(ScalarTypeDescriptor::mutable(scalar)),
            Some(distribution),
        )
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        self.scalar.map(ScalarTypeDescriptor::kind)
    }

    /// Template spelling of the type, or `None` if the parts do not form a
    /// type that can exist.
    pub fn template_name(&self) -> Option<String> {
        let supported = |d: DistributionDescriptor| d.is_supported().then_some(d);
        match (self.entity, self.scalar, self.distribution) {
            (Entity::Local(kind), Some(s), None) => Some(format!("{}<{}>", kind.name(), s)),
            (Entity::Distributed(kind), Some(s), Some(d)) if !s.is_const() => {
                let d = supported(d)?;
                Some(format!(
                    "{}<{},{}>",
                    dist_entity_name(kind),
                    s,
                    d.template_args()
                ))
            }
            (Entity::MatrixDistribution, None, Some(d)) => {
                Some(format!("matrix_distribution<{}>", supported(d)?.template_args()))
            }
            (Entity::MatrixIndex, None, None) => Some(INDEX_TEMPLATE.to_string()),
            (Entity::MatrixSize, None, None) => Some(SIZE_TEMPLATE.to_string()),
            (Entity::Range(end), None, None) => {
                let last = match end {
                    RangeEnd::Index => INDEX_TEMPLATE,
                    RangeEnd::Size => SIZE_TEMPLATE,
                };
                Some(format!("range<{INDEX_TEMPLATE},{last}>"))
            }
            (Entity::PcaControl, None, None) => Some("pca_control<bool,bool,bool>".to_string()),
            (Entity::PcaResult(Locality::Local), Some(s), None) if !s.is_const() => Some(format!(
                "pca_result<el_matrix<{s}>,el_matrix<{s}>,el_column_vector<{s}>,el_row_vector<{s}>>"
            )),
            (Entity::PcaResult(Locality::Distributed), Some(s), Some(d)) if !s.is_const() => {
                let args = supported(d)?.template_args();
                Some(format!(
                    "pca_result<el_dist_matrix<{s},{args}>,el_dist_matrix<{s},{args}>,\
                     el_dist_column_vector<{s},{}>,el_dist_row_vector<{s},{}>>",
                    LATENT_DISTRIBUTION.template_args(),
                    MEAN_DISTRIBUTION.template_args(),
                ))
            }
            _ => None,
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.template_name() {
            Some(name) => f.write_str(&name),
            None => write!(f, "{self:?}"),
        }
    }
}

// ============================================================================
// Helper entities
// ============================================================================

/// A `(row, column)` position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MatrixIndex {
    pub i: usize,
    pub j: usize,
}

impl MatrixIndex {
    pub const fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }
}

/// A block of a matrix from `first` up to `last`.
///
/// `last` is either the exclusive end index or the extent of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range<L> {
    pub first: MatrixIndex,
    pub last: L,
}

impl<L> Range<L> {
    pub const fn new(first: MatrixIndex, last: L) -> Self {
        Self { first, last }
    }
}

impl Range<MatrixSize> {
    /// End index of the block.
    pub fn end(&self) -> MatrixIndex {
        MatrixIndex::new(self.first.i + self.last.m, self.first.j + self.last.n)
    }
}

/// Options of a principal component analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PcaControl {
    pub economy: bool,
    pub center: bool,
    pub normalize: bool,
}

/// Output of a principal component analysis.
#[derive(Debug)]
pub struct PcaResult<C, S, L, M> {
    pub coeff: C,
    pub score: S,
    pub latent: L,
    pub mean: M,
}

/// A distribution as a value; the triple is fixed by `D`.
pub struct MatrixDistribution<D: Distribution>(PhantomData<D>);

impl<D: Distribution> MatrixDistribution<D> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    pub const fn descriptor(&self) -> DistributionDescriptor {
        D::DESCRIPTOR
    }
}

impl<D: Distribution> Default for MatrixDistribution<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Distribution> fmt::Debug for MatrixDistribution<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatrixDistribution{}", D::DESCRIPTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distbridge_traits::{McMr, StarStar};

    #[test]
    fn test_template_names() {
        let f64c = ScalarTypeDescriptor::constant(ScalarKind::F64);
        assert_eq!(
            TypeKey::local(EntityKind::Matrix, f64c).template_name().unwrap(),
            "el_matrix<f64 const>"
        );
        assert_eq!(
            TypeKey::distributed(EntityKind::Matrix, ScalarKind::F64, StarStar::DESCRIPTOR)
                .template_name()
                .unwrap(),
            "el_dist_matrix<f64,STAR,STAR,ELEMENT>"
        );
        assert_eq!(
            TypeKey::distributed(EntityKind::RowVector, ScalarKind::ComplexF32, McMr::DESCRIPTOR)
                .to_string(),
            "el_dist_row_vector<Complex<f32>,MC,MR,ELEMENT>"
        );
        assert_eq!(
            TypeKey::plain(Entity::Range(RangeEnd::Size)).template_name().unwrap(),
            "range<matrix_index<usize,usize>,matrix_size<usize,usize>>"
        );
        assert_eq!(
            TypeKey::dist_pca_result(ScalarKind::F32, McMr::DESCRIPTOR)
                .template_name()
                .unwrap(),
            "pca_result<el_dist_matrix<f32,MC,MR,ELEMENT>,el_dist_matrix<f32,MC,MR,ELEMENT>,\
             el_dist_column_vector<f32,MD,STAR,ELEMENT>,el_dist_row_vector<f32,STAR,VC,ELEMENT>>"
        );
    }

    #[test]
    fn test_unrepresentable_keys() {
        let block = DistributionDescriptor::new(Dist::Circ, Dist::Circ, DistWrap::Block);
        assert!(TypeKey::matrix_distribution(block).template_name().is_none());
        assert!(TypeKey::distributed(EntityKind::Matrix, ScalarKind::I32, block)
            .template_name()
            .is_none());
        let const_dist = TypeKey::new(
            Entity::Distributed(EntityKind::Matrix),
            Some(ScalarTypeDescriptor::constant(ScalarKind::I32)),
            Some(McMr::DESCRIPTOR),
        );
        assert!(const_dist.template_name().is_none());
        assert!(TypeKey::plain(Entity::Local(EntityKind::Matrix)).template_name().is_none());
    }

    #[test]
    fn test_range_end() {
        let r = Range::new(MatrixIndex::new(1, 2), MatrixSize::new(3, 4));
        assert_eq!(r.end(), MatrixIndex::new(4, 6));
        assert_eq!(MatrixDistribution::<McMr>::new().descriptor(), McMr::DESCRIPTOR);
    }
}
