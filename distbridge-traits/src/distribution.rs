//! Distribution domain: how a global matrix is spread over a process grid.
//!
//! A distribution is a triple (column placement, row placement, wrapping).
//! Of the 7 x 7 x 2 nominal triples only fourteen are supported; the marker
//! types below are exactly that set, in the order of the nominal product
//! (`Dist` declaration order for columns, then rows, then wrapping).

use std::fmt;

// ============================================================================
// Placement enumerations
// ============================================================================

/// Placement of one matrix dimension over the process grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dist {
    Mc,
    Md,
    Mr,
    Vc,
    Vr,
    Star,
    Circ,
}

impl Dist {
    pub const ALL: [Dist; 7] = [
        Dist::Mc,
        Dist::Md,
        Dist::Mr,
        Dist::Vc,
        Dist::Vr,
        Dist::Star,
        Dist::Circ,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Dist::Mc => "MC",
            Dist::Md => "MD",
            Dist::Mr => "MR",
            Dist::Vc => "VC",
            Dist::Vr => "VR",
            Dist::Star => "STAR",
            Dist::Circ => "CIRC",
        }
    }
}

impl fmt::Display for Dist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether consecutive indices are dealt out one at a time or in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistWrap {
    Element,
    Block,
}

impl DistWrap {
    pub const ALL: [DistWrap; 2] = [DistWrap::Element, DistWrap::Block];

    pub const fn name(self) -> &'static str {
        match self {
            DistWrap::Element => "ELEMENT",
            DistWrap::Block => "BLOCK",
        }
    }
}

impl fmt::Display for DistWrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// DistributionDescriptor
// ============================================================================

/// Run-time value of a distribution triple.
///
/// Any triple can be spelled; only [`is_supported`](Self::is_supported)
/// triples are ever instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistributionDescriptor {
    pub columnwise: Dist,
    pub rowwise: Dist,
    pub wrapping: DistWrap,
}

impl DistributionDescriptor {
    pub const fn new(columnwise: Dist, rowwise: Dist, wrapping: DistWrap) -> Self {
        Self {
            columnwise,
            rowwise,
            wrapping,
        }
    }

    /// All 98 nominal triples in product order.
    pub fn nominal() -> impl Iterator<Item = DistributionDescriptor> {
        Dist::ALL.into_iter().flat_map(|c| {
            Dist::ALL.into_iter().flat_map(move |r| {
                DistWrap::ALL
                    .into_iter()
                    .map(move |w| DistributionDescriptor::new(c, r, w))
            })
        })
    }

    pub const fn is_supported(self) -> bool {
        if !matches!(self.wrapping, DistWrap::Element) {
            return false;
        }
        matches!(
            (self.columnwise, self.rowwise),
            (Dist::Mc, Dist::Mr)
                | (Dist::Mc, Dist::Star)
                | (Dist::Md, Dist::Star)
                | (Dist::Mr, Dist::Mc)
                | (Dist::Mr, Dist::Star)
                | (Dist::Vc, Dist::Star)
                | (Dist::Vr, Dist::Star)
                | (Dist::Star, Dist::Mc)
                | (Dist::Star, Dist::Md)
                | (Dist::Star, Dist::Mr)
                | (Dist::Star, Dist::Vc)
                | (Dist::Star, Dist::Vr)
                | (Dist::Star, Dist::Star)
                | (Dist::Circ, Dist::Circ)
        )
    }

    /// Comma-separated form used inside type tuples: `MC,MR,ELEMENT`.
    pub fn template_args(self) -> String {
        format!("{},{},{}", self.columnwise, self.rowwise, self.wrapping)
    }
}

impl fmt::Display for DistributionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.template_args())
    }
}

// ============================================================================
// Compile-time markers
// ============================================================================

/// Compile-time member of the distribution domain.
pub trait Distribution: Copy + Default + Send + Sync + fmt::Debug + 'static {
    const COLUMNWISE: Dist;
    const ROWWISE: Dist;
    const WRAPPING: DistWrap;
    const DESCRIPTOR: DistributionDescriptor =
        DistributionDescriptor::new(Self::COLUMNWISE, Self::ROWWISE, Self::WRAPPING);
}

/// Callback invoked once per supported distribution.
pub trait DistributionVisitor {
    fn visit<D: Distribution>(&mut self);
}

macro_rules! distributions {
    ($($name:ident => ($c:ident, $r:ident)),* $(,)?) => {
        $(
            #[doc = concat!(
                "Element-wrapped `", stringify!($c), "` x `", stringify!($r), "` distribution."
            )]
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $name;

            impl Distribution for $name {
                const COLUMNWISE: Dist = Dist::$c;
                const ROWWISE: Dist = Dist::$r;
                const WRAPPING: DistWrap = DistWrap::Element;
            }
        )*

        /// The supported set, in stable enumeration order.
        pub const SUPPORTED_DISTRIBUTIONS: &[DistributionDescriptor] =
            &[$(<$name as Distribution>::DESCRIPTOR),*];

        /// Walk the supported set in the order of [`SUPPORTED_DISTRIBUTIONS`].
        pub fn for_each_distribution<V: DistributionVisitor + ?Sized>(visitor: &mut V) {
            $(visitor.visit::<$name>();)*
        }
    };
}

distributions! {
    McMr => (Mc, Mr),
    McStar => (Mc, Star),
    MdStar => (Md, Star),
    MrMc => (Mr, Mc),
    MrStar => (Mr, Star),
    VcStar => (Vc, Star),
    VrStar => (Vr, Star),
    StarMc => (Star, Mc),
    StarMd => (Star, Md),
    StarMr => (Star, Mr),
    StarVc => (Star, Vc),
    StarVr => (Star, Vr),
    StarStar => (Star, Star),
    CircCirc => (Circ, Circ),
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Vec<DistributionDescriptor>);

    impl DistributionVisitor for Collect {
        fn visit<D: Distribution>(&mut self) {
            self.0.push(D::DESCRIPTOR);
        }
    }

    #[test]
    fn test_supported_is_filtered_product() {
        let filtered: Vec<_> = DistributionDescriptor::nominal()
            .filter(|d| d.is_supported())
            .collect();
        assert_eq!(filtered, SUPPORTED_DISTRIBUTIONS);
        assert_eq!(SUPPORTED_DISTRIBUTIONS.len(), 14);
    }

    #[test]
    fn test_visitor_order() {
        let mut c = Collect(Vec::new());
        for_each_distribution(&mut c);
        assert_eq!(c.0, SUPPORTED_DISTRIBUTIONS);
    }

    #[test]
    fn test_nominal_count() {
        assert_eq!(DistributionDescriptor::nominal().count(), 98);
    }

    #[test]
    fn test_block_never_supported() {
        for d in DistributionDescriptor::nominal() {
            if d.wrapping == DistWrap::Block {
                assert!(!d.is_supported(), "{d}");
            }
        }
        let circ_block = DistributionDescriptor::new(Dist::Circ, Dist::Circ, DistWrap::Block);
        assert!(!circ_block.is_supported());
    }

    #[test]
    fn test_display() {
        assert_eq!(McMr::DESCRIPTOR.to_string(), "(MC,MR,ELEMENT)");
        assert_eq!(StarStar::DESCRIPTOR.template_args(), "STAR,STAR,ELEMENT");
    }
}
