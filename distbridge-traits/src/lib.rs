//! Shared type domains for the distbridge ecosystem.
//!
//! This crate defines the two compile-time type lists every other crate
//! walks: the scalar domain (element kinds a matrix can hold) and the
//! distribution domain (how a global matrix is laid out over a process
//! grid). Both lists are exposed as marker types for static dispatch and as
//! plain descriptor values for run-time lookup.
//!
//! Visitors ([`ScalarVisitor`], [`DistributionVisitor`]) let downstream
//! crates expand the cross product once, in declared order, without
//! repeating the lists.

pub mod distribution;
pub mod scalar;

pub use distribution::{
    for_each_distribution, CircCirc, Dist, DistWrap, Distribution, DistributionDescriptor,
    DistributionVisitor, McMr, McStar, MdStar, MrMc, MrStar, StarMc, StarMd, StarMr, StarStar,
    StarVc, StarVr, VcStar, VrStar, SUPPORTED_DISTRIBUTIONS,
};
pub use scalar::{
    for_each_scalar, HostNumeric, HostValue, Scalar, ScalarKind, ScalarTypeDescriptor,
    ScalarVisitor,
};
