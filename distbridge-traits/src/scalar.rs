//! Scalar domain: the element kinds a native matrix can hold.
//!
//! The domain is closed. Every kind has a fixed position in declaration
//! order (`i32, u32, i64, u64, f32, f64, Complex<f32>, Complex<f64>`) and
//! that order is observable. Registration follows it, and so does the
//! overload tie-break in [`ScalarKind::preferred_for`].

use std::fmt;

use num_complex::{Complex, Complex32, Complex64};

// ============================================================================
// ScalarKind
// ============================================================================

/// Run-time tag for a scalar element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    ComplexF32,
    ComplexF64,
}

impl ScalarKind {
    /// Every kind in declaration order, including kinds disabled by features.
    pub const ALL: [ScalarKind; 8] = [
        ScalarKind::I32,
        ScalarKind::U32,
        ScalarKind::I64,
        ScalarKind::U64,
        ScalarKind::F32,
        ScalarKind::F64,
        ScalarKind::ComplexF32,
        ScalarKind::ComplexF64,
    ];

    /// Kinds compiled into this build, in declaration order.
    pub fn enabled() -> Vec<ScalarKind> {
        Self::ALL.into_iter().filter(|k| k.is_enabled()).collect()
    }

    /// Whether the cargo feature selecting this kind is on.
    pub const fn is_enabled(self) -> bool {
        match self {
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::I64 | ScalarKind::U64 => {
                cfg!(feature = "scalar-int")
            }
            ScalarKind::F32 => cfg!(feature = "scalar-float"),
            ScalarKind::F64 => cfg!(feature = "scalar-double"),
            ScalarKind::ComplexF32 => cfg!(feature = "scalar-complex-float"),
            ScalarKind::ComplexF64 => cfg!(feature = "scalar-complex-double"),
        }
    }

    #[inline]
    pub const fn byte_size(self) -> usize {
        match self {
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::U64 | ScalarKind::F64 | ScalarKind::ComplexF32 => 8,
            ScalarKind::ComplexF64 => 16,
        }
    }

    /// Name used when spelling type tuples, e.g. `el_matrix<Complex<f64>>`.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::I32 => "i32",
            ScalarKind::U32 => "u32",
            ScalarKind::I64 => "i64",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::ComplexF32 => "Complex<f32>",
            ScalarKind::ComplexF64 => "Complex<f64>",
        }
    }

    /// Buffer-protocol format code for this kind.
    pub const fn format(self) -> &'static str {
        match self {
            ScalarKind::I32 => "i",
            ScalarKind::U32 => "I",
            ScalarKind::I64 => "q",
            ScalarKind::U64 => "Q",
            ScalarKind::F32 => "f",
            ScalarKind::F64 => "d",
            ScalarKind::ComplexF32 => "Zf",
            ScalarKind::ComplexF64 => "Zd",
        }
    }

    /// Inverse of [`format`](Self::format), checked against the item size.
    pub fn from_format(format: &str, itemsize: usize) -> Option<ScalarKind> {
        Self::ALL
            .into_iter()
            .find(|k| k.format() == format && k.byte_size() == itemsize)
    }

    pub const fn host_numeric(self) -> HostNumeric {
        match self {
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::I64 | ScalarKind::U64 => {
                HostNumeric::Integer
            }
            ScalarKind::F32 | ScalarKind::F64 => HostNumeric::Float,
            ScalarKind::ComplexF32 | ScalarKind::ComplexF64 => HostNumeric::Complex,
        }
    }

    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, ScalarKind::ComplexF32 | ScalarKind::ComplexF64)
    }

    /// Kind chosen when a host numeric value could bind to several kinds.
    ///
    /// Several native kinds surface as the same host type; the earliest
    /// enabled kind in declaration order wins.
    pub fn preferred_for(host: HostNumeric) -> Option<ScalarKind> {
        Self::ALL
            .into_iter()
            .find(|k| k.is_enabled() && k.host_numeric() == host)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Host numerics
// ============================================================================

/// The numeric categories a dynamically typed host distinguishes.
///
/// Ordered by widening: a sequence mixing categories is typed by the widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostNumeric {
    Integer,
    Float,
    Complex,
}

impl HostNumeric {
    #[inline]
    pub fn join(self, other: HostNumeric) -> HostNumeric {
        self.max(other)
    }
}

/// A single host-side number before it is bound to a native kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostValue {
    Integer(i128),
    Float(f64),
    Complex(Complex64),
}

impl HostValue {
    pub fn numeric(&self) -> HostNumeric {
        match self {
            HostValue::Integer(_) => HostNumeric::Integer,
            HostValue::Float(_) => HostNumeric::Float,
            HostValue::Complex(_) => HostNumeric::Complex,
        }
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Integer(i128::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<Complex64> for HostValue {
    fn from(value: Complex64) -> Self {
        HostValue::Complex(value)
    }
}

// ============================================================================
// ScalarTypeDescriptor
// ============================================================================

/// Element kind plus const qualification.
///
/// Two descriptors are the same type iff kind and const flag agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarTypeDescriptor {
    kind: ScalarKind,
    is_const: bool,
}

impl ScalarTypeDescriptor {
    pub const fn new(kind: ScalarKind, is_const: bool) -> Self {
        Self { kind, is_const }
    }

    pub const fn mutable(kind: ScalarKind) -> Self {
        Self::new(kind, false)
    }

    pub const fn constant(kind: ScalarKind) -> Self {
        Self::new(kind, true)
    }

    #[inline]
    pub const fn kind(self) -> ScalarKind {
        self.kind
    }

    #[inline]
    pub const fn is_const(self) -> bool {
        self.is_const
    }

    #[inline]
    pub const fn byte_size(self) -> usize {
        self.kind.byte_size()
    }

    /// `f64` or `f64 const`.
    pub fn display_name(self) -> String {
        if self.is_const {
            format!("{} const", self.kind.name())
        } else {
            self.kind.name().to_string()
        }
    }
}

impl fmt::Display for ScalarTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

// ============================================================================
// Scalar trait
// ============================================================================

mod private {
    pub trait Sealed {}
}

/// Compile-time member of the scalar domain.
///
/// Sealed: the domain is closed and every member has a [`ScalarKind`].
pub trait Scalar:
    private::Sealed
    + Copy
    + Send
    + Sync
    + PartialEq
    + fmt::Debug
    + Default
    + num_traits::Zero
    + 'static
{
    const KIND: ScalarKind;

    /// Convert a host number, or `None` if it does not fit this kind.
    fn from_host(value: HostValue) -> Option<Self>;

    fn to_host(self) -> HostValue;

    #[inline]
    fn descriptor() -> ScalarTypeDescriptor {
        ScalarTypeDescriptor::mutable(Self::KIND)
    }
}

macro_rules! impl_integer_scalar {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl private::Sealed for $t {}

        impl Scalar for $t {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn from_host(value: HostValue) -> Option<Self> {
                match value {
                    HostValue::Integer(v) => <$t>::try_from(v).ok(),
                    HostValue::Float(_) | HostValue::Complex(_) => None,
                }
            }

            fn to_host(self) -> HostValue {
                HostValue::Integer(i128::from(self))
            }
        }
    )*};
}

macro_rules! impl_float_scalar {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl private::Sealed for $t {}

        impl Scalar for $t {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn from_host(value: HostValue) -> Option<Self> {
                match value {
                    HostValue::Integer(v) => Some(v as $t),
                    HostValue::Float(v) => Some(v as $t),
                    HostValue::Complex(_) => None,
                }
            }

            fn to_host(self) -> HostValue {
                HostValue::Float(f64::from(self))
            }
        }
    )*};
}

macro_rules! impl_complex_scalar {
    ($($t:ty => ($re:ty, $kind:ident)),* $(,)?) => {$(
        impl private::Sealed for $t {}

        impl Scalar for $t {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn from_host(value: HostValue) -> Option<Self> {
                Some(match value {
                    HostValue::Integer(v) => Complex::new(v as $re, 0.0),
                    HostValue::Float(v) => Complex::new(v as $re, 0.0),
                    HostValue::Complex(c) => Complex::new(c.re as $re, c.im as $re),
                })
            }

            fn to_host(self) -> HostValue {
                HostValue::Complex(Complex64::new(f64::from(self.re), f64::from(self.im)))
            }
        }
    )*};
}

impl_integer_scalar!(i32 => I32, u32 => U32, i64 => I64, u64 => U64);
impl_float_scalar!(f32 => F32, f64 => F64);
impl_complex_scalar!(Complex32 => (f32, ComplexF32), Complex64 => (f64, ComplexF64));

// ============================================================================
// Type-list visitor
// ============================================================================

/// Callback invoked once per compiled scalar type.
pub trait ScalarVisitor {
    fn visit<T: Scalar>(&mut self);
}

/// Walk the enabled scalar domain in declaration order.
pub fn for_each_scalar<V: ScalarVisitor + ?Sized>(visitor: &mut V) {
    #[cfg(feature = "scalar-int")]
    {
        visitor.visit::<i32>();
        visitor.visit::<u32>();
        visitor.visit::<i64>();
        visitor.visit::<u64>();
    }
    #[cfg(feature = "scalar-float")]
    visitor.visit::<f32>();
    #[cfg(feature = "scalar-double")]
    visitor.visit::<f64>();
    #[cfg(feature = "scalar-complex-float")]
    visitor.visit::<Complex32>();
    #[cfg(feature = "scalar-complex-double")]
    visitor.visit::<Complex64>();
    let _ = visitor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct Collect(Vec<(ScalarKind, usize)>);

    impl ScalarVisitor for Collect {
        fn visit<T: Scalar>(&mut self) {
            self.0.push((T::KIND, std::mem::size_of::<T>()));
        }
    }

    #[test]
    fn test_visitor_matches_enabled_order() {
        let mut c = Collect(Vec::new());
        for_each_scalar(&mut c);
        let kinds: Vec<_> = c.0.iter().map(|&(k, _)| k).collect();
        assert_eq!(kinds, ScalarKind::enabled());
        for (kind, size) in c.0 {
            assert_eq!(kind.byte_size(), size, "{kind}");
        }
    }

    #[test]
    fn test_all_is_declaration_order() {
        let mut sorted = ScalarKind::ALL;
        sorted.sort();
        assert_eq!(sorted, ScalarKind::ALL);
    }

    #[test]
    fn test_format_roundtrip() {
        for kind in ScalarKind::ALL {
            assert_eq!(
                ScalarKind::from_format(kind.format(), kind.byte_size()),
                Some(kind)
            );
        }
        assert_eq!(ScalarKind::from_format("d", 4), None);
        assert_eq!(ScalarKind::from_format("x", 8), None);
    }

    #[test]
    fn test_preferred_for_takes_first_declared() {
        assert_eq!(
            ScalarKind::preferred_for(HostNumeric::Integer),
            Some(ScalarKind::I32)
        );
        assert_eq!(
            ScalarKind::preferred_for(HostNumeric::Float),
            Some(ScalarKind::F32)
        );
        assert_eq!(
            ScalarKind::preferred_for(HostNumeric::Complex),
            Some(ScalarKind::ComplexF32)
        );
    }

    #[test]
    fn test_host_numeric_join() {
        assert_eq!(
            HostNumeric::Integer.join(HostNumeric::Float),
            HostNumeric::Float
        );
        assert_eq!(
            HostNumeric::Complex.join(HostNumeric::Integer),
            HostNumeric::Complex
        );
    }

    #[test]
    fn test_descriptor_identity_and_name() {
        let a = ScalarTypeDescriptor::mutable(ScalarKind::F64);
        let b = ScalarTypeDescriptor::constant(ScalarKind::F64);
        assert_ne!(a, b);
        assert_eq!(a, f64::descriptor());
        assert_eq!(a.display_name(), "f64");
        assert_eq!(b.display_name(), "f64 const");
        assert_eq!(
            ScalarTypeDescriptor::constant(ScalarKind::ComplexF32).to_string(),
            "Complex<f32> const"
        );
    }

    #[test]
    fn test_from_host_integer_range() {
        assert_eq!(i32::from_host(HostValue::Integer(-5)), Some(-5));
        assert_eq!(u32::from_host(HostValue::Integer(-1)), None);
        assert_eq!(i32::from_host(HostValue::Integer(1 << 40)), None);
        assert_eq!(u64::from_host(HostValue::Integer(u64::MAX as i128)), Some(u64::MAX));
        assert_eq!(i64::from_host(HostValue::Float(1.0)), None);
    }

    #[test]
    fn test_from_host_float_and_complex() {
        let x = f32::from_host(HostValue::Float(0.25)).unwrap();
        assert_abs_diff_eq!(x, 0.25f32);
        assert_eq!(f64::from_host(HostValue::Complex(Complex64::new(1.0, 1.0))), None);
        let z = Complex32::from_host(HostValue::Integer(3)).unwrap();
        assert_abs_diff_eq!(z.re, 3.0f32);
        assert_abs_diff_eq!(z.im, 0.0f32);
        let h = Complex32::new(1.5, -2.0).to_host();
        assert_eq!(h, HostValue::Complex(Complex64::new(1.5, -2.0)));
    }
}
