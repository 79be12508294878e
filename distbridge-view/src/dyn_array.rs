use std::any::Any;

use distbridge_traits::{HostNumeric, HostValue, Scalar, ScalarKind};
use num_complex::{Complex32, Complex64};

use crate::buffer::BufferInfo;
use crate::host_array::{HostArray, Order};
use crate::owner::Owner;
use crate::{Result, ViewError};

/// A type-erased host array that dispatches over the scalar domain at runtime.
#[derive(Debug)]
pub enum DynArray {
    I32(HostArray<i32>),
    U32(HostArray<u32>),
    I64(HostArray<i64>),
    U64(HostArray<u64>),
    F32(HostArray<f32>),
    F64(HostArray<f64>),
    C32(HostArray<Complex32>),
    C64(HostArray<Complex64>),
}

macro_rules! dispatch {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            DynArray::I32($a) => $body,
            DynArray::U32($a) => $body,
            DynArray::I64($a) => $body,
            DynArray::U64($a) => $body,
            DynArray::F32($a) => $body,
            DynArray::F64($a) => $body,
            DynArray::C32($a) => $body,
            DynArray::C64($a) => $body,
        }
    };
}

macro_rules! impl_from_host_array {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl From<HostArray<$t>> for DynArray {
            fn from(array: HostArray<$t>) -> Self {
                DynArray::$variant(array)
            }
        }
    )*};
}

impl_from_host_array!(
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Complex32 => C32,
    Complex64 => C64,
);

fn to_scalar<T: Scalar>(value: HostValue) -> Result<T> {
    T::from_host(value).ok_or_else(|| ViewError::ScalarConversion {
        value: format!("{value:?}"),
        kind: T::KIND,
    })
}

fn build<T: Scalar>(shape: &[usize], values: &[HostValue], order: Order) -> Result<HostArray<T>> {
    let data = values
        .iter()
        .map(|&v| to_scalar::<T>(v))
        .collect::<Result<Vec<T>>>()?;
    HostArray::from_vec(shape, data, order)
}

impl DynArray {
    pub fn kind(&self) -> ScalarKind {
        dispatch!(self, a => a.kind())
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    /// Byte strides.
    pub fn strides(&self) -> &[isize] {
        dispatch!(self, a => a.strides())
    }

    pub fn ndim(&self) -> usize {
        dispatch!(self, a => a.ndim())
    }

    pub fn is_writeable(&self) -> bool {
        dispatch!(self, a => a.is_writeable())
    }

    pub fn owns_data(&self) -> bool {
        dispatch!(self, a => a.owns_data())
    }

    pub fn set_writeable(&mut self, writeable: bool) -> Result<()> {
        dispatch!(self, a => a.set_writeable(writeable))
    }

    pub fn base(&self) -> &Owner {
        dispatch!(self, a => a.base())
    }

    pub fn anchor(&self) -> Option<&Owner> {
        dispatch!(self, a => a.anchor())
    }

    pub fn buffer_info(&self) -> BufferInfo {
        dispatch!(self, a => a.buffer_info())
    }

    /// Read one element as a host number.
    pub fn get(&self, indices: &[usize]) -> HostValue {
        dispatch!(self, a => a.get(indices).to_host())
    }

    /// Write one host number, converted to the array's kind.
    pub fn set(&mut self, indices: &[usize], value: HostValue) -> Result<()> {
        dispatch!(self, a => a.set(indices, to_scalar(value)?))
    }

    /// Borrow as a concrete array if the kinds agree.
    pub fn as_array<T: Scalar>(&self) -> Option<&HostArray<T>> {
        dispatch!(self, a => (a as &dyn Any).downcast_ref::<HostArray<T>>())
    }

    pub fn as_array_mut<T: Scalar>(&mut self) -> Option<&mut HostArray<T>> {
        dispatch!(self, a => (a as &mut dyn Any).downcast_mut::<HostArray<T>>())
    }

    /// Erase a concretely typed array.
    pub fn from_array<T: Scalar>(array: HostArray<T>) -> Option<Self> {
        let any: Box<dyn Any> = Box::new(array);
        let any = match any.downcast::<HostArray<i32>>() {
            Ok(a) => return Some(DynArray::I32(*a)),
            Err(any) => any,
        };
        let any = match any.downcast::<HostArray<u32>>() {
            Ok(a) => return Some(DynArray::U32(*a)),
            Err(any) => any,
        };
        let any = match any.downcast::<HostArray<i64>>() {
            Ok(a) => return Some(DynArray::I64(*a)),
            Err(any) => any,
        };
        let any = match any.downcast::<HostArray<u64>>() {
            Ok(a) => return Some(DynArray::U64(*a)),
            Err(any) => any,
        };
        let any = match any.downcast::<HostArray<f32>>() {
            Ok(a) => return Some(DynArray::F32(*a)),
            Err(any) => any,
        };
        let any = match any.downcast::<HostArray<f64>>() {
            Ok(a) => return Some(DynArray::F64(*a)),
            Err(any) => any,
        };
        let any = match any.downcast::<HostArray<Complex32>>() {
            Ok(a) => return Some(DynArray::C32(*a)),
            Err(any) => any,
        };
        any.downcast::<HostArray<Complex64>>()
            .ok()
            .map(|a| DynArray::C64(*a))
    }

    /// Build an owned array of an explicit kind from host numbers.
    pub fn from_host_values_as(
        kind: ScalarKind,
        shape: &[usize],
        values: &[HostValue],
        order: Order,
    ) -> Result<Self> {
        Ok(match kind {
            ScalarKind::I32 => build::<i32>(shape, values, order)?.into(),
            ScalarKind::U32 => build::<u32>(shape, values, order)?.into(),
            ScalarKind::I64 => build::<i64>(shape, values, order)?.into(),
            ScalarKind::U64 => build::<u64>(shape, values, order)?.into(),
            ScalarKind::F32 => build::<f32>(shape, values, order)?.into(),
            ScalarKind::F64 => build::<f64>(shape, values, order)?.into(),
            ScalarKind::ComplexF32 => build::<Complex32>(shape, values, order)?.into(),
            ScalarKind::ComplexF64 => build::<Complex64>(shape, values, order)?.into(),
        })
    }

    /// Numeric category of a sequence of host numbers: the widest present,
    /// `Float` for an empty sequence.
    pub fn host_numeric_of(values: &[HostValue]) -> HostNumeric {
        values
            .iter()
            .map(HostValue::numeric)
            .reduce(HostNumeric::join)
            .unwrap_or(HostNumeric::Float)
    }
}
