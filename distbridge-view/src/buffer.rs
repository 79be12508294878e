//! Buffer descriptors exchanged between the host and native objects.

use distbridge_traits::{Scalar, ScalarKind};

/// Description of a strided block of memory, in the host's terms.
///
/// Strides are in bytes. `format` and `itemsize` together identify the
/// element kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    pub ptr: *mut u8,
    pub itemsize: usize,
    pub format: String,
    pub shape: Vec<usize>,
    pub strides: Vec<isize>,
    pub readonly: bool,
}

impl BufferInfo {
    /// Describe `shape`/`strides` elements of type `T` starting at `ptr`.
    pub fn of<T: Scalar>(ptr: *mut T, shape: Vec<usize>, strides: Vec<isize>, readonly: bool) -> Self {
        Self {
            ptr: ptr.cast::<u8>(),
            itemsize: T::KIND.byte_size(),
            format: T::KIND.format().to_string(),
            shape,
            strides,
            readonly,
        }
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Element kind, if the format is one of ours.
    pub fn kind(&self) -> Option<ScalarKind> {
        ScalarKind::from_format(&self.format, self.itemsize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&d| d == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn test_of_fills_element_fields() {
        let mut data = [Complex64::new(0.0, 0.0); 6];
        let info = BufferInfo::of(data.as_mut_ptr(), vec![2, 3], vec![16, 32], false);
        assert_eq!(info.itemsize, 16);
        assert_eq!(info.format, "Zd");
        assert_eq!(info.kind(), Some(ScalarKind::ComplexF64));
        assert_eq!(info.ndim(), 2);
        assert_eq!(info.len(), 6);
        assert!(!info.is_empty());
    }

    #[test]
    fn test_unknown_format() {
        let mut data = [0u8; 4];
        let info = BufferInfo {
            ptr: data.as_mut_ptr(),
            itemsize: 1,
            format: "B".into(),
            shape: vec![4],
            strides: vec![1],
            readonly: true,
        };
        assert_eq!(info.kind(), None);
    }
}
