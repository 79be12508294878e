//! Owner handles and shared element storage.

use std::any::Any;
use std::cell::UnsafeCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Strong reference to the object that owns some aliased memory.
///
/// Holding an `Owner` keeps that object, and therefore the memory, alive.
/// Dropping it never touches the memory itself.
#[derive(Clone)]
pub struct Owner(Rc<dyn Any>);

impl Owner {
    pub fn new<O: Any>(owner: Rc<O>) -> Self {
        Owner(owner)
    }

    /// Wrap an already type-erased reference.
    pub fn from_rc(owner: Rc<dyn Any>) -> Self {
        Owner(owner)
    }

    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn ptr_eq(&self, other: &Owner) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    pub fn downgrade(&self) -> WeakOwner {
        WeakOwner(Rc::downgrade(&self.0))
    }

    pub fn downcast<O: Any>(&self) -> Option<Rc<O>> {
        self.0.clone().downcast::<O>().ok()
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("strong", &self.strong_count())
            .finish()
    }
}

/// Non-owning counterpart of [`Owner`].
#[derive(Clone)]
pub struct WeakOwner(Weak<dyn Any>);

impl WeakOwner {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<Owner> {
        self.0.upgrade().map(Owner)
    }
}

impl fmt::Debug for WeakOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakOwner")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Heap storage whose elements may be written through any aliasing view.
///
/// Elements sit in `UnsafeCell`s so that raw pointers derived from a shared
/// `Rc<Storage<T>>` may be written to.
pub struct Storage<T> {
    cells: Box<[UnsafeCell<T>]>,
}

impl<T> Storage<T> {
    pub fn from_vec(data: Vec<T>) -> Rc<Self> {
        let cells = data.into_iter().map(UnsafeCell::new).collect();
        Rc::new(Storage { cells })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Pointer to the first element, valid for reads and writes while the
    /// storage is alive.
    #[inline]
    pub fn as_mut_ptr(&self) -> *mut T {
        UnsafeCell::raw_get(self.cells.as_ptr())
    }
}

impl<T> fmt::Debug for Storage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_keeps_storage_alive() {
        let storage = Storage::from_vec(vec![1.0f64, 2.0, 3.0]);
        let weak = Rc::downgrade(&storage);
        let owner = Owner::new(storage.clone());
        drop(storage);
        assert!(weak.upgrade().is_some());
        assert_eq!(owner.strong_count(), 1);
        drop(owner);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_weak_owner() {
        let owner = Owner::new(Rc::new(42u32));
        let weak = owner.downgrade();
        assert!(weak.is_alive());
        let again = weak.upgrade().unwrap();
        assert!(again.ptr_eq(&owner));
        drop(again);
        drop(owner);
        assert!(!weak.is_alive());
    }

    #[test]
    fn test_downcast() {
        let owner = Owner::new(Rc::new(String::from("buffer")));
        assert_eq!(owner.downcast::<String>().unwrap().as_str(), "buffer");
        assert!(owner.downcast::<u8>().is_none());
    }

    #[test]
    fn test_storage_writes_through_pointer() {
        let storage = Storage::from_vec(vec![0i32; 4]);
        let p = storage.as_mut_ptr();
        unsafe {
            *p.add(2) = 7;
            assert_eq!(*p.add(2), 7);
        }
        assert_eq!(storage.len(), 4);
    }
}
