//! Shared object header

use std::cell::RefCell;
use std::rc::Rc;

use memory_manager::ChainLink;

use crate::object::weakref::WeakRef;

/// Cached weak-reference handle
///
/// At most one [`WeakRef`] exists per object; asking again returns the
/// same handle.
#[derive(Default)]
pub struct WeakSlot(RefCell<Option<Rc<WeakRef>>>);

impl WeakSlot {
    /// Return the cached handle, creating it with `make` on first use
    pub fn get_or_create(&self, make: impl FnOnce() -> WeakRef) -> Rc<WeakRef> {
        self.0.borrow_mut().get_or_insert_with(|| Rc::new(make())).clone()
    }

    /// Check if a handle was ever created
    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }
}

/// Header embedded in every chain-registered object
#[derive(Default)]
pub struct ObjectHeader {
    /// Membership in the heap's collectable chain
    pub link: ChainLink,
    /// Weak-reference handle
    pub weak: WeakSlot,
}

impl ObjectHeader {
    /// Create an unregistered header
    pub fn new() -> Self {
        Self::default()
    }
}
