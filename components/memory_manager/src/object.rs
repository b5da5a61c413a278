//! Collectable object protocol
//!
//! Heap kinds that can take part in reference cycles embed a [`ChainLink`]
//! and implement [`Collectable`]. The link records the object's node in its
//! heap's chain and removes it when the object is dropped.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Weak;

use crate::heap::Chain;

/// Membership of one object in a heap's collectable chain
#[derive(Default)]
pub struct ChainLink {
    heap: OnceCell<Weak<RefCell<Chain>>>,
    index: Cell<Option<usize>>,
}

impl ChainLink {
    /// Create an unlinked link
    pub fn new() -> Self {
        Self::default()
    }

    /// Node index in the chain, `None` once unlinked or before registration
    pub fn index(&self) -> Option<usize> {
        self.index.get()
    }

    /// Check if the object is currently registered
    pub fn is_linked(&self) -> bool {
        self.index.get().is_some()
    }

    pub(crate) fn attach(&self, heap: Weak<RefCell<Chain>>, index: usize) -> bool {
        if self.heap.set(heap).is_err() {
            return false;
        }
        self.index.set(Some(index));
        true
    }

    pub(crate) fn detach(&self) {
        self.index.set(None);
    }
}

impl Drop for ChainLink {
    fn drop(&mut self) {
        let Some(index) = self.index.take() else {
            return;
        };
        let Some(chain) = self.heap.get().and_then(Weak::upgrade) else {
            return;
        };
        // A busy chain keeps the dead node; the next collection prunes it.
        if let Ok(mut chain) = chain.try_borrow_mut() {
            chain.release(index);
        };
    }
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLink")
            .field("index", &self.index.get())
            .finish()
    }
}

/// A heap object the cycle collector can inspect and break
pub trait Collectable {
    /// The object's chain membership
    fn link(&self) -> &ChainLink;

    /// Report every strong reference this object holds to another
    /// collectable object, once per reference
    fn trace(&self, visit: &mut dyn FnMut(&ChainLink));

    /// Drop every reference this object holds
    ///
    /// Called only on objects the collector proved unreachable.
    fn clear(&self);

    /// Short kind name for diagnostics
    fn kind(&self) -> &'static str;
}
