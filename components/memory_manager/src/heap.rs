//! Collectable chain
//!
//! Every cycle-capable object is registered in its heap's chain when it is
//! created and removed when its last strong reference drops. Nodes live in
//! an index arena threaded into a doubly-linked list; freed slots are
//! reused.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::object::Collectable;

/// Collector configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcConfig {
    /// Run the collector automatically at safe points
    pub auto_collect: bool,
    /// Registrations since the last pass that trigger an automatic pass
    pub allocation_threshold: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            auto_collect: true,
            allocation_threshold: 10_000,
        }
    }
}

impl GcConfig {
    /// Configuration with automatic collection turned off
    pub fn manual() -> Self {
        Self {
            auto_collect: false,
            ..Self::default()
        }
    }

    /// Set the automatic collection threshold
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.allocation_threshold = threshold;
        self
    }
}

/// Heap statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects currently registered
    pub live: usize,
    /// Objects ever registered
    pub allocated: usize,
    /// Objects removed from the chain, by refcount or by collection
    pub freed: usize,
    /// Collection passes run
    pub collections: usize,
    /// Objects the last pass found unreachable
    pub last_cycles_freed: usize,
}

#[derive(Debug)]
struct Node {
    prev: Option<usize>,
    next: Option<usize>,
    object: Option<Weak<dyn Collectable>>,
}

/// Arena-backed doubly-linked list of registered objects
#[derive(Debug, Default)]
pub struct Chain {
    nodes: Vec<Node>,
    head: Option<usize>,
    free: Vec<usize>,
    stats: GcStats,
    config: GcConfig,
    since_collect: usize,
}

impl Chain {
    fn insert(&mut self, object: Weak<dyn Collectable>) -> usize {
        let node = Node {
            prev: None,
            next: self.head,
            object: Some(object),
        };
        let index = match self.free.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        if let Some(head) = self.head {
            self.nodes[head].prev = Some(index);
        }
        self.head = Some(index);
        self.stats.live += 1;
        self.stats.allocated += 1;
        self.since_collect += 1;
        index
    }

    fn unlink(&mut self, index: usize) -> bool {
        let Some(node) = self.nodes.get_mut(index) else {
            return false;
        };
        if node.object.take().is_none() {
            return false;
        }
        let (prev, next) = (node.prev.take(), node.next.take());
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.nodes[n].prev = prev;
        }
        self.free.push(index);
        true
    }

    /// Remove a node whose object was dropped
    pub(crate) fn release(&mut self, index: usize) {
        if self.unlink(index) {
            self.stats.live -= 1;
            self.stats.freed += 1;
        }
    }

    /// Walk the list, upgrading live entries and pruning dead ones
    pub(crate) fn snapshot(&mut self) -> Vec<(usize, Rc<dyn Collectable>)> {
        let mut live = Vec::with_capacity(self.stats.live);
        let mut dead = Vec::new();
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let node = &self.nodes[index];
            cursor = node.next;
            match node.object.as_ref().and_then(Weak::upgrade) {
                Some(object) => live.push((index, object)),
                None => dead.push(index),
            }
        }
        for index in dead {
            self.release(index);
        }
        live
    }

    pub(crate) fn record_collection(&mut self, freed: usize) {
        self.stats.collections += 1;
        self.stats.last_cycles_freed = freed;
        self.since_collect = 0;
    }
}

/// Handle to a collectable chain
///
/// Cloning the handle shares the chain. Objects hold only a weak pointer
/// to it, so dropping every handle leaves registered objects valid.
///
/// # Examples
///
/// ```
/// use memory_manager::Heap;
///
/// let heap = Heap::new();
/// assert_eq!(heap.live_objects(), 0);
/// assert_eq!(heap.collect_garbage(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Heap {
    chain: Rc<RefCell<Chain>>,
}

impl Heap {
    /// Create a heap with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a heap with a custom configuration
    pub fn with_config(config: GcConfig) -> Self {
        let heap = Self::default();
        heap.chain.borrow_mut().config = config;
        heap
    }

    /// Register an object in the chain
    ///
    /// # Returns
    ///
    /// `false` if the object was already registered with some heap
    pub fn register<T: Collectable + 'static>(&self, object: &Rc<T>) -> bool {
        if object.link().is_linked() {
            return false;
        }
        let weak: Weak<dyn Collectable> = Rc::downgrade(object) as Weak<dyn Collectable>;
        let index = self.chain.borrow_mut().insert(weak);
        if object.link().attach(Rc::downgrade(&self.chain), index) {
            trace!(kind = object.kind(), index, "registered");
            true
        } else {
            let mut chain = self.chain.borrow_mut();
            chain.unlink(index);
            chain.stats.live -= 1;
            chain.stats.allocated -= 1;
            false
        }
    }

    /// Remove an object from the chain without dropping it
    pub fn unregister(&self, object: &dyn Collectable) -> bool {
        let Some(index) = object.link().index() else {
            return false;
        };
        let removed = self.chain.borrow_mut().unlink(index);
        if removed {
            let mut chain = self.chain.borrow_mut();
            chain.stats.live -= 1;
            object.link().detach();
        }
        removed
    }

    /// Check if an object is registered in this heap
    pub fn contains(&self, object: &dyn Collectable) -> bool {
        let Some(index) = object.link().index() else {
            return false;
        };
        let chain = self.chain.borrow();
        chain
            .nodes
            .get(index)
            .and_then(|n| n.object.as_ref())
            .and_then(Weak::upgrade)
            .is_some_and(|o| {
                Rc::as_ptr(&o) as *const () == object as *const dyn Collectable as *const ()
            })
    }

    /// Number of registered objects
    pub fn live_objects(&self) -> usize {
        self.chain.borrow().stats.live
    }

    /// Registered objects grouped by kind name
    pub fn live_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let objects = self.chain.borrow_mut().snapshot();
        let mut counts = BTreeMap::new();
        for (_, object) in &objects {
            *counts.entry(object.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Current statistics
    pub fn stats(&self) -> GcStats {
        self.chain.borrow().stats
    }

    /// Current configuration
    pub fn config(&self) -> GcConfig {
        self.chain.borrow().config
    }

    /// Replace the configuration
    pub fn set_config(&self, config: GcConfig) {
        self.chain.borrow_mut().config = config;
    }

    /// Check if an automatic collection is due
    pub fn should_collect(&self) -> bool {
        let chain = self.chain.borrow();
        chain.config.auto_collect && chain.since_collect >= chain.config.allocation_threshold
    }

    pub(crate) fn chain(&self) -> &Rc<RefCell<Chain>> {
        &self.chain
    }
}
