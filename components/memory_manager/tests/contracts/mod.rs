//! Contract tests verifying the memory_manager API

use memory_manager::{ChainLink, Collectable, GcConfig, Heap};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct Cell {
    link: ChainLink,
    refs: RefCell<Vec<Rc<Cell>>>,
}

impl Collectable for Cell {
    fn link(&self) -> &ChainLink {
        &self.link
    }
    fn trace(&self, visit: &mut dyn FnMut(&ChainLink)) {
        for r in self.refs.borrow().iter() {
            visit(r.link());
        }
    }
    fn clear(&self) {
        self.refs.borrow_mut().clear();
    }
    fn kind(&self) -> &'static str {
        "cell"
    }
}

fn cell(heap: &Heap) -> Rc<Cell> {
    let c = Rc::new(Cell {
        link: ChainLink::new(),
        refs: RefCell::new(Vec::new()),
    });
    assert!(heap.register(&c));
    c
}

/// Retain then release leaves count and chain membership unchanged
#[test]
fn contract_retain_release_round_trip() {
    let heap = Heap::new();
    let c = cell(&heap);
    let count = Rc::strong_count(&c);
    let live = heap.live_objects();

    let extra = Rc::clone(&c);
    drop(extra);

    assert_eq!(Rc::strong_count(&c), count);
    assert_eq!(heap.live_objects(), live);
    assert!(heap.contains(c.as_ref()));
}

/// A three-object ring with no root is freed only by collection
#[test]
fn contract_ring_collected() {
    let heap = Heap::with_config(GcConfig::manual());
    let a = cell(&heap);
    let b = cell(&heap);
    let c = cell(&heap);
    a.refs.borrow_mut().push(b.clone());
    b.refs.borrow_mut().push(c.clone());
    c.refs.borrow_mut().push(a.clone());
    let watch: Weak<Cell> = Rc::downgrade(&a);
    drop((a, b, c));

    assert!(watch.upgrade().is_some());
    assert_eq!(heap.collect_garbage(), 3);
    assert!(watch.upgrade().is_none());
    assert_eq!(heap.stats().freed, 3);
}

/// Acyclic garbage never reaches the collector
#[test]
fn contract_acyclic_freed_by_refcount() {
    let heap = Heap::new();
    let a = cell(&heap);
    a.refs.borrow_mut().push(cell(&heap));
    assert_eq!(heap.live_objects(), 2);
    drop(a);
    assert_eq!(heap.live_objects(), 0);
    assert_eq!(heap.collect_garbage(), 0);
}
