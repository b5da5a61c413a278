//! Script closures and captured-variable cells

use std::cell::RefCell;
use std::rc::Rc;

use bytecode_system::Prototype;
use memory_manager::{ChainLink, Collectable, Heap};

use crate::object::class::Class;
use crate::object::header::ObjectHeader;
use crate::value::Value;

/// Where an outer's value currently lives
#[derive(Debug, Clone)]
pub enum OuterState {
    /// Still on the VM stack at this absolute slot
    Open(usize),
    /// Owned by the cell after the defining scope ended
    Closed(Value),
}

/// Captured-variable cell
///
/// While open the value lives in the defining frame's stack slot and the
/// VM reads and writes it there. Closing copies the value into the cell;
/// every closure holding the cell then shares it.
pub struct Outer {
    pub(crate) header: ObjectHeader,
    state: RefCell<OuterState>,
}

impl Outer {
    /// Create a cell bound to a live stack slot
    pub fn open(heap: &Heap, stack_index: usize) -> Rc<Outer> {
        Self::with_state(heap, OuterState::Open(stack_index))
    }

    /// Create a cell that already owns its value
    pub fn closed(heap: &Heap, value: Value) -> Rc<Outer> {
        Self::with_state(heap, OuterState::Closed(value))
    }

    fn with_state(heap: &Heap, state: OuterState) -> Rc<Outer> {
        let outer = Rc::new(Outer {
            header: ObjectHeader::new(),
            state: RefCell::new(state),
        });
        heap.register(&outer);
        outer
    }

    /// Current state
    pub fn state(&self) -> OuterState {
        self.state.borrow().clone()
    }

    /// Stack slot while open
    pub fn stack_index(&self) -> Option<usize> {
        match *self.state.borrow() {
            OuterState::Open(i) => Some(i),
            OuterState::Closed(_) => None,
        }
    }

    /// Check if the cell is still bound to the stack
    pub fn is_open(&self) -> bool {
        self.stack_index().is_some()
    }

    /// Move the value off the stack into the cell
    pub fn close(&self, value: Value) {
        let old = self.state.replace(OuterState::Closed(value));
        drop(old);
    }

    /// Overwrite the value of a closed cell
    ///
    /// # Returns
    ///
    /// `false` if the cell is still open
    pub fn set_closed(&self, value: Value) -> bool {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            OuterState::Closed(v) => {
                let old = std::mem::replace(v, value);
                drop(state);
                drop(old);
                true
            }
            OuterState::Open(_) => false,
        }
    }
}

impl Collectable for Outer {
    fn link(&self) -> &ChainLink {
        &self.header.link
    }

    fn trace(&self, visit: &mut dyn FnMut(&ChainLink)) {
        if let Ok(state) = self.state.try_borrow() {
            if let OuterState::Closed(v) = &*state {
                v.visit_link(visit);
            }
        }
    }

    fn clear(&self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            let old = std::mem::replace(&mut *state, OuterState::Closed(Value::Null));
            drop(state);
            drop(old);
        }
    }

    fn kind(&self) -> &'static str {
        "outer"
    }
}

/// Instantiated script function
pub struct Closure {
    pub(crate) header: ObjectHeader,
    proto: Rc<Prototype>,
    outers: RefCell<Vec<Rc<Outer>>>,
    defaults: RefCell<Vec<Value>>,
    owner: RefCell<Option<Rc<Class>>>,
}

impl Closure {
    /// Create a closure registered in `heap`
    ///
    /// # Arguments
    ///
    /// * `proto` - Shared prototype
    /// * `outers` - One cell per outer descriptor of the prototype
    /// * `defaults` - Values for the trailing parameters
    pub fn new(
        heap: &Heap,
        proto: Rc<Prototype>,
        outers: Vec<Rc<Outer>>,
        defaults: Vec<Value>,
    ) -> Rc<Closure> {
        let closure = Rc::new(Closure {
            header: ObjectHeader::new(),
            proto,
            outers: RefCell::new(outers),
            defaults: RefCell::new(defaults),
            owner: RefCell::new(None),
        });
        heap.register(&closure);
        closure
    }

    /// Copy of this closure bound to `owner`, sharing prototype and outers
    pub fn bound_to(&self, heap: &Heap, owner: Rc<Class>) -> Rc<Closure> {
        let copy = Closure::new(
            heap,
            self.proto.clone(),
            self.outers.borrow().clone(),
            self.defaults.borrow().clone(),
        );
        *copy.owner.borrow_mut() = Some(owner);
        copy
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.proto.name
    }

    /// The shared prototype
    pub fn proto(&self) -> &Rc<Prototype> {
        &self.proto
    }

    /// Captured cell `index`
    pub fn outer(&self, index: usize) -> Option<Rc<Outer>> {
        self.outers.borrow().get(index).cloned()
    }

    /// Number of captured cells
    pub fn outer_count(&self) -> usize {
        self.outers.borrow().len()
    }

    /// Default values for the trailing parameters
    pub fn defaults(&self) -> Vec<Value> {
        self.defaults.borrow().clone()
    }

    /// Class the method was authored in
    pub fn owner(&self) -> Option<Rc<Class>> {
        self.owner.borrow().clone()
    }
}

impl Collectable for Closure {
    fn link(&self) -> &ChainLink {
        &self.header.link
    }

    fn trace(&self, visit: &mut dyn FnMut(&ChainLink)) {
        if let Ok(outers) = self.outers.try_borrow() {
            for outer in outers.iter() {
                visit(outer.link());
            }
        }
        if let Ok(defaults) = self.defaults.try_borrow() {
            for value in defaults.iter() {
                value.visit_link(visit);
            }
        }
        if let Ok(owner) = self.owner.try_borrow() {
            if let Some(class) = owner.as_ref() {
                visit(class.link());
            }
        }
    }

    fn clear(&self) {
        let outers = self.outers.try_borrow_mut().map(|mut o| std::mem::take(&mut *o));
        let defaults = self
            .defaults
            .try_borrow_mut()
            .map(|mut d| std::mem::take(&mut *d));
        let owner = self.owner.try_borrow_mut().map(|mut o| o.take());
        drop((outers, defaults, owner));
    }

    fn kind(&self) -> &'static str {
        "closure"
    }
}
