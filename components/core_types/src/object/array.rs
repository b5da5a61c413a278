//! Arrays

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use memory_manager::{ChainLink, Collectable, Heap};

use crate::error::SlotError;
use crate::object::header::ObjectHeader;
use crate::value::Value;

/// Growable sequence of values
pub struct Array {
    pub(crate) header: ObjectHeader,
    items: RefCell<Vec<Value>>,
}

impl Array {
    /// Create an array registered in `heap`
    pub fn new(heap: &Heap, items: Vec<Value>) -> Rc<Array> {
        let array = Rc::new(Array {
            header: ObjectHeader::new(),
            items: RefCell::new(items),
        });
        heap.register(&array);
        array
    }

    /// Create an empty array with reserved capacity
    pub fn with_capacity(heap: &Heap, capacity: usize) -> Rc<Array> {
        Self::new(heap, Vec::with_capacity(capacity))
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Check if the array is empty
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    /// Element at a script-level index
    pub fn get_index(&self, index: i64) -> Result<Value, SlotError> {
        let items = self.items.borrow();
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or(SlotError::OutOfRange {
                index,
                len: items.len(),
            })
    }

    /// Overwrite the element at a script-level index
    pub fn set_index(&self, index: i64, value: Value) -> Result<(), SlotError> {
        let mut items = self.items.borrow_mut();
        let len = items.len();
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| items.get_mut(i))
            .ok_or(SlotError::OutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Append a value
    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    /// Remove and return the last value
    pub fn pop(&self) -> Option<Value> {
        self.items.borrow_mut().pop()
    }

    /// Remove the element at a script-level index
    pub fn remove(&self, index: i64) -> Result<Value, SlotError> {
        let mut items = self.items.borrow_mut();
        let len = items.len();
        match usize::try_from(index) {
            Ok(i) if i < len => Ok(items.remove(i)),
            _ => Err(SlotError::OutOfRange { index, len }),
        }
    }

    /// Remove every element
    pub fn clear(&self) {
        let items = std::mem::take(&mut *self.items.borrow_mut());
        drop(items);
    }

    /// Borrow the elements
    pub fn items(&self) -> Ref<'_, Vec<Value>> {
        self.items.borrow()
    }

    /// Copy of the elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }
}

impl Collectable for Array {
    fn link(&self) -> &ChainLink {
        &self.header.link
    }

    fn trace(&self, visit: &mut dyn FnMut(&ChainLink)) {
        if let Ok(items) = self.items.try_borrow() {
            for item in items.iter() {
                item.visit_link(visit);
            }
        }
    }

    fn clear(&self) {
        if let Ok(mut items) = self.items.try_borrow_mut() {
            let dropped = std::mem::take(&mut *items);
            drop(items);
            drop(dropped);
        }
    }

    fn kind(&self) -> &'static str {
        "array"
    }
}
