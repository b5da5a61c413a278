//! Dicts

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::rc::Rc;

use memory_manager::{ChainLink, Collectable, Heap};

use crate::object::header::ObjectHeader;
use crate::value::Value;

/// String-keyed mapping
///
/// Iteration order is key order; scripts must not rely on it.
pub struct Dict {
    pub(crate) header: ObjectHeader,
    entries: RefCell<BTreeMap<Rc<str>, Value>>,
}

impl Dict {
    /// Create an empty dict registered in `heap`
    pub fn new(heap: &Heap) -> Rc<Dict> {
        let dict = Rc::new(Dict {
            header: ObjectHeader::new(),
            entries: RefCell::new(BTreeMap::new()),
        });
        heap.register(&dict);
        dict
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Check if the dict is empty
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    /// Check if `key` exists
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Overwrite an existing entry
    ///
    /// # Returns
    ///
    /// `false` if the key does not exist
    pub fn set(&self, key: &str, value: Value) -> bool {
        match self.entries.borrow_mut().get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Create or overwrite an entry
    pub fn new_slot(&self, key: Rc<str>, value: Value) {
        let old = self.entries.borrow_mut().insert(key, value);
        drop(old);
    }

    /// Remove an entry
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.borrow_mut().remove(key)
    }

    /// Snapshot of all entries in key order
    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Keys in key order
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Entry following `after` in key order, or the first entry for `None`
    ///
    /// Used by `foreach`; entries added or removed during iteration are
    /// seen or skipped according to their key position.
    pub fn next_entry(&self, after: Option<&str>) -> Option<(Rc<str>, Value)> {
        let entries = self.entries.borrow();
        let mut range = match after {
            Some(key) => entries.range::<str, _>((Bound::Excluded(key), Bound::Unbounded)),
            None => entries.range::<str, _>(..),
        };
        range.next().map(|(k, v)| (k.clone(), v.clone()))
    }
}

impl Collectable for Dict {
    fn link(&self) -> &ChainLink {
        &self.header.link
    }

    fn trace(&self, visit: &mut dyn FnMut(&ChainLink)) {
        if let Ok(entries) = self.entries.try_borrow() {
            for value in entries.values() {
                value.visit_link(visit);
            }
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.try_borrow_mut() {
            let dropped = std::mem::take(&mut *entries);
            drop(entries);
            drop(dropped);
        }
    }

    fn kind(&self) -> &'static str {
        "dict"
    }
}
