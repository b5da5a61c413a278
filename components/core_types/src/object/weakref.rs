//! Weak references
//!
//! A weak reference observes an object without keeping it alive. Once the
//! referent is dropped the reference reads as `null`.

use std::rc::{Rc, Weak};

use crate::object::{Array, Class, Closure, Dict, Instance, NativeClosure, Outer, Space};
use crate::value::Value;

enum Target {
    Array(Weak<Array>),
    Dict(Weak<Dict>),
    Closure(Weak<Closure>),
    NativeClosure(Weak<NativeClosure>),
    Class(Weak<Class>),
    Instance(Weak<Instance>),
    Space(Weak<Space>),
    Outer(Weak<Outer>),
}

/// Non-owning reference to a heap object
pub struct WeakRef {
    target: Target,
}

impl WeakRef {
    /// Create a weak reference to `value`
    ///
    /// # Returns
    ///
    /// `None` for values that are not weak-referenceable heap objects
    pub(crate) fn to(value: &Value) -> Option<WeakRef> {
        let target = match value {
            Value::Array(o) => Target::Array(Rc::downgrade(o)),
            Value::Dict(o) => Target::Dict(Rc::downgrade(o)),
            Value::Closure(o) => Target::Closure(Rc::downgrade(o)),
            Value::NativeClosure(o) => Target::NativeClosure(Rc::downgrade(o)),
            Value::Class(o) => Target::Class(Rc::downgrade(o)),
            Value::Instance(o) => Target::Instance(Rc::downgrade(o)),
            Value::Space(o) => Target::Space(Rc::downgrade(o)),
            Value::Outer(o) => Target::Outer(Rc::downgrade(o)),
            _ => return None,
        };
        Some(WeakRef { target })
    }

    /// The referent, or `null` once it has been dropped
    pub fn get(&self) -> Value {
        let value = match &self.target {
            Target::Array(w) => w.upgrade().map(Value::Array),
            Target::Dict(w) => w.upgrade().map(Value::Dict),
            Target::Closure(w) => w.upgrade().map(Value::Closure),
            Target::NativeClosure(w) => w.upgrade().map(Value::NativeClosure),
            Target::Class(w) => w.upgrade().map(Value::Class),
            Target::Instance(w) => w.upgrade().map(Value::Instance),
            Target::Space(w) => w.upgrade().map(Value::Space),
            Target::Outer(w) => w.upgrade().map(Value::Outer),
        };
        value.unwrap_or(Value::Null)
    }

    /// Check if the referent is still alive
    pub fn is_alive(&self) -> bool {
        match &self.target {
            Target::Array(w) => w.strong_count() > 0,
            Target::Dict(w) => w.strong_count() > 0,
            Target::Closure(w) => w.strong_count() > 0,
            Target::NativeClosure(w) => w.strong_count() > 0,
            Target::Class(w) => w.strong_count() > 0,
            Target::Instance(w) => w.strong_count() > 0,
            Target::Space(w) => w.strong_count() > 0,
            Target::Outer(w) => w.strong_count() > 0,
        }
    }
}
