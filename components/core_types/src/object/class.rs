//! Classes and instances
//!
//! A class keeps two tables: `methods` for callables and static members,
//! and `default_values` for per-instance fields. `members` maps every name
//! to its slot in one of them. Creating the first instance locks the class
//! and its ancestors against new fields.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use memory_manager::{ChainLink, Collectable, Heap};
use tracing::trace;

use crate::error::SlotError;
use crate::object::header::ObjectHeader;
use crate::object::Closure;
use crate::value::Value;

/// Upper bound on the number of members per class
pub const MAX_MEMBERS: usize = 0x00FF_FFFF;

/// Operator and protocol hooks a class may define
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaMethod {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Exp,
    /// unary `-`
    Neg,
    /// missing member read
    Get,
    /// missing member write
    Set,
    /// `typeof`
    TypeOf,
    /// `foreach` step
    Next,
    /// ordering
    Cmp,
    /// call an instance
    Call,
    /// slot creation
    NewSlot,
    /// slot deletion
    DelSlot,
    /// member added to the class
    NewMember,
    /// class derived from this one
    Inherit,
    /// string conversion
    String,
}

impl MetaMethod {
    /// Number of metamethods
    pub const COUNT: usize = 18;

    /// Every metamethod in table order
    pub const ALL: [MetaMethod; Self::COUNT] = [
        MetaMethod::Add,
        MetaMethod::Sub,
        MetaMethod::Mul,
        MetaMethod::Div,
        MetaMethod::Mod,
        MetaMethod::Exp,
        MetaMethod::Neg,
        MetaMethod::Get,
        MetaMethod::Set,
        MetaMethod::TypeOf,
        MetaMethod::Next,
        MetaMethod::Cmp,
        MetaMethod::Call,
        MetaMethod::NewSlot,
        MetaMethod::DelSlot,
        MetaMethod::NewMember,
        MetaMethod::Inherit,
        MetaMethod::String,
    ];

    /// Member name that defines the metamethod
    pub fn name(self) -> &'static str {
        match self {
            MetaMethod::Add => "_add",
            MetaMethod::Sub => "_sub",
            MetaMethod::Mul => "_mul",
            MetaMethod::Div => "_div",
            MetaMethod::Mod => "_mod",
            MetaMethod::Exp => "_exp",
            MetaMethod::Neg => "_neg",
            MetaMethod::Get => "_get",
            MetaMethod::Set => "_set",
            MetaMethod::TypeOf => "_typeof",
            MetaMethod::Next => "_next",
            MetaMethod::Cmp => "_cmp",
            MetaMethod::Call => "_call",
            MetaMethod::NewSlot => "_newslot",
            MetaMethod::DelSlot => "_delslot",
            MetaMethod::NewMember => "_newmember",
            MetaMethod::Inherit => "_inherit",
            MetaMethod::String => "_string",
        }
    }

    /// Metamethod defined by member `name`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// Index into the metamethod table
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Slot a member name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    /// Index into the per-instance fields
    Field(usize),
    /// Index into the shared methods and statics
    Method(usize),
}

/// One entry of a member table
#[derive(Debug, Clone)]
pub struct ClassMember {
    /// Member name
    pub key: Rc<str>,
    /// Method, static value or field default
    pub value: Value,
    /// User attributes, `null` when unset
    pub attributes: Value,
}

/// Script class
pub struct Class {
    pub(crate) header: ObjectHeader,
    heap: Heap,
    base: Option<Rc<Class>>,
    constructor_name: Rc<str>,
    members: RefCell<HashMap<Rc<str>, Member>>,
    methods: RefCell<Vec<ClassMember>>,
    default_values: RefCell<Vec<ClassMember>>,
    meta_funcs: RefCell<Vec<Value>>,
    attributes: RefCell<Value>,
    locked: Cell<bool>,
    constructor: Cell<Option<usize>>,
}

impl Class {
    /// Create a class, inheriting every member of `base`
    ///
    /// # Arguments
    ///
    /// * `heap` - Heap the class, its instances and its rebound methods live in
    /// * `base` - Optional base class
    /// * `constructor_name` - Method name recognized as the constructor
    pub fn new(heap: &Heap, base: Option<Rc<Class>>, constructor_name: &str) -> Rc<Class> {
        let (members, methods, defaults, metas, constructor) = match &base {
            Some(b) => (
                b.members.borrow().clone(),
                b.methods.borrow().clone(),
                b.default_values.borrow().clone(),
                b.meta_funcs.borrow().clone(),
                b.constructor.get(),
            ),
            None => (
                HashMap::new(),
                Vec::new(),
                Vec::new(),
                vec![Value::Null; MetaMethod::COUNT],
                None,
            ),
        };
        let class = Rc::new(Class {
            header: ObjectHeader::new(),
            heap: heap.clone(),
            base,
            constructor_name: Rc::from(constructor_name),
            members: RefCell::new(members),
            methods: RefCell::new(methods),
            default_values: RefCell::new(defaults),
            meta_funcs: RefCell::new(metas),
            attributes: RefCell::new(Value::Null),
            locked: Cell::new(false),
            constructor: Cell::new(constructor),
        });
        heap.register(&class);
        class
    }

    /// Base class
    pub fn base(&self) -> Option<Rc<Class>> {
        self.base.clone()
    }

    /// Check if an instance of this class or a derived class exists
    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// Lock this class and its ancestors against new fields
    pub fn lock(&self) {
        self.locked.set(true);
        if let Some(base) = &self.base {
            base.lock();
        }
    }

    /// Add a member
    ///
    /// Callables and static values go to the method table and are accepted
    /// on a locked class; anything else is a field. A callable named after a
    /// metamethod is stored in the metamethod table instead. A script closure
    /// is rebound to this class unless it already belongs to it or is the very
    /// method inherited under the same name.
    pub fn new_slot(self: &Rc<Self>, key: Rc<str>, value: Value, is_static: bool) -> Result<(), SlotError> {
        let callable = matches!(value, Value::Closure(_) | Value::NativeClosure(_));
        let shared = callable || is_static;
        if self.locked.get() && !shared {
            return Err(SlotError::Locked(key.to_string()));
        }

        let existing = self.members.borrow().get(&key).copied();
        if let Some(Member::Field(idx)) = existing {
            let old = std::mem::replace(&mut self.default_values.borrow_mut()[idx].value, value);
            drop(old);
            return Ok(());
        }
        if self.members.borrow().len() >= MAX_MEMBERS {
            return Err(SlotError::TooManyMembers);
        }

        if !shared {
            let mut defaults = self.default_values.borrow_mut();
            self.members
                .borrow_mut()
                .insert(key.clone(), Member::Field(defaults.len()));
            defaults.push(ClassMember {
                key,
                value,
                attributes: Value::Null,
            });
            return Ok(());
        }

        if callable {
            if let Some(meta) = MetaMethod::from_name(&key) {
                trace!(meta = meta.name(), "metamethod defined");
                let old = std::mem::replace(&mut self.meta_funcs.borrow_mut()[meta.index()], value);
                drop(old);
                return Ok(());
            }
        }

        let rebound = match &value {
            Value::Closure(c) if !self.is_inherited(&key, &value) && !self.owns(c) => {
                Some(Value::Closure(c.bound_to(&self.heap, self.clone())))
            }
            _ => None,
        };
        let value = rebound.unwrap_or(value);
        match existing {
            Some(Member::Method(idx)) => {
                let old = std::mem::replace(&mut self.methods.borrow_mut()[idx].value, value);
                drop(old);
            }
            _ => {
                let mut methods = self.methods.borrow_mut();
                let idx = methods.len();
                if *key == *self.constructor_name && self.constructor.get().is_none() {
                    self.constructor.set(Some(idx));
                }
                self.members.borrow_mut().insert(key.clone(), Member::Method(idx));
                methods.push(ClassMember {
                    key,
                    value,
                    attributes: Value::Null,
                });
            }
        }
        Ok(())
    }

    fn owns(self: &Rc<Self>, closure: &Closure) -> bool {
        closure.owner().is_some_and(|o| Rc::ptr_eq(&o, self))
    }

    fn is_inherited(&self, key: &str, value: &Value) -> bool {
        self.base
            .as_ref()
            .and_then(|b| b.method(key))
            .is_some_and(|m| m.same_object(value))
    }

    /// Slot `key` resolves to
    pub fn member(&self, key: &str) -> Option<Member> {
        self.members.borrow().get(key).copied()
    }

    /// Method or static member `key`
    pub fn method(&self, key: &str) -> Option<Value> {
        match self.member(key)? {
            Member::Method(idx) => self.methods.borrow().get(idx).map(|m| m.value.clone()),
            Member::Field(_) => None,
        }
    }

    /// Member value: the method, static value or field default
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.member(key)? {
            Member::Method(idx) => self.methods.borrow().get(idx).map(|m| m.value.clone()),
            Member::Field(idx) => self.default_values.borrow().get(idx).map(|m| m.value.clone()),
        }
    }

    /// Overwrite an existing member
    ///
    /// # Returns
    ///
    /// `false` if the member does not exist
    pub fn set(&self, key: &str, value: Value) -> bool {
        let old = match self.member(key) {
            Some(Member::Method(idx)) => {
                std::mem::replace(&mut self.methods.borrow_mut()[idx].value, value)
            }
            Some(Member::Field(idx)) => {
                std::mem::replace(&mut self.default_values.borrow_mut()[idx].value, value)
            }
            None => return false,
        };
        drop(old);
        true
    }

    /// Constructor method
    pub fn constructor(&self) -> Option<Value> {
        let idx = self.constructor.get()?;
        self.methods.borrow().get(idx).map(|m| m.value.clone())
    }

    /// Metamethod `meta` if defined
    pub fn meta(&self, meta: MetaMethod) -> Option<Value> {
        let value = self.meta_funcs.borrow()[meta.index()].clone();
        (!value.is_null()).then_some(value)
    }

    /// Class attributes
    pub fn attributes(&self) -> Value {
        self.attributes.borrow().clone()
    }

    /// Replace the class attributes
    pub fn set_attributes(&self, attributes: Value) {
        let old = self.attributes.replace(attributes);
        drop(old);
    }

    /// Attributes of member `key`
    pub fn member_attributes(&self, key: &str) -> Option<Value> {
        match self.member(key)? {
            Member::Method(idx) => self.methods.borrow().get(idx).map(|m| m.attributes.clone()),
            Member::Field(idx) => self
                .default_values
                .borrow()
                .get(idx)
                .map(|m| m.attributes.clone()),
        }
    }

    /// Set the attributes of member `key`
    pub fn set_member_attributes(&self, key: &str, attributes: Value) -> Result<(), SlotError> {
        let old = match self.member(key) {
            Some(Member::Method(idx)) => {
                std::mem::replace(&mut self.methods.borrow_mut()[idx].attributes, attributes)
            }
            Some(Member::Field(idx)) => std::mem::replace(
                &mut self.default_values.borrow_mut()[idx].attributes,
                attributes,
            ),
            None => return Err(SlotError::Missing(key.to_string())),
        };
        drop(old);
        Ok(())
    }

    /// Member names in insertion order: fields first, then methods
    pub fn member_names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = self
            .default_values
            .borrow()
            .iter()
            .map(|m| m.key.clone())
            .collect();
        names.extend(self.methods.borrow().iter().map(|m| m.key.clone()));
        names
    }

    /// Number of per-instance fields
    pub fn field_count(&self) -> usize {
        self.default_values.borrow().len()
    }

    /// Check if `self` is `other` or derives from it
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.base.as_ref().is_some_and(|b| b.is_subclass_of(other))
    }

    /// Create an instance
    ///
    /// Locks the class and copies the field defaults into the instance.
    pub fn create_instance(self: &Rc<Self>) -> Rc<Instance> {
        self.lock();
        let values: Vec<Value> = self
            .default_values
            .borrow()
            .iter()
            .map(|m| m.value.deep_copy(&self.heap))
            .collect();
        let instance = Rc::new(Instance {
            header: ObjectHeader::new(),
            class: self.clone(),
            values: RefCell::new(values),
        });
        self.heap.register(&instance);
        instance
    }
}

impl Collectable for Class {
    fn link(&self) -> &ChainLink {
        &self.header.link
    }

    fn trace(&self, visit: &mut dyn FnMut(&ChainLink)) {
        if let Some(base) = &self.base {
            visit(base.link());
        }
        if let Ok(methods) = self.methods.try_borrow() {
            for m in methods.iter() {
                m.value.visit_link(visit);
                m.attributes.visit_link(visit);
            }
        }
        if let Ok(defaults) = self.default_values.try_borrow() {
            for m in defaults.iter() {
                m.value.visit_link(visit);
                m.attributes.visit_link(visit);
            }
        }
        if let Ok(metas) = self.meta_funcs.try_borrow() {
            for v in metas.iter() {
                v.visit_link(visit);
            }
        }
        if let Ok(attributes) = self.attributes.try_borrow() {
            attributes.visit_link(visit);
        }
    }

    fn clear(&self) {
        let methods = self.methods.try_borrow_mut().map(|mut m| std::mem::take(&mut *m));
        let defaults = self
            .default_values
            .try_borrow_mut()
            .map(|mut d| std::mem::take(&mut *d));
        let metas = self.meta_funcs.try_borrow_mut().map(|mut m| {
            std::mem::replace(&mut *m, vec![Value::Null; MetaMethod::COUNT])
        });
        let attributes = self
            .attributes
            .try_borrow_mut()
            .map(|mut a| std::mem::take(&mut *a));
        if let Ok(mut members) = self.members.try_borrow_mut() {
            members.clear();
        }
        self.constructor.set(None);
        drop((methods, defaults, metas, attributes));
    }

    fn kind(&self) -> &'static str {
        "class"
    }
}

/// Instance of a class
pub struct Instance {
    pub(crate) header: ObjectHeader,
    class: Rc<Class>,
    values: RefCell<Vec<Value>>,
}

impl Instance {
    /// Class the instance was created from
    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// Field value or class method `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.class.member(key)? {
            Member::Field(idx) => self.values.borrow().get(idx).cloned(),
            Member::Method(_) => self.class.method(key),
        }
    }

    /// Overwrite field `key`
    ///
    /// # Returns
    ///
    /// `false` if `key` is not a field
    pub fn set(&self, key: &str, value: Value) -> bool {
        let Some(Member::Field(idx)) = self.class.member(key) else {
            return false;
        };
        let mut values = self.values.borrow_mut();
        match values.get_mut(idx) {
            Some(slot) => {
                let old = std::mem::replace(slot, value);
                drop(values);
                drop(old);
                true
            }
            None => false,
        }
    }

    /// Metamethod `meta` of the class
    pub fn meta(&self, meta: MetaMethod) -> Option<Value> {
        self.class.meta(meta)
    }

    /// Check if the instance's class is `class` or derives from it
    pub fn instance_of(&self, class: &Class) -> bool {
        self.class.is_subclass_of(class)
    }
}

impl Collectable for Instance {
    fn link(&self) -> &ChainLink {
        &self.header.link
    }

    fn trace(&self, visit: &mut dyn FnMut(&ChainLink)) {
        visit(self.class.link());
        if let Ok(values) = self.values.try_borrow() {
            for v in values.iter() {
                v.visit_link(visit);
            }
        }
    }

    fn clear(&self) {
        let values = self.values.try_borrow_mut().map(|mut v| std::mem::take(&mut *v));
        drop(values);
    }

    fn kind(&self) -> &'static str {
        "instance"
    }
}
