//! Script value representation
//!
//! [`Value`] is a tagged union over every runtime type. Primitive payloads
//! are stored inline; heap objects are held through `Rc`, so cloning a
//! value retains the object and dropping it releases it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use bytecode_system::{Literal, Prototype};
use memory_manager::{ChainLink, Collectable, Heap};
use num_traits::Zero;

use crate::complex::Complex;
use crate::object::{
    Array, Class, Closure, Dict, Instance, NativeClosure, Outer, Space, WeakRef,
};
use crate::type_tag::TypeTag;

/// Any script value
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let five = Value::Integer(5);
/// assert!(five.check_equal(&Value::Float(5.0)));
/// assert!(Value::Integer(0).is_falsy());
/// assert_eq!(Value::from("hi").type_name(), "string");
/// ```
#[derive(Clone, Default)]
pub enum Value {
    /// `null`
    #[default]
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// Complex number
    Complex(Complex),
    /// Boolean
    Bool(bool),
    /// Immutable string
    String(Rc<str>),
    /// Ordered sequence
    Array(Rc<Array>),
    /// String-keyed mapping
    Dict(Rc<Dict>),
    /// Script function with captured outers
    Closure(Rc<Closure>),
    /// Host function
    NativeClosure(Rc<NativeClosure>),
    /// Class
    Class(Rc<Class>),
    /// Class instance
    Instance(Rc<Instance>),
    /// Weak reference
    WeakRef(Rc<WeakRef>),
    /// Domain descriptor
    Space(Rc<Space>),
    /// Captured-variable cell
    Outer(Rc<Outer>),
    /// Compiled function
    Prototype(Rc<Prototype>),
}

impl Value {
    /// Type tag of the active variant
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::NULL,
            Value::Integer(_) => TypeTag::INTEGER,
            Value::Float(_) => TypeTag::FLOAT,
            Value::Complex(_) => TypeTag::COMPLEX,
            Value::Bool(_) => TypeTag::BOOL,
            Value::String(_) => TypeTag::STRING,
            Value::Array(_) => TypeTag::ARRAY,
            Value::Dict(_) => TypeTag::DICT,
            Value::Closure(_) => TypeTag::CLOSURE,
            Value::NativeClosure(_) => TypeTag::NATIVE_CLOSURE,
            Value::Class(_) => TypeTag::CLASS,
            Value::Instance(_) => TypeTag::INSTANCE,
            Value::WeakRef(_) => TypeTag::WEAKREF,
            Value::Space(_) => TypeTag::SPACE,
            Value::Outer(_) => TypeTag::OUTER,
            Value::Prototype(_) => TypeTag::PROTOTYPE,
        }
    }

    /// Type name without metamethod overrides
    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    /// Create a string value
    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    /// Convert a literal constant
    pub fn from_literal(lit: &Literal) -> Value {
        match lit {
            Literal::Null => Value::Null,
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Complex { re, im } => Value::Complex(Complex::new(*re, *im)),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::String(s) => Value::string(s),
            Literal::Space(s) => Value::Space(Space::from_literal(s)),
        }
    }

    /// Check if the value is `null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Falsy values: `null`, `false`, `0`, `0.0` and `0+0i`
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Integer(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Complex(c) => c.is_zero(),
            _ => false,
        }
    }

    /// Negation of [`is_falsy`](Self::is_falsy)
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer or float payload as `f64`
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Any numeric payload promoted to complex
    pub fn as_complex(&self) -> Option<Complex> {
        match self {
            Value::Integer(i) => Some(Complex::from(*i)),
            Value::Float(f) => Some(Complex::from(*f)),
            Value::Complex(c) => Some(*c),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Current strong count of a heap object, `None` for inline values
    pub fn ref_count(&self) -> Option<usize> {
        let count = match self {
            Value::String(o) => Rc::strong_count(o),
            Value::Array(o) => Rc::strong_count(o),
            Value::Dict(o) => Rc::strong_count(o),
            Value::Closure(o) => Rc::strong_count(o),
            Value::NativeClosure(o) => Rc::strong_count(o),
            Value::Class(o) => Rc::strong_count(o),
            Value::Instance(o) => Rc::strong_count(o),
            Value::WeakRef(o) => Rc::strong_count(o),
            Value::Space(o) => Rc::strong_count(o),
            Value::Outer(o) => Rc::strong_count(o),
            Value::Prototype(o) => Rc::strong_count(o),
            _ => return None,
        };
        Some(count)
    }

    /// Address of the referenced object, `None` for inline values
    fn identity(&self) -> Option<*const ()> {
        let ptr = match self {
            Value::String(o) => Rc::as_ptr(o) as *const (),
            Value::Array(o) => Rc::as_ptr(o) as *const (),
            Value::Dict(o) => Rc::as_ptr(o) as *const (),
            Value::Closure(o) => Rc::as_ptr(o) as *const (),
            Value::NativeClosure(o) => Rc::as_ptr(o) as *const (),
            Value::Class(o) => Rc::as_ptr(o) as *const (),
            Value::Instance(o) => Rc::as_ptr(o) as *const (),
            Value::WeakRef(o) => Rc::as_ptr(o) as *const (),
            Value::Space(o) => Rc::as_ptr(o) as *const (),
            Value::Outer(o) => Rc::as_ptr(o) as *const (),
            Value::Prototype(o) => Rc::as_ptr(o) as *const (),
            _ => return None,
        };
        Some(ptr)
    }

    /// Check if both values reference the same heap object
    pub fn same_object(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Weak reference to this value
    ///
    /// Heap objects return their cached [`WeakRef`]; every other value is
    /// returned unchanged.
    pub fn weak_ref(&self) -> Value {
        let slot = match self {
            Value::Array(o) => &o.header.weak,
            Value::Dict(o) => &o.header.weak,
            Value::Closure(o) => &o.header.weak,
            Value::NativeClosure(o) => &o.header.weak,
            Value::Class(o) => &o.header.weak,
            Value::Instance(o) => &o.header.weak,
            Value::Outer(o) => &o.header.weak,
            Value::Space(o) => &o.weak,
            _ => return self.clone(),
        };
        match WeakRef::to(self) {
            Some(weak) => Value::WeakRef(slot.get_or_create(|| weak)),
            None => self.clone(),
        }
    }

    /// Equality used by `==`
    ///
    /// Numbers compare after promotion, strings and spaces by content, and
    /// every other heap object by identity.
    pub fn check_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Space(a), Value::Space(b)) => a.same_as(b),
            (Value::Complex(_), _) | (_, Value::Complex(_)) => {
                match (self.as_complex(), other.as_complex()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            _ => self.tag() == other.tag() && self.same_object(other),
        }
    }

    /// Structural equality
    ///
    /// Like [`check_equal`](Self::check_equal) but arrays and dicts compare
    /// element by element.
    pub fn deep_equal(&self, other: &Value) -> bool {
        let mut visiting = Vec::new();
        deep_equal_inner(self, other, &mut visiting)
    }

    /// Copy arrays and dicts recursively into fresh objects registered in
    /// `heap`; every other value is aliased
    pub fn deep_copy(&self, heap: &Heap) -> Value {
        let mut copies = HashMap::new();
        deep_copy_inner(self, heap, &mut copies)
    }

    /// Report the chain link of the referenced object if it is registered
    pub fn visit_link(&self, visit: &mut dyn FnMut(&ChainLink)) {
        match self {
            Value::Array(o) => visit(o.link()),
            Value::Dict(o) => visit(o.link()),
            Value::Closure(o) => visit(o.link()),
            Value::NativeClosure(o) => visit(o.link()),
            Value::Class(o) => visit(o.link()),
            Value::Instance(o) => visit(o.link()),
            Value::Outer(o) => visit(o.link()),
            _ => {}
        }
    }
}

fn deep_equal_inner(a: &Value, b: &Value, visiting: &mut Vec<(*const (), *const ())>) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let key = (Rc::as_ptr(x) as *const (), Rc::as_ptr(y) as *const ());
            if visiting.contains(&key) {
                return true;
            }
            let (xs, ys) = (x.to_vec(), y.to_vec());
            if xs.len() != ys.len() {
                return false;
            }
            visiting.push(key);
            let equal = xs
                .iter()
                .zip(&ys)
                .all(|(l, r)| deep_equal_inner(l, r, visiting));
            visiting.pop();
            equal
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let key = (Rc::as_ptr(x) as *const (), Rc::as_ptr(y) as *const ());
            if visiting.contains(&key) {
                return true;
            }
            let (xs, ys) = (x.entries(), y.entries());
            if xs.len() != ys.len() {
                return false;
            }
            visiting.push(key);
            let equal = xs
                .iter()
                .zip(&ys)
                .all(|((lk, lv), (rk, rv))| lk == rk && deep_equal_inner(lv, rv, visiting));
            visiting.pop();
            equal
        }
        _ => a.check_equal(b),
    }
}

fn deep_copy_inner(value: &Value, heap: &Heap, copies: &mut HashMap<*const (), Value>) -> Value {
    match value {
        Value::Array(a) => {
            let key = Rc::as_ptr(a) as *const ();
            if let Some(copy) = copies.get(&key) {
                return copy.clone();
            }
            let copy = Array::new(heap, Vec::new());
            copies.insert(key, Value::Array(copy.clone()));
            for item in a.to_vec() {
                copy.push(deep_copy_inner(&item, heap, copies));
            }
            Value::Array(copy)
        }
        Value::Dict(d) => {
            let key = Rc::as_ptr(d) as *const ();
            if let Some(copy) = copies.get(&key) {
                return copy.clone();
            }
            let copy = Dict::new(heap);
            copies.insert(key, Value::Dict(copy.clone()));
            for (k, v) in d.entries() {
                copy.new_slot(k, deep_copy_inner(&v, heap, copies));
            }
            Value::Dict(copy)
        }
        other => other.clone(),
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Complex> for Value {
    fn from(c: Complex) -> Self {
        Value::Complex(c)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Complex(c) => f.debug_tuple("Complex").field(c).finish(),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Array(a) => write!(f, "Array(len={})", a.len()),
            Value::Dict(d) => write!(f, "Dict(len={})", d.len()),
            Value::Closure(c) => write!(f, "Closure({})", c.name()),
            Value::NativeClosure(n) => write!(f, "NativeClosure({})", n.name()),
            Value::Class(_) => write!(f, "Class({:p})", self.identity().unwrap_or(std::ptr::null())),
            Value::Instance(_) => {
                write!(f, "Instance({:p})", self.identity().unwrap_or(std::ptr::null()))
            }
            Value::WeakRef(w) => write!(f, "WeakRef(alive={})", w.is_alive()),
            Value::Space(s) => write!(f, "Space({s})"),
            Value::Outer(_) => write!(f, "Outer"),
            Value::Prototype(p) => write!(f, "Prototype({})", p.name),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Complex(c) => write!(f, "{c}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Space(s) => write!(f, "{s}"),
            Value::Closure(c) => write!(f, "(closure : {})", c.name()),
            Value::NativeClosure(n) => write!(f, "(native_closure : {})", n.name()),
            other => write!(
                f,
                "({} : {:p})",
                other.type_name(),
                other.identity().unwrap_or(std::ptr::null())
            ),
        }
    }
}
