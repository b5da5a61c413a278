//! Native functions
//!
//! A host function is described once with the [`NativeFunction`] builder
//! and instantiated into a [`NativeClosure`] when it is registered. The VM
//! checks argument counts and types against the description before calling
//! the function pointer.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use bytecode_system::CompileError;
use memory_manager::{ChainLink, Collectable, Heap};

use crate::error::{VmError, VmResult};
use crate::object::dict::Dict;
use crate::object::header::ObjectHeader;
use crate::type_tag::TypeTag;
use crate::value::Value;

/// What a native function can reach while it runs
pub trait NativeContext {
    /// Heap new objects are registered in
    fn heap(&self) -> &Heap;

    /// The root dict
    fn root(&self) -> Rc<Dict>;

    /// Call a script or native callable; `args[0]` is the receiver
    fn call(&mut self, callee: &Value, args: &[Value]) -> VmResult<Value>;
}

/// Native function pointer; `args[0]` is the receiver
pub type NativeFn = fn(&mut dyn NativeContext, &[Value]) -> VmResult<Value>;

/// Mask that accepts any type
pub const MASK_ANY: u32 = 0x00FF_FFFF;

fn mask_bits(ch: char) -> Option<u32> {
    let bits = match ch {
        '.' => MASK_ANY,
        'e' => TypeTag::NULL.base(),
        'i' => TypeTag::INTEGER.base(),
        'f' => TypeTag::FLOAT.base(),
        'C' => TypeTag::COMPLEX.base(),
        'b' => TypeTag::BOOL.base(),
        'n' => TypeTag::INTEGER.base() | TypeTag::FLOAT.base() | TypeTag::COMPLEX.base(),
        's' => TypeTag::STRING.base(),
        'd' => TypeTag::DICT.base(),
        'a' => TypeTag::ARRAY.base(),
        'c' => TypeTag::CLOSURE.base() | TypeTag::NATIVE_CLOSURE.base(),
        'x' => TypeTag::INSTANCE.base(),
        'y' => TypeTag::CLASS.base(),
        'w' => TypeTag::WEAKREF.base(),
        _ => return None,
    };
    Some(bits)
}

/// Parse a type-mask string into one bit set per parameter
///
/// Each character is a parameter slot; `|` joins alternatives for the
/// slot before it.
///
/// # Examples
///
/// ```
/// use core_types::parse_type_mask;
///
/// let masks = parse_type_mask(".i|fs").unwrap();
/// assert_eq!(masks.len(), 3);
/// assert!(parse_type_mask("iz").is_err());
/// ```
pub fn parse_type_mask(mask: &str) -> Result<Vec<u32>, CompileError> {
    let invalid = |found: char| CompileError::InvalidTypeMask {
        mask: mask.to_string(),
        found,
    };
    let mut slots: Vec<u32> = Vec::new();
    let mut join = false;
    for ch in mask.chars() {
        if ch == '|' {
            if join || slots.is_empty() {
                return Err(invalid(ch));
            }
            join = true;
            continue;
        }
        let bits = mask_bits(ch).ok_or_else(|| invalid(ch))?;
        match slots.last_mut() {
            Some(last) if join => *last |= bits,
            _ => slots.push(bits),
        }
        join = false;
    }
    if join {
        return Err(invalid('|'));
    }
    Ok(slots)
}

fn mask_names(mask: u32) -> String {
    if mask == MASK_ANY {
        return "any".to_string();
    }
    TypeTag::ALL
        .iter()
        .filter(|t| mask & t.base() != 0)
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join("|")
}

/// Native function description
///
/// # Examples
///
/// ```
/// use core_types::{NativeContext, NativeFunction, Value, VmResult};
///
/// fn twice(_: &mut dyn NativeContext, args: &[Value]) -> VmResult<Value> {
///     Ok(Value::Integer(args[1].as_int().unwrap_or(0) * 2))
/// }
///
/// let f = NativeFunction::new("twice", twice)
///     .params(2)
///     .type_mask(".i")
///     .unwrap()
///     .docs("Double an integer");
/// assert_eq!(f.name(), "twice");
/// ```
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    func: NativeFn,
    nparams: i64,
    type_mask: Vec<u32>,
    defaults: BTreeMap<usize, Value>,
    docs: String,
}

impl NativeFunction {
    /// Describe `func` under `name`; arguments are unchecked until
    /// [`params`](Self::params) is set
    pub fn new(name: impl Into<String>, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            func,
            nparams: 0,
            type_mask: Vec::new(),
            defaults: BTreeMap::new(),
            docs: String::new(),
        }
    }

    /// Parameter-count rule, counting the receiver
    ///
    /// `n > 0` requires exactly `n` values, `n < 0` at least `-n`, `0`
    /// disables the check.
    pub fn params(mut self, n: i64) -> Self {
        self.nparams = n;
        self
    }

    /// Per-parameter type mask, see [`parse_type_mask`]
    pub fn type_mask(mut self, mask: &str) -> Result<Self, CompileError> {
        self.type_mask = parse_type_mask(mask)?;
        Ok(self)
    }

    /// Value used when the caller omits parameter `index`
    pub fn default(mut self, index: usize, value: Value) -> Self {
        self.defaults.insert(index, value);
        self
    }

    /// Documentation string
    pub fn docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = docs.into();
        self
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instantiate into a closure registered in `heap`
    pub fn instantiate(&self, heap: &Heap) -> Rc<NativeClosure> {
        let closure = Rc::new(NativeClosure {
            header: ObjectHeader::new(),
            name: Rc::from(self.name.as_str()),
            func: self.func,
            nparams: self.nparams,
            type_mask: self.type_mask.clone(),
            defaults: RefCell::new(self.defaults.clone()),
            docs: Rc::from(self.docs.as_str()),
        });
        heap.register(&closure);
        closure
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("nparams", &self.nparams)
            .finish()
    }
}

/// Metadata a native closure exposes through `attribute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeAttribute {
    /// Registered name
    Name,
    /// Documentation string
    Docs,
    /// Parameter-count rule
    ParamCount,
    /// Minimum number of arguments the caller must pass
    MinArgs,
    /// Number of parameters with defaults
    DefaultCount,
    /// Expected type names per parameter
    TypeMask,
}

impl NativeAttribute {
    /// Look up an attribute by its script-level name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(NativeAttribute::Name),
            "docs" => Some(NativeAttribute::Docs),
            "n_params" => Some(NativeAttribute::ParamCount),
            "n_minargs" => Some(NativeAttribute::MinArgs),
            "n_defparams" => Some(NativeAttribute::DefaultCount),
            "typemask" => Some(NativeAttribute::TypeMask),
            _ => None,
        }
    }
}

/// Instantiated native function
pub struct NativeClosure {
    pub(crate) header: ObjectHeader,
    name: Rc<str>,
    func: NativeFn,
    nparams: i64,
    type_mask: Vec<u32>,
    defaults: RefCell<BTreeMap<usize, Value>>,
    docs: Rc<str>,
}

impl NativeClosure {
    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Function pointer
    pub fn func(&self) -> NativeFn {
        self.func
    }

    /// Parameter-count rule
    pub fn nparams(&self) -> i64 {
        self.nparams
    }

    fn min_args(&self) -> usize {
        let declared = self.nparams.unsigned_abs() as usize;
        let defaults = self.defaults.borrow();
        (0..declared)
            .rev()
            .take_while(|i| defaults.contains_key(i))
            .fold(declared, |n, _| n - 1)
    }

    /// Read one metadata attribute
    pub fn attribute(&self, attr: NativeAttribute) -> Value {
        match attr {
            NativeAttribute::Name => Value::String(self.name.clone()),
            NativeAttribute::Docs => Value::String(self.docs.clone()),
            NativeAttribute::ParamCount => Value::Integer(self.nparams),
            NativeAttribute::MinArgs => Value::Integer(self.min_args() as i64),
            NativeAttribute::DefaultCount => {
                Value::Integer(self.defaults.borrow().len() as i64)
            }
            NativeAttribute::TypeMask => {
                let names: Vec<String> = self.type_mask.iter().map(|m| mask_names(*m)).collect();
                Value::string(&names.join(", "))
            }
        }
    }

    /// Fill omitted parameters from defaults and validate counts and types
    ///
    /// # Arguments
    ///
    /// * `args` - Receiver followed by the call arguments; extended in place
    pub fn prepare_args(&self, args: &mut Vec<Value>) -> VmResult<()> {
        let declared = self.nparams.unsigned_abs() as usize;
        if self.nparams != 0 && args.len() < declared {
            let defaults = self.defaults.borrow();
            while args.len() < declared {
                match defaults.get(&args.len()) {
                    Some(v) => args.push(v.clone()),
                    None => break,
                }
            }
        }
        let count_ok = match self.nparams {
            0 => true,
            n if n > 0 => args.len() == declared,
            _ => args.len() >= declared,
        };
        if !count_ok {
            return Err(VmError::argument(format!(
                "'{}' expects {}{} arguments, got {}",
                self.name,
                if self.nparams < 0 { "at least " } else { "" },
                declared.saturating_sub(1),
                args.len().saturating_sub(1)
            )));
        }
        for (i, (mask, arg)) in self.type_mask.iter().zip(args.iter()).enumerate() {
            if mask & arg.tag().base() == 0 {
                return Err(VmError::argument(format!(
                    "parameter {} of '{}' has invalid type '{}'; expected '{}'",
                    i,
                    self.name,
                    arg.type_name(),
                    mask_names(*mask)
                )));
            }
        }
        Ok(())
    }
}

impl Collectable for NativeClosure {
    fn link(&self) -> &ChainLink {
        &self.header.link
    }

    fn trace(&self, visit: &mut dyn FnMut(&ChainLink)) {
        if let Ok(defaults) = self.defaults.try_borrow() {
            for value in defaults.values() {
                value.visit_link(visit);
            }
        }
    }

    fn clear(&self) {
        let defaults = self
            .defaults
            .try_borrow_mut()
            .map(|mut d| std::mem::take(&mut *d));
        drop(defaults);
    }

    fn kind(&self) -> &'static str {
        "native_closure"
    }
}
