//! Virtual Machine for bytecode execution
//!
//! Main entry point for executing Tern prototypes.

use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytecode_system::{CompileError, Prototype};
use core_types::{
    Array, Class, Closure, Dict, ErrorKind, MetaMethod, NativeClosure, NativeFunction, TraceEntry,
    TypeTag, Value, VmError, VmResult,
};
use memory_manager::Heap;
use tracing::{debug, trace, warn};

use crate::call_frame::CallFrame;
use crate::config::VmConfig;
use crate::delegates;
use crate::outers::OpenOuters;

/// Virtual Machine for executing Tern bytecode
///
/// The VM manages the execution state including:
/// - A single value stack shared by every call frame
/// - The call frame stack and the list of open outers
/// - The root dict (globals) and per-type delegate tables
/// - Its own heap with the cycle collector
///
/// # Examples
///
/// ```
/// use bytecode_system::{FunctionState, Opcode, ARG_INVALID};
/// use interpreter::Vm;
///
/// let mut fs = FunctionState::new("main");
/// let a = fs.push_target(None).unwrap() as i64;
/// let b = fs.push_target(None).unwrap() as i64;
/// fs.emit(Opcode::LoadInteger, a, 40, 0, 0);
/// fs.emit(Opcode::LoadInteger, b, 2, 0, 0);
/// fs.emit(Opcode::Add, a, a, b, 0);
/// fs.emit(Opcode::Return, a, ARG_INVALID, 0, 0);
///
/// let mut vm = Vm::new();
/// let result = vm.run(std::rc::Rc::new(fs.build_prototype())).unwrap();
/// assert_eq!(result.as_int(), Some(42));
/// ```
pub struct Vm {
    pub(crate) config: VmConfig,
    pub(crate) heap: Heap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) open_outers: OpenOuters,
    pub(crate) root: Rc<Dict>,
    pub(crate) delegates: Vec<Rc<Dict>>,
    pub(crate) last_error: Option<VmError>,
    pub(crate) interrupt: Arc<AtomicBool>,
    pub(crate) native_depth: usize,
}

impl Vm {
    /// Create a VM with the default configuration
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with a custom configuration
    ///
    /// The core delegates (`len`, `append`, `weakref`, `ref`, `attribute`)
    /// are installed before the VM is returned.
    pub fn with_config(config: VmConfig) -> Self {
        let heap = Heap::with_config(config.gc);
        let root = Dict::new(&heap);
        let delegate_tables = TypeTag::ALL.iter().map(|_| Dict::new(&heap)).collect();
        let mut vm = Self {
            stack: Vec::with_capacity(config.initial_stack),
            frames: Vec::with_capacity(64),
            open_outers: OpenOuters::new(),
            root,
            delegates: delegate_tables,
            last_error: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            native_depth: 0,
            heap,
            config,
        };
        delegates::install_core(&mut vm);
        vm
    }

    /// Active configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The VM's heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The root dict holding globals
    pub fn root(&self) -> Rc<Dict> {
        self.root.clone()
    }

    /// Get a global variable
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.root.get(name)
    }

    /// Set a global variable, creating it if needed
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.root.new_slot(Rc::from(name), value);
    }

    /// Install a native function into the root dict
    ///
    /// # Errors
    ///
    /// `CompileError::DuplicateRegistration` if the name is taken
    pub fn register_global(&mut self, function: NativeFunction) -> Result<(), CompileError> {
        if self.root.contains(function.name()) {
            return Err(CompileError::DuplicateRegistration(function.name().to_string()));
        }
        let closure = function.instantiate(&self.heap);
        debug!(name = function.name(), "registered global");
        self.root
            .new_slot(Rc::from(function.name()), Value::NativeClosure(closure));
        Ok(())
    }

    /// Install a native function as a delegate of every value tagged `tag`
    ///
    /// # Errors
    ///
    /// `CompileError::DuplicateRegistration` if the type already has a
    /// delegate with that name
    pub fn register_delegate(
        &mut self,
        tag: TypeTag,
        function: NativeFunction,
    ) -> Result<(), CompileError> {
        let table = self.delegate_table(tag);
        if table.contains(function.name()) {
            return Err(CompileError::DuplicateRegistration(format!(
                "{}.{}",
                tag.name(),
                function.name()
            )));
        }
        debug!(tag = tag.name(), name = function.name(), "registered delegate");
        let closure = function.instantiate(&self.heap);
        table.new_slot(Rc::from(function.name()), Value::NativeClosure(closure));
        Ok(())
    }

    pub(crate) fn delegate_table(&self, tag: TypeTag) -> Rc<Dict> {
        self.delegates[tag.index()].clone()
    }

    /// Delegate `key` for values tagged `tag`
    pub fn delegate(&self, tag: TypeTag, key: &str) -> Option<Value> {
        self.delegates[tag.index()].get(key)
    }

    /// Error of the last failed call, with its trace
    pub fn last_error(&self) -> Option<&VmError> {
        self.last_error.as_ref()
    }

    /// Shared flag that interrupts execution at the next instruction
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Number of active call frames
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Number of live value stack slots
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Wrap a top-level prototype in a closure
    ///
    /// # Errors
    ///
    /// A compile error if the prototype captures variables of an enclosing
    /// function, which a top-level function does not have
    pub fn closure_from_prototype(&self, proto: Rc<Prototype>) -> VmResult<Rc<Closure>> {
        if let Some(info) = proto.outers.first() {
            return Err(VmError::new(
                ErrorKind::Compile,
                format!(
                    "top-level function '{}' cannot capture '{}'",
                    proto.name, info.name
                ),
            ));
        }
        debug!(name = %proto.name, "closure created");
        Ok(Closure::new(&self.heap, proto, Vec::new(), Vec::new()))
    }

    /// Run a top-level prototype with the root dict as `this`
    pub fn run(&mut self, proto: Rc<Prototype>) -> VmResult<Value> {
        let closure = match self.closure_from_prototype(proto) {
            Ok(c) => c,
            Err(e) => {
                self.last_error = Some(e.clone());
                return Err(e);
            }
        };
        let this = Value::Dict(self.root.clone());
        self.call(&Value::Closure(closure), &[this])
    }

    /// Call any callable value
    ///
    /// # Arguments
    ///
    /// * `callee` - Closure, native closure, class or instance with `_call`
    /// * `args` - Receiver followed by the arguments; an empty slice calls
    ///   with a `null` receiver
    ///
    /// # Returns
    ///
    /// The callee's return value. On failure the error is also kept for
    /// [`last_error`](Self::last_error).
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> VmResult<Value> {
        let args = if args.is_empty() {
            vec![Value::Null]
        } else {
            args.to_vec()
        };
        let result = self.call_value(callee, args);
        if let Err(e) = &result {
            self.last_error = Some(e.clone());
        }
        result
    }

    /// Call a value from native code or the dispatch loop
    pub(crate) fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> VmResult<Value> {
        match callee {
            Value::Closure(closure) => {
                let base = self.stack.len();
                let nargs = args.len();
                self.stack.extend(args);
                if let Err(e) = self.push_frame(closure.clone(), base, nargs, None, true) {
                    self.stack.truncate(base);
                    return Err(e);
                }
                self.execute()
            }
            Value::NativeClosure(native) => self.call_native(native, args),
            Value::Class(class) => self.construct(class, args),
            Value::Instance(instance) => match instance.meta(MetaMethod::Call) {
                Some(meta) => {
                    let mut meta_args = args;
                    match meta_args.first_mut() {
                        Some(this) => *this = callee.clone(),
                        None => meta_args.push(callee.clone()),
                    }
                    self.call_value(&meta, meta_args)
                }
                None => Err(VmError::new(
                    ErrorKind::Call,
                    "instance has no '_call' metamethod",
                )),
            },
            other => Err(VmError::new(
                ErrorKind::Call,
                format!("attempt to call '{}'", other.type_name()),
            )),
        }
    }

    fn call_native(&mut self, native: &Rc<NativeClosure>, mut args: Vec<Value>) -> VmResult<Value> {
        self.check_depth()?;
        let with_trace = |mut e: VmError| {
            e.push_trace(TraceEntry {
                function: native.name().to_string(),
                source: "native".to_string(),
                line: 0,
                instruction: 0,
            });
            e
        };
        native.prepare_args(&mut args).map_err(with_trace)?;
        trace!(name = native.name(), "native call");
        self.native_depth += 1;
        let func = native.func();
        let result = func(self, &args);
        self.native_depth -= 1;
        result.map_err(with_trace)
    }

    /// Instantiate `class` and run its constructor
    fn construct(&mut self, class: &Rc<Class>, mut args: Vec<Value>) -> VmResult<Value> {
        let instance = Value::Instance(class.create_instance());
        if let Some(ctor) = class.constructor() {
            match args.first_mut() {
                Some(this) => *this = instance.clone(),
                None => args.push(instance.clone()),
            }
            self.call_value(&ctor, args)?;
        }
        Ok(instance)
    }

    pub(crate) fn check_depth(&self) -> VmResult<()> {
        if self.frames.len() + self.native_depth >= self.config.max_call_depth {
            warn!(depth = self.config.max_call_depth, "stack overflow");
            return Err(VmError::new(
                ErrorKind::StackOverflow,
                format!("call depth exceeded {}", self.config.max_call_depth),
            ));
        }
        Ok(())
    }

    /// Push a frame for `closure` whose receiver and arguments start at `base`
    ///
    /// Fills missing parameters from the closure's defaults and packs extra
    /// arguments of a varargs function into an array.
    pub(crate) fn push_frame(
        &mut self,
        closure: Rc<Closure>,
        base: usize,
        nargs: usize,
        target: Option<usize>,
        root: bool,
    ) -> VmResult<()> {
        self.check_depth()?;
        self.maybe_collect();

        let proto = closure.proto().clone();
        let nparams = proto.parameters.len();
        let prev_top = if root { base } else { self.stack.len() };
        let top = base + proto.stack_size.max(nparams).max(nargs);
        if self.stack.len() < top {
            self.stack.resize(top, Value::Null);
        }

        let mut nargs = nargs;
        if proto.varargs {
            let fixed = nparams.saturating_sub(1);
            if nargs < fixed {
                return Err(wrong_arg_count(&proto, nargs));
            }
            let rest: Vec<Value> = (fixed..nargs)
                .map(|i| std::mem::take(&mut self.stack[base + i]))
                .collect();
            self.stack[base + fixed] = Value::Array(Array::new(&self.heap, rest));
            nargs = nparams;
        } else if nargs != nparams {
            let defaults = closure.defaults();
            let missing = nparams.saturating_sub(nargs);
            if nargs > nparams || missing > defaults.len() {
                return Err(wrong_arg_count(&proto, nargs));
            }
            for value in &defaults[defaults.len() - missing..] {
                self.stack[base + nargs] = value.clone();
                nargs += 1;
            }
        }
        for slot in &mut self.stack[base + nargs..top] {
            *slot = Value::Null;
        }

        trace!(function = %proto.name, depth = self.frames.len() + 1, "push frame");
        self.frames
            .push(CallFrame::new(closure, base, prev_top, target, root));
        Ok(())
    }

    /// Close outers at or above `from`
    pub(crate) fn close_outers(&mut self, from: usize) {
        self.open_outers.close_from(from, &self.stack);
    }

    /// Display form of a value, honouring `_string` on instances
    pub fn to_display_string(&mut self, value: &Value) -> VmResult<String> {
        if let Value::Instance(instance) = value {
            if let Some(meta) = instance.meta(MetaMethod::String) {
                let result = self.call_value(&meta, vec![value.clone()])?;
                return Ok(match result.as_str() {
                    Some(s) => s.to_string(),
                    None => result.to_string(),
                });
            }
        }
        Ok(value.to_string())
    }
}

fn wrong_arg_count(proto: &Prototype, nargs: usize) -> VmError {
    VmError::argument(format!(
        "wrong number of parameters: '{}' expects {}{} and got {}",
        proto.name,
        if proto.varargs { "at least " } else { "" },
        proto.parameters.len().saturating_sub(if proto.varargs { 2 } else { 1 }),
        nargs.saturating_sub(1)
    ))
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
