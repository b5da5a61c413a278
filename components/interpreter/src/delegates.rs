//! Core delegates
//!
//! Natives every VM installs into the per-type delegate tables. They are
//! reached through member lookup, so `arr.len()` resolves `len` on the
//! array delegate and calls it with the array as `this`.

use std::rc::Rc;

use core_types::{
    NativeAttribute, NativeContext, NativeFunction, TypeTag, Value, VmError, VmResult,
};

use crate::vm::Vm;

fn this(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or_default()
}

fn len(_: &mut dyn NativeContext, args: &[Value]) -> VmResult<Value> {
    let n = match this(args) {
        Value::String(s) => s.len(),
        Value::Array(a) => a.len(),
        Value::Dict(d) => d.len(),
        other => {
            return Err(VmError::type_error(format!(
                "'{}' has no length",
                other.type_name()
            )))
        }
    };
    Ok(Value::Integer(n as i64))
}

fn append(_: &mut dyn NativeContext, args: &[Value]) -> VmResult<Value> {
    let target = this(args);
    match &target {
        Value::Array(a) => a.push(args.get(1).cloned().unwrap_or_default()),
        other => {
            return Err(VmError::type_error(format!(
                "cannot append to '{}'",
                other.type_name()
            )))
        }
    }
    Ok(target)
}

fn weakref(_: &mut dyn NativeContext, args: &[Value]) -> VmResult<Value> {
    Ok(this(args).weak_ref())
}

fn deref(_: &mut dyn NativeContext, args: &[Value]) -> VmResult<Value> {
    match this(args) {
        Value::WeakRef(w) => Ok(w.get()),
        other => Ok(other),
    }
}

fn attribute(_: &mut dyn NativeContext, args: &[Value]) -> VmResult<Value> {
    let Value::NativeClosure(native) = this(args) else {
        return Err(VmError::type_error("attributes exist only on native closures"));
    };
    let name = args.get(1).and_then(Value::as_str).unwrap_or_default();
    NativeAttribute::from_name(name)
        .map(|attr| native.attribute(attr))
        .ok_or_else(|| VmError::argument(format!("unknown attribute '{name}'")))
}

fn install(vm: &Vm, tag: TypeTag, function: &NativeFunction) {
    let closure = function.instantiate(&vm.heap);
    vm.delegate_table(tag)
        .new_slot(Rc::from(function.name()), Value::NativeClosure(closure));
}

/// Install the core delegates
pub(crate) fn install_core(vm: &mut Vm) {
    let len = NativeFunction::new("len", len)
        .params(1)
        .docs("number of characters, items or entries");
    for tag in [TypeTag::STRING, TypeTag::ARRAY, TypeTag::DICT] {
        install(vm, tag, &len);
    }

    let append = NativeFunction::new("append", append)
        .params(2)
        .docs("push a value and return the array");
    install(vm, TypeTag::ARRAY, &append);

    let weakref = NativeFunction::new("weakref", weakref)
        .params(1)
        .docs("weak reference to the receiver");
    for tag in TypeTag::ALL.into_iter().filter(|t| t.has_delegates()) {
        install(vm, tag, &weakref);
    }

    let deref = NativeFunction::new("ref", deref)
        .params(1)
        .docs("referenced value, or null once it is gone");
    install(vm, TypeTag::WEAKREF, &deref);

    let attribute = NativeFunction::new("attribute", attribute)
        .params(2)
        .docs("read a native function attribute by name");
    install(vm, TypeTag::NATIVE_CLOSURE, &attribute);
}
