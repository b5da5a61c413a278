//! Integration tests for memory_manager + interpreter
//!
//! Verifies that reference counting, weak references and the cycle
//! collector behave the same for objects built by the host and objects
//! built by running scripts.

use core_types::{Array, Class, Closure, Dict, Instance, NativeFunction, Outer, Value, VmResult};
use integration_tests::programs;
use interpreter::{Vm, VmConfig};
use memory_manager::{Collectable, GcConfig, Heap};
use std::rc::Rc;

fn manual_vm() -> Vm {
    Vm::with_config(VmConfig::default().gc(GcConfig::manual()))
}

fn noop(_ctx: &mut dyn core_types::NativeContext, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Null)
}

fn weak(value: &Value) -> Rc<core_types::WeakRef> {
    match value.weak_ref() {
        Value::WeakRef(w) => w,
        other => panic!("expected weak ref, got {}", other.type_name()),
    }
}

fn assert_clone_drop_round_trip<T: Collectable>(heap: &Heap, value: Value, object: &T) {
    let count = value.ref_count();
    let live = heap.live_objects();
    assert!(heap.contains(object));

    let copy = value.clone();
    assert_eq!(copy.ref_count(), count.map(|c| c + 1));
    drop(copy);

    assert_eq!(value.ref_count(), count);
    assert!(heap.contains(object));
    assert_eq!(heap.live_objects(), live);
}

// ============================================================================
// Reference counting
// ============================================================================

#[test]
fn test_clone_then_drop_restores_counts_for_every_collectable() {
    let heap = Heap::with_config(GcConfig::manual());

    let arr = Array::new(&heap, vec![Value::Integer(1)]);
    assert_clone_drop_round_trip(&heap, Value::Array(arr.clone()), &*arr);

    let dict = Dict::new(&heap);
    assert_clone_drop_round_trip(&heap, Value::Dict(dict.clone()), &*dict);

    let outer = Outer::closed(&heap, Value::Integer(3));
    assert_clone_drop_round_trip(&heap, Value::Outer(outer.clone()), &*outer);

    let closure = Closure::new(&heap, programs::increment(), Vec::new(), Vec::new());
    assert_clone_drop_round_trip(&heap, Value::Closure(closure.clone()), &*closure);

    let native = NativeFunction::new("noop", noop).instantiate(&heap);
    assert_clone_drop_round_trip(&heap, Value::NativeClosure(native.clone()), &*native);

    let class = Class::new(&heap, None, "constructor");
    assert_clone_drop_round_trip(&heap, Value::Class(class.clone()), &*class);

    let inst: Rc<Instance> = class.create_instance();
    assert_clone_drop_round_trip(&heap, Value::Instance(inst.clone()), &*inst);
}

#[test]
fn test_last_release_unlinks_object() {
    let heap = Heap::with_config(GcConfig::manual());
    let before = heap.live_objects();

    let arr = Value::Array(Array::new(&heap, Vec::new()));
    assert_eq!(heap.live_objects(), before + 1);

    drop(arr);
    assert_eq!(heap.live_objects(), before);
}

#[test]
fn test_weak_ref_to_array_clears_after_last_handle() {
    let heap = Heap::new();
    let arr = Value::Array(Array::new(&heap, vec![Value::Integer(7)]));
    let copy = arr.clone();
    let w = weak(&arr);

    drop(arr);
    assert!(w.is_alive());
    assert_eq!(items_len(&w.get()), 1);

    drop(copy);
    assert!(!w.is_alive());
    assert!(w.get().is_null());
}

fn items_len(value: &Value) -> usize {
    match value {
        Value::Array(a) => a.len(),
        other => panic!("expected array, got {}", other.type_name()),
    }
}

#[test]
fn test_weak_ref_does_not_keep_object_alive() {
    let heap = Heap::new();
    let dict = Dict::new(&heap);
    let value = Value::Dict(dict.clone());
    let w = value.weak_ref();

    assert_eq!(value.ref_count(), Some(2));
    drop(dict);
    drop(value);

    let Value::WeakRef(w) = w else {
        panic!("expected weak ref");
    };
    assert!(w.get().is_null());
}

// ============================================================================
// Cycle collection
// ============================================================================

#[test]
fn test_script_built_cycle_survives_until_collection() {
    let mut vm = manual_vm();
    let baseline = vm.heap().live_objects();

    let result = vm.run(programs::instance_cycle()).unwrap();
    let Value::Array(arr) = &result else {
        panic!("expected array");
    };
    let inst = weak(&arr.items()[0]);
    let class = weak(&arr.items()[1]);
    assert_eq!(inst.get().type_name(), "instance");
    drop(result);

    assert!(inst.is_alive());
    assert!(class.is_alive());
    assert!(vm.heap().live_objects() > baseline);

    let destroyed = vm.collect_garbage();

    assert_eq!(destroyed, 4);
    assert!(!inst.is_alive());
    assert!(!class.is_alive());
    assert_eq!(vm.heap().live_objects(), baseline);
    assert_eq!(vm.heap().stats().last_cycles_freed, 4);
}

#[test]
fn test_collection_keeps_reachable_cycle() {
    let mut vm = manual_vm();

    let result = vm.run(programs::instance_cycle()).unwrap();
    let Value::Array(arr) = &result else {
        panic!("expected array");
    };
    let class_value = arr.items()[1].clone();
    let inst = weak(&arr.items()[0]);
    drop(result);

    vm.set_global("keep", class_value);
    assert_eq!(vm.collect_garbage(), 0);
    assert!(inst.is_alive());

    vm.root().remove("keep");
    assert_eq!(vm.collect_garbage(), 4);
    assert!(!inst.is_alive());
}

#[test]
fn test_host_cycle_across_dict_and_array() {
    let mut vm = manual_vm();
    let heap = vm.heap().clone();
    let dict = Dict::new(&heap);
    let arr = Array::new(&heap, vec![Value::Dict(dict.clone())]);
    dict.new_slot(Rc::from("back"), Value::Array(arr.clone()));
    let w = weak(&Value::Array(arr.clone()));
    drop(arr);
    drop(dict);

    assert!(w.is_alive());
    assert_eq!(vm.collect_garbage(), 2);
    assert!(!w.is_alive());
}

#[test]
fn test_automatic_collection_at_call_boundary() {
    let config = VmConfig::default().gc(GcConfig::default().with_threshold(1));
    let mut vm = Vm::with_config(config);

    let first = vm.run(programs::instance_cycle()).unwrap();
    let Value::Array(arr) = &first else {
        panic!("expected array");
    };
    let inst = weak(&arr.items()[0]);
    drop(first);
    assert!(inst.is_alive());

    let second = vm.run(programs::instance_cycle()).unwrap();

    assert!(!inst.is_alive());
    assert!(vm.heap().stats().collections >= 1);
    drop(second);
}
