//! Integration tests for interpreter
//!
//! Each test emits a small program through `FunctionState`, the way a
//! compiler front end would, and runs it on a fresh VM.

use bytecode_system::{
    AppendKind, CmpOp, FunctionState, NewObjectKind, Opcode, Prototype, ARG_INVALID,
};
use core_types::{Array, ErrorKind, Value};
use interpreter::{Vm, VmConfig};
use std::rc::Rc;

const NONE: i64 = ARG_INVALID;

fn temp(fs: &mut FunctionState) -> i64 {
    fs.alloc_stack_pos().unwrap() as i64
}

fn local(fs: &mut FunctionState, name: &str) -> i64 {
    fs.push_local(name).unwrap() as i64
}

fn string(fs: &mut FunctionState, s: &str) -> i64 {
    fs.get_string_literal(s).unwrap() as i64
}

fn closure(vm: &Vm, proto: Rc<Prototype>) -> Value {
    Value::Closure(vm.closure_from_prototype(proto).unwrap())
}

fn items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(a) => a.to_vec(),
        other => panic!("expected array, got {other:?}"),
    }
}

/// function inc(x) { return x + 1 }
fn inc() -> Rc<Prototype> {
    let mut fs = FunctionState::new("inc");
    let x = fs.add_parameter("x").unwrap() as i64;
    let t = temp(&mut fs);
    fs.emit(Opcode::LoadInteger, t, 1, 0, 0);
    fs.emit(Opcode::Add, t, x, t, 0);
    fs.emit(Opcode::Return, t, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// class A { v = 0; init() { this.v = 1 } get() { return this.v } }
/// class B extends A {}
/// return B().get()
fn inherited_method() -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let a = local(&mut fs, "A");
    let b = local(&mut fs, "B");
    let key = temp(&mut fs);
    let val = temp(&mut fs);
    let inst = temp(&mut fs);
    let res = temp(&mut fs);
    let recv = temp(&mut fs);

    fs.emit(Opcode::NewObject, a, NONE, NONE, NewObjectKind::Class.as_arg());
    let v = string(&mut fs, "v");
    fs.emit(Opcode::Load, key, v, 0, 0);
    fs.emit(Opcode::LoadInteger, val, 0, 0, 0);
    fs.emit(Opcode::NewSlot, NONE, a, key, val);

    let mut init = fs.push_child("init");
    let one = temp(&mut init);
    let k = temp(&mut init);
    init.emit(Opcode::LoadInteger, one, 1, 0, 0);
    let v = string(&mut init, "v");
    init.emit(Opcode::Load, k, v, 0, 0);
    init.emit(Opcode::Set, NONE, 0, k, one);
    init.emit(Opcode::Return, NONE, NONE, 0, 0);
    let (mut fs, init_idx) = init.pop_child().unwrap();

    let name = string(&mut fs, "init");
    fs.emit(Opcode::Load, key, name, 0, 0);
    fs.emit(Opcode::Closure, val, init_idx as i64, 0, 0);
    fs.emit(Opcode::NewSlot, NONE, a, key, val);

    let mut get = fs.push_child("get");
    let r = temp(&mut get);
    let v = string(&mut get, "v");
    get.emit(Opcode::Load, r, v, 0, 0);
    get.emit(Opcode::Get, r, r, 0, 0);
    get.emit(Opcode::Return, r, NONE, 0, 0);
    let (mut fs, get_idx) = get.pop_child().unwrap();

    let name = string(&mut fs, "get");
    fs.emit(Opcode::Load, key, name, 0, 0);
    fs.emit(Opcode::Closure, val, get_idx as i64, 0, 0);
    fs.emit(Opcode::NewSlot, NONE, a, key, val);

    fs.emit(Opcode::NewObject, b, a, NONE, NewObjectKind::Class.as_arg());
    fs.emit(Opcode::LoadNulls, inst, 1, 0, 0);
    fs.emit(Opcode::Call, inst, b, inst, 1);
    fs.emit(Opcode::PrepCallK, res, name, inst, recv);
    fs.emit(Opcode::Call, res, res, recv, 1);
    fs.emit(Opcode::Return, res, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// local fact = function(n) { if (n <= 1) return 1; return n * fact(n - 1) }
/// return fact(n)
fn factorial(n: i64) -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let fact = local(&mut fs, "fact");
    let recv = temp(&mut fs);
    let arg = temp(&mut fs);
    fs.emit(Opcode::LoadNulls, fact, 1, 0, 0);

    let mut f = fs.push_child("fact");
    let param = f.add_parameter("n").unwrap() as i64;
    let outer = f.get_outer_variable("fact").unwrap() as i64;
    let one = temp(&mut f);
    let cond = temp(&mut f);
    let callee = temp(&mut f);
    let crecv = temp(&mut f);
    let carg = temp(&mut f);
    f.emit(Opcode::LoadInteger, one, 1, 0, 0);
    f.emit(Opcode::Cmp, cond, param, one, CmpOp::Le.as_arg());
    f.emit(Opcode::Jz, cond, 0, 0, 0);
    let jump = f.last_pos().unwrap();
    f.emit(Opcode::Return, one, NONE, 0, 0);
    let else_branch = f.instruction_count();
    f.patch_jump(jump, else_branch);
    f.emit(Opcode::GetOuter, callee, outer, 0, 0);
    f.emit(Opcode::LoadNulls, crecv, 1, 0, 0);
    f.emit(Opcode::Sub, carg, param, one, 0);
    f.emit(Opcode::Call, crecv, callee, crecv, 2);
    f.emit(Opcode::Mul, crecv, param, crecv, 0);
    f.emit(Opcode::Return, crecv, NONE, 0, 0);
    let (mut fs, idx) = f.pop_child().unwrap();

    fs.emit(Opcode::Closure, fact, idx as i64, 0, 0);
    fs.emit(Opcode::LoadNulls, recv, 1, 0, 0);
    fs.emit(Opcode::LoadInteger, arg, n, 0, 0);
    fs.emit(Opcode::Call, recv, fact, recv, 2);
    fs.emit(Opcode::Return, recv, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// local count = 0
/// local inc = function() { count = count + 1; return count }
/// local get = function() { return count }
/// inc()
/// return [inc, get]
fn counter() -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let count = local(&mut fs, "count");
    let inc = local(&mut fs, "inc");
    let get = local(&mut fs, "get");
    let recv = temp(&mut fs);
    let arr = temp(&mut fs);
    fs.emit(Opcode::LoadInteger, count, 0, 0, 0);

    let mut f = fs.push_child("inc");
    let o = f.get_outer_variable("count").unwrap() as i64;
    let t = temp(&mut f);
    let one = temp(&mut f);
    f.emit(Opcode::GetOuter, t, o, 0, 0);
    f.emit(Opcode::LoadInteger, one, 1, 0, 0);
    f.emit(Opcode::Add, t, t, one, 0);
    f.emit(Opcode::SetOuter, NONE, o, t, 0);
    f.emit(Opcode::Return, t, NONE, 0, 0);
    let (mut fs, inc_idx) = f.pop_child().unwrap();
    fs.emit(Opcode::Closure, inc, inc_idx as i64, 0, 0);

    let mut g = fs.push_child("get");
    let o = g.get_outer_variable("count").unwrap() as i64;
    let t = temp(&mut g);
    g.emit(Opcode::GetOuter, t, o, 0, 0);
    g.emit(Opcode::Return, t, NONE, 0, 0);
    let (mut fs, get_idx) = g.pop_child().unwrap();
    fs.emit(Opcode::Closure, get, get_idx as i64, 0, 0);

    fs.emit(Opcode::LoadNulls, recv, 1, 0, 0);
    fs.emit(Opcode::Call, NONE, inc, recv, 1);
    fs.emit(Opcode::NewObject, arr, 2, NONE, NewObjectKind::Array.as_arg());
    fs.emit(Opcode::AppendToArray, arr, inc, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::AppendToArray, arr, get, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::Return, arr, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// function sum(...) { local acc = 0; foreach (v in vargv) acc += v; return acc }
fn sum() -> Rc<Prototype> {
    let mut fs = FunctionState::new("sum");
    fs.set_varargs(true);
    let args = fs.add_parameter("vargv").unwrap() as i64;
    let acc = temp(&mut fs);
    let key = temp(&mut fs);
    let value = temp(&mut fs);
    let state = temp(&mut fs);
    fs.emit(Opcode::LoadInteger, acc, 0, 0, 0);
    fs.emit(Opcode::LoadNulls, state, 1, 0, 0);
    let head = fs.instruction_count();
    fs.emit(Opcode::Foreach, args, 0, key, 0);
    fs.emit(Opcode::Add, acc, acc, value, 0);
    fs.emit(Opcode::Jmp, 0, 0, 0, 0);
    let back = fs.last_pos().unwrap();
    fs.patch_jump(back, head);
    let end = fs.instruction_count();
    fs.patch_jump(head, end);
    fs.emit(Opcode::Return, acc, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// local ten = 10
/// return function(a, b = ten) { return a + b }
fn with_default() -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let ten = temp(&mut fs);
    let f = temp(&mut fs);
    fs.emit(Opcode::LoadInteger, ten, 10, 0, 0);

    let mut c = fs.push_child("add");
    let a = c.add_parameter("a").unwrap() as i64;
    let b = c.add_parameter("b").unwrap() as i64;
    c.add_default_param(ten as usize);
    let t = temp(&mut c);
    c.emit(Opcode::Add, t, a, b, 0);
    c.emit(Opcode::Return, t, NONE, 0, 0);
    let (mut fs, idx) = c.pop_child().unwrap();

    fs.emit(Opcode::Closure, f, idx as i64, 0, 0);
    fs.emit(Opcode::Return, f, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// local list = []
/// local push = function(items = list) { items.append(1); return items }
/// return [push, push_again, list]
///
/// Both closures are built from the same prototype and default register.
fn shared_default() -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let list = local(&mut fs, "list");
    let f = temp(&mut fs);
    let g = temp(&mut fs);
    let arr = temp(&mut fs);
    fs.emit(Opcode::NewObject, list, 0, NONE, NewObjectKind::Array.as_arg());

    let mut c = fs.push_child("push");
    let items = c.add_parameter("items").unwrap() as i64;
    c.add_default_param(list as usize);
    let one = temp(&mut c);
    c.emit(Opcode::LoadInteger, one, 1, 0, 0);
    c.emit(Opcode::AppendToArray, items, one, AppendKind::Stack.as_arg(), 0);
    c.emit(Opcode::Return, items, NONE, 0, 0);
    let (mut fs, idx) = c.pop_child().unwrap();

    fs.emit(Opcode::Closure, f, idx as i64, 0, 0);
    fs.emit(Opcode::Closure, g, idx as i64, 0, 0);
    fs.emit(Opcode::NewObject, arr, 3, NONE, NewObjectKind::Array.as_arg());
    fs.emit(Opcode::AppendToArray, arr, f, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::AppendToArray, arr, g, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::AppendToArray, arr, list, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::Return, arr, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// local t = 7
/// if (false) { <body> }
/// local d = t
/// return d
///
/// `body` is `t = 9` when `retarget` is set, otherwise an unrelated move.
fn skipped_branch(retarget: bool) -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let cond = temp(&mut fs);
    let t = temp(&mut fs);
    let a = temp(&mut fs);
    let d = temp(&mut fs);
    fs.emit(Opcode::LoadInteger, t, 7, 0, 0);
    fs.emit(Opcode::LoadBool, cond, 0, 0, 0);
    fs.emit(Opcode::Jz, cond, 0, 0, 0);
    let jump = fs.last_pos().unwrap();
    if retarget {
        fs.emit(Opcode::LoadInteger, t, 9, 0, 0);
    } else {
        fs.emit(Opcode::Move, a, cond, 0, 0);
    }
    let label = fs.instruction_count();
    fs.patch_jump(jump, label);
    fs.emit(Opcode::Move, d, t, 0, 0);
    fs.emit(Opcode::Return, d, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// class V { n = 5; _add(o) { return this.n + o } _typeof() { return "V" } }
/// local v = V()
/// return [v + 1, typeof v]
fn metamethods() -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let class = local(&mut fs, "V");
    let key = temp(&mut fs);
    let val = temp(&mut fs);
    let inst = temp(&mut fs);
    let one = temp(&mut fs);
    let sum = temp(&mut fs);
    let ty = temp(&mut fs);
    let arr = temp(&mut fs);

    fs.emit(Opcode::NewObject, class, NONE, NONE, NewObjectKind::Class.as_arg());
    let n = string(&mut fs, "n");
    fs.emit(Opcode::Load, key, n, 0, 0);
    fs.emit(Opcode::LoadInteger, val, 5, 0, 0);
    fs.emit(Opcode::NewSlot, NONE, class, key, val);

    let mut add = fs.push_child("_add");
    let o = add.add_parameter("o").unwrap() as i64;
    let t = temp(&mut add);
    let n = string(&mut add, "n");
    add.emit(Opcode::Load, t, n, 0, 0);
    add.emit(Opcode::Get, t, t, 0, 0);
    add.emit(Opcode::Add, t, t, o, 0);
    add.emit(Opcode::Return, t, NONE, 0, 0);
    let (mut fs, add_idx) = add.pop_child().unwrap();
    let name = string(&mut fs, "_add");
    fs.emit(Opcode::Load, key, name, 0, 0);
    fs.emit(Opcode::Closure, val, add_idx as i64, 0, 0);
    fs.emit(Opcode::NewSlot, NONE, class, key, val);

    let mut type_of = fs.push_child("_typeof");
    let t = temp(&mut type_of);
    let v = string(&mut type_of, "V");
    type_of.emit(Opcode::Load, t, v, 0, 0);
    type_of.emit(Opcode::Return, t, NONE, 0, 0);
    let (mut fs, ty_idx) = type_of.pop_child().unwrap();
    let name = string(&mut fs, "_typeof");
    fs.emit(Opcode::Load, key, name, 0, 0);
    fs.emit(Opcode::Closure, val, ty_idx as i64, 0, 0);
    fs.emit(Opcode::NewSlot, NONE, class, key, val);

    fs.emit(Opcode::LoadNulls, inst, 1, 0, 0);
    fs.emit(Opcode::Call, inst, class, inst, 1);
    fs.emit(Opcode::LoadInteger, one, 1, 0, 0);
    fs.emit(Opcode::Add, sum, inst, one, 0);
    fs.emit(Opcode::TypeOf, ty, inst, 0, 0);
    fs.emit(Opcode::NewObject, arr, 2, NONE, NewObjectKind::Array.as_arg());
    fs.emit(Opcode::AppendToArray, arr, sum, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::AppendToArray, arr, ty, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::Return, arr, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// local inner = function() { return 1 / this }
/// return inner()
fn failing_call() -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    fs.set_source_name("fail.tern");
    let f = temp(&mut fs);
    let recv = temp(&mut fs);

    let mut inner = fs.push_child("inner");
    inner.add_line_info(2, true);
    let t = temp(&mut inner);
    inner.emit(Opcode::LoadInteger, t, 1, 0, 0);
    inner.emit(Opcode::Div, t, t, 0, 0);
    inner.emit(Opcode::Return, t, NONE, 0, 0);
    let (mut fs, idx) = inner.pop_child().unwrap();

    fs.add_line_info(7, true);
    fs.emit(Opcode::Closure, f, idx as i64, 0, 0);
    fs.emit(Opcode::LoadNulls, recv, 1, 0, 0);
    fs.emit(Opcode::Call, recv, f, recv, 1);
    fs.emit(Opcode::Return, recv, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// local f = function() { return f() }   (no base case)
/// or, with `tail`, local f = function(n) { if (n == 0) return 0; return f(n - 1) }
fn recursion(tail: bool, n: i64) -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let f = local(&mut fs, "f");
    let recv = temp(&mut fs);
    let arg = temp(&mut fs);
    fs.emit(Opcode::LoadNulls, f, 1, 0, 0);

    let mut c = fs.push_child("f");
    let param = c.add_parameter("n").unwrap() as i64;
    let outer = c.get_outer_variable("f").unwrap() as i64;
    let zero = temp(&mut c);
    let cond = temp(&mut c);
    let callee = temp(&mut c);
    let crecv = temp(&mut c);
    let carg = temp(&mut c);
    if tail {
        c.emit(Opcode::LoadInteger, zero, 0, 0, 0);
        c.emit(Opcode::Eq, cond, param, zero, 0);
        c.emit(Opcode::Jz, cond, 0, 0, 0);
        let jump = c.last_pos().unwrap();
        c.emit(Opcode::Return, zero, NONE, 0, 0);
        let else_branch = c.instruction_count();
        c.patch_jump(jump, else_branch);
        c.set_return_expression();
    }
    c.emit(Opcode::GetOuter, callee, outer, 0, 0);
    c.emit(Opcode::LoadNulls, crecv, 1, 0, 0);
    c.emit(Opcode::LoadInteger, carg, 1, 0, 0);
    c.emit(Opcode::Sub, carg, param, carg, 0);
    c.emit(Opcode::Call, crecv, callee, crecv, 2);
    c.emit(Opcode::Return, crecv, NONE, 0, 0);
    let (mut fs, idx) = c.pop_child().unwrap();

    fs.emit(Opcode::Closure, f, idx as i64, 0, 0);
    fs.emit(Opcode::LoadNulls, recv, 1, 0, 0);
    fs.emit(Opcode::LoadInteger, arg, n, 0, 0);
    fs.emit(Opcode::Call, recv, f, recv, 2);
    fs.emit(Opcode::Return, recv, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

/// local d = { a = 1, b = 2 }; local acc = 0; local names = ""
/// foreach (k, v in d) { acc += v; names += k }
/// return [acc, names]
fn dict_iteration() -> Rc<Prototype> {
    let mut fs = FunctionState::new("main");
    let d = local(&mut fs, "d");
    let key = temp(&mut fs);
    let val = temp(&mut fs);
    let acc = local(&mut fs, "acc");
    let names = local(&mut fs, "names");
    let k = local(&mut fs, "k");
    let v = local(&mut fs, "v");
    let state = temp(&mut fs);
    let arr = temp(&mut fs);

    fs.emit(Opcode::NewObject, d, NONE, NONE, NewObjectKind::Dict.as_arg());
    for (name, n) in [("a", 1), ("b", 2)] {
        let lit = string(&mut fs, name);
        fs.emit(Opcode::Load, key, lit, 0, 0);
        fs.emit(Opcode::LoadInteger, val, n, 0, 0);
        fs.emit(Opcode::NewSlot, NONE, d, key, val);
    }
    fs.emit(Opcode::LoadInteger, acc, 0, 0, 0);
    let empty = string(&mut fs, "");
    fs.emit(Opcode::Load, names, empty, 0, 0);
    fs.emit(Opcode::LoadNulls, state, 1, 0, 0);
    let head = fs.instruction_count();
    fs.emit(Opcode::Foreach, d, 0, k, 0);
    fs.emit(Opcode::Add, acc, acc, v, 0);
    fs.emit(Opcode::Add, names, names, k, 0);
    fs.emit(Opcode::Jmp, 0, 0, 0, 0);
    let back = fs.last_pos().unwrap();
    fs.patch_jump(back, head);
    let end = fs.instruction_count();
    fs.patch_jump(head, end);
    fs.emit(Opcode::NewObject, arr, 2, NONE, NewObjectKind::Array.as_arg());
    fs.emit(Opcode::AppendToArray, arr, acc, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::AppendToArray, arr, names, AppendKind::Stack.as_arg(), 0);
    fs.emit(Opcode::Return, arr, NONE, 0, 0);
    Rc::new(fs.build_prototype())
}

#[test]
fn test_increment_integer_and_float() {
    let mut vm = Vm::new();
    let f = closure(&vm, inc());
    let int = vm.call(&f, &[Value::Null, Value::Integer(5)]).unwrap();
    assert!(matches!(int, Value::Integer(6)));
    let float = vm.call(&f, &[Value::Null, Value::Float(5.0)]).unwrap();
    assert!(matches!(float, Value::Float(x) if x == 6.0));
}

#[test]
fn test_inherited_constructor_and_method() {
    let mut vm = Vm::new();
    let result = vm.run(inherited_method()).unwrap();
    assert_eq!(result.as_int(), Some(1));
    assert_eq!(vm.stack_len(), 0);
}

#[test]
fn test_recursive_factorial_through_outer() {
    let mut vm = Vm::new();
    assert_eq!(vm.run(factorial(5)).unwrap().as_int(), Some(120));
    assert_eq!(vm.run(factorial(1)).unwrap().as_int(), Some(1));
}

#[test]
fn test_closures_share_outer_after_scope_ends() {
    let mut vm = Vm::new();
    let pair = items(&vm.run(counter()).unwrap());
    let (inc, get) = (pair[0].clone(), pair[1].clone());

    assert_eq!(vm.call(&get, &[]).unwrap().as_int(), Some(1));
    assert_eq!(vm.call(&inc, &[]).unwrap().as_int(), Some(2));
    assert_eq!(vm.call(&inc, &[]).unwrap().as_int(), Some(3));
    assert_eq!(vm.call(&get, &[]).unwrap().as_int(), Some(3));
}

#[test]
fn test_varargs_are_packed() {
    let mut vm = Vm::new();
    let f = closure(&vm, sum());
    let args = [Value::Null, Value::Integer(1), Value::Integer(2), Value::Integer(3)];
    assert_eq!(vm.call(&f, &args).unwrap().as_int(), Some(6));
    assert_eq!(vm.call(&f, &[Value::Null]).unwrap().as_int(), Some(0));
}

#[test]
fn test_default_parameters() {
    let mut vm = Vm::new();
    let f = vm.run(with_default()).unwrap();
    assert_eq!(vm.call(&f, &[Value::Null, Value::Integer(5)]).unwrap().as_int(), Some(15));
    let both = [Value::Null, Value::Integer(5), Value::Integer(1)];
    assert_eq!(vm.call(&f, &both).unwrap().as_int(), Some(6));
    let err = vm.call(&f, &[Value::Null]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Argument);
}

#[test]
fn test_default_values_are_copied_per_closure() {
    let mut vm = Vm::new();
    let out = items(&vm.run(shared_default()).unwrap());
    let (push, push_again, list) = (&out[0], &out[1], &out[2]);

    let first = vm.call(push, &[]).unwrap();
    let second = vm.call(push_again, &[]).unwrap();

    assert!(!first.same_object(&second));
    assert!(!first.same_object(list));
    assert_eq!(items(&second).len(), 1);
    assert!(items(list).is_empty());
}

#[test]
fn test_move_after_jump_target_is_not_fused() {
    for retarget in [false, true] {
        let proto = skipped_branch(retarget);
        let ops: Vec<Opcode> = proto.instructions.iter().map(|i| i.opcode).collect();
        assert!(!ops.contains(&Opcode::DMove), "{ops:?}");
        assert_eq!(ops.iter().filter(|&&op| op == Opcode::Move).count(), 2 - retarget as usize);

        let mut vm = Vm::new();
        assert_eq!(vm.run(proto).unwrap().as_int(), Some(7), "retarget: {retarget}");
    }
}

#[test]
fn test_arithmetic_and_typeof_metamethods() {
    let mut vm = Vm::new();
    let out = items(&vm.run(metamethods()).unwrap());
    assert_eq!(out[0].as_int(), Some(6));
    assert_eq!(out[1].as_str(), Some("V"));
}

#[test]
fn test_error_trace_lists_frames_innermost_first() {
    let mut vm = Vm::new();
    let err = vm.run(failing_call()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
    let functions: Vec<&str> = err.trace.iter().map(|t| t.function.as_str()).collect();
    assert_eq!(functions, ["inner", "main"]);
    assert_eq!(err.trace[0].line, 2);
    assert_eq!(err.trace[1].line, 7);
    assert_eq!(err.trace[1].source, "fail.tern");

    let last = vm.last_error().unwrap();
    assert_eq!(last.trace.len(), 2);
    assert_eq!(vm.call_depth(), 0);
    assert_eq!(vm.stack_len(), 0);
}

#[test]
fn test_unbounded_recursion_overflows() {
    let mut vm = Vm::with_config(VmConfig::default().max_call_depth(32));
    let err = vm.run(recursion(false, 3)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::StackOverflow);
    assert_eq!(vm.call_depth(), 0);
    assert_eq!(vm.stack_len(), 0);
}

#[test]
fn test_tail_calls_reuse_the_frame() {
    let proto = recursion(true, 1000);
    let child = &proto.functions[0];
    assert!(child.instructions.iter().any(|i| i.opcode == Opcode::TailCall));

    let mut vm = Vm::with_config(VmConfig::default().max_call_depth(16));
    assert_eq!(vm.run(proto).unwrap().as_int(), Some(0));
}

#[test]
fn test_foreach_over_dict_in_key_order() {
    let mut vm = Vm::new();
    let out = items(&vm.run(dict_iteration()).unwrap());
    assert_eq!(out[0].as_int(), Some(3));
    assert_eq!(out[1].as_str(), Some("ab"));
}

#[test]
fn test_vm_is_reusable_after_error() {
    let mut vm = Vm::new();
    assert!(vm.run(failing_call()).is_err());
    let f = closure(&vm, inc());
    assert_eq!(vm.call(&f, &[Value::Null, Value::Integer(1)]).unwrap().as_int(), Some(2));
}

#[test]
fn test_host_built_array_flows_through_vm() {
    let mut vm = Vm::new();
    let f = closure(&vm, sum());
    let arr = Array::new(vm.heap(), vec![Value::Integer(4)]);
    let len = vm.get_member(&Value::Array(arr), &Value::from("len")).unwrap();
    assert!(matches!(len, Value::NativeClosure(_)));
    assert_eq!(
        vm.call(&f, &[Value::Null, Value::Integer(4), Value::Float(0.5)])
            .unwrap()
            .as_float(),
        Some(4.5)
    );
}
