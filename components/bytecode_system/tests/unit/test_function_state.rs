//! Tests for FunctionState: locals, outers, loops and prototype output

use bytecode_system::{
    CompileError, FunctionState, LocalState, Opcode, OuterKind, Prototype,
};

#[test]
fn test_outer_resolution_marks_parent_local_escaped() {
    let mut parent = FunctionState::new("main");
    let x = parent.push_local("x").unwrap();
    let mut child = parent.push_child("inner");

    assert_eq!(child.get_outer_variable("x"), Some(0));
    // second lookup hits the cache
    assert_eq!(child.get_outer_variable("x"), Some(0));
    assert_eq!(child.get_outer_variable("missing"), None);

    let (parent, index) = child.pop_child().unwrap();
    assert_eq!(index, 0);
    assert_eq!(parent.local_state(x), Some(LocalState::Escaped));
    assert_eq!(parent.count_outers(0), 1);
    assert_eq!(parent.escaped_count(), 1);

    let proto = parent.build_prototype();
    let inner = &proto.functions[0];
    assert_eq!(inner.outers[0].kind, OuterKind::Local);
    assert_eq!(inner.outers[0].index, x);
}

#[test]
fn test_grandchild_captures_through_parent_outer() {
    let mut main = FunctionState::new("main");
    main.push_local("counter").unwrap();
    let middle = main.push_child("middle");
    let mut inner = middle.push_child("inner");

    assert_eq!(inner.get_outer_variable("counter"), Some(0));

    let (middle, _) = inner.pop_child().unwrap();
    let (main, _) = middle.pop_child().unwrap();
    let proto = main.build_prototype();
    let middle_proto = &proto.functions[0];
    let inner_proto = &middle_proto.functions[0];

    assert_eq!(middle_proto.outers[0].kind, OuterKind::Local);
    assert_eq!(inner_proto.outers[0].kind, OuterKind::Outer);
    assert_eq!(inner_proto.outers[0].index, 0);
}

#[test]
fn test_pop_child_without_parent_fails() {
    let fs = FunctionState::new("main");
    assert_eq!(fs.pop_child().err(), Some(CompileError::NoParentState));
}

#[test]
fn test_parameters_and_defaults() {
    let mut parent = FunctionState::new("main");
    let default_reg = parent.push_target(None).unwrap();
    let mut f = parent.push_child("f");
    f.add_parameter("a").unwrap();
    f.add_parameter("b").unwrap();
    f.add_default_param(default_reg);
    let (parent, idx) = f.pop_child().unwrap();

    let main = parent.build_prototype();
    let proto = &main.functions[idx];
    assert_eq!(proto.parameters, vec!["this", "a", "b"]);
    assert_eq!(proto.default_param_count(), 1);
    assert_eq!(proto.default_params[0], default_reg as i64);
}

#[test]
fn test_set_stack_size_retires_locals_into_debug_info() {
    let mut fs = FunctionState::new("main");
    fs.push_local("a").unwrap();
    fs.emit(Opcode::LoadInteger, 1, 1, 0, 0);
    fs.push_local("b").unwrap();
    fs.emit(Opcode::LoadInteger, 2, 2, 0, 0);
    fs.set_stack_size(1);

    assert_eq!(fs.get_stack_size(), 1);
    assert_eq!(fs.get_local("a"), None);

    let proto = fs.build_prototype();
    let names: Vec<_> = proto.locals.iter().map(|l| l.name.as_str()).collect();
    assert!(names.contains(&"a"));
    assert!(names.contains(&"b"));
    assert!(names.contains(&"this"));
    assert_eq!(proto.stack_size, 3);
}

#[test]
fn test_shadowed_local_resolves_innermost() {
    let mut fs = FunctionState::new("main");
    fs.push_local("v").unwrap();
    let inner = fs.push_local("v").unwrap();
    assert_eq!(fs.get_local("v"), Some(inner));
}

#[test]
fn test_loop_break_and_continue_patching() {
    let mut fs = FunctionState::new("main");
    let top = fs.instruction_count();
    fs.begin_loop();
    fs.emit(Opcode::LoadInteger, 1, 0, 0, 0);
    fs.add_continue().unwrap();
    fs.add_break().unwrap();
    fs.emit(Opcode::Jmp, 0, 0, 0, 0);
    let back = fs.last_pos().unwrap();
    fs.patch_jump(back, top);
    fs.end_loop(top).unwrap();

    let insts = fs.instructions();
    // continue at 1 jumps back to 0
    assert_eq!(insts[1].arg1, -2);
    // break at 2 jumps past the loop (index 4)
    assert_eq!(insts[2].arg1, 1);
    assert_eq!(insts[3].arg1, -4);
}

#[test]
fn test_line_info_dedups_same_line() {
    let mut fs = FunctionState::new("main");
    fs.add_line_info(1, false);
    fs.emit(Opcode::LoadInteger, 1, 0, 0, 0);
    fs.add_line_info(1, false);
    fs.emit(Opcode::LoadInteger, 2, 0, 0, 0);
    fs.add_line_info(2, false);
    fs.emit(Opcode::LoadInteger, 3, 0, 0, 0);

    let proto: Prototype = fs.build_prototype();
    assert_eq!(proto.line_info_count(), 2);
    assert_eq!(proto.line_for(2), 2);
}
