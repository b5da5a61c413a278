//! Contract compliance tests for bytecode_system
//! Verifies the exported API shape the interpreter and hosts rely on

use bytecode_system::{
    disassemble, is_valid_arg, FunctionState, Instruction, Literal, Opcode, Prototype,
    ARG_INVALID, MAX_LITERALS, MAX_STACK_SIZE,
};

#[test]
fn test_contract_sentinel_is_min_integer() {
    assert_eq!(ARG_INVALID, i64::MIN);
    assert!(!is_valid_arg(ARG_INVALID));
    assert!(is_valid_arg(-1));
}

#[test]
fn test_contract_limits() {
    assert_eq!(MAX_STACK_SIZE, 255);
    assert_eq!(MAX_LITERALS, 65535);
}

#[test]
fn test_contract_prototype_counts() {
    let mut parent = FunctionState::new("main");
    let k = parent.get_literal(Literal::from("k")).unwrap() as i64;
    parent.add_line_info(1, false);
    parent.emit(Opcode::Load, 1, k, 0, 0);
    let mut child = parent.push_child("f");
    child.add_parameter("x").unwrap();
    child.emit(Opcode::Return, 1, 0, 0, 0);
    let (parent, _) = child.pop_child().unwrap();
    let proto = parent.build_prototype();

    assert_eq!(proto.instruction_count(), 1);
    assert_eq!(proto.literal_count(), 1);
    assert_eq!(proto.parameter_count(), 1);
    assert_eq!(proto.function_count(), 1);
    assert_eq!(proto.outer_count(), 0);
    assert_eq!(proto.line_info_count(), 1);
    assert_eq!(proto.local_info_count(), 1);
    assert_eq!(proto.default_param_count(), 0);
    assert_eq!(proto.functions[0].parameter_count(), 2);
}

#[test]
fn test_contract_json_interchange() {
    let mut fs = FunctionState::new("main");
    fs.get_literal(Literal::Float(2.5)).unwrap();
    fs.emit(Opcode::LoadBool, 1, 1, 0, 0);
    let proto = fs.build_prototype();
    let json = proto.to_json().unwrap();
    let restored = Prototype::from_json(&json).unwrap();
    assert_eq!(restored, proto);
}

#[test]
fn test_contract_disassemble_lists_every_instruction() {
    let mut fs = FunctionState::new("main");
    fs.emit(Opcode::LoadInteger, 1, 7, 0, 0);
    fs.emit(Opcode::Return, 1, 0, 0, 0);
    let listing = disassemble(&fs.build_prototype());
    assert_eq!(listing.lines().filter(|l| l.contains("RETURN")).count(), 1);
    let text = Instruction::unary(Opcode::Return, 1).to_string();
    assert_eq!(text.split_whitespace().collect::<Vec<_>>(), ["RETURN", "1", "0", "0", "0"]);
}
