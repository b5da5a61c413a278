//! Human-readable listing of prototypes

use std::fmt::Write;

use crate::instruction::is_valid_arg;
use crate::opcode::{CmpOp, Opcode};
use crate::prototype::Prototype;

/// Render a prototype and its nested functions
///
/// # Examples
///
/// ```
/// use bytecode_system::{disassemble, FunctionState, Opcode};
///
/// let mut fs = FunctionState::new("main");
/// fs.emit(Opcode::LoadInteger, 1, 42, 0, 0);
/// fs.emit(Opcode::Return, 1, 0, 0, 0);
/// let listing = disassemble(&fs.build_prototype());
/// assert!(listing.contains("LOADINTEGER"));
/// ```
pub fn disassemble(proto: &Prototype) -> String {
    let mut out = String::new();
    write_proto(&mut out, proto, 0);
    out
}

fn write_proto(out: &mut String, proto: &Prototype, depth: usize) {
    let pad = "  ".repeat(depth);
    let _ = writeln!(
        out,
        "{pad}function {} ({} params, {} outers, stack {})",
        proto.name,
        proto.parameter_count(),
        proto.outer_count(),
        proto.stack_size
    );
    for (i, lit) in proto.literals.iter().enumerate() {
        let _ = writeln!(out, "{pad}  .lit {i:<4} {lit}");
    }
    for (i, outer) in proto.outers.iter().enumerate() {
        let _ = writeln!(out, "{pad}  .outer {i:<2} {} {:?} {}", outer.name, outer.kind, outer.index);
    }
    for (ip, inst) in proto.instructions.iter().enumerate() {
        let _ = write!(out, "{pad}  {ip:>4} [{:>4}] {inst}", proto.line_for(ip));
        if let Some(note) = annotate(proto, ip) {
            let _ = write!(out, "  ; {note}");
        }
        out.push('\n');
    }
    for nested in &proto.functions {
        write_proto(out, nested, depth + 1);
    }
}

fn literal_note(proto: &Prototype, idx: i64) -> Option<String> {
    if !is_valid_arg(idx) || idx < 0 {
        return None;
    }
    proto.literals.get(idx as usize).map(|l| l.to_string())
}

fn annotate(proto: &Prototype, ip: usize) -> Option<String> {
    let inst = proto.instructions[ip];
    match inst.opcode {
        Opcode::Load | Opcode::GetK | Opcode::PrepCallK | Opcode::EqK | Opcode::NeqK => {
            literal_note(proto, inst.arg1)
        }
        Opcode::DLoad => Some(format!(
            "{}, {}",
            literal_note(proto, inst.arg1)?,
            literal_note(proto, inst.arg3)?
        )),
        Opcode::LoadFloat => Some(f64::from_bits(inst.arg1 as u64).to_string()),
        Opcode::Cmp => CmpOp::from_arg(inst.arg3).map(|op| op.symbol().to_string()),
        Opcode::JCmp => CmpOp::from_arg(inst.arg0).map(|op| {
            format!("if !(r{} {} r{}) -> {}", inst.arg2, op.symbol(), inst.arg3, ip as i64 + 1 + inst.arg1)
        }),
        Opcode::Jmp | Opcode::Jz | Opcode::And | Opcode::Or | Opcode::Foreach => {
            Some(format!("-> {}", ip as i64 + 1 + inst.arg1))
        }
        Opcode::Closure => proto
            .functions
            .get(inst.arg1 as usize)
            .map(|f| f.name.clone()),
        _ => None,
    }
}
