//! Bytecode system for the Tern runtime
//!
//! This crate defines the register instruction set, the literal table, the
//! immutable [`Prototype`] produced for each compiled function, and the
//! [`FunctionState`] builder a compiler drives to emit it.
//!
//! # Features
//!
//! - Four-argument register instructions with an [`ARG_INVALID`] sentinel
//! - Single-pass peephole fusion on append
//! - Local/outer resolution across nested functions
//! - JSON interchange and a disassembler
//!
//! # Example
//!
//! ```
//! use bytecode_system::{FunctionState, Opcode};
//!
//! let mut fs = FunctionState::new("main");
//! let x = fs.get_string_literal("x").unwrap() as i64;
//!
//! // LOAD into a temporary followed by GET fuses into GETK
//! let tmp = fs.push_target(None).unwrap() as i64;
//! fs.emit(Opcode::Load, tmp, x, 0, 0);
//! fs.emit(Opcode::Get, tmp, tmp, 0, 0);
//!
//! let proto = fs.build_prototype();
//! assert_eq!(proto.instruction_count(), 1);
//! assert_eq!(proto.instructions[0].opcode, Opcode::GetK);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod disasm;
pub mod error;
pub mod function_state;
pub mod instruction;
pub mod literal;
pub mod opcode;
pub mod peephole;
pub mod prototype;

// Re-export main types at crate root
pub use disasm::disassemble;
pub use error::{CompileError, CompileResult, MAX_LITERALS, MAX_STACK_SIZE};
pub use function_state::{FunctionState, LocalState};
pub use instruction::{is_valid_arg, Instruction, ARG_INVALID};
pub use literal::{Literal, SpaceLiteral};
pub use opcode::{AppendKind, BitwiseOp, CmpOp, NewObjectKind, Opcode};
pub use peephole::{EmitterState, Fusion};
pub use prototype::{LineInfo, LocalInfo, OuterInfo, OuterKind, Prototype};
