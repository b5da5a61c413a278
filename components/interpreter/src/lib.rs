//! Register VM for Tern bytecode
//!
//! This crate executes [`Prototype`](bytecode_system::Prototype)s over the
//! object model in `core_types`:
//! - One value stack shared by all call frames, with frame-relative registers
//! - Outer capture with shared cells that close when their scope ends
//! - Member access through own slots, metamethods and per-type delegates
//! - Class construction, method calls and inheritance hooks
//! - Error unwinding with a per-frame trace, interrupts and depth limits
//! - Automatic cycle collection at call boundaries
//!
//! # Example
//!
//! ```
//! use bytecode_system::{FunctionState, Opcode, ARG_INVALID};
//! use core_types::Value;
//! use interpreter::Vm;
//! use std::rc::Rc;
//!
//! // function(x) { return x + 1 }
//! let mut fs = FunctionState::new("inc");
//! let x = fs.add_parameter("x").unwrap() as i64;
//! let one = fs.push_target(None).unwrap() as i64;
//! fs.emit(Opcode::LoadInteger, one, 1, 0, 0);
//! fs.emit(Opcode::Add, one, x, one, 0);
//! fs.emit(Opcode::Return, one, ARG_INVALID, 0, 0);
//!
//! let mut vm = Vm::new();
//! let inc = Value::Closure(vm.closure_from_prototype(Rc::new(fs.build_prototype())).unwrap());
//! let result = vm.call(&inc, &[Value::Null, Value::Integer(5)]).unwrap();
//! assert_eq!(result.as_int(), Some(6));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call_frame;
pub mod config;
mod context;
mod delegates;
mod dispatch;
mod gc_integration;
mod members;
pub mod outers;
pub mod vm;

// Re-export main types at crate root
pub use call_frame::CallFrame;
pub use config::VmConfig;
pub use outers::OpenOuters;
pub use vm::Vm;
