//! Instruction representation
//!
//! An instruction is an opcode plus four integer arguments.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::opcode::Opcode;

/// Sentinel argument meaning "no argument" or "discard the result"
pub const ARG_INVALID: i64 = i64::MIN;

/// Check if an argument carries a value
pub fn is_valid_arg(arg: i64) -> bool {
    arg != ARG_INVALID
}

/// A single bytecode instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The opcode for this instruction
    pub opcode: Opcode,
    /// First argument, usually the destination register
    pub arg0: i64,
    /// Second argument
    pub arg1: i64,
    /// Third argument
    pub arg2: i64,
    /// Fourth argument
    pub arg3: i64,
}

impl Instruction {
    /// Create a new instruction with all four arguments
    pub fn new(opcode: Opcode, arg0: i64, arg1: i64, arg2: i64, arg3: i64) -> Self {
        Self {
            opcode,
            arg0,
            arg1,
            arg2,
            arg3,
        }
    }

    /// Create an instruction that only uses `arg0`
    pub fn unary(opcode: Opcode, arg0: i64) -> Self {
        Self::new(opcode, arg0, 0, 0, 0)
    }

    /// Create an instruction that uses `arg0` and `arg1`
    pub fn binary(opcode: Opcode, arg0: i64, arg1: i64) -> Self {
        Self::new(opcode, arg0, arg1, 0, 0)
    }

    /// Create an instruction that uses the first three arguments
    pub fn ternary(opcode: Opcode, arg0: i64, arg1: i64, arg2: i64) -> Self {
        Self::new(opcode, arg0, arg1, arg2, 0)
    }

    /// Get an argument by position (0..=3)
    pub fn arg(&self, index: usize) -> Option<i64> {
        match index {
            0 => Some(self.arg0),
            1 => Some(self.arg1),
            2 => Some(self.arg2),
            3 => Some(self.arg3),
            _ => None,
        }
    }

    /// Set an argument by position; out-of-range positions are ignored
    pub fn set_arg(&mut self, index: usize, value: i64) {
        match index {
            0 => self.arg0 = value,
            1 => self.arg1 = value,
            2 => self.arg2 = value,
            3 => self.arg3 = value,
            _ => {}
        }
    }
}

fn fmt_arg(f: &mut fmt::Formatter<'_>, arg: i64) -> fmt::Result {
    if is_valid_arg(arg) {
        write!(f, " {}", arg)
    } else {
        f.write_str(" _")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<14}", self.opcode.name())?;
        for arg in [self.arg0, self.arg1, self.arg2, self.arg3] {
            fmt_arg(f, arg)?;
        }
        Ok(())
    }
}
